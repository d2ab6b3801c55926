pub mod daily;
pub mod projection;
pub mod trend;
pub mod types;

pub use types::*;

use std::collections::HashSet;

use chrono::NaiveDate;
use rusqlite::Connection;

use crate::date_util::parse_date_key;
use crate::error::{Error, Result};
use crate::query::filter::{DivisionScope, FactTable, ReportFilter};
use crate::query::period::{ComparisonWindows, Month, PeriodWindow};
use crate::storage::repository::{self, CentreRow};
use crate::storage::Database;

use daily::{FootfallItem, RevenueItem, Sourced};

// ── Source records ───────────────────────────────────────────────

/// Run a query whose first three columns are date key, division name and
/// centre village, appending one record per row. Rows with an unreadable
/// date key are skipped.
fn query_sourced<T>(
    conn: &Connection,
    sql: &str,
    params: &[Box<dyn rusqlite::types::ToSql>],
    out: &mut Vec<Sourced<T>>,
    item: impl Fn(&rusqlite::Row<'_>) -> rusqlite::Result<T>,
) -> rusqlite::Result<()> {
    let param_refs: Vec<&dyn rusqlite::types::ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(param_refs.as_slice())?;
    while let Some(row) = rows.next()? {
        let key: String = row.get(0)?;
        let Some(date) = parse_date_key(&key) else {
            log::warn!("Skipping row with unreadable date key {key:?}");
            continue;
        };
        out.push(Sourced {
            date,
            division: row.get(1)?,
            centre: row.get(2)?,
            item: item(row)?,
        });
    }
    Ok(())
}

/// Revenue records in the window. Visits skip non-reporting divisions
/// unless the filter names one; OTC sales are never restricted.
pub async fn fetch_revenue_records(
    db: &Database,
    window: &PeriodWindow,
    filter: &ReportFilter,
) -> Result<Vec<Sourced<RevenueItem>>> {
    let window = window.clone();
    let filter = filter.clone();
    db.reader()
        .call(move |conn| {
            let mut out = Vec::new();
            let source = filter.revenue_source();

            if source.includes_visits() {
                let (where_sql, params) =
                    filter.build_where(&window, DivisionScope::ReportingUnlessNamed);
                let sql = format!(
                    "SELECT f.created_date_key, d.name, c.village,
                            f.cost, f.consultation, f.medicine, f.diagnostics, f.poc, f.eye
                     {} {where_sql}
                     ORDER BY f.created_at, f.visit_id",
                    FactTable::Visits.from_clause()
                );
                query_sourced(conn, &sql, &params, &mut out, |row| {
                    Ok(RevenueItem::Visit {
                        cost: row.get(3)?,
                        consultation: row.get(4)?,
                        medicine: row.get(5)?,
                        diagnostics: row.get(6)?,
                        poc: row.get(7)?,
                        eye: row.get(8)?,
                    })
                })?;
            }

            if source.includes_otc() {
                let (where_sql, params) = filter.build_where(&window, DivisionScope::Any);
                let sql = format!(
                    "SELECT f.created_date_key, d.name, c.village,
                            f.cost, f.paid_amount, f.medicine, f.diagnostics, f.poc
                     {} {where_sql}
                     ORDER BY f.created_at, f.sale_id",
                    FactTable::OtcSales.from_clause()
                );
                query_sourced(conn, &sql, &params, &mut out, |row| {
                    Ok(RevenueItem::OtcSale {
                        cost: row.get(3)?,
                        paid_amount: row.get(4)?,
                        medicine: row.get(5)?,
                        diagnostics: row.get(6)?,
                        poc: row.get(7)?,
                    })
                })?;
            }

            Ok::<_, rusqlite::Error>(out)
        })
        .await
        .map_err(|e| Error::Database(e.to_string()))
}

/// Footfall candidates in the window, from active reporting divisions.
/// Whether each one counts is decided by [`FootfallItem::counts`].
pub async fn fetch_footfall_records(
    db: &Database,
    window: &PeriodWindow,
    filter: &ReportFilter,
) -> Result<Vec<Sourced<FootfallItem>>> {
    let window = window.clone();
    let filter = filter.clone();
    db.reader()
        .call(move |conn| {
            let mut out = Vec::new();
            let (where_sql, params) = filter.build_where(&window, DivisionScope::Reporting);

            let sql = format!(
                "SELECT f.created_date_key, d.name, c.village, f.status, doc.speciality
                 {} {where_sql}
                 ORDER BY f.created_at, f.visit_id",
                FactTable::Visits.from_clause()
            );
            query_sourced(conn, &sql, &params, &mut out, |row| {
                Ok(FootfallItem::Visit {
                    status: row.get(3)?,
                    speciality: row.get(4)?,
                })
            })?;

            let sql = format!(
                "SELECT f.created_date_key, d.name, c.village, f.cost, f.paid_amount,
                        (SELECT vd.speciality
                           FROM fact_visits v
                           LEFT JOIN doctors vd ON vd.doctor_id = v.doctor_id
                          WHERE v.patient_id = f.patient_id AND v.created_at <= f.created_at
                          ORDER BY v.created_at DESC, v.visit_id DESC
                          LIMIT 1)
                 {} {where_sql}
                 ORDER BY f.created_at, f.sale_id",
                FactTable::OtcSales.from_clause()
            );
            query_sourced(conn, &sql, &params, &mut out, |row| {
                Ok(FootfallItem::OtcSale {
                    cost: row.get(3)?,
                    paid_amount: row.get(4)?,
                    speciality: row.get(5)?,
                })
            })?;

            Ok::<_, rusqlite::Error>(out)
        })
        .await
        .map_err(|e| Error::Database(e.to_string()))
}

/// Daily revenue rows for the window, ordered by date.
pub async fn fetch_daily_revenue(
    db: &Database,
    window: &PeriodWindow,
    filter: &ReportFilter,
) -> Result<Vec<MetricRow>> {
    let records = fetch_revenue_records(db, window, filter).await?;
    Ok(daily::fold_revenue(&records))
}

/// Daily footfall rows for the window, ordered by date.
pub async fn fetch_daily_footfall(
    db: &Database,
    window: &PeriodWindow,
    filter: &ReportFilter,
    otc_min_amount: f64,
) -> Result<Vec<MetricRow>> {
    let records = fetch_footfall_records(db, window, filter).await?;
    Ok(daily::fold_footfall(&records, otc_min_amount))
}

pub async fn fetch_reporting_centres(db: &Database) -> Result<Vec<CentreRow>> {
    Ok(db
        .reader()
        .call(|conn| repository::list_reporting_centres(conn))
        .await?)
}

// ── Reports ──────────────────────────────────────────────────────

pub async fn compute_revenue_report(
    db: &Database,
    month: Month,
    filter: &ReportFilter,
    target: Option<Target>,
    settings: &ReportSettings,
    today: NaiveDate,
) -> Result<RevenueReport> {
    let windows = ComparisonWindows::for_month(month);
    let (current, last_3, last_3_prev_year) = tokio::try_join!(
        fetch_daily_revenue(db, &windows.this_month, filter),
        fetch_daily_revenue(db, &windows.last_3_months, filter),
        fetch_daily_revenue(db, &windows.last_3_months_prev_year, filter),
    )?;

    let projection = target.and_then(|t| {
        projection::build_projection(&current, t.value, month, today, settings.excluded_weekday)
    });

    Ok(RevenueReport {
        month: month.to_key(),
        label: month.label(),
        source: filter.revenue_source(),
        division: filter.division_name().map(str::to_string),
        centre_id: filter.centre_id(),
        total: daily::total(&current),
        categories: daily::category_shares(&daily::category_totals(&current)),
        last_3_months: daily::period_totals(&last_3, &windows.last_3_months),
        last_3_months_prev_year: daily::period_totals(
            &last_3_prev_year,
            &windows.last_3_months_prev_year,
        ),
        daily: current,
        target,
        projection,
    })
}

/// Footfall report. Without a target, the recommended target is used.
pub async fn compute_footfall_report(
    db: &Database,
    month: Month,
    filter: &ReportFilter,
    target: Option<Target>,
    settings: &ReportSettings,
    today: NaiveDate,
) -> Result<FootfallReport> {
    let windows = ComparisonWindows::for_month(month);
    let min = settings.otc_min_amount;
    let (current, last_3, last_3_prev_year, prev_month, prev_month_prev_year) = tokio::try_join!(
        fetch_daily_footfall(db, &windows.this_month, filter, min),
        fetch_daily_footfall(db, &windows.last_3_months, filter, min),
        fetch_daily_footfall(db, &windows.last_3_months_prev_year, filter, min),
        fetch_daily_footfall(db, &windows.prev_month, filter, min),
        fetch_daily_footfall(db, &windows.prev_month_prev_year, filter, min),
    )?;

    let prev_month_total = daily::total(&prev_month);
    let prev_year_prev_month_total = daily::total(&prev_month_prev_year);
    let recommended_target =
        projection::recommended_target(prev_month_total, prev_year_prev_month_total);
    let target = target.unwrap_or(Target {
        value: recommended_target,
        source: TargetSource::Recommended,
    });
    let projection = projection::build_projection(
        &current,
        target.value,
        month,
        today,
        settings.excluded_weekday,
    );

    let speciality_totals = daily::category_totals(&current);
    Ok(FootfallReport {
        month: month.to_key(),
        label: month.label(),
        division: filter.division_name().map(str::to_string),
        centre_id: filter.centre_id(),
        total: daily::total(&current),
        specialities: daily::category_names(&current),
        speciality_shares: daily::category_shares(&speciality_totals),
        last_3_months: daily::period_totals(&last_3, &windows.last_3_months),
        last_3_months_prev_year: daily::period_totals(
            &last_3_prev_year,
            &windows.last_3_months_prev_year,
        ),
        daily: current,
        prev_month_total,
        prev_year_prev_month_total,
        recommended_target,
        target,
        projection,
    })
}

enum CentreRecords {
    Revenue(Vec<Sourced<RevenueItem>>),
    Footfall(Vec<Sourced<FootfallItem>>),
}

impl CentreRecords {
    async fn fetch(db: &Database, metric: ReportMetric, window: &PeriodWindow) -> Result<Self> {
        let filter = ReportFilter::new();
        Ok(match metric {
            ReportMetric::Revenue => {
                CentreRecords::Revenue(fetch_revenue_records(db, window, &filter).await?)
            }
            ReportMetric::Footfall => {
                CentreRecords::Footfall(fetch_footfall_records(db, window, &filter).await?)
            }
        })
    }

    fn retain_roster(&mut self, roster: &HashSet<(String, String)>) {
        let keep = |division: &str, centre: &str| {
            roster.contains(&(division.to_string(), centre.to_string()))
        };
        match self {
            CentreRecords::Revenue(r) => r.retain(|s| keep(&s.division, &s.centre)),
            CentreRecords::Footfall(r) => r.retain(|s| keep(&s.division, &s.centre)),
        }
    }

    fn entity_totals(&self, otc_min_amount: f64) -> Vec<EntityTotal> {
        match self {
            CentreRecords::Revenue(r) => daily::revenue_by_entity(r),
            CentreRecords::Footfall(r) => daily::footfall_by_entity(r, otc_min_amount),
        }
    }

    fn daily(&self, otc_min_amount: f64) -> Vec<MetricRow> {
        match self {
            CentreRecords::Revenue(r) => daily::fold_revenue(r),
            CentreRecords::Footfall(r) => daily::fold_footfall(r, otc_min_amount),
        }
    }
}

/// Trend table over every reporting centre. Centres with no data still
/// appear, with zero totals.
pub async fn compute_centre_report(
    db: &Database,
    month: Month,
    metric: ReportMetric,
    settings: &ReportSettings,
) -> Result<CentreReport> {
    let windows = ComparisonWindows::for_month(month);
    let (roster, mut current, mut prev_month, mut prev_year) = tokio::try_join!(
        fetch_reporting_centres(db),
        CentreRecords::fetch(db, metric, &windows.this_month),
        CentreRecords::fetch(db, metric, &windows.prev_month),
        CentreRecords::fetch(db, metric, &windows.prev_year),
    )?;

    let roster_keys: HashSet<(String, String)> = roster
        .iter()
        .map(|c| (c.division_name.clone(), c.village.clone()))
        .collect();
    for records in [&mut current, &mut prev_month, &mut prev_year] {
        records.retain_roster(&roster_keys);
    }

    let min = settings.otc_min_amount;
    let mut current_totals: Vec<EntityTotal> = roster
        .iter()
        .map(|c| EntityTotal {
            division: c.division_name.clone(),
            centre: c.village.clone(),
            value: 0.0,
        })
        .collect();
    current_totals.extend(current.entity_totals(min));

    let summaries = trend::build_entity_summaries(
        &current_totals,
        &prev_month.entity_totals(min),
        &prev_year.entity_totals(min),
    );
    let summary = trend::summarize(&summaries);
    let daily_comparison = daily::align_by_day(
        &current.daily(min),
        month,
        &prev_month.daily(min),
        month.previous(),
    );

    log::debug!(
        "Centre report {month} ({metric}): {} centres",
        summaries.len()
    );

    Ok(CentreReport {
        month: month.to_key(),
        label: month.label(),
        metric,
        summaries,
        summary,
        daily_comparison,
    })
}
