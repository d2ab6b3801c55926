use std::collections::{BTreeMap, BTreeSet};

use chrono::{Datelike, NaiveDate};

use crate::date_util::{non_negative, round_to};
use crate::metrics::types::{
    CategoryShare, DayComparison, EntityTotal, MetricRow, MonthTotal, PeriodTotals,
};
use crate::query::period::{Month, PeriodWindow};

/// Revenue categories every revenue row carries.
pub const REVENUE_CATEGORIES: [&str; 6] =
    ["consultation", "medicine", "diagnostics", "poc", "eye", "otc"];

/// Speciality bucket for visits without a doctor speciality.
pub const OTHER_SPECIALITY: &str = "other";

/// A source record tagged with its day and owning entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Sourced<T> {
    pub date: NaiveDate,
    pub division: String,
    pub centre: String,
    pub item: T,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RevenueItem {
    Visit {
        cost: f64,
        consultation: f64,
        medicine: f64,
        diagnostics: f64,
        poc: f64,
        eye: f64,
    },
    OtcSale {
        cost: f64,
        paid_amount: Option<f64>,
        medicine: f64,
        diagnostics: f64,
        poc: f64,
    },
}

impl RevenueItem {
    /// Amount this record adds to the day's total.
    pub fn amount(&self) -> f64 {
        match self {
            RevenueItem::Visit { cost, .. } => non_negative(*cost),
            RevenueItem::OtcSale {
                cost, paid_amount, ..
            } => otc_paid(*cost, *paid_amount),
        }
    }

    /// Per-category amounts, in `REVENUE_CATEGORIES` order.
    pub fn categories(&self) -> [f64; 6] {
        match self {
            RevenueItem::Visit {
                consultation,
                medicine,
                diagnostics,
                poc,
                eye,
                ..
            } => [
                non_negative(*consultation),
                non_negative(*medicine),
                non_negative(*diagnostics),
                non_negative(*poc),
                non_negative(*eye),
                0.0,
            ],
            RevenueItem::OtcSale {
                medicine,
                diagnostics,
                poc,
                ..
            } => {
                let (medicine, diagnostics, poc) = (
                    non_negative(*medicine),
                    non_negative(*diagnostics),
                    non_negative(*poc),
                );
                let otc = non_negative(self.amount() - medicine - diagnostics - poc);
                [0.0, medicine, diagnostics, poc, 0.0, otc]
            }
        }
    }
}

/// Paid amount, falling back to the list cost only when none was recorded.
fn otc_paid(cost: f64, paid_amount: Option<f64>) -> f64 {
    paid_amount
        .map(non_negative)
        .unwrap_or_else(|| non_negative(cost))
}

#[derive(Debug, Clone, PartialEq)]
pub enum FootfallItem {
    Visit {
        status: String,
        speciality: Option<String>,
    },
    OtcSale {
        cost: f64,
        paid_amount: Option<f64>,
        /// Speciality of the patient's latest visit at or before the sale.
        speciality: Option<String>,
    },
}

impl FootfallItem {
    /// Whether this record counts as one unit of footfall.
    pub fn counts(&self, otc_min_amount: f64) -> bool {
        match self {
            FootfallItem::Visit { status, .. } => status.trim().eq_ignore_ascii_case("A"),
            FootfallItem::OtcSale {
                cost, paid_amount, ..
            } => otc_paid(*cost, *paid_amount) > otc_min_amount,
        }
    }

    pub fn speciality(&self) -> String {
        match self {
            FootfallItem::Visit { speciality, .. } | FootfallItem::OtcSale { speciality, .. } => {
                normalize_speciality(speciality.as_deref())
            }
        }
    }
}

/// Trimmed speciality name; blank or missing becomes `other`.
pub fn normalize_speciality(speciality: Option<&str>) -> String {
    match speciality.map(str::trim) {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => OTHER_SPECIALITY.to_string(),
    }
}

fn revenue_row(date: NaiveDate) -> MetricRow {
    MetricRow {
        date,
        value: 0.0,
        category_breakdown: REVENUE_CATEGORIES
            .iter()
            .map(|c| (c.to_string(), 0.0))
            .collect(),
    }
}

/// Fold revenue records into one row per day, ordered by date.
pub fn fold_revenue(records: &[Sourced<RevenueItem>]) -> Vec<MetricRow> {
    let mut by_date: BTreeMap<NaiveDate, MetricRow> = BTreeMap::new();
    for rec in records {
        let row = by_date
            .entry(rec.date)
            .or_insert_with(|| revenue_row(rec.date));
        row.value += rec.item.amount();
        for (name, amount) in REVENUE_CATEGORIES.iter().zip(rec.item.categories()) {
            *row.category_breakdown.entry(name.to_string()).or_insert(0.0) += amount;
        }
    }
    by_date.into_values().collect()
}

/// Fold footfall records into one row per day, broken down by speciality.
pub fn fold_footfall(records: &[Sourced<FootfallItem>], otc_min_amount: f64) -> Vec<MetricRow> {
    let mut by_date: BTreeMap<NaiveDate, MetricRow> = BTreeMap::new();
    for rec in records.iter().filter(|r| r.item.counts(otc_min_amount)) {
        let row = by_date.entry(rec.date).or_insert_with(|| MetricRow {
            date: rec.date,
            value: 0.0,
            category_breakdown: BTreeMap::new(),
        });
        row.value += 1.0;
        *row
            .category_breakdown
            .entry(rec.item.speciality())
            .or_insert(0.0) += 1.0;
    }
    by_date.into_values().collect()
}

fn entity_totals<T>(
    records: &[Sourced<T>],
    value: impl Fn(&T) -> f64,
) -> Vec<EntityTotal> {
    let mut by_entity: BTreeMap<(String, String), f64> = BTreeMap::new();
    for rec in records {
        *by_entity
            .entry((rec.division.clone(), rec.centre.clone()))
            .or_insert(0.0) += value(&rec.item);
    }
    by_entity
        .into_iter()
        .map(|((division, centre), value)| EntityTotal {
            division,
            centre,
            value,
        })
        .collect()
}

pub fn revenue_by_entity(records: &[Sourced<RevenueItem>]) -> Vec<EntityTotal> {
    entity_totals(records, RevenueItem::amount)
}

pub fn footfall_by_entity(
    records: &[Sourced<FootfallItem>],
    otc_min_amount: f64,
) -> Vec<EntityTotal> {
    entity_totals(records, |item| {
        if item.counts(otc_min_amount) {
            1.0
        } else {
            0.0
        }
    })
}

pub fn total(rows: &[MetricRow]) -> f64 {
    rows.iter().map(|r| r.value).sum()
}

pub fn category_totals(rows: &[MetricRow]) -> BTreeMap<String, f64> {
    let mut totals = BTreeMap::new();
    for row in rows {
        for (name, value) in &row.category_breakdown {
            *totals.entry(name.clone()).or_insert(0.0) += value;
        }
    }
    totals
}

/// Share of each non-zero category, largest first.
pub fn category_shares(totals: &BTreeMap<String, f64>) -> Vec<CategoryShare> {
    let sum: f64 = totals.values().sum();
    if sum <= 0.0 {
        return Vec::new();
    }
    let mut shares: Vec<CategoryShare> = totals
        .iter()
        .filter(|(_, v)| **v > 0.0)
        .map(|(name, v)| CategoryShare {
            category: name.clone(),
            value: *v,
            percentage: round_to(v * 100.0 / sum, 1),
        })
        .collect();
    shares.sort_by(|a, b| b.value.total_cmp(&a.value));
    shares
}

/// Sorted category names seen across the rows.
pub fn category_names(rows: &[MetricRow]) -> Vec<String> {
    let names: BTreeSet<&String> = rows.iter().flat_map(|r| r.category_breakdown.keys()).collect();
    names.into_iter().cloned().collect()
}

/// Totals per calendar month of the window, zero for months without rows.
pub fn monthly_totals(rows: &[MetricRow], window: &PeriodWindow) -> Vec<MonthTotal> {
    let mut months = Vec::new();
    let mut month = Month::containing(window.from);
    let last = Month::containing(window.to);
    while month <= last {
        let value = rows
            .iter()
            .filter(|r| month.contains(r.date) && window.contains(r.date))
            .map(|r| r.value)
            .sum();
        months.push(MonthTotal {
            month_key: month.to_key(),
            label: month.label(),
            value,
        });
        month = month.next();
    }
    months
}

pub fn period_totals(rows: &[MetricRow], window: &PeriodWindow) -> PeriodTotals {
    let in_window: Vec<MetricRow> = rows
        .iter()
        .filter(|r| window.contains(r.date))
        .cloned()
        .collect();
    PeriodTotals {
        window: window.clone(),
        label: window.range_label(),
        total: total(&in_window),
        categories: category_totals(&in_window),
        months: monthly_totals(&in_window, window),
    }
}

/// Current and previous month values side by side by day of month.
/// Days present in only one of the months are `None` on the other side.
pub fn align_by_day(
    current: &[MetricRow],
    current_month: Month,
    previous: &[MetricRow],
    previous_month: Month,
) -> Vec<DayComparison> {
    let per_day = |rows: &[MetricRow], month: Month| -> BTreeMap<u32, f64> {
        let mut map = BTreeMap::new();
        for r in rows.iter().filter(|r| month.contains(r.date)) {
            *map.entry(r.date.day()).or_insert(0.0) += r.value;
        }
        map
    };
    let cur = per_day(current, current_month);
    let prev = per_day(previous, previous_month);

    let days = current_month.days().max(previous_month.days());
    (1..=days)
        .map(|day| DayComparison {
            day,
            current: (day <= current_month.days())
                .then(|| cur.get(&day).copied().unwrap_or(0.0)),
            previous: (day <= previous_month.days())
                .then(|| prev.get(&day).copied().unwrap_or(0.0)),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn sourced<T>(date: NaiveDate, centre: &str, item: T) -> Sourced<T> {
        Sourced {
            date,
            division: "North".to_string(),
            centre: centre.to_string(),
            item,
        }
    }

    fn visit(cost: f64, consultation: f64, medicine: f64) -> RevenueItem {
        RevenueItem::Visit {
            cost,
            consultation,
            medicine,
            diagnostics: 0.0,
            poc: 0.0,
            eye: 0.0,
        }
    }

    fn sale(cost: f64, paid: Option<f64>, medicine: f64) -> RevenueItem {
        RevenueItem::OtcSale {
            cost,
            paid_amount: paid,
            medicine,
            diagnostics: 0.0,
            poc: 0.0,
        }
    }

    fn footfall_visit(status: &str, speciality: Option<&str>) -> FootfallItem {
        FootfallItem::Visit {
            status: status.to_string(),
            speciality: speciality.map(str::to_string),
        }
    }

    #[test]
    fn test_otc_remainder_category() {
        let item = sale(300.0, Some(250.0), 200.0);
        assert_eq!(item.amount(), 250.0);
        assert_eq!(item.categories(), [0.0, 200.0, 0.0, 0.0, 0.0, 50.0]);

        // Components exceeding the paid amount leave no negative remainder.
        let item = sale(100.0, Some(80.0), 90.0);
        assert_eq!(item.categories()[5], 0.0);

        // A missing paid amount falls back to cost; a waived sale stays at zero.
        assert_eq!(sale(120.0, None, 0.0).amount(), 120.0);
        assert_eq!(sale(120.0, Some(0.0), 0.0).amount(), 0.0);
        assert_eq!(sale(120.0, Some(0.0), 0.0).categories(), [0.0; 6]);
    }

    #[test]
    fn test_fold_revenue() {
        let records = vec![
            sourced(d(2025, 9, 2), "A", visit(500.0, 200.0, 300.0)),
            sourced(d(2025, 9, 1), "A", sale(100.0, Some(100.0), 40.0)),
            sourced(d(2025, 9, 2), "B", sale(80.0, None, 0.0)),
            sourced(d(2025, 9, 2), "B", visit(f64::NAN, -5.0, 0.0)),
        ];
        let rows = fold_revenue(&records);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].date, d(2025, 9, 1));
        assert_eq!(rows[0].value, 100.0);
        assert_eq!(rows[0].category_breakdown.len(), 6);
        assert_eq!(rows[0].category_breakdown["otc"], 60.0);
        assert_eq!(rows[0].category_breakdown["consultation"], 0.0);

        assert_eq!(rows[1].value, 580.0);
        assert_eq!(rows[1].category_breakdown["consultation"], 200.0);
        assert_eq!(rows[1].category_breakdown["medicine"], 300.0);
        assert_eq!(rows[1].category_breakdown["otc"], 80.0);
    }

    #[test]
    fn test_fold_footfall() {
        let records = vec![
            sourced(d(2025, 9, 1), "A", footfall_visit("A", Some(" Eye "))),
            sourced(d(2025, 9, 1), "A", footfall_visit("C", Some("Eye"))),
            sourced(d(2025, 9, 1), "A", footfall_visit("a", None)),
            sourced(
                d(2025, 9, 1),
                "A",
                FootfallItem::OtcSale {
                    cost: 100.0,
                    paid_amount: Some(75.0),
                    speciality: Some("Eye".into()),
                },
            ),
            sourced(
                d(2025, 9, 2),
                "A",
                FootfallItem::OtcSale {
                    cost: 60.0,
                    paid_amount: None,
                    speciality: None,
                },
            ),
        ];
        let rows = fold_footfall(&records, 60.0);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].value, 3.0);
        assert_eq!(rows[0].category_breakdown["Eye"], 2.0);
        assert_eq!(rows[0].category_breakdown["other"], 1.0);

        let totals = footfall_by_entity(&records, 60.0);
        assert_eq!(totals.len(), 1);
        assert_eq!(totals[0].value, 3.0);
    }

    #[test]
    fn test_waived_otc_sale_does_not_count() {
        let waived = FootfallItem::OtcSale {
            cost: 500.0,
            paid_amount: Some(0.0),
            speciality: None,
        };
        assert!(!waived.counts(60.0));

        let unrecorded = FootfallItem::OtcSale {
            cost: 500.0,
            paid_amount: None,
            speciality: None,
        };
        assert!(unrecorded.counts(60.0));
        assert_eq!(sale(500.0, Some(0.0), 0.0).amount(), 0.0);
    }

    #[test]
    fn test_revenue_by_entity() {
        let records = vec![
            sourced(d(2025, 9, 1), "B", visit(10.0, 0.0, 0.0)),
            sourced(d(2025, 9, 3), "A", visit(5.0, 0.0, 0.0)),
            sourced(d(2025, 9, 2), "B", sale(7.0, None, 0.0)),
        ];
        let totals = revenue_by_entity(&records);
        assert_eq!(totals.len(), 2);
        assert_eq!(totals[0].centre, "A");
        assert_eq!(totals[1].value, 17.0);
    }

    #[test]
    fn test_category_shares() {
        let mut totals = BTreeMap::new();
        totals.insert("medicine".to_string(), 200.0);
        totals.insert("consultation".to_string(), 100.0);
        totals.insert("eye".to_string(), 0.0);
        let shares = category_shares(&totals);
        assert_eq!(shares.len(), 2);
        assert_eq!(shares[0].category, "medicine");
        assert_eq!(shares[0].percentage, 66.7);
        assert_eq!(shares[1].percentage, 33.3);

        assert!(category_shares(&BTreeMap::new()).is_empty());
    }

    #[test]
    fn test_period_totals_with_months() {
        let window = crate::query::period::resolve_last_n_months("2025-12", 3).unwrap();
        let rows = vec![
            MetricRow {
                date: d(2025, 9, 10),
                value: 10.0,
                category_breakdown: BTreeMap::from([("x".to_string(), 10.0)]),
            },
            MetricRow {
                date: d(2025, 11, 30),
                value: 5.0,
                category_breakdown: BTreeMap::new(),
            },
            MetricRow {
                date: d(2025, 12, 1),
                value: 99.0,
                category_breakdown: BTreeMap::new(),
            },
        ];
        let totals = period_totals(&rows, &window);
        assert_eq!(totals.total, 15.0);
        assert_eq!(totals.label, "Sep-Nov 2025");
        assert_eq!(totals.categories["x"], 10.0);
        let months: Vec<(&str, f64)> = totals
            .months
            .iter()
            .map(|m| (m.label.as_str(), m.value))
            .collect();
        assert_eq!(months, vec![("Sep 2025", 10.0), ("Oct 2025", 0.0), ("Nov 2025", 5.0)]);
    }

    #[test]
    fn test_align_by_day() {
        let cur_month = Month::new(2025, 3).unwrap();
        let prev_month = Month::new(2025, 2).unwrap();
        let current = vec![MetricRow {
            date: d(2025, 3, 31),
            value: 4.0,
            category_breakdown: BTreeMap::new(),
        }];
        let previous = vec![MetricRow {
            date: d(2025, 2, 1),
            value: 9.0,
            category_breakdown: BTreeMap::new(),
        }];
        let aligned = align_by_day(&current, cur_month, &previous, prev_month);
        assert_eq!(aligned.len(), 31);
        assert_eq!(aligned[0].previous, Some(9.0));
        assert_eq!(aligned[0].current, Some(0.0));
        assert_eq!(aligned[27].previous, Some(0.0));
        assert_eq!(aligned[28].previous, None);
        assert_eq!(aligned[30].current, Some(4.0));
    }

    #[test]
    fn test_normalize_speciality() {
        assert_eq!(normalize_speciality(Some("  Dental ")), "Dental");
        assert_eq!(normalize_speciality(Some("   ")), "other");
        assert_eq!(normalize_speciality(None), "other");
    }
}
