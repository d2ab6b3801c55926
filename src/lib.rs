pub mod date_util;
pub mod error;
pub mod import;
pub mod metrics;
pub mod query;
pub mod storage;

pub use error::{Error, Result};
pub use import::{ImportBundle, ImportReport};
pub use metrics::{
    CentreReport, EntitySummary, FootfallReport, MetricRow, ProjectionResult, ReportMetric,
    ReportSettings, RevenueReport, SummaryTrend, Target, TargetSource, TrendCategory,
};
pub use query::filter::{ReportFilter, RevenueSource};
pub use query::period::{ComparisonWindows, Month, PeriodWindow};
pub use storage::Database;

// Re-export repository row types needed by the binary crate, but not the module itself
pub use storage::repository::{CentreRow, DivisionRow, TargetRow};

use chrono::NaiveDate;
use storage::repository;

/// Main entry point for the clinic reporting warehouse.
pub struct ClinicDW {
    db: Database,
}

impl ClinicDW {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Access the database (for direct queries in the CLI).
    pub fn db(&self) -> &Database {
        &self.db
    }

    // ── Settings ─────────────────────────────────────────────────

    pub async fn settings(&self) -> Result<ReportSettings> {
        Ok(self.db.reader().call(|conn| repository::load_settings(conn)).await?)
    }

    /// Resolve the target for a report: an explicit value wins, then a
    /// stored monthly target. An unusable explicit value resolves to no
    /// target, so the report carries no projection (footfall falls back to
    /// its recommended target).
    async fn resolve_target(
        &self,
        metric: ReportMetric,
        month: Month,
        explicit: Option<f64>,
    ) -> Result<Option<Target>> {
        if let Some(value) = explicit {
            if let Err(e) = validate_target(value) {
                log::warn!("Ignoring {metric} target for {month}: {e}");
                return Ok(None);
            }
            return Ok(Some(Target::explicit(value)));
        }
        Ok(self
            .get_target(metric, month)
            .await?
            .map(Target::configured))
    }

    // ── Reports ──────────────────────────────────────────────────

    pub async fn revenue_report(
        &self,
        month: Month,
        filter: &ReportFilter,
        target: Option<f64>,
        today: NaiveDate,
    ) -> Result<RevenueReport> {
        let settings = self.settings().await?;
        let target = self
            .resolve_target(ReportMetric::Revenue, month, target)
            .await?;
        log::info!(
            "Revenue report for {month} ({})",
            filter.revenue_source().as_str()
        );
        metrics::compute_revenue_report(&self.db, month, filter, target, &settings, today).await
    }

    pub async fn footfall_report(
        &self,
        month: Month,
        filter: &ReportFilter,
        target: Option<f64>,
        today: NaiveDate,
    ) -> Result<FootfallReport> {
        let settings = self.settings().await?;
        let target = self
            .resolve_target(ReportMetric::Footfall, month, target)
            .await?;
        log::info!("Footfall report for {month}");
        metrics::compute_footfall_report(&self.db, month, filter, target, &settings, today).await
    }

    pub async fn centre_report(&self, month: Month, metric: ReportMetric) -> Result<CentreReport> {
        let settings = self.settings().await?;
        log::info!("Centre report for {month} ({metric})");
        metrics::compute_centre_report(&self.db, month, metric, &settings).await
    }

    // ── Lookups ──────────────────────────────────────────────────

    pub async fn list_divisions(&self) -> Result<Vec<DivisionRow>> {
        Ok(self
            .db
            .reader()
            .call(|conn| repository::list_divisions(conn))
            .await?)
    }

    /// Centres ordered by village. Naming a division that does not exist
    /// is an error rather than an empty list.
    pub async fn list_centres(&self, division: Option<&str>) -> Result<Vec<CentreRow>> {
        let division = division
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string);
        let lookup = division.clone();
        let centres = self
            .db
            .reader()
            .call(move |conn| repository::list_centres(conn, lookup.as_deref()))
            .await?;

        if let (Some(name), true) = (division, centres.is_empty()) {
            let known = self
                .list_divisions()
                .await?
                .iter()
                .any(|d| d.name == name);
            if !known {
                return Err(Error::NotFound(format!("division {name:?}")));
            }
        }
        Ok(centres)
    }

    // ── Config ───────────────────────────────────────────────────

    pub async fn config_get(&self, key: &str) -> Result<Option<String>> {
        let key = key.to_string();
        Ok(self
            .db
            .reader()
            .call(move |conn| repository::get_config(conn, &key))
            .await?)
    }

    /// Store a config value. Known report settings are validated first.
    pub async fn config_set(&self, key: &str, value: &str) -> Result<()> {
        let value = value.trim();
        match key {
            repository::EXCLUDED_WEEKDAY_KEY => {
                if repository::parse_weekday_setting(value).is_none() {
                    return Err(Error::Config(format!(
                        "{key} must be a weekday (e.g. sun) or none, got {value:?}"
                    )));
                }
            }
            repository::OTC_MIN_AMOUNT_KEY => match value.parse::<f64>() {
                Ok(n) if n.is_finite() && n >= 0.0 => {}
                _ => {
                    return Err(Error::Config(format!(
                        "{key} must be a non-negative number, got {value:?}"
                    )))
                }
            },
            _ => log::warn!("Setting unrecognised config key {key:?}"),
        }

        let key = key.to_string();
        let value = value.to_string();
        self.db
            .writer()
            .call(move |conn| repository::set_config(conn, &key, &value))
            .await?;
        Ok(())
    }

    pub async fn config_list(&self) -> Result<Vec<(String, String)>> {
        Ok(self
            .db
            .reader()
            .call(|conn| repository::list_config(conn))
            .await?)
    }

    // ── Targets ──────────────────────────────────────────────────

    pub async fn set_target(&self, metric: ReportMetric, month: Month, target: f64) -> Result<()> {
        validate_target(target)?;
        let month_key = month.to_key();
        self.db
            .writer()
            .call(move |conn| repository::set_target(conn, metric.as_str(), &month_key, target))
            .await?;
        log::info!("Set {metric} target for {month} to {target}");
        Ok(())
    }

    pub async fn get_target(&self, metric: ReportMetric, month: Month) -> Result<Option<f64>> {
        let month_key = month.to_key();
        Ok(self
            .db
            .reader()
            .call(move |conn| repository::get_target(conn, metric.as_str(), &month_key))
            .await?)
    }

    pub async fn list_targets(&self, metric: Option<ReportMetric>) -> Result<Vec<TargetRow>> {
        Ok(self
            .db
            .reader()
            .call(move |conn| repository::list_targets(conn, metric.map(|m| m.as_str())))
            .await?)
    }

    // ── Import & status ──────────────────────────────────────────

    pub async fn import_file(&self, path: impl AsRef<std::path::Path>) -> Result<ImportReport> {
        let bundle = import::load_bundle(path)?;
        import::import_bundle(&self.db, bundle).await
    }

    pub async fn import_bundle(&self, bundle: ImportBundle) -> Result<ImportReport> {
        import::import_bundle(&self.db, bundle).await
    }

    /// Row counts per warehouse table.
    pub async fn status(&self) -> Result<Vec<(String, i64)>> {
        Ok(self
            .db
            .reader()
            .call(|conn| repository::table_counts(conn))
            .await?)
    }
}

fn validate_target(target: f64) -> Result<()> {
    if target.is_finite() && target > 0.0 {
        Ok(())
    } else {
        Err(Error::InvalidTarget(format!(
            "target must be a positive number, got {target}"
        )))
    }
}
