use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{NaiveDate, Weekday};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::query::filter::RevenueSource;
use crate::query::period::PeriodWindow;

/// One aggregated observation for one calendar day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricRow {
    pub date: NaiveDate,
    pub value: f64,
    /// Sub-totals per category. They need not sum to `value`.
    pub category_breakdown: BTreeMap<String, f64>,
}

/// Total for one division + centre over one window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityTotal {
    pub division: String,
    pub centre: String,
    pub value: f64,
}

/// Trend bucket for an entity, by direction against last month and last year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TrendCategory {
    All,
    Stars,
    Concerning,
    #[serde(rename = "Better than last year")]
    BetterThanLastYear,
    #[serde(rename = "Better than last month")]
    BetterThanLastMonth,
}

impl TrendCategory {
    pub fn label(&self) -> &'static str {
        match self {
            TrendCategory::All => "All",
            TrendCategory::Stars => "Stars",
            TrendCategory::Concerning => "Concerning",
            TrendCategory::BetterThanLastYear => "Better than last year",
            TrendCategory::BetterThanLastMonth => "Better than last month",
        }
    }
}

impl std::fmt::Display for TrendCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One row of the centre trend table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntitySummary {
    pub division: String,
    pub centre: String,
    pub current: f64,
    pub prev_month: f64,
    pub prev_year: f64,
    pub trend_month_pct: Option<f64>,
    pub trend_year_pct: Option<f64>,
    pub trend_month_display: String,
    pub trend_year_display: String,
    pub category: TrendCategory,
}

/// Totals across all entities, with mean trends.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryTrend {
    pub entity_count: usize,
    pub total_current: f64,
    pub total_prev_month: f64,
    pub total_prev_year: f64,
    pub trend_month_pct: f64,
    pub trend_year_pct: f64,
    pub trend_month_display: String,
    pub trend_year_display: String,
}

/// Least-squares fit over `(day_of_month, cumulative)` points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Regression {
    pub slope: f64,
    pub intercept: f64,
    pub points: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectionPoint {
    pub day: u32,
    pub date: NaiveDate,
    pub actual_cumulative: Option<f64>,
    pub target_line: f64,
    pub trend_line: Option<f64>,
}

/// Month-to-date progress against a target, with a month-end projection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectionResult {
    pub month: String,
    pub target: f64,
    pub month_to_date_total: f64,
    pub projected_month_end: f64,
    pub required_per_remaining_day: Option<f64>,
    pub is_on_track: bool,
    pub is_ongoing_month: bool,
    pub days_in_month: u32,
    pub days_remaining: u32,
    pub remaining_working_days: u32,
    pub regression: Option<Regression>,
    pub series: Vec<ProjectionPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryShare {
    pub category: String,
    pub value: f64,
    /// Percent of the total, one decimal place.
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthTotal {
    pub month_key: String,
    pub label: String,
    pub value: f64,
}

/// One side of a multi-month comparison.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodTotals {
    pub window: PeriodWindow,
    pub label: String,
    pub total: f64,
    pub categories: BTreeMap<String, f64>,
    pub months: Vec<MonthTotal>,
}

/// Current and previous month values for the same day of month.
/// `None` when that day does not exist in the month.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayComparison {
    pub day: u32,
    pub current: Option<f64>,
    pub previous: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetSource {
    Explicit,
    Configured,
    Recommended,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Target {
    pub value: f64,
    pub source: TargetSource,
}

impl Target {
    pub fn explicit(value: f64) -> Self {
        Self {
            value,
            source: TargetSource::Explicit,
        }
    }

    pub fn configured(value: f64) -> Self {
        Self {
            value,
            source: TargetSource::Configured,
        }
    }
}

/// Metric a target or centre report is keyed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportMetric {
    #[default]
    Footfall,
    Revenue,
}

impl ReportMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportMetric::Footfall => "footfall",
            ReportMetric::Revenue => "revenue",
        }
    }
}

impl FromStr for ReportMetric {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "footfall" => Ok(ReportMetric::Footfall),
            "revenue" => Ok(ReportMetric::Revenue),
            other => Err(Error::Other(format!(
                "unknown metric {other:?} (expected footfall or revenue)"
            ))),
        }
    }
}

impl std::fmt::Display for ReportMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RevenueReport {
    pub month: String,
    pub label: String,
    pub source: RevenueSource,
    pub division: Option<String>,
    pub centre_id: Option<i64>,
    pub daily: Vec<MetricRow>,
    pub total: f64,
    pub categories: Vec<CategoryShare>,
    pub last_3_months: PeriodTotals,
    pub last_3_months_prev_year: PeriodTotals,
    pub target: Option<Target>,
    pub projection: Option<ProjectionResult>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FootfallReport {
    pub month: String,
    pub label: String,
    pub division: Option<String>,
    pub centre_id: Option<i64>,
    pub daily: Vec<MetricRow>,
    pub total: f64,
    pub specialities: Vec<String>,
    pub speciality_shares: Vec<CategoryShare>,
    pub last_3_months: PeriodTotals,
    pub last_3_months_prev_year: PeriodTotals,
    pub prev_month_total: f64,
    pub prev_year_prev_month_total: f64,
    pub recommended_target: f64,
    pub target: Target,
    pub projection: Option<ProjectionResult>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CentreReport {
    pub month: String,
    pub label: String,
    pub metric: ReportMetric,
    pub summaries: Vec<EntitySummary>,
    pub summary: SummaryTrend,
    pub daily_comparison: Vec<DayComparison>,
}

/// Tunables persisted in `app_config`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSettings {
    /// Weekday left out of the remaining-working-days count.
    pub excluded_weekday: Option<Weekday>,
    /// OTC sales count toward footfall only above this amount.
    pub otc_min_amount: f64,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            excluded_weekday: Some(Weekday::Sun),
            otc_min_amount: 60.0,
        }
    }
}
