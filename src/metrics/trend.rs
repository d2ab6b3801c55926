use std::collections::BTreeMap;

use crate::date_util::round2;
use crate::metrics::types::{EntitySummary, EntityTotal, SummaryTrend, TrendCategory};

/// Percentage change from `previous` to `current`, two decimals.
/// `None` when there is no previous value to compare against.
pub fn trend_pct(current: f64, previous: f64) -> Option<f64> {
    if previous == 0.0 {
        None
    } else {
        Some(round2((current - previous) * 100.0 / previous))
    }
}

/// Bucket an entity by its totals for this month, last month and the
/// same month last year.
pub fn categorize(current: f64, prev_month: f64, prev_year: f64) -> TrendCategory {
    if current == 0.0 {
        return if prev_month > 0.0 || prev_year > 0.0 {
            TrendCategory::Concerning
        } else {
            TrendCategory::All
        };
    }

    match (trend_pct(current, prev_month), trend_pct(current, prev_year)) {
        (None, None) => TrendCategory::All,
        (Some(t), None) | (None, Some(t)) => {
            if t >= 0.0 {
                TrendCategory::Stars
            } else {
                TrendCategory::Concerning
            }
        }
        (Some(month), Some(year)) => match (month >= 0.0, year >= 0.0) {
            (false, false) => TrendCategory::Concerning,
            (false, true) => TrendCategory::BetterThanLastYear,
            (true, false) => TrendCategory::BetterThanLastMonth,
            (true, true) => TrendCategory::Stars,
        },
    }
}

/// `▲ 12.34%`, `▼ 5.00%`, or `N/A`.
pub fn format_trend(pct: Option<f64>) -> String {
    match pct {
        Some(p) if p >= 0.0 => format!("▲ {:.2}%", p),
        Some(p) => format!("▼ {:.2}%", p.abs()),
        None => "N/A".to_string(),
    }
}

#[derive(Default)]
struct Triple {
    current: f64,
    prev_month: f64,
    prev_year: f64,
}

/// Join per-window totals into one summary per entity. Entities missing
/// from a window count as 0 there; repeated entities within a window are
/// summed. Sorted by division then centre, case-insensitively.
pub fn build_entity_summaries(
    current: &[EntityTotal],
    prev_month: &[EntityTotal],
    prev_year: &[EntityTotal],
) -> Vec<EntitySummary> {
    let mut by_entity: BTreeMap<(String, String), Triple> = BTreeMap::new();

    for t in current {
        by_entity
            .entry((t.division.clone(), t.centre.clone()))
            .or_default()
            .current += t.value;
    }
    for t in prev_month {
        by_entity
            .entry((t.division.clone(), t.centre.clone()))
            .or_default()
            .prev_month += t.value;
    }
    for t in prev_year {
        by_entity
            .entry((t.division.clone(), t.centre.clone()))
            .or_default()
            .prev_year += t.value;
    }

    let mut summaries: Vec<EntitySummary> = by_entity
        .into_iter()
        .map(|((division, centre), v)| {
            let trend_month_pct = trend_pct(v.current, v.prev_month);
            let trend_year_pct = trend_pct(v.current, v.prev_year);
            EntitySummary {
                division,
                centre,
                current: v.current,
                prev_month: v.prev_month,
                prev_year: v.prev_year,
                trend_month_pct,
                trend_year_pct,
                trend_month_display: format_trend(trend_month_pct),
                trend_year_display: format_trend(trend_year_pct),
                category: categorize(v.current, v.prev_month, v.prev_year),
            }
        })
        .collect();

    summaries.sort_by(|a, b| {
        a.division
            .to_lowercase()
            .cmp(&b.division.to_lowercase())
            .then_with(|| a.centre.to_lowercase().cmp(&b.centre.to_lowercase()))
            .then_with(|| a.division.cmp(&b.division))
            .then_with(|| a.centre.cmp(&b.centre))
    });
    summaries
}

/// Totals across entities. The trend is the plain mean of per-entity
/// trends (missing trends count as 0), not a trend of the totals.
pub fn summarize(summaries: &[EntitySummary]) -> SummaryTrend {
    let n = summaries.len();
    let mean = |f: fn(&EntitySummary) -> Option<f64>| -> f64 {
        if n == 0 {
            return 0.0;
        }
        let sum: f64 = summaries.iter().map(|s| f(s).unwrap_or(0.0)).sum();
        round2(sum / n as f64)
    };
    let trend_month_pct = mean(|s| s.trend_month_pct);
    let trend_year_pct = mean(|s| s.trend_year_pct);

    SummaryTrend {
        entity_count: n,
        total_current: summaries.iter().map(|s| s.current).sum(),
        total_prev_month: summaries.iter().map(|s| s.prev_month).sum(),
        total_prev_year: summaries.iter().map(|s| s.prev_year).sum(),
        trend_month_pct,
        trend_year_pct,
        trend_month_display: format_trend(Some(trend_month_pct)),
        trend_year_display: format_trend(Some(trend_year_pct)),
    }
}
