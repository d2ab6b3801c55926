use std::collections::BTreeMap;

use chrono::{Datelike, Duration, NaiveDate, Weekday};

use crate::error::{Error, Result};
use crate::metrics::types::{MetricRow, ProjectionPoint, ProjectionResult, Regression};
use crate::query::period::Month;

/// Projections within this fraction of the target count as on track.
const ON_TRACK_TOLERANCE: f64 = 0.02;

impl Regression {
    /// Ordinary least squares over `(x, y)` points. Needs at least two
    /// distinct x values.
    pub fn fit(points: &[(f64, f64)]) -> Result<Self> {
        let n = points.len();
        if n < 2 {
            return Err(Error::InsufficientData(format!(
                "regression needs at least 2 points, got {n}"
            )));
        }

        let nf = n as f64;
        let (mut sx, mut sy, mut sxy, mut sxx) = (0.0, 0.0, 0.0, 0.0);
        for &(x, y) in points {
            sx += x;
            sy += y;
            sxy += x * y;
            sxx += x * x;
        }

        let denom = nf * sxx - sx * sx;
        if denom.abs() < f64::EPSILON {
            return Err(Error::InsufficientData(
                "regression points share a single x value".into(),
            ));
        }

        let slope = (nf * sxy - sx * sy) / denom;
        let intercept = (sy - slope * sx) / nf;
        Ok(Self {
            slope,
            intercept,
            points: n,
        })
    }

    pub fn predict(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

/// Running month-to-date totals for days in `month` up to `today`.
/// Rows sharing a date are merged; days without rows are absent.
pub fn cumulative_points(rows: &[MetricRow], month: Month, today: NaiveDate) -> Vec<(NaiveDate, f64)> {
    let mut by_date: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for row in rows {
        if month.contains(row.date) && row.date <= today {
            *by_date.entry(row.date).or_insert(0.0) += row.value;
        }
    }

    let mut running = 0.0;
    by_date
        .into_iter()
        .map(|(date, value)| {
            running += value;
            (date, running)
        })
        .collect()
}

/// Days of `month` after `today`, skipping `excluded` weekdays.
pub fn remaining_open_days(today: NaiveDate, month: Month, excluded: Option<Weekday>) -> u32 {
    let last = month.last_day();
    let mut day = today.max(month.first_day() - Duration::days(1)) + Duration::days(1);
    let mut count = 0;
    while day <= last {
        if Some(day.weekday()) != excluded {
            count += 1;
        }
        day += Duration::days(1);
    }
    count
}

/// Suggested footfall target: 10% over the better of last month and the
/// same month last year, never below 50.
pub fn recommended_target(prev_month_total: f64, prev_year_prev_month_total: f64) -> f64 {
    (prev_month_total.max(prev_year_prev_month_total) * 1.1)
        .max(50.0)
        .round()
}

/// Build a month-end projection from daily rows.
///
/// Fails with `InvalidTarget` for a missing or non-positive target and
/// `InsufficientData` when no rows fall in the month up to `today`.
pub fn try_build_projection(
    rows: &[MetricRow],
    target: f64,
    month: Month,
    today: NaiveDate,
    excluded_weekday: Option<Weekday>,
) -> Result<ProjectionResult> {
    if !target.is_finite() || target <= 0.0 {
        return Err(Error::InvalidTarget(format!(
            "target must be a positive number, got {target}"
        )));
    }

    let cumulative = cumulative_points(rows, month, today);
    let Some(&(_, month_to_date_total)) = cumulative.last() else {
        return Err(Error::InsufficientData(format!(
            "no data for {month} up to {today}"
        )));
    };

    let points: Vec<(f64, f64)> = cumulative
        .iter()
        .map(|(date, total)| (date.day() as f64, *total))
        .collect();
    let regression = Regression::fit(&points).ok();

    let days_in_month = month.days();
    let projected_month_end = match regression {
        Some(r) => month_to_date_total.max(r.predict(days_in_month as f64)),
        None => month_to_date_total,
    };

    let is_ongoing_month = month.contains(today);
    let days_remaining = if is_ongoing_month {
        days_in_month - today.day()
    } else if today > month.last_day() {
        0
    } else {
        days_in_month
    };
    let remaining_working_days = if is_ongoing_month {
        remaining_open_days(today, month, excluded_weekday)
    } else {
        0
    };
    let required_per_remaining_day = if is_ongoing_month && remaining_working_days > 0 {
        Some((target - month_to_date_total) / remaining_working_days as f64)
    } else {
        None
    };

    let is_on_track = (projected_month_end - target).abs() <= ON_TRACK_TOLERANCE * target
        || projected_month_end >= target;

    let by_date: BTreeMap<NaiveDate, f64> = cumulative.into_iter().collect();
    let mut running = 0.0;
    let series = (1..=days_in_month)
        .map(|day| {
            let date = month.first_day() + Duration::days(day as i64 - 1);
            if let Some(total) = by_date.get(&date) {
                running = *total;
            }
            ProjectionPoint {
                day,
                date,
                actual_cumulative: (date <= today).then_some(running),
                target_line: target / days_in_month as f64 * day as f64,
                trend_line: regression.map(|r| r.predict(day as f64).max(0.0)),
            }
        })
        .collect();

    Ok(ProjectionResult {
        month: month.to_key(),
        target,
        month_to_date_total,
        projected_month_end,
        required_per_remaining_day,
        is_on_track,
        is_ongoing_month,
        days_in_month,
        days_remaining,
        remaining_working_days,
        regression,
        series,
    })
}

/// Like [`try_build_projection`], degrading a missing target or missing
/// data to "no projection".
pub fn build_projection(
    rows: &[MetricRow],
    target: f64,
    month: Month,
    today: NaiveDate,
    excluded_weekday: Option<Weekday>,
) -> Option<ProjectionResult> {
    match try_build_projection(rows, target, month, today, excluded_weekday) {
        Ok(p) => Some(p),
        Err(e) => {
            log::debug!("No projection for {month}: {e}");
            None
        }
    }
}
