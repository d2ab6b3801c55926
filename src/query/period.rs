use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate};
use regex::Regex;
use serde::Serialize;

use crate::date_util::{
    days_in_month, format_date_key, is_month_end, last_day_of_month, month_label, parse_date_key,
    shift_years,
};
use crate::error::{Error, Result};

static RE_MONTH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d{4})-(\d{2})$").unwrap());

/// A calendar month, the unit every report is keyed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Month {
    year: i32,
    month: u32,
}

impl Month {
    pub fn new(year: i32, month: u32) -> Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(Error::InvalidMonthFormat(format!(
                "month out of range: {year}-{month:02}"
            )));
        }
        Ok(Self { year, month })
    }

    /// Parse a month token.
    ///
    /// Supported formats:
    /// - `2025-01` — explicit month
    /// - `mtd` — the current month
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("mtd") {
            return Ok(Self::containing(chrono::Local::now().date_naive()));
        }

        let caps = RE_MONTH
            .captures(s)
            .ok_or_else(|| Error::InvalidMonthFormat(format!("expected YYYY-MM, got {s:?}")))?;
        let year: i32 = caps[1]
            .parse()
            .map_err(|_| Error::InvalidMonthFormat(format!("invalid year: {s}")))?;
        let month: u32 = caps[2]
            .parse()
            .map_err(|_| Error::InvalidMonthFormat(format!("invalid month: {s}")))?;
        Self::new(year, month)
    }

    /// The month a date falls in.
    pub fn containing(d: NaiveDate) -> Self {
        Self {
            year: d.year(),
            month: d.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap()
    }

    pub fn last_day(&self) -> NaiveDate {
        last_day_of_month(self.year, self.month)
    }

    pub fn days(&self) -> u32 {
        days_in_month(self.year, self.month)
    }

    pub fn contains(&self, d: NaiveDate) -> bool {
        d.year() == self.year && d.month() == self.month
    }

    pub fn previous(&self) -> Self {
        self.minus_months(1)
    }

    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    pub fn minus_months(&self, n: u32) -> Self {
        let index = self.year as i64 * 12 + (self.month as i64 - 1) - n as i64;
        Self {
            year: index.div_euclid(12) as i32,
            month: index.rem_euclid(12) as u32 + 1,
        }
    }

    pub fn prior_year(&self) -> Self {
        Self {
            year: self.year - 1,
            month: self.month,
        }
    }

    /// Canonical `YYYY-MM` key.
    pub fn to_key(&self) -> String {
        format!("{}-{:02}", self.year, self.month)
    }

    /// Display label, e.g. `Sep 2025`.
    pub fn label(&self) -> String {
        month_label(self.year, self.month)
    }

    pub fn window(&self, label: WindowLabel) -> PeriodWindow {
        PeriodWindow {
            label,
            from: self.first_day(),
            to: self.last_day(),
        }
    }
}

impl std::fmt::Display for Month {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_key())
    }
}

/// What a window represents in a comparison report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum WindowLabel {
    ThisMonth,
    PrevMonth,
    PrevYear,
    Last3Months,
    Last3MonthsPrevYear,
    PrevMonthPrevYear,
    Custom,
}

impl WindowLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            WindowLabel::ThisMonth => "thisMonth",
            WindowLabel::PrevMonth => "prevMonth",
            WindowLabel::PrevYear => "prevYear",
            WindowLabel::Last3Months => "last3Months",
            WindowLabel::Last3MonthsPrevYear => "last3MonthsPrevYear",
            WindowLabel::PrevMonthPrevYear => "prevMonthPrevYear",
            WindowLabel::Custom => "custom",
        }
    }

    /// Label of the same window shifted back one year.
    fn prior_year(self) -> Self {
        match self {
            WindowLabel::ThisMonth => WindowLabel::PrevYear,
            WindowLabel::Last3Months => WindowLabel::Last3MonthsPrevYear,
            WindowLabel::PrevMonth => WindowLabel::PrevMonthPrevYear,
            other => other,
        }
    }
}

/// An inclusive date range with a semantic label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeriodWindow {
    pub label: WindowLabel,
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl PeriodWindow {
    /// Build a window from explicit `YYYY-MM-DD` bounds.
    pub fn explicit(from: &str, to: &str) -> Result<Self> {
        let from_date = parse_date_key(from)
            .ok_or_else(|| Error::InvalidDate(format!("expected YYYY-MM-DD, got {from:?}")))?;
        let to_date = parse_date_key(to)
            .ok_or_else(|| Error::InvalidDate(format!("expected YYYY-MM-DD, got {to:?}")))?;
        if from_date > to_date {
            return Err(Error::InvalidDate(format!(
                "range start {from} is after end {to}"
            )));
        }
        Ok(Self {
            label: WindowLabel::Custom,
            from: from_date,
            to: to_date,
        })
    }

    pub fn contains(&self, d: NaiveDate) -> bool {
        d >= self.from && d <= self.to
    }

    pub fn days(&self) -> i64 {
        (self.to - self.from).num_days() + 1
    }

    pub fn overlaps(&self, other: &PeriodWindow) -> bool {
        self.from <= other.to && other.from <= self.to
    }

    pub fn from_key(&self) -> String {
        format_date_key(self.from)
    }

    pub fn to_key(&self) -> String {
        format_date_key(self.to)
    }

    /// The same range one calendar year earlier. A month-end `to` stays a
    /// month end, so Feb 28 2025 maps to Feb 29 2024.
    pub fn prior_year(&self) -> Self {
        let to = if is_month_end(self.to) {
            last_day_of_month(self.to.year() - 1, self.to.month())
        } else {
            shift_years(self.to, -1)
        };
        Self {
            label: self.label.prior_year(),
            from: shift_years(self.from, -1),
            to,
        }
    }

    pub fn with_label(mut self, label: WindowLabel) -> Self {
        self.label = label;
        self
    }

    /// Short label for charts: `Sep 2025` or `Sep-Nov 2025`.
    pub fn range_label(&self) -> String {
        let from = self.from.format("%b").to_string();
        let to = self.to.format("%b").to_string();
        if from == to {
            format!("{from} {}", self.from.year())
        } else {
            format!("{from}-{to} {}", self.from.year())
        }
    }
}

/// First to last day of the token's month.
pub fn resolve_month(token: &str) -> Result<PeriodWindow> {
    Ok(Month::parse(token)?.window(WindowLabel::ThisMonth))
}

/// The calendar month immediately preceding the token's month.
pub fn resolve_previous_month(token: &str) -> Result<PeriodWindow> {
    Ok(Month::parse(token)?
        .previous()
        .window(WindowLabel::PrevMonth))
}

/// The token's month, one year earlier.
pub fn resolve_same_month_prior_year(token: &str) -> Result<PeriodWindow> {
    Ok(resolve_month(token)?.prior_year())
}

/// The `n` full months before the token's month, as one contiguous range.
pub fn resolve_last_n_months(token: &str, n: u32) -> Result<PeriodWindow> {
    let month = Month::parse(token)?;
    last_n_months(month, n)
}

fn last_n_months(month: Month, n: u32) -> Result<PeriodWindow> {
    if n == 0 {
        return Err(Error::Other("last-N-months window needs n >= 1".into()));
    }
    Ok(PeriodWindow {
        label: WindowLabel::Last3Months,
        from: month.minus_months(n).first_day(),
        to: month.previous().last_day(),
    })
}

/// Every window a month report compares against.
#[derive(Debug, Clone, Serialize)]
pub struct ComparisonWindows {
    pub this_month: PeriodWindow,
    pub prev_month: PeriodWindow,
    pub prev_year: PeriodWindow,
    pub last_3_months: PeriodWindow,
    pub last_3_months_prev_year: PeriodWindow,
    pub prev_month_prev_year: PeriodWindow,
}

impl ComparisonWindows {
    pub fn for_month(month: Month) -> Self {
        let this_month = month.window(WindowLabel::ThisMonth);
        let prev_month = month.previous().window(WindowLabel::PrevMonth);
        let prev_year = this_month.prior_year();
        // n is fixed at 3 here, which last_n_months always accepts.
        let last_3_months = PeriodWindow {
            label: WindowLabel::Last3Months,
            from: month.minus_months(3).first_day(),
            to: month.previous().last_day(),
        };
        let last_3_months_prev_year = last_3_months.prior_year();
        let prev_month_prev_year = prev_month.prior_year();
        Self {
            this_month,
            prev_month,
            prev_year,
            last_3_months,
            last_3_months_prev_year,
            prev_month_prev_year,
        }
    }
}
