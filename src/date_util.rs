use chrono::{Datelike, Duration, NaiveDate};

/// Get the last day of a given month.
pub fn last_day_of_month(year: i32, month: u32) -> NaiveDate {
    if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1).unwrap() - Duration::days(1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1).unwrap() - Duration::days(1)
    }
}

/// Number of calendar days in a month.
pub fn days_in_month(year: i32, month: u32) -> u32 {
    last_day_of_month(year, month).day()
}

/// True if `d` is the last calendar day of its month.
pub fn is_month_end(d: NaiveDate) -> bool {
    d == last_day_of_month(d.year(), d.month())
}

/// Move a date by whole years, clamping the day to the target month's length
/// (Feb 29 becomes Feb 28 in non-leap years).
pub fn shift_years(d: NaiveDate, years: i32) -> NaiveDate {
    let year = d.year() + years;
    let last = last_day_of_month(year, d.month());
    let day = d.day().min(last.day());
    NaiveDate::from_ymd_opt(year, d.month(), day).unwrap_or(last)
}

/// `YYYY-MM-DD` key used in the warehouse's `*_date_key` columns.
pub fn format_date_key(d: NaiveDate) -> String {
    d.format("%Y-%m-%d").to_string()
}

pub fn parse_date_key(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()
}

/// Extract YYYY-MM-DD from an ISO or SQL datetime string. Input without a
/// character boundary at byte 10 is returned whole for the caller to reject.
pub fn date_key_from_iso(iso: &str) -> String {
    let iso = iso.trim();
    iso.get(..10).unwrap_or(iso).to_string()
}

/// Short month label, e.g. `Sep 2025`.
pub fn month_label(year: i32, month: u32) -> String {
    let name = match month {
        1 => "Jan",
        2 => "Feb",
        3 => "Mar",
        4 => "Apr",
        5 => "May",
        6 => "Jun",
        7 => "Jul",
        8 => "Aug",
        9 => "Sep",
        10 => "Oct",
        11 => "Nov",
        12 => "Dec",
        _ => "???",
    };
    format!("{name} {year}")
}

/// Round to a fixed number of decimal places, halves away from zero.
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

pub fn round2(value: f64) -> f64 {
    round_to(value, 2)
}

/// Clamp an amount into the non-negative, finite range.
pub fn non_negative(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}

/// Parse a loosely formatted amount ("1,200.50", " 75 ") into a number.
/// Anything unparseable or non-finite is 0.
pub fn parse_amount(s: &str) -> f64 {
    let cleaned: String = s.trim().chars().filter(|c| *c != ',').collect();
    match cleaned.parse::<f64>() {
        Ok(n) if n.is_finite() => n,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_last_day_of_month() {
        assert_eq!(last_day_of_month(2025, 1), d(2025, 1, 31));
        assert_eq!(last_day_of_month(2025, 2), d(2025, 2, 28));
        assert_eq!(last_day_of_month(2024, 2), d(2024, 2, 29)); // Leap year
        assert_eq!(last_day_of_month(2025, 12), d(2025, 12, 31));
    }

    #[test]
    fn test_days_in_month() {
        assert_eq!(days_in_month(2024, 2), 29);
        assert_eq!(days_in_month(2023, 2), 28);
        assert_eq!(days_in_month(2000, 2), 29);
        assert_eq!(days_in_month(1900, 2), 28);
        assert_eq!(days_in_month(2025, 4), 30);
    }

    #[test]
    fn test_shift_years_clamps_leap_day() {
        assert_eq!(shift_years(d(2024, 2, 29), -1), d(2023, 2, 28));
        assert_eq!(shift_years(d(2025, 9, 1), -1), d(2024, 9, 1));
    }

    #[test]
    fn test_date_key_from_iso() {
        assert_eq!(date_key_from_iso("2025-01-15 10:30:00"), "2025-01-15");
        assert_eq!(date_key_from_iso("2025-01-15T10:30:00.000Z"), "2025-01-15");
        assert_eq!(date_key_from_iso("2025-01-15"), "2025-01-15");
        assert_eq!(date_key_from_iso("2025-09-0é 09:00"), "2025-09-0é 09:00");
        assert!(parse_date_key(&date_key_from_iso("2025-09-0é 09:00")).is_none());
    }

    #[test]
    fn test_month_label() {
        assert_eq!(month_label(2025, 9), "Sep 2025");
        assert_eq!(month_label(2024, 12), "Dec 2024");
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(12.3456), 12.35);
        assert_eq!(round2(-4.444), -4.44);
        assert_eq!(round2(100.0), 100.0);
        assert_eq!(round_to(33.333, 1), 33.3);
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("1,200.50"), 1200.5);
        assert_eq!(parse_amount(" 75 "), 75.0);
        assert_eq!(parse_amount("abc"), 0.0);
        assert_eq!(parse_amount(""), 0.0);
        assert_eq!(parse_amount("inf"), 0.0);
    }

    #[test]
    fn test_non_negative() {
        assert_eq!(non_negative(-3.0), 0.0);
        assert_eq!(non_negative(f64::NAN), 0.0);
        assert_eq!(non_negative(12.5), 12.5);
    }
}
