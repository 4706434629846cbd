// src/timeparse.rs
//
// Source pages publish maintenance times as `d.m. klo H:M` with no year,
// prefixed by the marker verb. The year is inferred from "now": the scrape
// always observes recent-past events, so a substituted-year date landing in
// the future means the event belongs to the previous year.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use once_cell::sync::OnceCell;
use regex::Regex;

/// Display format for rendered maintenance times (local wall clock).
pub const DISPLAY_FMT: &str = "%d.%m. klo %H:%M";

fn maintained_re() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| {
        // Colon present on the status page, absent on the new-marks page.
        Regex::new(r"Kunnostettu:?\s+(\d{1,2})\.(\d{1,2})\.?\s+klo\s+(\d{1,2}):(\d{2})")
            .expect("static regex")
    })
}

/// Extract a maintenance timestamp from a raw status string, as local wall
/// time. Returns `None` when the text has no date, or the date is invalid
/// (e.g. 31.2.); absence of a date is a common, valid outcome.
pub fn parse_maintenance_date(text: &str, now_local: NaiveDateTime) -> Option<NaiveDateTime> {
    let caps = maintained_re().captures(text)?;
    let day: u32 = caps[1].parse().ok()?;
    let month: u32 = caps[2].parse().ok()?;
    let hour: u32 = caps[3].parse().ok()?;
    let minute: u32 = caps[4].parse().ok()?;

    let with_year = |year: i32| {
        NaiveDate::from_ymd_opt(year, month, day).and_then(|d| d.and_hms_opt(hour, minute, 0))
    };

    let candidate = with_year(now_local.year())?;
    if candidate > now_local {
        with_year(now_local.year() - 1)
    } else {
        Some(candidate)
    }
}

/// Local wall time in the configured display offset.
pub fn now_local(offset: FixedOffset, now: DateTime<Utc>) -> NaiveDateTime {
    now.with_timezone(&offset).naive_local()
}

/// Interpret a local wall-clock time in the configured offset as UTC.
pub fn local_to_utc(local: NaiveDateTime, offset: FixedOffset) -> Option<DateTime<Utc>> {
    offset
        .from_local_datetime(&local)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Render a timestamp in the local display format.
pub fn format_local(dt: DateTime<Utc>, offset: FixedOffset) -> String {
    dt.with_timezone(&offset).format(DISPLAY_FMT).to_string()
}

/// Parse a window string like `15m`, `24h`, `7d`, `8M` into a duration.
/// Months are approximated as 31 days, years as 365 (windows, not calendars).
pub fn since_to_duration(since: &str) -> Result<Duration> {
    let since = since.trim();
    if since.len() < 2 || !since.is_char_boundary(since.len() - 1) {
        return Err(anyhow!("invalid window {since:?}, expected e.g. 15m, 24h, 7d"));
    }
    let (value, unit) = since.split_at(since.len() - 1);
    let n: i64 = value
        .parse()
        .map_err(|_| anyhow!("invalid window value in {since:?}"))?;
    if n < 0 {
        return Err(anyhow!("window must not be negative: {since:?}"));
    }
    match unit {
        "m" => Ok(Duration::minutes(n)),
        "h" => Ok(Duration::hours(n)),
        "d" => Ok(Duration::days(n)),
        "M" => Ok(Duration::days(31 * n)),
        "y" => Ok(Duration::days(365 * n)),
        other => Err(anyhow!("unknown window unit {other:?} in {since:?}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn local(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, 0)
            .unwrap()
    }

    #[test]
    fn parses_date_with_current_year() {
        let now = local(2024, 2, 1, 0, 0);
        let got = parse_maintenance_date("Kunnostettu: 5.1. klo 14:30", now);
        assert_eq!(got, Some(local(2024, 1, 5, 14, 30)));
    }

    #[test]
    fn colon_is_optional_and_trailing_text_tolerated() {
        let now = local(2024, 2, 1, 0, 0);
        let got = parse_maintenance_date("Kunnostettu 5.1. klo 14:30,Hyvä kunto", now);
        assert_eq!(got, Some(local(2024, 1, 5, 14, 30)));
    }

    #[test]
    fn future_date_rolls_back_a_year() {
        // Scraped late December; a December date stamped with the current
        // year would be in the future, so it belongs to last year.
        let now = local(2024, 1, 2, 8, 0);
        let got = parse_maintenance_date("Kunnostettu: 28.12. klo 10:00", now);
        assert_eq!(got, Some(local(2023, 12, 28, 10, 0)));
    }

    #[test]
    fn unmatched_or_invalid_text_yields_none() {
        let now = local(2024, 2, 1, 0, 0);
        assert_eq!(parse_maintenance_date("Suljettu", now), None);
        assert_eq!(parse_maintenance_date("", now), None);
        // 31.2. matches the pattern but is not a calendar date.
        assert_eq!(
            parse_maintenance_date("Kunnostettu: 31.2. klo 10:00", now),
            None
        );
    }

    #[test]
    fn local_utc_round_trip() {
        let offset = FixedOffset::east_opt(2 * 3600).unwrap();
        let l = local(2024, 1, 5, 14, 30);
        let utc = local_to_utc(l, offset).unwrap();
        assert_eq!(utc, Utc.with_ymd_and_hms(2024, 1, 5, 12, 30, 0).unwrap());
        assert_eq!(format_local(utc, offset), "05.01. klo 14:30");
    }

    #[test]
    fn window_strings() {
        assert_eq!(since_to_duration("15m").unwrap(), Duration::minutes(15));
        assert_eq!(since_to_duration("24h").unwrap(), Duration::hours(24));
        assert_eq!(since_to_duration("7d").unwrap(), Duration::days(7));
        assert_eq!(since_to_duration("8M").unwrap(), Duration::days(248));
        assert!(since_to_duration("nope").is_err());
        assert!(since_to_duration("h").is_err());
        assert!(since_to_duration("-1h").is_err());
    }
}
