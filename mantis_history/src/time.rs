use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeDelta};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Local wall-clock time used for every timestamp the store writes.
#[must_use]
pub fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

#[must_use]
pub fn format_timestamp(at: NaiveDateTime) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse an ISO-8601 timestamp into local wall-clock time.
///
/// Accepts naive date-times (with or without fractional seconds, `T` or space
/// separated), bare dates, and RFC 3339 strings with an offset.
#[must_use]
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();

    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Local).naive_local());
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

/// Render elapsed time as `H:MM:SS`, prefixed with `N day(s), ` past a day.
#[must_use]
pub fn format_duration(elapsed: TimeDelta) -> String {
    let total = elapsed.num_seconds().max(0);
    let days = total / 86_400;
    let hours = (total % 86_400) / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    let clock = format!("{hours}:{minutes:02}:{seconds:02}");
    match days {
        0 => clock,
        1 => format!("1 day, {clock}"),
        n => format!("{n} days, {clock}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .and_then(|date| date.and_hms_opt(h, mi, s))
            .unwrap_or_default()
    }

    #[test]
    fn test_format_then_parse_keeps_time() {
        let now = at(2025, 3, 14, 9, 26, 53);
        let text = format_timestamp(now);
        assert_eq!(text, "2025-03-14T09:26:53.000000");
        assert_eq!(parse_timestamp(&text), Some(now));
    }

    #[test]
    fn test_parse_accepts_common_shapes() {
        let expected = at(2024, 1, 2, 3, 4, 5);
        assert_eq!(parse_timestamp("2024-01-02T03:04:05"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-02 03:04:05"), Some(expected));
        assert!(parse_timestamp("2024-01-02T03:04:05.123456").is_some());
        assert!(parse_timestamp("2024-01-02T03:04:05+00:00").is_some());
        assert_eq!(parse_timestamp("2024-01-02"), Some(at(2024, 1, 2, 0, 0, 0)));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("yesterday").is_none());
        assert!(parse_timestamp("2024-13-40T00:00:00").is_none());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(TimeDelta::seconds(5)), "0:00:05");
        assert_eq!(format_duration(TimeDelta::seconds(3723)), "1:02:03");
        assert_eq!(format_duration(TimeDelta::seconds(86_400 + 61)), "1 day, 0:01:01");
        assert_eq!(format_duration(TimeDelta::days(3)), "3 days, 0:00:00");
        assert_eq!(format_duration(TimeDelta::seconds(-10)), "0:00:00");
    }
}
