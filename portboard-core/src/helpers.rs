use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};

use crate::correspondence::{Correspondence, Minute, Priority};

const DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parses the date formats found in catalog data
///
/// Accepts RFC 3339 timestamps (converted to UTC), naive date-times with or
/// without seconds, and plain `YYYY-MM-DD` dates (midnight).
pub fn parse_date(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    for format in DATE_TIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Long date, e.g. "January 5, 2024"; empty for unparseable input
pub fn format_date(raw: &str) -> String {
    parse_date(raw)
        .map(|d| d.format("%B %-d, %Y").to_string())
        .unwrap_or_default()
}

/// Date with time, e.g. "Jan 5, 2024, 09:30 AM"
pub fn format_date_time(raw: &str) -> String {
    parse_date(raw)
        .map(|d| d.format("%b %-d, %Y, %I:%M %p").to_string())
        .unwrap_or_default()
}

/// Short date, e.g. "01/05/2024"
pub fn format_date_short(raw: &str) -> String {
    parse_date(raw)
        .map(|d| d.format("%m/%d/%Y").to_string())
        .unwrap_or_default()
}

/// Days a correspondence may wait before it is overdue
fn overdue_threshold_days(priority: &Priority) -> i64 {
    match priority {
        Priority::Urgent => 1,
        Priority::High => 3,
        Priority::Medium => 7,
        Priority::Low => 10,
        Priority::Other(_) => 14,
    }
}

/// Checks whether a correspondence has waited longer than its priority allows
///
/// A correspondence with an unparseable received date is never overdue.
pub fn is_overdue(item: &Correspondence, now: DateTime<Utc>) -> bool {
    let Some(received) = parse_date(&item.received_date) else {
        return false;
    };
    let days = (now.naive_utc() - received).num_days();
    days > overdue_threshold_days(&item.priority)
}

/// Highest sequence that fits the four-digit slot of a reference number
pub const MAX_REFERENCE_SEQUENCE: u32 = 9_999;

/// Builds a registry reference number: `NPA/{division}/{year}/{month}{seq}`
///
/// Returns `None` when `sequence` needs more than four digits.
pub fn generate_reference_number(
    division_code: &str,
    now: DateTime<Utc>,
    sequence: u32,
) -> Option<String> {
    if sequence > MAX_REFERENCE_SEQUENCE {
        tracing::warn!(division_code, sequence, "reference sequence exhausted for the month");
        return None;
    }
    Some(format!(
        "NPA/{}/{}/{:02}{:04}",
        division_code,
        now.year(),
        now.month(),
        sequence
    ))
}

/// Generates a unique record id with a display prefix
pub fn generate_id(prefix: &str) -> String {
    format!("{}-{}", prefix, uuid::Uuid::new_v4().simple())
}

/// Step number for the next minute on a correspondence
pub fn next_step_number(minutes: &[Minute]) -> u32 {
    minutes
        .iter()
        .map(|m| m.step_number)
        .max()
        .map_or(1, |max| max + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_date_formats() {
        assert!(parse_date("2024-03-01").is_some());
        assert!(parse_date("2024-03-01T09:30:00Z").is_some());
        assert!(parse_date("2024-03-01T09:30:00+01:00").is_some());
        assert!(parse_date("2024-03-01 09:30").is_some());
        assert!(parse_date("2024-03-01T09:30:00.123").is_some());
        assert!(parse_date("").is_none());
        assert!(parse_date("yesterday").is_none());
        assert!(parse_date("2024-13-01").is_none());
    }

    #[test]
    fn test_rfc3339_is_converted_to_utc() {
        let d = parse_date("2024-03-01T01:00:00+02:00").unwrap();
        assert_eq!(d.format("%Y-%m-%d %H:%M").to_string(), "2024-02-29 23:00");
    }

    #[test]
    fn test_format_dates() {
        assert_eq!(format_date("2024-01-05"), "January 5, 2024");
        assert_eq!(format_date_short("2024-01-05"), "01/05/2024");
        assert_eq!(format_date_time("2024-01-05 09:30"), "Jan 5, 2024, 09:30 AM");
        assert_eq!(format_date(""), "");
        assert_eq!(format_date_short("garbage"), "");
    }

    #[test]
    fn test_is_overdue_by_priority() {
        let mut item = Correspondence::new("C-1", "Berth allocation");
        item.received_date = "2024-01-01".into();

        item.priority = Priority::Urgent;
        assert!(!is_overdue(&item, at(2024, 1, 2)));
        assert!(is_overdue(&item, at(2024, 1, 3)));

        item.priority = Priority::Low;
        assert!(!is_overdue(&item, at(2024, 1, 11)));
        assert!(is_overdue(&item, at(2024, 1, 12)));

        item.priority = Priority::Other("routine".into());
        assert!(!is_overdue(&item, at(2024, 1, 15)));
        assert!(is_overdue(&item, at(2024, 1, 16)));

        item.received_date = "sometime".into();
        assert!(!is_overdue(&item, at(2030, 1, 1)));
    }

    #[test]
    fn test_generate_reference_number() {
        assert_eq!(
            generate_reference_number("ICT", at(2024, 7, 9), 42).as_deref(),
            Some("NPA/ICT/2024/070042")
        );
        assert_eq!(
            generate_reference_number("MAR", at(2024, 12, 1), MAX_REFERENCE_SEQUENCE).as_deref(),
            Some("NPA/MAR/2024/129999")
        );
        assert!(generate_reference_number("MAR", at(2024, 12, 1), 10_000).is_none());
    }

    #[test]
    fn test_generate_id_is_unique() {
        let a = generate_id("CORR");
        let b = generate_id("CORR");
        assert!(a.starts_with("CORR-"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_next_step_number() {
        assert_eq!(next_step_number(&[]), 1);
        let minutes = vec![
            Minute::new("M1", "C-1", 1),
            Minute::new("M2", "C-1", 4),
            Minute::new("M3", "C-1", 2),
        ];
        assert_eq!(next_step_number(&minutes), 5);
    }
}
