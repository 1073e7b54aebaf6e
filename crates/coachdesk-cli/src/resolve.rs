//! Argument parsing helpers shared by the command handlers.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use uuid::Uuid;

use coachdesk_core::recurrence::{RecurrenceRule, parse_rrule};

/// Parse a timestamp argument.
///
/// Accepts RFC 3339 (`2025-02-10T12:00:00Z`, any offset), a naive
/// `YYYY-MM-DDTHH:MM[:SS]` taken as UTC, or a bare `YYYY-MM-DD` meaning
/// midnight UTC.
pub fn parse_timestamp(input: &str) -> Result<DateTime<Utc>, String> {
    let input = input.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(input) {
        return Ok(ts.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
            return Ok(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        return Ok(date.and_time(chrono::NaiveTime::MIN).and_utc());
    }
    Err(format!(
        "invalid timestamp {input:?} (expected RFC 3339, YYYY-MM-DDTHH:MM, or YYYY-MM-DD)"
    ))
}

/// Parse a `--rrule` argument.
pub fn parse_rule_arg(input: Option<&str>) -> Result<Option<RecurrenceRule>> {
    input
        .map(|text| parse_rrule(text).with_context(|| format!("invalid --rrule {text:?}")))
        .transpose()
}

/// Parse a UUID argument, naming what it identifies in the error.
pub fn parse_id(kind: &str, input: &str) -> Result<Uuid> {
    Uuid::parse_str(input.trim()).with_context(|| format!("invalid {kind} ID: {input:?}"))
}

/// `2025-02-10 12:00 UTC`, or `-` for an absent date.
pub fn display_ts(ts: Option<DateTime<Utc>>) -> String {
    ts.map_or_else(|| "-".to_owned(), |t| t.format("%Y-%m-%d %H:%M UTC").to_string())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn parses_rfc3339_with_offset() {
        assert_eq!(
            parse_timestamp("2025-02-10T13:00:00+01:00").unwrap(),
            Utc.with_ymd_and_hms(2025, 2, 10, 12, 0, 0).unwrap()
        );
    }

    #[test]
    fn parses_naive_forms_as_utc() {
        let noon = Utc.with_ymd_and_hms(2025, 2, 10, 12, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2025-02-10T12:00").unwrap(), noon);
        assert_eq!(parse_timestamp("2025-02-10T12:00:00").unwrap(), noon);
        assert_eq!(
            parse_timestamp("2025-02-10").unwrap(),
            Utc.with_ymd_and_hms(2025, 2, 10, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn rejects_garbage_timestamp() {
        let err = parse_timestamp("next monday").unwrap_err();
        assert!(err.contains("next monday"));
    }

    #[test]
    fn rule_arg_is_optional() {
        assert_eq!(parse_rule_arg(None).unwrap(), None);
        assert!(parse_rule_arg(Some("FREQ=DAILY")).unwrap().is_some());
        assert!(parse_rule_arg(Some("FREQ=SOMETIMES")).is_err());
    }

    #[test]
    fn parse_id_names_the_kind() {
        let msg = parse_id("task", "nope").unwrap_err().to_string();
        assert!(msg.contains("invalid task ID"), "unexpected: {msg}");
        assert!(parse_id("task", &Uuid::new_v4().to_string()).is_ok());
    }

    #[test]
    fn display_ts_formats_or_dashes() {
        assert_eq!(display_ts(None), "-");
        assert_eq!(
            display_ts(Some(Utc.with_ymd_and_hms(2025, 2, 10, 12, 0, 0).unwrap())),
            "2025-02-10 12:00 UTC"
        );
    }
}
