//! RRULE text format.
//!
//! The subset written and read here covers `FREQ`, `INTERVAL`, `COUNT`,
//! `UNTIL`, and plain `BYDAY` codes. Output is normalized:
//!
//! ```text
//! FREQ=WEEKLY;INTERVAL=1;COUNT=3;UNTIL=20250301T000000Z;BYDAY=MO,FR
//! ```
//!
//! Parsing is lenient about case, part order, and an `RRULE:` prefix.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use super::error::RuleParseError;
use super::rule::{Frequency, RecurrenceRule, Weekday};

const UNTIL_FORMAT: &str = "%Y%m%dT%H%M%SZ";

impl fmt::Display for RecurrenceRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = self.normalized();
        write!(f, "FREQ={};INTERVAL={}", rule.frequency, rule.interval)?;
        if let Some(count) = rule.count {
            write!(f, ";COUNT={count}")?;
        }
        if let Some(until) = rule.until {
            write!(f, ";UNTIL={}", until.format(UNTIL_FORMAT))?;
        }
        if !rule.by_weekday.is_empty() {
            let days: Vec<&str> = rule.by_weekday.iter().map(|d| d.code()).collect();
            write!(f, ";BYDAY={}", days.join(","))?;
        }
        Ok(())
    }
}

impl FromStr for RecurrenceRule {
    type Err = RuleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_rrule(s)
    }
}

/// Parse RRULE text into a normalized [`RecurrenceRule`].
pub fn parse_rrule(input: &str) -> Result<RecurrenceRule, RuleParseError> {
    let trimmed = input.trim();
    let body = match trimmed.get(..6) {
        Some(prefix) if prefix.eq_ignore_ascii_case("RRULE:") => &trimmed[6..],
        _ => trimmed,
    };
    if body.is_empty() {
        return Err(RuleParseError::Empty);
    }

    let mut seen = HashSet::new();
    let mut frequency = None;
    let mut interval = 1;
    let mut count = None;
    let mut until = None;
    let mut by_weekday = Vec::new();

    for part in body.split(';').map(str::trim).filter(|p| !p.is_empty()) {
        let (key, value) = part
            .split_once('=')
            .ok_or_else(|| RuleParseError::MalformedPart(part.to_owned()))?;
        let key = key.trim().to_ascii_uppercase();
        let value = value.trim();

        if !seen.insert(key.clone()) {
            return Err(RuleParseError::DuplicatePart(key));
        }

        match key.as_str() {
            "FREQ" => frequency = Some(value.parse::<Frequency>()?),
            "INTERVAL" => interval = parse_positive("INTERVAL", value)?,
            "COUNT" => count = Some(parse_positive("COUNT", value)?),
            "UNTIL" => until = Some(parse_until(value)?),
            "BYDAY" => {
                by_weekday = value
                    .split(',')
                    .map(str::parse::<Weekday>)
                    .collect::<Result<_, _>>()?;
            }
            _ => return Err(RuleParseError::UnsupportedPart(part.to_owned())),
        }
    }

    let frequency = frequency.ok_or(RuleParseError::MissingFrequency)?;
    let rule = RecurrenceRule {
        frequency,
        interval,
        count,
        until,
        by_weekday,
    };
    Ok(rule.normalized())
}

fn parse_positive(part: &'static str, value: &str) -> Result<u32, RuleParseError> {
    match value.parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(RuleParseError::InvalidNumber {
            part,
            value: value.to_owned(),
        }),
    }
}

/// `UNTIL` in UTC basic date-time, or a bare date meaning midnight UTC.
fn parse_until(value: &str) -> Result<DateTime<Utc>, RuleParseError> {
    let upper = value.to_ascii_uppercase();
    if let Ok(dt) = NaiveDateTime::parse_from_str(&upper, UNTIL_FORMAT) {
        return Ok(dt.and_utc());
    }
    if upper.len() == 8 {
        if let Ok(date) = NaiveDate::parse_from_str(&upper, "%Y%m%d") {
            return Ok(date.and_time(chrono::NaiveTime::MIN).and_utc());
        }
    }
    Err(RuleParseError::InvalidUntil(value.to_owned()))
}
