//! Recurrence rule types.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use super::error::{RecurrenceError, RuleParseError};

/// How often a rule repeats, before `interval` is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Frequency {
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Daily => "DAILY",
            Self::Weekly => "WEEKLY",
            Self::Monthly => "MONTHLY",
            Self::Yearly => "YEARLY",
        };
        f.write_str(s)
    }
}

impl FromStr for Frequency {
    type Err = RuleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "DAILY" => Ok(Self::Daily),
            "WEEKLY" => Ok(Self::Weekly),
            "MONTHLY" => Ok(Self::Monthly),
            "YEARLY" => Ok(Self::Yearly),
            _ => Err(RuleParseError::InvalidFrequency(s.to_owned())),
        }
    }
}

/// Two-letter iCalendar weekday code.
///
/// Ordering follows the week as it is expanded: Monday first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Weekday {
    #[serde(rename = "MO")]
    Monday,
    #[serde(rename = "TU")]
    Tuesday,
    #[serde(rename = "WE")]
    Wednesday,
    #[serde(rename = "TH")]
    Thursday,
    #[serde(rename = "FR")]
    Friday,
    #[serde(rename = "SA")]
    Saturday,
    #[serde(rename = "SU")]
    Sunday,
}

impl Weekday {
    pub const ALL: [Weekday; 7] = [
        Weekday::Monday,
        Weekday::Tuesday,
        Weekday::Wednesday,
        Weekday::Thursday,
        Weekday::Friday,
        Weekday::Saturday,
        Weekday::Sunday,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Self::Monday => "MO",
            Self::Tuesday => "TU",
            Self::Wednesday => "WE",
            Self::Thursday => "TH",
            Self::Friday => "FR",
            Self::Saturday => "SA",
            Self::Sunday => "SU",
        }
    }

    /// Days since the Monday that starts the week.
    pub fn days_from_monday(self) -> u32 {
        chrono::Weekday::from(self).num_days_from_monday()
    }
}

impl From<Weekday> for chrono::Weekday {
    fn from(day: Weekday) -> Self {
        match day {
            Weekday::Monday => chrono::Weekday::Mon,
            Weekday::Tuesday => chrono::Weekday::Tue,
            Weekday::Wednesday => chrono::Weekday::Wed,
            Weekday::Thursday => chrono::Weekday::Thu,
            Weekday::Friday => chrono::Weekday::Fri,
            Weekday::Saturday => chrono::Weekday::Sat,
            Weekday::Sunday => chrono::Weekday::Sun,
        }
    }
}

impl From<chrono::Weekday> for Weekday {
    fn from(day: chrono::Weekday) -> Self {
        match day {
            chrono::Weekday::Mon => Weekday::Monday,
            chrono::Weekday::Tue => Weekday::Tuesday,
            chrono::Weekday::Wed => Weekday::Wednesday,
            chrono::Weekday::Thu => Weekday::Thursday,
            chrono::Weekday::Fri => Weekday::Friday,
            chrono::Weekday::Sat => Weekday::Saturday,
            chrono::Weekday::Sun => Weekday::Sunday,
        }
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Weekday {
    type Err = RuleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_ascii_uppercase();
        Weekday::ALL
            .into_iter()
            .find(|day| day.code() == code)
            .ok_or_else(|| RuleParseError::InvalidWeekday(s.to_owned()))
    }
}

/// A recurrence rule as submitted with a task.
///
/// The rule has no start of its own: it is always expanded from the task's
/// due date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurrenceRule {
    pub frequency: Frequency,
    #[serde(default = "default_interval")]
    pub interval: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub until: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub by_weekday: Vec<Weekday>,
}

fn default_interval() -> u32 {
    1
}

impl RecurrenceRule {
    /// A rule repeating every period at `frequency`, with no end.
    pub fn new(frequency: Frequency) -> Self {
        Self {
            frequency,
            interval: 1,
            count: None,
            until: None,
            by_weekday: Vec::new(),
        }
    }

    pub fn every(mut self, interval: u32) -> Self {
        self.interval = interval;
        self
    }

    pub fn count(mut self, count: u32) -> Self {
        self.count = Some(count);
        self
    }

    pub fn until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    pub fn on(mut self, days: impl IntoIterator<Item = Weekday>) -> Self {
        self.by_weekday = days.into_iter().collect();
        self
    }

    /// Neither `count` nor `until` bounds the rule.
    pub fn is_open_ended(&self) -> bool {
        self.count.is_none() && self.until.is_none()
    }

    /// Check field-level invariants.
    pub fn validate(&self) -> Result<(), RecurrenceError> {
        if self.interval == 0 {
            return Err(RecurrenceError::InvalidInterval);
        }
        if self.count == Some(0) {
            return Err(RecurrenceError::InvalidCount);
        }
        Ok(())
    }

    /// Copy of the rule with weekdays deduplicated and in week order, so that
    /// equal rules serialize to equal strings.
    ///
    /// `until` is cut to whole seconds, the precision of the RRULE text, so a
    /// rule expands the same before and after it is stored.
    pub fn normalized(&self) -> Self {
        let mut rule = self.clone();
        rule.by_weekday.sort();
        rule.by_weekday.dedup();
        rule.until = rule.until.map(|until| until.trunc_subsecs(0));
        rule
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frequency_parse_is_case_insensitive() {
        assert_eq!("weekly".parse::<Frequency>().unwrap(), Frequency::Weekly);
        assert_eq!(" Daily ".parse::<Frequency>().unwrap(), Frequency::Daily);
        assert!(matches!(
            "hourly".parse::<Frequency>(),
            Err(RuleParseError::InvalidFrequency(_))
        ));
    }

    #[test]
    fn weekday_codes_roundtrip_through_chrono() {
        for day in Weekday::ALL {
            let chrono_day: chrono::Weekday = day.into();
            assert_eq!(Weekday::from(chrono_day), day);
            assert_eq!(day.code().parse::<Weekday>().unwrap(), day);
        }
        assert_eq!(Weekday::Sunday.days_from_monday(), 6);
    }

    #[test]
    fn deserializes_camel_case_payload() {
        let json = r#"{"frequency":"WEEKLY","count":3,"byWeekday":["MO","FR"]}"#;
        let rule: RecurrenceRule = serde_json::from_str(json).unwrap();
        assert_eq!(rule.frequency, Frequency::Weekly);
        assert_eq!(rule.interval, 1);
        assert_eq!(rule.count, Some(3));
        assert_eq!(rule.by_weekday, vec![Weekday::Monday, Weekday::Friday]);
    }

    #[test]
    fn validate_rejects_zero_interval_and_count() {
        let rule = RecurrenceRule::new(Frequency::Daily).every(0);
        assert_eq!(rule.validate(), Err(RecurrenceError::InvalidInterval));

        let rule = RecurrenceRule::new(Frequency::Daily).count(0);
        assert_eq!(rule.validate(), Err(RecurrenceError::InvalidCount));
    }

    #[test]
    fn normalized_sorts_and_dedups_weekdays() {
        let rule = RecurrenceRule::new(Frequency::Weekly).on([
            Weekday::Friday,
            Weekday::Monday,
            Weekday::Friday,
        ]);
        assert_eq!(
            rule.normalized().by_weekday,
            vec![Weekday::Monday, Weekday::Friday]
        );
    }

    #[test]
    fn normalized_drops_subsecond_until() {
        let until = DateTime::parse_from_rfc3339("2025-02-12T09:00:00.500Z")
            .unwrap()
            .with_timezone(&Utc);
        let rule = RecurrenceRule::new(Frequency::Daily).until(until).normalized();
        assert_eq!(
            rule.until,
            Some(DateTime::parse_from_rfc3339("2025-02-12T09:00:00Z").unwrap().with_timezone(&Utc))
        );
        assert_eq!(rule.to_string().parse::<RecurrenceRule>().unwrap(), rule);
    }

    #[test]
    fn open_ended_detection() {
        assert!(RecurrenceRule::new(Frequency::Daily).is_open_ended());
        assert!(!RecurrenceRule::new(Frequency::Daily).count(2).is_open_ended());
    }
}
