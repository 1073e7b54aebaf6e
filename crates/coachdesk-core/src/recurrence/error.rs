use thiserror::Error;

/// Errors produced while parsing RRULE text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleParseError {
    #[error("recurrence rule is empty")]
    Empty,

    #[error("malformed rule part {0:?} (expected KEY=VALUE)")]
    MalformedPart(String),

    #[error("unsupported rule part {0:?}")]
    UnsupportedPart(String),

    #[error("rule part {0} appears more than once")]
    DuplicatePart(String),

    #[error("rule is missing FREQ")]
    MissingFrequency,

    #[error("invalid frequency {0:?} (expected DAILY, WEEKLY, MONTHLY, or YEARLY)")]
    InvalidFrequency(String),

    #[error("invalid weekday {0:?} (expected MO, TU, WE, TH, FR, SA, or SU)")]
    InvalidWeekday(String),

    #[error("invalid {part} value {value:?}")]
    InvalidNumber { part: &'static str, value: String },

    #[error("invalid UNTIL value {0:?} (expected YYYYMMDD or YYYYMMDDTHHMMSSZ)")]
    InvalidUntil(String),
}

/// Errors of the recurrence planner.
///
/// All but [`RecurrenceError::InvalidMaxInstances`] describe a bad request
/// and are surfaced to clients as validation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecurrenceError {
    #[error("a recurrence rule requires a due date to anchor it")]
    MissingAnchor,

    #[error("recurrence interval must be at least 1")]
    InvalidInterval,

    #[error("recurrence count must be at least 1")]
    InvalidCount,

    #[error("scheduled date {scheduled} is after due date {due}")]
    ScheduledAfterDue { scheduled: String, due: String },

    #[error("instance cap must be at least 1, got {0}")]
    InvalidMaxInstances(usize),

    #[error("invalid recurrence rule: {0}")]
    Parse(#[from] RuleParseError),
}

impl RecurrenceError {
    /// Whether the error stems from caller input (as opposed to a
    /// misconfigured service).
    pub fn is_validation(&self) -> bool {
        !matches!(self, Self::InvalidMaxInstances(_))
    }
}
