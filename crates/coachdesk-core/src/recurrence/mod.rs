//! Recurring-task planning: rule types, RRULE text, expansion, and the
//! planner service.

pub mod error;
mod expand;
pub mod rrule;
pub mod rule;
pub mod service;

pub use error::{RecurrenceError, RuleParseError};
pub use rrule::parse_rrule;
pub use rule::{Frequency, RecurrenceRule, Weekday};
pub use service::{
    DEFAULT_HARD_LIMIT, DEFAULT_MAX_INSTANCES, PlanRequest, PlannedInstance, RecurrenceService,
    TaskInstancePlan,
};
