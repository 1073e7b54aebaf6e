pub mod mfa;
pub mod recurrence;
pub mod schedule;
