//! The recurrence planner.
//!
//! Turns a task's due date and optional rule into the list of instances the
//! caller should store. Planning is pure: no I/O, no shared state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::RecurrenceError;
use super::expand::expand;
use super::rrule::parse_rrule;
use super::rule::RecurrenceRule;

/// Instance cap for rules with neither `count` nor `until`.
pub const DEFAULT_MAX_INSTANCES: usize = 2;

/// Instance cap for rules bounded by `count` or `until`.
pub const DEFAULT_HARD_LIMIT: usize = 366;

/// Input of [`RecurrenceService::plan_instances`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanRequest {
    #[serde(default)]
    pub due_date: Option<DateTime<Utc>>,
    /// When work on the anchor instance is planned to start. Its distance to
    /// `due_date` is kept for every instance.
    #[serde(default)]
    pub scheduled_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub recurrence_rule: Option<RecurrenceRule>,
}

/// One instance to be written by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedInstance {
    pub due_date: Option<DateTime<Utc>>,
    pub scheduled_date: Option<DateTime<Utc>>,
}

/// Output of [`RecurrenceService::plan_instances`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskInstancePlan {
    /// The normalized rule, `None` for one-off tasks.
    pub recurrence_rule: Option<RecurrenceRule>,
    /// Never empty, ordered by due date.
    pub instances: Vec<PlannedInstance>,
}

impl TaskInstancePlan {
    /// RRULE text to persist alongside the task.
    pub fn rrule(&self) -> Option<String> {
        self.recurrence_rule.as_ref().map(ToString::to_string)
    }
}

/// Plans task instances from recurrence rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecurrenceService {
    max_instances: usize,
    hard_limit: usize,
}

impl Default for RecurrenceService {
    fn default() -> Self {
        Self {
            max_instances: DEFAULT_MAX_INSTANCES,
            hard_limit: DEFAULT_HARD_LIMIT,
        }
    }
}

impl RecurrenceService {
    /// Build a planner capping open-ended rules at `max_instances`.
    pub fn new(max_instances: usize) -> Result<Self, RecurrenceError> {
        if max_instances == 0 {
            return Err(RecurrenceError::InvalidMaxInstances(max_instances));
        }
        Ok(Self {
            max_instances,
            hard_limit: DEFAULT_HARD_LIMIT.max(max_instances),
        })
    }

    /// Replace the cap applied to rules bounded by `count` or `until`.
    pub fn with_hard_limit(self, hard_limit: usize) -> Result<Self, RecurrenceError> {
        if hard_limit == 0 {
            return Err(RecurrenceError::InvalidMaxInstances(hard_limit));
        }
        Ok(Self { hard_limit, ..self })
    }

    pub fn max_instances(&self) -> usize {
        self.max_instances
    }

    pub fn hard_limit(&self) -> usize {
        self.hard_limit
    }

    /// Expand a request into instances.
    ///
    /// - No rule: one instance at the due date (or one undated instance).
    /// - Rule without due date: [`RecurrenceError::MissingAnchor`].
    /// - Open-ended rule: at most `max_instances` instances.
    /// - Bounded rule: at most `min(count, until, hard_limit)` instances.
    ///
    /// A rule that yields nothing from the anchor on (an `until` before the
    /// due date, say) still produces the anchor instance.
    pub fn plan_instances(&self, request: &PlanRequest) -> Result<TaskInstancePlan, RecurrenceError> {
        if let (Some(due), Some(scheduled)) = (request.due_date, request.scheduled_date) {
            if scheduled > due {
                return Err(RecurrenceError::ScheduledAfterDue {
                    scheduled: scheduled.to_rfc3339(),
                    due: due.to_rfc3339(),
                });
            }
        }

        let Some(rule) = &request.recurrence_rule else {
            return Ok(TaskInstancePlan {
                recurrence_rule: None,
                instances: vec![PlannedInstance {
                    due_date: request.due_date,
                    scheduled_date: request.scheduled_date.or(request.due_date),
                }],
            });
        };

        let anchor = request.due_date.ok_or(RecurrenceError::MissingAnchor)?;
        rule.validate()?;
        let rule = rule.normalized();

        let limit = if rule.is_open_ended() {
            self.max_instances
        } else {
            self.hard_limit
        };
        let mut due_dates = expand(&rule, anchor, limit);
        if due_dates.is_empty() {
            due_dates.push(anchor);
        }

        let lead = request.scheduled_date.map(|scheduled| anchor - scheduled);
        let instances = due_dates
            .into_iter()
            .map(|due| PlannedInstance {
                due_date: Some(due),
                scheduled_date: Some(lead.map_or(due, |lead| due - lead)),
            })
            .collect::<Vec<_>>();

        debug!(
            rule = %rule,
            anchor = %anchor,
            instances = instances.len(),
            limit,
            "planned recurring task instances"
        );

        Ok(TaskInstancePlan {
            recurrence_rule: Some(rule),
            instances,
        })
    }

    /// Re-expand a persisted rule string from its stored anchor.
    pub fn replan(
        &self,
        rrule: Option<&str>,
        due_date: Option<DateTime<Utc>>,
        scheduled_date: Option<DateTime<Utc>>,
    ) -> Result<TaskInstancePlan, RecurrenceError> {
        let recurrence_rule = rrule.map(parse_rrule).transpose()?;
        self.plan_instances(&PlanRequest {
            due_date,
            scheduled_date,
            recurrence_rule,
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::recurrence::{Frequency, Weekday};

    fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn zero_cap_is_rejected() {
        assert_eq!(
            RecurrenceService::new(0),
            Err(RecurrenceError::InvalidMaxInstances(0))
        );
        assert!(!RecurrenceError::InvalidMaxInstances(0).is_validation());
    }

    #[test]
    fn hard_limit_never_below_cap() {
        let service = RecurrenceService::new(1000).unwrap();
        assert_eq!(service.hard_limit(), 1000);
    }

    #[test]
    fn hard_limit_caps_far_until() {
        let service = RecurrenceService::default().with_hard_limit(10).unwrap();
        let request = PlanRequest {
            due_date: Some(at(2025, 1, 1, 9)),
            scheduled_date: None,
            recurrence_rule: Some(RecurrenceRule::new(Frequency::Daily).until(at(2030, 1, 1, 0))),
        };
        let plan = service.plan_instances(&request).unwrap();
        assert_eq!(plan.instances.len(), 10);
    }

    #[test]
    fn scheduled_lead_time_applies_to_every_instance() {
        let due = at(2025, 2, 10, 12);
        let request = PlanRequest {
            due_date: Some(due),
            scheduled_date: Some(due - Duration::days(2)),
            recurrence_rule: Some(RecurrenceRule::new(Frequency::Weekly).count(2).on([Weekday::Monday])),
        };
        let plan = RecurrenceService::default().plan_instances(&request).unwrap();
        for instance in &plan.instances {
            let due = instance.due_date.unwrap();
            assert_eq!(instance.scheduled_date, Some(due - Duration::days(2)));
        }
    }

    #[test]
    fn scheduled_after_due_is_rejected() {
        let due = at(2025, 2, 10, 12);
        let request = PlanRequest {
            due_date: Some(due),
            scheduled_date: Some(due + Duration::hours(1)),
            recurrence_rule: None,
        };
        let err = RecurrenceService::default().plan_instances(&request).unwrap_err();
        assert!(matches!(err, RecurrenceError::ScheduledAfterDue { .. }));
        assert!(err.is_validation());
    }

    #[test]
    fn undated_one_off_task_gets_one_undated_instance() {
        let plan = RecurrenceService::default()
            .plan_instances(&PlanRequest::default())
            .unwrap();
        assert_eq!(plan.recurrence_rule, None);
        assert_eq!(
            plan.instances,
            vec![PlannedInstance {
                due_date: None,
                scheduled_date: None
            }]
        );
    }

    #[test]
    fn until_before_anchor_falls_back_to_anchor() {
        let due = at(2025, 2, 10, 12);
        let request = PlanRequest {
            due_date: Some(due),
            scheduled_date: None,
            recurrence_rule: Some(RecurrenceRule::new(Frequency::Daily).until(at(2025, 1, 1, 0))),
        };
        let plan = RecurrenceService::default().plan_instances(&request).unwrap();
        assert_eq!(plan.instances.len(), 1);
        assert_eq!(plan.instances[0].due_date, Some(due));
    }

    #[test]
    fn replan_parses_stored_rule() {
        let due = at(2025, 2, 10, 12);
        let plan = RecurrenceService::default()
            .replan(Some("FREQ=WEEKLY;INTERVAL=1;COUNT=3;BYDAY=MO"), Some(due), None)
            .unwrap();
        assert_eq!(plan.instances.len(), 3);
        assert_eq!(plan.rrule().as_deref(), Some("FREQ=WEEKLY;INTERVAL=1;COUNT=3;BYDAY=MO"));
    }

    #[test]
    fn replan_surfaces_parse_errors() {
        let err = RecurrenceService::default()
            .replan(Some("FREQ=HOURLY"), Some(at(2025, 2, 10, 12)), None)
            .unwrap_err();
        assert!(matches!(err, RecurrenceError::Parse(_)));
    }
}
