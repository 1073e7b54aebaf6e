//! Persisting planned task instances.
//!
//! The recurrence planner is pure; this module writes its output. Tasks and
//! their instances are created and rescheduled in one transaction each, and
//! instances move through [`InstanceStateMachine`].

pub mod service;
pub mod state;

use uuid::Uuid;

use coachdesk_db::models::InstanceStatus;

use crate::recurrence::RecurrenceError;

pub use service::{
    NewTaskRequest, TaskWithInstances, create_task, get_task_with_instances, reload_plan,
    reschedule_task,
};
pub use state::{InstanceStateMachine, complete_instance, reopen_instance, skip_instance};

/// Errors from the scheduling service.
#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    /// The request could not be planned. Callers report this as a client
    /// error.
    #[error(transparent)]
    Validation(#[from] RecurrenceError),

    #[error("task {0} not found")]
    TaskNotFound(Uuid),

    #[error("task instance {0} not found")]
    InstanceNotFound(Uuid),

    #[error("invalid instance transition: {from} -> {to}")]
    InvalidTransition {
        from: InstanceStatus,
        to: InstanceStatus,
    },

    #[error("task instance {id} is {actual}, expected {expected}")]
    StateConflict {
        id: Uuid,
        actual: InstanceStatus,
        expected: InstanceStatus,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ScheduleError {
    /// The request itself was malformed and can be fixed by the caller.
    pub fn is_validation(&self) -> bool {
        match self {
            Self::Validation(e) => e.is_validation(),
            Self::InvalidTransition { .. } => true,
            _ => false,
        }
    }

    /// The task or instance named by the request does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::TaskNotFound(_) | Self::InstanceNotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_rows_are_not_validation_errors() {
        let err = ScheduleError::TaskNotFound(Uuid::nil());
        assert!(err.is_not_found());
        assert!(!err.is_validation());

        let err = ScheduleError::InstanceNotFound(Uuid::nil());
        assert!(err.is_not_found());
        assert!(!err.is_validation());
    }

    #[test]
    fn classification_of_remaining_variants() {
        let err = ScheduleError::Validation(RecurrenceError::MissingAnchor);
        assert!(err.is_validation());
        assert!(!err.is_not_found());

        let err = ScheduleError::Validation(RecurrenceError::InvalidMaxInstances(0));
        assert!(!err.is_validation());

        let err = ScheduleError::StateConflict {
            id: Uuid::nil(),
            actual: InstanceStatus::Completed,
            expected: InstanceStatus::Pending,
        };
        assert!(!err.is_validation());
        assert!(!err.is_not_found());

        let err = ScheduleError::Other(anyhow::anyhow!("connection reset"));
        assert!(!err.is_validation());
        assert!(!err.is_not_found());
    }
}
