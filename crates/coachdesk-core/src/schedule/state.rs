//! Task instance status transitions.

use chrono::Utc;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use coachdesk_db::models::{InstanceStatus, TaskInstance};
use coachdesk_db::queries::instances as db;

use super::ScheduleError;

/// The instance state machine.
///
/// ```text
/// pending   -> completed
/// pending   -> skipped
/// completed -> pending   (reopen)
/// skipped   -> pending   (reopen)
/// ```
pub struct InstanceStateMachine;

impl InstanceStateMachine {
    pub fn is_valid_transition(from: InstanceStatus, to: InstanceStatus) -> bool {
        matches!(
            (from, to),
            (InstanceStatus::Pending, InstanceStatus::Completed)
                | (InstanceStatus::Pending, InstanceStatus::Skipped)
                | (InstanceStatus::Completed, InstanceStatus::Pending)
                | (InstanceStatus::Skipped, InstanceStatus::Pending)
        )
    }

    /// Apply a transition with optimistic locking on `from`.
    ///
    /// `completed_at` is stamped when an instance is completed or skipped and
    /// cleared when it is reopened. Returns the updated row.
    pub async fn transition(
        pool: &PgPool,
        instance_id: Uuid,
        from: InstanceStatus,
        to: InstanceStatus,
    ) -> Result<TaskInstance, ScheduleError> {
        if !Self::is_valid_transition(from, to) {
            return Err(ScheduleError::InvalidTransition { from, to });
        }

        let completed_at = match to {
            InstanceStatus::Completed | InstanceStatus::Skipped => Some(Utc::now()),
            InstanceStatus::Pending => None,
        };

        let rows = db::transition_instance_status(pool, instance_id, from, to, completed_at).await?;
        let instance = db::get_instance(pool, instance_id)
            .await?
            .ok_or(ScheduleError::InstanceNotFound(instance_id))?;

        if rows == 0 {
            return Err(ScheduleError::StateConflict {
                id: instance_id,
                actual: instance.status,
                expected: from,
            });
        }

        debug!(%instance_id, %from, %to, "instance transitioned");
        Ok(instance)
    }
}

/// `pending -> completed`
pub async fn complete_instance(
    pool: &PgPool,
    instance_id: Uuid,
) -> Result<TaskInstance, ScheduleError> {
    InstanceStateMachine::transition(
        pool,
        instance_id,
        InstanceStatus::Pending,
        InstanceStatus::Completed,
    )
    .await
}

/// `pending -> skipped`
pub async fn skip_instance(pool: &PgPool, instance_id: Uuid) -> Result<TaskInstance, ScheduleError> {
    InstanceStateMachine::transition(
        pool,
        instance_id,
        InstanceStatus::Pending,
        InstanceStatus::Skipped,
    )
    .await
}

/// Put a completed or skipped instance back to `pending`.
pub async fn reopen_instance(
    pool: &PgPool,
    instance_id: Uuid,
) -> Result<TaskInstance, ScheduleError> {
    let current = db::get_instance(pool, instance_id)
        .await?
        .ok_or(ScheduleError::InstanceNotFound(instance_id))?;
    InstanceStateMachine::transition(pool, instance_id, current.status, InstanceStatus::Pending)
        .await
}
