//! Database query functions for the `task_instances` table.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::models::{InstanceStatus, TaskInstance};

/// Insert planned instances in `pending` status in one statement.
///
/// `dates` holds `(due_date, scheduled_date)` pairs; the first gets sequence
/// `first_sequence` and the rest follow consecutively. Returns the new rows
/// in sequence order.
pub async fn insert_instances<'e>(
    executor: impl PgExecutor<'e>,
    task_id: Uuid,
    first_sequence: i32,
    dates: &[(Option<DateTime<Utc>>, Option<DateTime<Utc>>)],
) -> Result<Vec<TaskInstance>> {
    if dates.is_empty() {
        return Ok(Vec::new());
    }
    let (due_dates, scheduled_dates): (Vec<_>, Vec<_>) = dates.iter().copied().unzip();

    let mut instances = sqlx::query_as::<_, TaskInstance>(
        "INSERT INTO task_instances (task_id, sequence, due_date, scheduled_date) \
         SELECT $1, $2 + (t.ord - 1)::int4, t.due_date, t.scheduled_date \
         FROM UNNEST($3::timestamptz[], $4::timestamptz[]) \
              WITH ORDINALITY AS t(due_date, scheduled_date, ord) \
         RETURNING *",
    )
    .bind(task_id)
    .bind(first_sequence)
    .bind(&due_dates)
    .bind(&scheduled_dates)
    .fetch_all(executor)
    .await
    .with_context(|| {
        format!(
            "failed to insert {} instances of task {task_id} from sequence {first_sequence}",
            dates.len()
        )
    })?;

    instances.sort_by_key(|i| i.sequence);
    Ok(instances)
}

/// Fetch a single instance by ID.
pub async fn get_instance<'e>(
    executor: impl PgExecutor<'e>,
    id: Uuid,
) -> Result<Option<TaskInstance>> {
    let instance = sqlx::query_as::<_, TaskInstance>("SELECT * FROM task_instances WHERE id = $1")
        .bind(id)
        .fetch_optional(executor)
        .await
        .context("failed to fetch task instance")?;

    Ok(instance)
}

/// List all instances of a task in sequence order.
pub async fn list_instances_for_task<'e>(
    executor: impl PgExecutor<'e>,
    task_id: Uuid,
) -> Result<Vec<TaskInstance>> {
    let instances = sqlx::query_as::<_, TaskInstance>(
        "SELECT * FROM task_instances WHERE task_id = $1 ORDER BY sequence ASC",
    )
    .bind(task_id)
    .fetch_all(executor)
    .await
    .context("failed to list task instances")?;

    Ok(instances)
}

/// Delete every still-pending instance of a task. Returns the number of
/// rows removed.
pub async fn delete_pending_instances<'e>(
    executor: impl PgExecutor<'e>,
    task_id: Uuid,
) -> Result<u64> {
    let result =
        sqlx::query("DELETE FROM task_instances WHERE task_id = $1 AND status = 'pending'")
            .bind(task_id)
            .execute(executor)
            .await
            .context("failed to delete pending instances")?;

    Ok(result.rows_affected())
}

/// Highest sequence number used by a task, `None` when it has no instances.
pub async fn max_sequence<'e>(executor: impl PgExecutor<'e>, task_id: Uuid) -> Result<Option<i32>> {
    let max: Option<i32> =
        sqlx::query_scalar("SELECT MAX(sequence) FROM task_instances WHERE task_id = $1")
            .bind(task_id)
            .fetch_one(executor)
            .await
            .context("failed to read max instance sequence")?;

    Ok(max)
}

/// Atomically move an instance from `from` to `to`, setting `completed_at`
/// to the given value (`None` clears it). Uses optimistic locking on the
/// current status.
///
/// Returns the number of rows affected (0 or 1).
pub async fn transition_instance_status(
    pool: &PgPool,
    id: Uuid,
    from: InstanceStatus,
    to: InstanceStatus,
    completed_at: Option<DateTime<Utc>>,
) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE task_instances \
         SET status = $1, completed_at = $2 \
         WHERE id = $3 AND status = $4",
    )
    .bind(to)
    .bind(completed_at)
    .bind(id)
    .bind(from)
    .execute(pool)
    .await
    .context("failed to transition instance status")?;

    Ok(result.rows_affected())
}

/// Per-status instance counts for one task.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstanceProgress {
    pub total: i64,
    pub pending: i64,
    pub completed: i64,
    pub skipped: i64,
}

/// Count a task's instances by status.
pub async fn get_task_progress(pool: &PgPool, task_id: Uuid) -> Result<InstanceProgress> {
    let rows: Vec<(InstanceStatus, i64)> = sqlx::query_as(
        "SELECT status, COUNT(*) FROM task_instances WHERE task_id = $1 GROUP BY status",
    )
    .bind(task_id)
    .fetch_all(pool)
    .await
    .context("failed to count task instances")?;

    let mut progress = InstanceProgress::default();
    for (status, count) in rows {
        progress.total += count;
        match status {
            InstanceStatus::Pending => progress.pending = count,
            InstanceStatus::Completed => progress.completed = count,
            InstanceStatus::Skipped => progress.skipped = count,
        }
    }
    Ok(progress)
}
