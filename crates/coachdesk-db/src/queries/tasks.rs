//! Database query functions for the `tasks` table.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::models::Task;

/// Column values for a new task row.
#[derive(Debug, Clone, Default)]
pub struct NewTask<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub coach_id: Option<Uuid>,
    pub client_id: Option<Uuid>,
    pub due_date: Option<DateTime<Utc>>,
    pub scheduled_date: Option<DateTime<Utc>>,
    pub recurrence_rule: Option<&'a str>,
}

/// Insert a new task row. Returns the inserted task with server-generated
/// defaults (id, created_at, updated_at).
pub async fn insert_task<'e>(executor: impl PgExecutor<'e>, task: &NewTask<'_>) -> Result<Task> {
    let task = sqlx::query_as::<_, Task>(
        "INSERT INTO tasks (title, description, coach_id, client_id, due_date, scheduled_date, recurrence_rule) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         RETURNING *",
    )
    .bind(task.title)
    .bind(task.description)
    .bind(task.coach_id)
    .bind(task.client_id)
    .bind(task.due_date)
    .bind(task.scheduled_date)
    .bind(task.recurrence_rule)
    .fetch_one(executor)
    .await
    .with_context(|| format!("failed to insert task {:?}", task.title))?;

    Ok(task)
}

/// Fetch a single task by ID.
pub async fn get_task<'e>(executor: impl PgExecutor<'e>, id: Uuid) -> Result<Option<Task>> {
    let task = sqlx::query_as::<_, Task>("SELECT * FROM tasks WHERE id = $1")
        .bind(id)
        .fetch_optional(executor)
        .await
        .context("failed to fetch task")?;

    Ok(task)
}

/// List tasks, newest first. `coach_id` narrows the list to one coach.
pub async fn list_tasks(pool: &PgPool, coach_id: Option<Uuid>) -> Result<Vec<Task>> {
    let tasks = sqlx::query_as::<_, Task>(
        "SELECT * FROM tasks \
         WHERE ($1::uuid IS NULL OR coach_id = $1) \
         ORDER BY created_at DESC",
    )
    .bind(coach_id)
    .fetch_all(pool)
    .await
    .context("failed to list tasks")?;

    Ok(tasks)
}

/// Replace a task's anchor dates and recurrence rule.
///
/// Returns the updated row, or `None` if the task does not exist.
pub async fn update_task_schedule<'e>(
    executor: impl PgExecutor<'e>,
    id: Uuid,
    due_date: Option<DateTime<Utc>>,
    scheduled_date: Option<DateTime<Utc>>,
    recurrence_rule: Option<&str>,
) -> Result<Option<Task>> {
    let task = sqlx::query_as::<_, Task>(
        "UPDATE tasks \
         SET due_date = $2, scheduled_date = $3, recurrence_rule = $4, updated_at = now() \
         WHERE id = $1 \
         RETURNING *",
    )
    .bind(id)
    .bind(due_date)
    .bind(scheduled_date)
    .bind(recurrence_rule)
    .fetch_optional(executor)
    .await
    .context("failed to update task schedule")?;

    Ok(task)
}

/// Delete a task and, through the cascade, all of its instances.
///
/// Returns `true` if a row was deleted.
pub async fn delete_task(pool: &PgPool, id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await
        .context("failed to delete task")?;

    Ok(result.rows_affected() > 0)
}
