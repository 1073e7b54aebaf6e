//! Task creation and rescheduling.

use std::collections::HashSet;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use coachdesk_db::models::{InstanceStatus, Task, TaskInstance};
use coachdesk_db::queries::instances as instance_queries;
use coachdesk_db::queries::tasks::{self as task_queries, NewTask};

use super::ScheduleError;
use crate::recurrence::{PlanRequest, RecurrenceService, TaskInstancePlan};

/// A task-creation request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTaskRequest {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub coach_id: Option<Uuid>,
    #[serde(default)]
    pub client_id: Option<Uuid>,
    #[serde(flatten)]
    pub plan: PlanRequest,
}

/// A task row together with its instances, ordered by sequence.
#[derive(Debug, Clone, Serialize)]
pub struct TaskWithInstances {
    pub task: Task,
    pub instances: Vec<TaskInstance>,
}

/// Plan a new task and store it with all of its instances.
///
/// Nothing is written when planning fails.
pub async fn create_task(
    pool: &PgPool,
    planner: &RecurrenceService,
    request: &NewTaskRequest,
) -> Result<TaskWithInstances, ScheduleError> {
    let plan = planner.plan_instances(&request.plan)?;
    let rrule = plan.rrule();

    let mut tx = pool.begin().await.context("failed to begin transaction")?;

    let task = task_queries::insert_task(
        &mut *tx,
        &NewTask {
            title: &request.title,
            description: &request.description,
            coach_id: request.coach_id,
            client_id: request.client_id,
            due_date: request.plan.due_date,
            scheduled_date: request.plan.scheduled_date,
            recurrence_rule: rrule.as_deref(),
        },
    )
    .await?;

    let dates: Vec<_> = plan
        .instances
        .iter()
        .map(|p| (p.due_date, p.scheduled_date))
        .collect();
    let instances = instance_queries::insert_instances(&mut *tx, task.id, 0, &dates).await?;

    tx.commit().await.context("failed to commit transaction")?;

    info!(
        task_id = %task.id,
        rrule = rrule.as_deref().unwrap_or("-"),
        instances = instances.len(),
        "created task"
    );

    Ok(TaskWithInstances { task, instances })
}

/// Move a task to a new anchor and/or rule.
///
/// Pending instances are replaced by the new plan. Completed and skipped
/// instances are history and stay; a planned due date that one of them
/// already covers is not inserted again. New instances continue the task's
/// sequence numbering.
pub async fn reschedule_task(
    pool: &PgPool,
    planner: &RecurrenceService,
    task_id: Uuid,
    request: &PlanRequest,
) -> Result<TaskWithInstances, ScheduleError> {
    let plan = planner.plan_instances(request)?;
    let rrule = plan.rrule();

    let mut tx = pool.begin().await.context("failed to begin transaction")?;

    task_queries::get_task(&mut *tx, task_id)
        .await?
        .ok_or(ScheduleError::TaskNotFound(task_id))?;

    let removed = instance_queries::delete_pending_instances(&mut *tx, task_id).await?;
    let resolved: HashSet<_> = instance_queries::list_instances_for_task(&mut *tx, task_id)
        .await?
        .into_iter()
        .filter(|i| i.status != InstanceStatus::Pending)
        .map(|i| i.due_date)
        .collect();

    let next_sequence = instance_queries::max_sequence(&mut *tx, task_id)
        .await?
        .map_or(0, |max| max + 1);
    let dates: Vec<_> = plan
        .instances
        .iter()
        .filter(|p| !resolved.contains(&p.due_date))
        .map(|p| (p.due_date, p.scheduled_date))
        .collect();
    let added = instance_queries::insert_instances(&mut *tx, task_id, next_sequence, &dates)
        .await?
        .len();

    let task = task_queries::update_task_schedule(
        &mut *tx,
        task_id,
        request.due_date,
        request.scheduled_date,
        rrule.as_deref(),
    )
    .await?
    .ok_or(ScheduleError::TaskNotFound(task_id))?;

    let instances = instance_queries::list_instances_for_task(&mut *tx, task_id).await?;

    tx.commit().await.context("failed to commit transaction")?;

    info!(%task_id, removed, added, "rescheduled task");

    Ok(TaskWithInstances { task, instances })
}

/// Fetch a task and its instances.
pub async fn get_task_with_instances(
    pool: &PgPool,
    task_id: Uuid,
) -> Result<TaskWithInstances, ScheduleError> {
    let task = task_queries::get_task(pool, task_id)
        .await?
        .ok_or(ScheduleError::TaskNotFound(task_id))?;
    let instances = instance_queries::list_instances_for_task(pool, task_id).await?;
    Ok(TaskWithInstances { task, instances })
}

/// Re-expand a stored task's rule from its stored anchor.
pub fn reload_plan(
    planner: &RecurrenceService,
    task: &Task,
) -> Result<TaskInstancePlan, ScheduleError> {
    Ok(planner.replan(
        task.recurrence_rule.as_deref(),
        task.due_date,
        task.scheduled_date,
    )?)
}
