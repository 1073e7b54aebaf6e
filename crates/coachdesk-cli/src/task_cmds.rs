//! `coachdesk task` subcommands.

use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use coachdesk_core::recurrence::{PlanRequest, RecurrenceService};
use coachdesk_core::schedule::{self, NewTaskRequest, TaskWithInstances};
use coachdesk_db::models::{InstanceStatus, Task, TaskInstance};
use coachdesk_db::queries::{instances as instance_db, tasks as task_db};

use crate::TaskCommands;
use crate::resolve::{display_ts, parse_id, parse_rule_arg};

pub async fn run_task_command(
    command: TaskCommands,
    pool: &PgPool,
    planner: &RecurrenceService,
) -> Result<()> {
    match command {
        TaskCommands::Create {
            title,
            description,
            due,
            scheduled,
            rrule,
            coach,
            client,
            json,
        } => {
            let request = NewTaskRequest {
                title,
                description: description.unwrap_or_default(),
                coach_id: coach.as_deref().map(|c| parse_id("coach", c)).transpose()?,
                client_id: client.as_deref().map(|c| parse_id("client", c)).transpose()?,
                plan: PlanRequest {
                    due_date: due,
                    scheduled_date: scheduled,
                    recurrence_rule: parse_rule_arg(rrule.as_deref())?,
                },
            };
            let created = schedule::create_task(pool, planner, &request).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&created)?);
            } else {
                println!("Task created.");
                println!();
                print_task(&created);
            }
            Ok(())
        }
        TaskCommands::Show { task_id, json } => {
            let id = parse_id("task", &task_id)?;
            let found = schedule::get_task_with_instances(pool, id).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&found)?);
            } else {
                print_task(&found);
            }
            Ok(())
        }
        TaskCommands::List { coach } => {
            let coach_id = coach.as_deref().map(|c| parse_id("coach", c)).transpose()?;
            cmd_list(pool, coach_id).await
        }
        TaskCommands::Reschedule {
            task_id,
            due,
            scheduled,
            clear_scheduled,
            rrule,
            clear_rrule,
        } => {
            let id = parse_id("task", &task_id)?;
            let edit = ScheduleEdit {
                due,
                scheduled,
                clear_scheduled,
                rrule,
                clear_rrule,
            };
            cmd_reschedule(pool, planner, id, &edit).await
        }
        TaskCommands::Complete { instance_id } => {
            let id = parse_id("instance", &instance_id)?;
            let instance = schedule::complete_instance(pool, id).await?;
            println!("Instance {} completed.", instance.id);
            Ok(())
        }
        TaskCommands::Skip { instance_id } => {
            let id = parse_id("instance", &instance_id)?;
            let instance = schedule::skip_instance(pool, id).await?;
            println!("Instance {} skipped.", instance.id);
            Ok(())
        }
        TaskCommands::Reopen { instance_id } => {
            let id = parse_id("instance", &instance_id)?;
            let instance = schedule::reopen_instance(pool, id).await?;
            println!("Instance {} reopened.", instance.id);
            Ok(())
        }
    }
}

async fn cmd_list(pool: &PgPool, coach_id: Option<Uuid>) -> Result<()> {
    let tasks = task_db::list_tasks(pool, coach_id).await?;
    if tasks.is_empty() {
        println!("No tasks found.");
        return Ok(());
    }

    println!(
        "{:<38} {:<28} {:<22} {:>10}",
        "ID", "TITLE", "DUE", "PROGRESS"
    );
    println!("{}", "-".repeat(101));
    for task in &tasks {
        let progress = instance_db::get_task_progress(pool, task.id).await?;
        let title = if task.title.chars().count() > 26 {
            format!("{}...", task.title.chars().take(23).collect::<String>())
        } else {
            task.title.clone()
        };
        println!(
            "{:<38} {:<28} {:<22} {:>10}",
            task.id,
            title,
            display_ts(task.due_date),
            format!("{}/{}", progress.completed + progress.skipped, progress.total)
        );
    }
    Ok(())
}

/// Fields given to `task reschedule`. Anything left out keeps its stored
/// value.
#[derive(Debug, Default)]
struct ScheduleEdit {
    due: Option<DateTime<Utc>>,
    scheduled: Option<DateTime<Utc>>,
    clear_scheduled: bool,
    rrule: Option<String>,
    clear_rrule: bool,
}

impl ScheduleEdit {
    /// Build the planner request from the stored task.
    ///
    /// Moving only the due date moves the stored scheduled date with it, so
    /// the task keeps its `due - scheduled` lead time.
    fn to_request(&self, current: &Task) -> Result<PlanRequest> {
        if self.clear_rrule && self.rrule.is_some() {
            bail!("--rrule and --clear-rrule are mutually exclusive");
        }
        if self.clear_scheduled && self.scheduled.is_some() {
            bail!("--scheduled and --clear-scheduled are mutually exclusive");
        }

        let due_date = self.due.or(current.due_date);
        let scheduled_date = if self.clear_scheduled {
            None
        } else if self.scheduled.is_some() {
            self.scheduled
        } else {
            match (self.due, current.due_date, current.scheduled_date) {
                (Some(new_due), Some(old_due), Some(old_scheduled)) => {
                    Some(new_due - (old_due - old_scheduled))
                }
                _ => current.scheduled_date,
            }
        };
        let recurrence_rule = if self.clear_rrule {
            None
        } else {
            parse_rule_arg(self.rrule.as_deref().or(current.recurrence_rule.as_deref()))?
        };

        Ok(PlanRequest {
            due_date,
            scheduled_date,
            recurrence_rule,
        })
    }
}

async fn cmd_reschedule(
    pool: &PgPool,
    planner: &RecurrenceService,
    task_id: Uuid,
    edit: &ScheduleEdit,
) -> Result<()> {
    let current = schedule::get_task_with_instances(pool, task_id).await?.task;
    let request = edit.to_request(&current)?;

    let updated = schedule::reschedule_task(pool, planner, task_id, &request).await?;
    println!("Task rescheduled.");
    println!();
    print_task(&updated);
    Ok(())
}

fn print_task(found: &TaskWithInstances) {
    let task = &found.task;
    println!("  Task ID:     {}", task.id);
    println!("  Title:       {}", task.title);
    if !task.description.is_empty() {
        println!("  Description: {}", task.description);
    }
    if let Some(coach) = task.coach_id {
        println!("  Coach:       {coach}");
    }
    if let Some(client) = task.client_id {
        println!("  Client:      {client}");
    }
    println!("  Due:         {}", display_ts(task.due_date));
    println!("  Scheduled:   {}", display_ts(task.scheduled_date));
    println!(
        "  Rule:        {}",
        task.recurrence_rule.as_deref().unwrap_or("(none)")
    );
    println!();
    println!("Instances ({}):", found.instances.len());
    for instance in &found.instances {
        println!("  {}", instance_line(instance));
    }
}

fn instance_line(instance: &TaskInstance) -> String {
    let icon = match instance.status {
        InstanceStatus::Pending => ".",
        InstanceStatus::Completed => "+",
        InstanceStatus::Skipped => "-",
    };
    format!(
        "[{icon}] #{:<3} due {:<22} {}  ({})",
        instance.sequence,
        display_ts(instance.due_date),
        instance.id,
        instance.status
    )
}
