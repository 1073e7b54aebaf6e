//! `coachdesk plan` subcommands. These run the planner only and never touch
//! the database.

use anyhow::Result;
use chrono::{DateTime, Utc};

use coachdesk_core::recurrence::{PlanRequest, RecurrenceService, TaskInstancePlan};

use crate::PlanCommands;
use crate::resolve::{display_ts, parse_rule_arg};

pub fn run_plan_command(command: PlanCommands, planner: &RecurrenceService) -> Result<()> {
    match command {
        PlanCommands::Preview {
            due,
            scheduled,
            rrule,
            json,
        } => cmd_preview(planner, due, scheduled, rrule.as_deref(), json),
    }
}

fn cmd_preview(
    planner: &RecurrenceService,
    due: Option<DateTime<Utc>>,
    scheduled: Option<DateTime<Utc>>,
    rrule: Option<&str>,
    json: bool,
) -> Result<()> {
    let request = PlanRequest {
        due_date: due,
        scheduled_date: scheduled,
        recurrence_rule: parse_rule_arg(rrule)?,
    };
    let plan = planner.plan_instances(&request)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
    } else {
        print!("{}", render_plan(&plan));
    }
    Ok(())
}

fn render_plan(plan: &TaskInstancePlan) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Rule: {}\n",
        plan.rrule().as_deref().unwrap_or("(none)")
    ));
    out.push_str(&format!("Instances: {}\n\n", plan.instances.len()));
    out.push_str(&format!("{:>4}  {:<22} {:<22}\n", "#", "DUE", "SCHEDULED"));
    for (i, instance) in plan.instances.iter().enumerate() {
        out.push_str(&format!(
            "{:>4}  {:<22} {:<22}\n",
            i,
            display_ts(instance.due_date),
            display_ts(instance.scheduled_date)
        ));
    }
    out
}
