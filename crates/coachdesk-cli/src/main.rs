mod config;
mod mfa_cmds;
mod plan_cmds;
mod resolve;
mod task_cmds;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tracing::debug;

use coachdesk_db::config::DbConfig;
use coachdesk_db::pool;

use config::CoachdeskConfig;
use resolve::parse_timestamp;

#[derive(Parser)]
#[command(
    name = "coachdesk",
    about = "Recurring coaching tasks and account MFA, from the command line"
)]
struct Cli {
    /// Database URL (overrides COACHDESK_DATABASE_URL env var)
    #[arg(long, global = true)]
    database_url: Option<String>,

    /// Instances planned for open-ended rules (overrides COACHDESK_MAX_INSTANCES)
    #[arg(long, global = true)]
    max_instances: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a coachdesk config file (no database required)
    Init {
        /// PostgreSQL connection URL
        #[arg(long, default_value = DbConfig::DEFAULT_URL)]
        db_url: String,
        /// MFA issuer shown in authenticator apps
        #[arg(long)]
        issuer: Option<String>,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Create the database if needed and apply migrations
    DbInit,
    /// Preview recurrence plans (no database required)
    Plan {
        #[command(subcommand)]
        command: PlanCommands,
    },
    /// Task scheduling
    Task {
        #[command(subcommand)]
        command: TaskCommands,
    },
    /// Multi-factor authentication
    Mfa {
        #[command(subcommand)]
        command: MfaCommands,
    },
}

#[derive(Subcommand)]
pub enum PlanCommands {
    /// Expand a due date and rule into instances
    Preview {
        /// Due date of the first instance
        #[arg(long, value_parser = parse_timestamp)]
        due: Option<DateTime<Utc>>,
        /// Planned start of the first instance
        #[arg(long, value_parser = parse_timestamp)]
        scheduled: Option<DateTime<Utc>>,
        /// Recurrence rule, e.g. "FREQ=WEEKLY;COUNT=3;BYDAY=MO"
        #[arg(long)]
        rrule: Option<String>,
        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum TaskCommands {
    /// Create a task and its planned instances
    Create {
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: Option<String>,
        /// Due date of the first instance
        #[arg(long, value_parser = parse_timestamp)]
        due: Option<DateTime<Utc>>,
        /// Planned start of the first instance
        #[arg(long, value_parser = parse_timestamp)]
        scheduled: Option<DateTime<Utc>>,
        /// Recurrence rule
        #[arg(long)]
        rrule: Option<String>,
        /// Coach user ID
        #[arg(long)]
        coach: Option<String>,
        /// Client user ID
        #[arg(long)]
        client: Option<String>,
        /// Print the created task as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a task and its instances
    Show {
        task_id: String,
        #[arg(long)]
        json: bool,
    },
    /// List tasks with progress
    List {
        /// Only tasks assigned by this coach
        #[arg(long)]
        coach: Option<String>,
    },
    /// Move a task to a new due date or rule; completed instances are kept
    Reschedule {
        task_id: String,
        /// New due date; a stored scheduled date keeps its lead time
        #[arg(long, value_parser = parse_timestamp)]
        due: Option<DateTime<Utc>>,
        #[arg(long, value_parser = parse_timestamp, conflicts_with = "clear_scheduled")]
        scheduled: Option<DateTime<Utc>>,
        /// Drop the scheduled date
        #[arg(long)]
        clear_scheduled: bool,
        /// New recurrence rule
        #[arg(long)]
        rrule: Option<String>,
        /// Make the task one-off
        #[arg(long, conflicts_with = "rrule")]
        clear_rrule: bool,
    },
    /// Mark an instance completed
    Complete { instance_id: String },
    /// Mark an instance skipped
    Skip { instance_id: String },
    /// Put a completed or skipped instance back to pending
    Reopen { instance_id: String },
}

#[derive(Subcommand)]
pub enum MfaCommands {
    /// Start (or restart) enrollment: prints the secret and backup codes
    Enroll {
        user_id: String,
        /// Account label shown in the authenticator app (defaults to the user ID)
        #[arg(long)]
        account: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Finish enrollment with the first code from the authenticator
    Confirm { user_id: String, code: String },
    /// Check a sign-in code or backup code
    Verify { user_id: String, code: String },
    /// Show a user's MFA state
    Status {
        user_id: String,
        #[arg(long)]
        json: bool,
    },
    /// Turn MFA off or cancel a pending enrollment
    Disable { user_id: String },
}

/// Execute `coachdesk init`: write the config file.
fn cmd_init(db_url: &str, issuer: Option<String>, force: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let mut cfg = config::ConfigFile::default();
    cfg.database.url = db_url.to_owned();
    if let Some(issuer) = issuer {
        cfg.mfa.issuer = issuer;
    }
    let path = config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    println!("  database.url = {db_url}");
    println!("  planner.max_instances = {}", cfg.planner.max_instances);
    println!("  mfa.issuer = {}", cfg.mfa.issuer);
    println!();
    println!("Next: run `coachdesk db-init` to create and migrate the database.");

    Ok(())
}

/// Execute `coachdesk db-init`: create the database and run migrations.
async fn cmd_db_init(resolved: &CoachdeskConfig) -> anyhow::Result<()> {
    println!("Initializing coachdesk database...");

    if pool::ensure_database_exists(&resolved.db_config).await? {
        println!("Created database.");
    }
    let db_pool = pool::create_pool(&resolved.db_config).await?;
    let applied = pool::run_migrations(&db_pool).await?;
    if applied.is_empty() {
        println!("Schema is up to date.");
    } else {
        println!("Applied migrations:");
        for migration in &applied {
            println!("  {migration}");
        }
    }

    let counts = pool::table_counts(&db_pool).await?;
    println!("Database ready. Tables:");
    for (table, count) in &counts {
        println!("  {table}: {count} rows");
    }

    db_pool.close().await;
    println!("coachdesk db-init complete.");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init {
            db_url,
            issuer,
            force,
        } => cmd_init(&db_url, issuer, force)?,
        command => {
            let resolved =
                CoachdeskConfig::resolve(cli.database_url.as_deref(), cli.max_instances)?;
            debug!(
                database = resolved.db_config.database_name().unwrap_or("-"),
                max_instances = resolved.planner.max_instances(),
                issuer = %resolved.mfa.issuer,
                "configuration resolved"
            );
            run_command(command, &resolved).await?;
        }
    }

    Ok(())
}

/// Run a command that needs resolved configuration.
async fn run_command(command: Commands, resolved: &CoachdeskConfig) -> anyhow::Result<()> {
    match command {
        Commands::Init { .. } => anyhow::bail!("init does not take resolved configuration"),
        Commands::DbInit => cmd_db_init(resolved).await,
        Commands::Plan { command } => plan_cmds::run_plan_command(command, &resolved.planner),
        Commands::Task { command } => {
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let result = task_cmds::run_task_command(command, &db_pool, &resolved.planner).await;
            db_pool.close().await;
            result
        }
        Commands::Mfa { command } => {
            let db_pool = pool::create_pool(&resolved.db_config).await?;
            let result = mfa_cmds::run_mfa_command(command, &db_pool, &resolved.mfa).await;
            db_pool.close().await;
            result
        }
    }
}
