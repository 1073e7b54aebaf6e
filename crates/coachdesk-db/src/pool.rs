//! Connections, embedded migrations, and the pieces of `coachdesk db-init`.

use std::collections::HashSet;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{Connection, Executor, PgConnection, PgPool};
use tracing::{debug, info};

use crate::config::DbConfig;

/// Migrations embedded at compile time from `crates/coachdesk-db/migrations/`.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();

/// Tables owned by coachdesk, in the order `db-init` reports them.
pub const TABLES: [&str; 4] = ["tasks", "task_instances", "mfa_enrollments", "mfa_backup_codes"];

/// Shown in `pg_stat_activity` for every coachdesk connection.
const APPLICATION_NAME: &str = "coachdesk";

fn connect_options(url: &str) -> Result<PgConnectOptions> {
    let options = PgConnectOptions::from_str(url).context("invalid database URL")?;
    Ok(options.application_name(APPLICATION_NAME))
}

/// Open the pool used by task and MFA commands.
pub async fn create_pool(config: &DbConfig) -> Result<PgPool> {
    let name = config.database_name().unwrap_or("(default)");
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(connect_options(&config.database_url)?)
        .await
        .with_context(|| format!("failed to connect to database {name}"))?;
    debug!(db = name, "connection pool ready");
    Ok(pool)
}

/// Apply pending migrations and return the ones this call applied, as
/// `"<version> <description>"`. An up-to-date schema yields an empty list.
pub async fn run_migrations(pool: &PgPool) -> Result<Vec<String>> {
    let before = applied_versions(pool).await?;

    MIGRATOR
        .run(pool)
        .await
        .context("failed to run database migrations")?;

    let applied: Vec<String> = MIGRATOR
        .iter()
        .filter(|m| m.migration_type.is_up_migration() && !before.contains(&m.version))
        .map(|m| format!("{} {}", m.version, m.description))
        .collect();

    if applied.is_empty() {
        debug!("schema already up to date");
    }
    for migration in &applied {
        info!(%migration, "applied migration");
    }
    Ok(applied)
}

/// Versions recorded by earlier migration runs.
async fn applied_versions(pool: &PgPool) -> Result<HashSet<i64>> {
    let tracked: bool =
        sqlx::query_scalar("SELECT to_regclass('public._sqlx_migrations') IS NOT NULL")
            .fetch_one(pool)
            .await
            .context("failed to look up the migrations table")?;
    if !tracked {
        return Ok(HashSet::new());
    }

    let versions: Vec<i64> =
        sqlx::query_scalar("SELECT version FROM _sqlx_migrations WHERE success")
            .fetch_all(pool)
            .await
            .context("failed to read applied migrations")?;
    Ok(versions.into_iter().collect())
}

/// Create the configured database unless it already exists.
///
/// Returns `true` when the database was created by this call.
pub async fn ensure_database_exists(config: &DbConfig) -> Result<bool> {
    let Some(name) = config.database_name() else {
        bail!("database URL does not name a database");
    };
    // CREATE DATABASE takes an identifier, not a bind parameter.
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        bail!("database name {name:?} must be ASCII letters, digits, or underscores");
    }

    let mut conn = PgConnection::connect_with(&connect_options(&config.maintenance_url())?)
        .await
        .context("failed to connect to the postgres maintenance database")?;

    let exists: bool =
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
            .bind(name)
            .fetch_one(&mut conn)
            .await
            .context("failed to query pg_database")?;

    if !exists {
        conn.execute(format!("CREATE DATABASE \"{name}\"").as_str())
            .await
            .with_context(|| format!("failed to create database {name}"))?;
        info!(db = name, "database created");
    } else {
        debug!(db = name, "database already exists");
    }

    conn.close().await.context("failed to close maintenance connection")?;
    Ok(!exists)
}

/// Row count of each table in [`TABLES`], in that order.
pub async fn table_counts(pool: &PgPool) -> Result<Vec<(&'static str, i64)>> {
    let query = TABLES
        .iter()
        .enumerate()
        .map(|(i, table)| format!("SELECT {i}::int4 AS ord, COUNT(*) AS n FROM {table}"))
        .collect::<Vec<_>>()
        .join(" UNION ALL ")
        + " ORDER BY ord";

    let rows: Vec<(i32, i64)> = sqlx::query_as(&query)
        .fetch_all(pool)
        .await
        .context("failed to count rows in coachdesk tables")?;

    Ok(rows
        .into_iter()
        .zip(TABLES)
        .map(|((_, count), table)| (table, count))
        .collect())
}
