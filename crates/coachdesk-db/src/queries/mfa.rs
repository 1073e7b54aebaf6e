//! Database query functions for the `mfa_enrollments` and
//! `mfa_backup_codes` tables.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::models::{MfaEnrollment, MfaState};

/// Fetch a user's enrollment row.
pub async fn get_enrollment<'e>(
    executor: impl PgExecutor<'e>,
    user_id: Uuid,
) -> Result<Option<MfaEnrollment>> {
    let enrollment =
        sqlx::query_as::<_, MfaEnrollment>("SELECT * FROM mfa_enrollments WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(executor)
            .await
            .context("failed to fetch mfa enrollment")?;

    Ok(enrollment)
}

/// Start (or restart) an enrollment with a fresh secret.
///
/// Creates the row if the user has none. An existing row is only reset when
/// it is `disabled`; otherwise nothing changes and `None` is returned.
pub async fn begin_enrollment<'e>(
    executor: impl PgExecutor<'e>,
    user_id: Uuid,
    secret: &[u8],
) -> Result<Option<MfaEnrollment>> {
    let enrollment = sqlx::query_as::<_, MfaEnrollment>(
        "INSERT INTO mfa_enrollments (user_id, state, secret) \
         VALUES ($1, 'pending', $2) \
         ON CONFLICT (user_id) DO UPDATE \
         SET state = 'pending', secret = EXCLUDED.secret, last_used_step = NULL, \
             enabled_at = NULL, updated_at = now() \
         WHERE mfa_enrollments.state = 'disabled' \
         RETURNING *",
    )
    .bind(user_id)
    .bind(secret)
    .fetch_optional(executor)
    .await
    .context("failed to begin mfa enrollment")?;

    Ok(enrollment)
}

/// Atomically move an enrollment from `from` to `to` with optimistic locking
/// on the current state.
///
/// `enabled_at` is written as given. Moving to `disabled` also drops the
/// secret and the replay marker. Returns the number of rows affected.
pub async fn transition_enrollment_state<'e>(
    executor: impl PgExecutor<'e>,
    user_id: Uuid,
    from: MfaState,
    to: MfaState,
    enabled_at: Option<DateTime<Utc>>,
) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE mfa_enrollments \
         SET state = $1, \
             enabled_at = $2, \
             secret = CASE WHEN $1 = 'disabled' THEN NULL ELSE secret END, \
             last_used_step = CASE WHEN $1 = 'disabled' THEN NULL ELSE last_used_step END, \
             updated_at = now() \
         WHERE user_id = $3 AND state = $4",
    )
    .bind(to)
    .bind(enabled_at)
    .bind(user_id)
    .bind(from)
    .execute(executor)
    .await
    .context("failed to transition mfa enrollment")?;

    Ok(result.rows_affected())
}

/// Record that the TOTP time step `step` was used.
///
/// Only succeeds (returns 1) when `step` is newer than every step accepted
/// before, which makes a replayed code fail even under concurrent requests.
pub async fn record_used_step<'e>(
    executor: impl PgExecutor<'e>,
    user_id: Uuid,
    step: i64,
) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE mfa_enrollments \
         SET last_used_step = $2, updated_at = now() \
         WHERE user_id = $1 AND (last_used_step IS NULL OR last_used_step < $2)",
    )
    .bind(user_id)
    .bind(step)
    .execute(executor)
    .await
    .context("failed to record used totp step")?;

    Ok(result.rows_affected())
}

/// Delete all of a user's backup codes.
pub async fn delete_backup_codes<'e>(executor: impl PgExecutor<'e>, user_id: Uuid) -> Result<u64> {
    let result = sqlx::query("DELETE FROM mfa_backup_codes WHERE user_id = $1")
        .bind(user_id)
        .execute(executor)
        .await
        .context("failed to delete backup codes")?;

    Ok(result.rows_affected())
}

/// Insert hashed backup codes for a user in one statement.
pub async fn insert_backup_codes<'e>(
    executor: impl PgExecutor<'e>,
    user_id: Uuid,
    code_hashes: &[String],
) -> Result<u64> {
    let result = sqlx::query(
        "INSERT INTO mfa_backup_codes (user_id, code_hash) \
         SELECT $1, UNNEST($2::text[])",
    )
    .bind(user_id)
    .bind(code_hashes)
    .execute(executor)
    .await
    .context("failed to insert backup codes")?;

    Ok(result.rows_affected())
}

/// Mark an unused backup code as used. Returns 1 if the code existed and
/// was still unused, 0 otherwise.
pub async fn consume_backup_code<'e>(
    executor: impl PgExecutor<'e>,
    user_id: Uuid,
    code_hash: &str,
) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE mfa_backup_codes SET used_at = now() \
         WHERE user_id = $1 AND code_hash = $2 AND used_at IS NULL",
    )
    .bind(user_id)
    .bind(code_hash)
    .execute(executor)
    .await
    .context("failed to consume backup code")?;

    Ok(result.rows_affected())
}

/// Number of backup codes the user can still use.
pub async fn count_unused_backup_codes<'e>(
    executor: impl PgExecutor<'e>,
    user_id: Uuid,
) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM mfa_backup_codes WHERE user_id = $1 AND used_at IS NULL",
    )
    .bind(user_id)
    .fetch_one(executor)
    .await
    .context("failed to count backup codes")?;

    Ok(count)
}
