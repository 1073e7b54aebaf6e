//! MFA enrollment and verification against the database.
//!
//! Every state change goes through [`MfaStateMachine`] and is applied with
//! optimistic locking on the stored state, so two concurrent requests for the
//! same user cannot both win.

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tracing::{debug, info, warn};
use uuid::Uuid;

use coachdesk_db::models::{MfaEnrollment, MfaState};
use coachdesk_db::queries::mfa as db;

use super::backup::{
    DEFAULT_BACKUP_CODE_COUNT, generate_backup_codes, hash_backup_code, looks_like_backup_code,
};
use super::totp::TotpSecret;

/// Issuer shown in authenticator apps when none is configured.
pub const DEFAULT_ISSUER: &str = "Coachdesk";

/// Errors from MFA operations.
///
/// Everything except [`MfaError::Storage`] is caused by the request or the
/// user's current state and should be reported back to them.
#[derive(Debug, thiserror::Error)]
pub enum MfaError {
    #[error("user has no MFA enrollment in progress or enabled")]
    NotEnrolled,

    #[error("MFA is not enabled for this user")]
    NotEnabled,

    #[error("MFA is already enabled for this user")]
    AlreadyEnabled,

    #[error("invalid verification code")]
    InvalidCode,

    #[error("verification code was already used")]
    CodeReused,

    #[error("MFA state changed concurrently, retry the request")]
    StateConflict,

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl MfaError {
    /// Whether the error comes from the request rather than the backing store.
    pub fn is_user_error(&self) -> bool {
        !matches!(self, Self::Storage(_))
    }
}

/// Settings for enrollment.
#[derive(Debug, Clone)]
pub struct MfaConfig {
    pub issuer: String,
    pub backup_code_count: usize,
}

impl Default for MfaConfig {
    fn default() -> Self {
        Self {
            issuer: DEFAULT_ISSUER.to_owned(),
            backup_code_count: DEFAULT_BACKUP_CODE_COUNT,
        }
    }
}

/// What a user needs to finish enrolling. Shown once, never stored in this
/// form.
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    pub user_id: Uuid,
    pub secret_base32: String,
    pub provisioning_uri: String,
    pub backup_codes: Vec<String>,
}

impl std::fmt::Debug for Enrollment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Enrollment")
            .field("user_id", &self.user_id)
            .field("backup_codes", &self.backup_codes.len())
            .finish_non_exhaustive()
    }
}

/// Which factor satisfied a successful [`verify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum VerifiedWith {
    Totp,
    BackupCode { remaining: i64 },
}

/// Summary of a user's MFA setup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MfaStatus {
    pub user_id: Uuid,
    pub state: MfaState,
    pub enabled_at: Option<DateTime<Utc>>,
    pub backup_codes_remaining: i64,
}

/// The enrollment state machine.
///
/// ```text
/// disabled -> pending   (begin enrollment)
/// pending  -> enabled   (first valid code)
/// pending  -> disabled  (cancel)
/// enabled  -> disabled  (disable)
/// ```
pub struct MfaStateMachine;

impl MfaStateMachine {
    pub fn is_valid_transition(from: MfaState, to: MfaState) -> bool {
        matches!(
            (from, to),
            (MfaState::Disabled, MfaState::Pending)
                | (MfaState::Pending, MfaState::Enabled)
                | (MfaState::Pending, MfaState::Disabled)
                | (MfaState::Enabled, MfaState::Disabled)
        )
    }
}

/// Start enrolling `user_id`: issue a new secret and a new set of backup
/// codes.
///
/// A pending enrollment is cancelled and started over. An enabled one is left
/// alone and [`MfaError::AlreadyEnabled`] is returned; it has to be disabled
/// first.
pub async fn begin_enrollment(
    pool: &PgPool,
    config: &MfaConfig,
    user_id: Uuid,
    account: &str,
) -> Result<Enrollment, MfaError> {
    let mut tx = pool.begin().await.context("failed to begin transaction")?;

    match db::get_enrollment(&mut *tx, user_id).await?.map(|e| e.state) {
        Some(MfaState::Enabled) => return Err(MfaError::AlreadyEnabled),
        Some(MfaState::Pending) => {
            let rows = db::transition_enrollment_state(
                &mut *tx,
                user_id,
                MfaState::Pending,
                MfaState::Disabled,
                None,
            )
            .await?;
            if rows == 0 {
                return Err(MfaError::StateConflict);
            }
            debug!(%user_id, "restarting pending mfa enrollment");
        }
        Some(MfaState::Disabled) | None => {}
    }

    let secret = TotpSecret::generate();
    if db::begin_enrollment(&mut *tx, user_id, secret.as_bytes())
        .await?
        .is_none()
    {
        return Err(MfaError::StateConflict);
    }

    let backup_codes = generate_backup_codes(config.backup_code_count);
    let hashes: Vec<String> = backup_codes.iter().map(|c| hash_backup_code(c)).collect();
    db::delete_backup_codes(&mut *tx, user_id).await?;
    db::insert_backup_codes(&mut *tx, user_id, &hashes).await?;

    tx.commit().await.context("failed to commit transaction")?;

    info!(%user_id, backup_codes = backup_codes.len(), "mfa enrollment started");

    Ok(Enrollment {
        user_id,
        secret_base32: secret.to_base32(),
        provisioning_uri: secret.provisioning_uri(&config.issuer, account),
        backup_codes,
    })
}

/// Finish a pending enrollment with the first code from the user's
/// authenticator. The code's time step counts as used.
pub async fn confirm_enrollment(
    pool: &PgPool,
    user_id: Uuid,
    code: &str,
    at: DateTime<Utc>,
) -> Result<(), MfaError> {
    let enrollment = db::get_enrollment(pool, user_id).await?;
    let secret = match enrollment {
        Some(e) if e.state == MfaState::Pending => stored_secret(&e)?,
        Some(e) if e.state == MfaState::Enabled => return Err(MfaError::AlreadyEnabled),
        _ => return Err(MfaError::NotEnrolled),
    };

    let step = secret.verify(code, at).ok_or(MfaError::InvalidCode)?;

    let mut tx = pool.begin().await.context("failed to begin transaction")?;
    if db::record_used_step(&mut *tx, user_id, step).await? == 0 {
        return Err(MfaError::CodeReused);
    }
    transition(&mut tx, user_id, MfaState::Pending, MfaState::Enabled, Some(at)).await?;
    tx.commit().await.context("failed to commit transaction")?;

    info!(%user_id, "mfa enabled");
    Ok(())
}

/// Check a sign-in code for a user with MFA enabled.
///
/// Input shaped like a backup code is checked against the unused backup
/// codes and consumes the match. Anything else is treated as a TOTP code,
/// which must come from a time step later than the last accepted one.
pub async fn verify(
    pool: &PgPool,
    user_id: Uuid,
    code: &str,
    at: DateTime<Utc>,
) -> Result<VerifiedWith, MfaError> {
    let enrollment = db::get_enrollment(pool, user_id)
        .await?
        .filter(|e| e.state == MfaState::Enabled)
        .ok_or(MfaError::NotEnabled)?;

    if looks_like_backup_code(code) {
        if db::consume_backup_code(pool, user_id, &hash_backup_code(code)).await? == 0 {
            return Err(MfaError::InvalidCode);
        }
        let remaining = db::count_unused_backup_codes(pool, user_id).await?;
        if remaining == 0 {
            warn!(%user_id, "last mfa backup code used");
        } else {
            info!(%user_id, remaining, "mfa backup code used");
        }
        return Ok(VerifiedWith::BackupCode { remaining });
    }

    let secret = stored_secret(&enrollment)?;
    let step = secret.verify(code, at).ok_or(MfaError::InvalidCode)?;
    if db::record_used_step(pool, user_id, step).await? == 0 {
        return Err(MfaError::CodeReused);
    }

    debug!(%user_id, step, "totp code accepted");
    Ok(VerifiedWith::Totp)
}

/// Turn MFA off (or cancel a pending enrollment). Drops the secret and every
/// backup code.
pub async fn disable(pool: &PgPool, user_id: Uuid) -> Result<(), MfaError> {
    let mut tx = pool.begin().await.context("failed to begin transaction")?;

    let from = match db::get_enrollment(&mut *tx, user_id).await?.map(|e| e.state) {
        Some(state @ (MfaState::Pending | MfaState::Enabled)) => state,
        Some(MfaState::Disabled) | None => return Err(MfaError::NotEnrolled),
    };
    transition(&mut tx, user_id, from, MfaState::Disabled, None).await?;
    db::delete_backup_codes(&mut *tx, user_id).await?;

    tx.commit().await.context("failed to commit transaction")?;

    info!(%user_id, previous = %from, "mfa disabled");
    Ok(())
}

/// Current MFA state of a user. Users who never enrolled are `disabled`.
pub async fn status(pool: &PgPool, user_id: Uuid) -> Result<MfaStatus, MfaError> {
    let Some(enrollment) = db::get_enrollment(pool, user_id).await? else {
        return Ok(MfaStatus {
            user_id,
            state: MfaState::Disabled,
            enabled_at: None,
            backup_codes_remaining: 0,
        });
    };

    let backup_codes_remaining = if enrollment.state == MfaState::Disabled {
        0
    } else {
        db::count_unused_backup_codes(pool, user_id).await?
    };

    Ok(MfaStatus {
        user_id,
        state: enrollment.state,
        enabled_at: enrollment.enabled_at,
        backup_codes_remaining,
    })
}

async fn transition(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    user_id: Uuid,
    from: MfaState,
    to: MfaState,
    enabled_at: Option<DateTime<Utc>>,
) -> Result<(), MfaError> {
    if !MfaStateMachine::is_valid_transition(from, to) {
        return Err(MfaError::Storage(anyhow::anyhow!(
            "invalid mfa transition: {from} -> {to} for user {user_id}"
        )));
    }
    let rows = db::transition_enrollment_state(&mut **tx, user_id, from, to, enabled_at).await?;
    if rows == 0 {
        return Err(MfaError::StateConflict);
    }
    Ok(())
}

fn stored_secret(enrollment: &MfaEnrollment) -> Result<TotpSecret, MfaError> {
    enrollment
        .secret
        .as_deref()
        .map(TotpSecret::from_bytes)
        .ok_or_else(|| {
            MfaError::Storage(anyhow::anyhow!(
                "mfa enrollment for user {} has no secret",
                enrollment.user_id
            ))
        })
}
