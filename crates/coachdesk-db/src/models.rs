use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Status of a single planned task instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    Pending,
    Completed,
    Skipped,
}

impl fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

impl FromStr for InstanceStatus {
    type Err = InstanceStatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "skipped" => Ok(Self::Skipped),
            other => Err(InstanceStatusParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`InstanceStatus`] string.
#[derive(Debug, Clone)]
pub struct InstanceStatusParseError(pub String);

impl fmt::Display for InstanceStatusParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid instance status: {:?}", self.0)
    }
}

impl std::error::Error for InstanceStatusParseError {}

// ---------------------------------------------------------------------------

/// MFA enrollment state of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MfaState {
    /// No second factor; also the state after a cancelled enrollment.
    Disabled,
    /// Secret issued, waiting for the first valid code.
    Pending,
    /// Codes are required at sign-in.
    Enabled,
}

impl fmt::Display for MfaState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disabled => "disabled",
            Self::Pending => "pending",
            Self::Enabled => "enabled",
        };
        f.write_str(s)
    }
}

impl FromStr for MfaState {
    type Err = MfaStateParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "disabled" => Ok(Self::Disabled),
            "pending" => Ok(Self::Pending),
            "enabled" => Ok(Self::Enabled),
            other => Err(MfaStateParseError(other.to_owned())),
        }
    }
}

/// Error returned when parsing an invalid [`MfaState`] string.
#[derive(Debug, Clone)]
pub struct MfaStateParseError(pub String);

impl fmt::Display for MfaStateParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid mfa state: {:?}", self.0)
    }
}

impl std::error::Error for MfaStateParseError {}

// ---------------------------------------------------------------------------
// Row structs
// ---------------------------------------------------------------------------

/// A task assigned by a coach to a client, optionally recurring.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub coach_id: Option<Uuid>,
    pub client_id: Option<Uuid>,
    /// Anchor due date of the recurrence (or the single due date).
    pub due_date: Option<DateTime<Utc>>,
    pub scheduled_date: Option<DateTime<Utc>>,
    /// Normalized RRULE text, `None` for one-off tasks.
    pub recurrence_rule: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One planned occurrence of a task.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TaskInstance {
    pub id: Uuid,
    pub task_id: Uuid,
    pub sequence: i32,
    pub due_date: Option<DateTime<Utc>>,
    pub scheduled_date: Option<DateTime<Utc>>,
    pub status: InstanceStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// TOTP enrollment row for a user.
#[derive(Clone, Serialize, Deserialize, FromRow)]
pub struct MfaEnrollment {
    pub user_id: Uuid,
    pub state: MfaState,
    /// Raw TOTP secret; `None` once MFA is disabled.
    #[serde(skip_serializing)]
    pub secret: Option<Vec<u8>>,
    /// Highest TOTP time step accepted so far.
    pub last_used_step: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub enabled_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl fmt::Debug for MfaEnrollment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MfaEnrollment")
            .field("user_id", &self.user_id)
            .field("state", &self.state)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("last_used_step", &self.last_used_step)
            .field("created_at", &self.created_at)
            .field("enabled_at", &self.enabled_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

/// Hashed single-use backup code.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BackupCode {
    pub id: Uuid,
    pub user_id: Uuid,
    pub code_hash: String,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
