//! Second-factor authentication: TOTP codes, backup codes, and the
//! enrollment lifecycle.

pub mod backup;
pub mod service;
pub mod totp;

pub use backup::{DEFAULT_BACKUP_CODE_COUNT, generate_backup_codes, hash_backup_code};
pub use service::{
    DEFAULT_ISSUER, Enrollment, MfaConfig, MfaError, MfaStateMachine, MfaStatus, VerifiedWith,
};
pub use totp::TotpSecret;
