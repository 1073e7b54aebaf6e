//! Query functions, one module per table family.
//!
//! Functions that run inside service-layer transactions take any
//! [`sqlx::PgExecutor`], so callers can pass either `&PgPool` or
//! `&mut *tx`.

pub mod instances;
pub mod mfa;
pub mod tasks;
