//! `coachdesk mfa` subcommands, for operators enrolling and checking users.

use anyhow::Result;
use chrono::Utc;
use sqlx::PgPool;

use coachdesk_core::mfa::{MfaConfig, VerifiedWith, service};

use crate::MfaCommands;
use crate::resolve::{display_ts, parse_id};

pub async fn run_mfa_command(command: MfaCommands, pool: &PgPool, config: &MfaConfig) -> Result<()> {
    match command {
        MfaCommands::Enroll {
            user_id,
            account,
            json,
        } => {
            let id = parse_id("user", &user_id)?;
            let account = account.unwrap_or_else(|| id.to_string());
            let enrollment = service::begin_enrollment(pool, config, id, &account).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&enrollment)?);
                return Ok(());
            }
            println!("Enrollment started for {id}.");
            println!();
            println!("  Secret: {}", enrollment.secret_base32);
            println!("  URI:    {}", enrollment.provisioning_uri);
            println!();
            println!("Backup codes (shown once):");
            for code in &enrollment.backup_codes {
                println!("  {code}");
            }
            println!();
            println!("Next: run `coachdesk mfa confirm {id} <code>` with a code from the app.");
            Ok(())
        }
        MfaCommands::Confirm { user_id, code } => {
            let id = parse_id("user", &user_id)?;
            service::confirm_enrollment(pool, id, &code, Utc::now()).await?;
            println!("MFA enabled for {id}.");
            Ok(())
        }
        MfaCommands::Verify { user_id, code } => {
            let id = parse_id("user", &user_id)?;
            match service::verify(pool, id, &code, Utc::now()).await? {
                VerifiedWith::Totp => println!("Code accepted (authenticator)."),
                VerifiedWith::BackupCode { remaining } => {
                    println!("Code accepted (backup code, {remaining} remaining).")
                }
            }
            Ok(())
        }
        MfaCommands::Status { user_id, json } => {
            let id = parse_id("user", &user_id)?;
            let status = service::status(pool, id).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
                return Ok(());
            }
            println!("User:         {}", status.user_id);
            println!("State:        {}", status.state);
            println!("Enabled at:   {}", display_ts(status.enabled_at));
            println!("Backup codes: {} unused", status.backup_codes_remaining);
            Ok(())
        }
        MfaCommands::Disable { user_id } => {
            let id = parse_id("user", &user_id)?;
            service::disable(pool, id).await?;
            println!("MFA disabled for {id}.");
            Ok(())
        }
    }
}
