//! Configuration file management for coachdesk.
//!
//! Provides a TOML config file at `~/.config/coachdesk/config.toml` and a
//! resolution chain: CLI flag > env var > config file > default.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use coachdesk_core::mfa::{DEFAULT_ISSUER, MfaConfig};
use coachdesk_core::recurrence::{DEFAULT_MAX_INSTANCES, RecurrenceService};
use coachdesk_db::config::DbConfig;

pub const MAX_INSTANCES_ENV: &str = "COACHDESK_MAX_INSTANCES";
pub const MFA_ISSUER_ENV: &str = "COACHDESK_MFA_ISSUER";

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub database: DatabaseSection,
    #[serde(default)]
    pub planner: PlannerSection,
    #[serde(default)]
    pub mfa: MfaSection,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DatabaseSection {
    pub url: String,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            url: DbConfig::DEFAULT_URL.to_owned(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PlannerSection {
    /// Instances planned for rules with neither COUNT nor UNTIL.
    pub max_instances: usize,
}

impl Default for PlannerSection {
    fn default() -> Self {
        Self {
            max_instances: DEFAULT_MAX_INSTANCES,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MfaSection {
    /// Issuer label shown in authenticator apps.
    pub issuer: String,
}

impl Default for MfaSection {
    fn default() -> Self {
        Self {
            issuer: DEFAULT_ISSUER.to_owned(),
        }
    }
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// `$XDG_CONFIG_HOME/coachdesk` or `~/.config/coachdesk`, on every platform.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("coachdesk");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("coachdesk")
}

pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file. Returns an error if it does not exist.
pub fn load_config() -> Result<ConfigFile> {
    let path = config_path();
    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file at {}", path.display()))
}

/// Write the config file, creating parent dirs as needed. The file holds
/// database credentials, so it is made owner-only on Unix.
pub fn save_config(config: &ConfigFile) -> Result<PathBuf> {
    let path = config_path();
    let dir = config_dir();
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create config directory {}", dir.display()))?;

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(&path, contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(path)
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Fully resolved configuration, ready for use.
#[derive(Debug)]
pub struct CoachdeskConfig {
    pub db_config: DbConfig,
    pub planner: RecurrenceService,
    pub mfa: MfaConfig,
}

impl CoachdeskConfig {
    /// Resolve configuration using the chain: CLI flag > env var > config file > default.
    ///
    /// - DB URL: `cli_db_url` > `COACHDESK_DATABASE_URL` > `database.url` > `DbConfig::DEFAULT_URL`
    /// - Instance cap: `cli_max_instances` > `COACHDESK_MAX_INSTANCES` > `planner.max_instances` > 2
    /// - MFA issuer: `COACHDESK_MFA_ISSUER` > `mfa.issuer` > `"Coachdesk"`
    ///
    /// A config file that exists but does not parse is an error; a missing
    /// one is not.
    pub fn resolve(cli_db_url: Option<&str>, cli_max_instances: Option<usize>) -> Result<Self> {
        let file_config = if config_path().exists() {
            load_config()?
        } else {
            ConfigFile::default()
        };

        let db_url = match cli_db_url {
            Some(url) => url.to_owned(),
            None => std::env::var(DbConfig::URL_ENV).unwrap_or(file_config.database.url),
        };

        let max_instances = match cli_max_instances {
            Some(n) => n,
            None => match std::env::var(MAX_INSTANCES_ENV) {
                Ok(raw) => raw
                    .trim()
                    .parse()
                    .with_context(|| format!("{MAX_INSTANCES_ENV} is not a number: {raw:?}"))?,
                Err(_) => file_config.planner.max_instances,
            },
        };
        let planner = RecurrenceService::new(max_instances)
            .context("invalid planner.max_instances")?;

        let issuer = std::env::var(MFA_ISSUER_ENV).unwrap_or(file_config.mfa.issuer);

        Ok(Self {
            db_config: DbConfig::new(db_url),
            planner,
            mfa: MfaConfig {
                issuer,
                ..MfaConfig::default()
            },
        })
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------
