use std::env;

/// Database configuration.
///
/// Reads from the `COACHDESK_DATABASE_URL` environment variable, falling back
/// to `postgresql://localhost:5432/coachdesk` when unset.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Full PostgreSQL connection URL.
    pub database_url: String,
}

impl DbConfig {
    /// Environment variable holding the connection URL.
    pub const URL_ENV: &str = "COACHDESK_DATABASE_URL";

    /// The default connection URL used when no environment variable is set.
    pub const DEFAULT_URL: &str = "postgresql://localhost:5432/coachdesk";

    /// Build a config from the environment, then the compile-time default.
    pub fn from_env() -> Self {
        let database_url =
            env::var(Self::URL_ENV).unwrap_or_else(|_| Self::DEFAULT_URL.to_owned());
        Self { database_url }
    }

    /// Build a config from an explicit URL (CLI flags, tests).
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
        }
    }

    /// Extract the database name from the URL.
    ///
    /// Query parameters (`?sslmode=...`) are ignored. Returns `None` if the
    /// URL has no path component.
    pub fn database_name(&self) -> Option<&str> {
        let without_query = self
            .database_url
            .split_once('?')
            .map_or(self.database_url.as_str(), |(head, _)| head);
        let authority_start = without_query.find("://").map_or(0, |pos| pos + 3);
        let (_, name) = without_query[authority_start..].split_once('/')?;
        Some(name).filter(|s| !s.is_empty())
    }

    /// URL of the `postgres` maintenance database on the same server, used to
    /// issue `CREATE DATABASE` when the target does not exist yet.
    pub fn maintenance_url(&self) -> String {
        let (head, query) = match self.database_url.split_once('?') {
            Some((head, query)) => (head, Some(query)),
            None => (self.database_url.as_str(), None),
        };
        // Only a slash after the scheme separator starts the database path.
        let authority_start = head.find("://").map_or(0, |pos| pos + 3);
        let mut url = match head[authority_start..].rfind('/') {
            Some(pos) => format!("{}/postgres", &head[..authority_start + pos]),
            None => format!("{head}/postgres"),
        };
        if let Some(query) = query {
            url.push('?');
            url.push_str(query);
        }
        url
    }
}

impl Default for DbConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
