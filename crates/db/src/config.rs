use datalabel_core::error::CoreError;

/// Database configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Postgres connection URL (required).
    pub database_url: String,
    /// Maximum pool size (default: `20`).
    pub max_connections: u32,
    /// Seconds to wait for a pooled connection (default: `30`).
    pub acquire_timeout_secs: u64,
}

impl DbConfig {
    /// Load configuration from the process environment, reading a `.env`
    /// file first if one is present.
    ///
    /// | Env Var                   | Default    |
    /// |---------------------------|------------|
    /// | `DATABASE_URL`            | (required) |
    /// | `DB_MAX_CONNECTIONS`      | `20`       |
    /// | `DB_ACQUIRE_TIMEOUT_SECS` | `30`       |
    pub fn from_env() -> Result<Self, CoreError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CoreError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| CoreError::Validation("DATABASE_URL must be set".into()))?;

        let max_connections: u32 = parse_or(&lookup, "DB_MAX_CONNECTIONS", 20)?;
        if max_connections == 0 {
            return Err(CoreError::Validation(
                "DB_MAX_CONNECTIONS must be at least 1".into(),
            ));
        }

        let acquire_timeout_secs: u64 = parse_or(&lookup, "DB_ACQUIRE_TIMEOUT_SECS", 30)?;

        Ok(Self {
            database_url,
            max_connections,
            acquire_timeout_secs,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, CoreError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| {
            CoreError::Validation(format!("{key} must be a valid number, got '{raw}'"))
        }),
        None => Ok(default),
    }
}
