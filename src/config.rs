use std::{env, time::Duration};

use sqlx::{migrate::MigrateError, postgres::PgPoolOptions, PgPool};
use thiserror::Error;

pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("environment variable {0} is not set")]
    Missing(&'static str),

    #[error("environment variable {var} has an invalid value '{value}'")]
    Invalid { var: &'static str, value: String },
}

/// Connection settings for the recipe store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
    pub database_url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl StoreConfig {
    pub fn new(database_url: &str) -> Self {
        Self {
            database_url: database_url.to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            acquire_timeout: Duration::from_secs(DEFAULT_ACQUIRE_TIMEOUT_SECS),
        }
    }

    /// Reads `DATABASE_URL` (required), `DATABASE_MAX_CONNECTIONS` and
    /// `DATABASE_ACQUIRE_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = lookup("DATABASE_URL")
            .filter(|url| !url.trim().is_empty())
            .ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let max_connections = parse_var(
            "DATABASE_MAX_CONNECTIONS",
            &lookup,
            DEFAULT_MAX_CONNECTIONS,
        )?;
        let acquire_timeout = parse_var(
            "DATABASE_ACQUIRE_TIMEOUT_SECS",
            &lookup,
            DEFAULT_ACQUIRE_TIMEOUT_SECS,
        )?;

        if max_connections == 0 {
            return Err(ConfigError::Invalid {
                var: "DATABASE_MAX_CONNECTIONS",
                value: "0".to_string(),
            });
        }

        Ok(Self {
            database_url,
            max_connections,
            acquire_timeout: Duration::from_secs(acquire_timeout),
        })
    }

    pub async fn connect(&self) -> Result<PgPool, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(self.acquire_timeout)
            .connect(&self.database_url)
            .await?;

        log::info!(
            "Connected to recipe store (max {} connections)",
            self.max_connections
        );
        Ok(pool)
    }
}

fn parse_var<T: std::str::FromStr>(
    var: &'static str,
    lookup: &impl Fn(&str) -> Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(var) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { var, value }),
        None => Ok(default),
    }
}

pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), MigrateError> {
    migrator().run(pool).await?;
    log::info!("Recipe store migrations applied");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |var| vars.get(var).cloned()
    }

    #[test]
    fn defaults_apply() {
        let config =
            StoreConfig::from_lookup(lookup(&[("DATABASE_URL", "postgres://localhost/recipes")]))
                .unwrap();

        assert_eq!(config, StoreConfig::new("postgres://localhost/recipes"));
        assert_eq!(config.acquire_timeout, Duration::from_secs(5));
    }

    #[test]
    fn overrides_are_parsed() {
        let config = StoreConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://db/recipes"),
            ("DATABASE_MAX_CONNECTIONS", " 3 "),
            ("DATABASE_ACQUIRE_TIMEOUT_SECS", "30"),
        ]))
        .unwrap();

        assert_eq!(config.max_connections, 3);
        assert_eq!(config.acquire_timeout, Duration::from_secs(30));
    }

    #[test]
    fn missing_and_invalid_values_are_reported() {
        assert!(matches!(
            StoreConfig::from_lookup(lookup(&[])),
            Err(ConfigError::Missing("DATABASE_URL"))
        ));

        let err = StoreConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://db/recipes"),
            ("DATABASE_MAX_CONNECTIONS", "many"),
        ]))
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "environment variable DATABASE_MAX_CONNECTIONS has an invalid value 'many'"
        );

        assert!(StoreConfig::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://db/recipes"),
            ("DATABASE_MAX_CONNECTIONS", "0"),
        ]))
        .is_err());
    }
}
