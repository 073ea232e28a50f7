//! Database configuration loaded from the environment

use std::env;
use std::fmt;
use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use crate::constants::{
    ACQUIRE_TIMEOUT_VAR, DEFAULT_ACQUIRE_TIMEOUT_SECS, DEFAULT_MAX_CONNECTIONS, MAX_CONNECTIONS_VAR,
    POSTGRES_URL_VAR, TIMESCALE_URL_VAR,
};
use crate::error::{Error, LogErr, Result};

#[derive(Clone)]
pub struct DatabaseConfig {
    pub postgres_url: String,
    pub timescale_url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl DatabaseConfig {
    /// Read the configuration from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    /// Unset or non-positive numeric values fall back to their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |var: &'static str| {
            lookup(var)
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| Error::Config {
                    var,
                    reason: "must be set".to_string(),
                })
        };

        let max_connections = lookup(MAX_CONNECTIONS_VAR)
            .and_then(|s| s.parse().ok())
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_MAX_CONNECTIONS);

        let acquire_timeout_secs = lookup(ACQUIRE_TIMEOUT_VAR)
            .and_then(|s| s.parse().ok())
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_ACQUIRE_TIMEOUT_SECS);

        Ok(Self {
            postgres_url: required(POSTGRES_URL_VAR)?,
            timescale_url: required(TIMESCALE_URL_VAR)?,
            max_connections,
            acquire_timeout: Duration::from_secs(acquire_timeout_secs),
        })
    }

    fn pool_options(&self) -> PgPoolOptions {
        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(self.acquire_timeout)
    }

    /// Build the PostgreSQL and TimescaleDB pools without opening connections.
    pub fn connect_lazy(&self) -> Result<(PgPool, PgPool)> {
        let postgres = self
            .pool_options()
            .connect_lazy(&self.postgres_url)
            .map_err(|e| Error::Config {
                var: POSTGRES_URL_VAR,
                reason: e.to_string(),
            })
            .log_err("Failed to configure PostgreSQL pool")?;

        let timescale = self
            .pool_options()
            .connect_lazy(&self.timescale_url)
            .map_err(|e| Error::Config {
                var: TIMESCALE_URL_VAR,
                reason: e.to_string(),
            })
            .log_err("Failed to configure TimescaleDB pool")?;

        Ok((postgres, timescale))
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("postgres_url", &"<redacted>")
            .field("timescale_url", &"<redacted>")
            .field("max_connections", &self.max_connections)
            .field("acquire_timeout", &self.acquire_timeout)
            .finish()
    }
}
