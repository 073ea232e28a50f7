//! Configuration defaults

/// Environment variable holding the PostgreSQL connection URL
pub const POSTGRES_URL_VAR: &str = "DATABASE_URL";

/// Environment variable holding the TimescaleDB connection URL
pub const TIMESCALE_URL_VAR: &str = "TIMESCALE_DATABASE_URL";

pub const MAX_CONNECTIONS_VAR: &str = "DB_MAX_CONNECTIONS";

pub const ACQUIRE_TIMEOUT_VAR: &str = "DB_ACQUIRE_TIMEOUT_SECS";

/// Default pool size per backend
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// Default time to wait for a pooled connection (30 seconds)
pub const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 30;
