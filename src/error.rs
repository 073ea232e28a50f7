//! Error types and logging helpers

use log::Level;
use thiserror::Error;

use crate::context::DeadlineExceeded;

/// Errors produced by the sqlx-backed transaction handles and executors.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    DeadlineExceeded(#[from] DeadlineExceeded),

    /// The transaction was already committed or rolled back.
    #[error("transaction already closed")]
    TransactionClosed,

    #[error("invalid configuration for {var}: {reason}")]
    Config { var: &'static str, reason: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Extension trait for logging an error with context while passing it through
pub trait LogErr<T, E> {
    /// Log at error level and return the result unchanged
    fn log_err(self, context: &str) -> Result<T, E>;

    /// Log at a custom level and return the result unchanged
    fn log_level(self, context: &str, level: Level) -> Result<T, E>;
}

impl<T, E: std::fmt::Display> LogErr<T, E> for Result<T, E> {
    fn log_err(self, context: &str) -> Result<T, E> {
        self.log_level(context, Level::Error)
    }

    fn log_level(self, context: &str, level: Level) -> Result<T, E> {
        self.inspect_err(|e| log::log!(level, "{}: {}", context, e))
    }
}
