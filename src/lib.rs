//! Context-propagated database transactions
//!
//! A usecase opens a transaction once, and every repository it calls (and every
//! repository those call) picks the same transaction up from the [`Context`]
//! instead of having a `&mut PgConnection` threaded through its signature.
//! Whether the work ends in a commit or a rollback is decided only by the
//! outermost [`TxManager::run_in_transaction`] call.
//!
//! ```ignore
//! use txscope::{BaseRepo, Context, TxRepository, QueryExecutor};
//!
//! async fn rename_user(repo: &BaseRepo, ctx: &Context, id: i64, name: &str) -> txscope::Result<()> {
//!     repo.with_postgres_tx(ctx, |ctx| async move {
//!         repo.postgres_executor(&ctx)
//!             .execute(&ctx, sqlx::query("UPDATE users SET name = $1 WHERE id = $2").bind(name).bind(id))
//!             .await?;
//!         audit::record(repo, &ctx, id, "rename").await // joins the same transaction
//!     })
//!     .await
//! }
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod context;
pub mod error;
pub mod executor;
pub mod repo;
pub mod tx;

pub use backends::{PostgresBackend, PostgresTx, TimescaleBackend, TimescaleTx};
pub use config::DatabaseConfig;
pub use context::{Context, DeadlineExceeded};
pub use error::{Error, LogErr, Result};
pub use executor::{PgQuery, QueryExecutor};
pub use repo::{BaseRepo, TxRepository};
pub use tx::{BackendFamily, Executor, Relational, TimeSeries, TxBackend, TxHandle, TxManager};
