//! Query execution surface
//!
//! Repository code takes a `&impl QueryExecutor` (or the [`Executor`] returned
//! by a resolver) and never needs to know whether it is running inside a
//! transaction:
//!
//! ```ignore
//! pub async fn get_username(repo: &BaseRepo, ctx: &Context, user_id: i64) -> Result<Option<String>> {
//!     let row = repo
//!         .postgres_executor(ctx)
//!         .fetch_optional(ctx, sqlx::query("SELECT twitter_username FROM users WHERE id = $1").bind(user_id))
//!         .await?;
//!     Ok(row.map(|r| r.get("twitter_username")))
//! }
//! ```
//!
//! Rows map onto `FromRow` types through the `_as` variants:
//!
//! ```ignore
//! #[derive(sqlx::FromRow)]
//! struct Reading { sensor_id: Uuid, value: f64 }
//!
//! let readings: Vec<Reading> = repo
//!     .timescale_executor(ctx)
//!     .fetch_all_as(ctx, sqlx::query("SELECT sensor_id, value FROM readings"))
//!     .await?;
//! ```

use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgQueryResult, PgRow};
use sqlx::{FromRow, Postgres};

use crate::context::Context;
use crate::error::{Error, Result};
use crate::tx::{Executor, TxBackend};

/// A bound Postgres statement, as built by `sqlx::query(..).bind(..)`
pub type PgQuery<'q> = sqlx::query::Query<'q, Postgres, PgArguments>;

#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Run a statement, returning the affected row count
    async fn execute<'q>(&self, ctx: &Context, query: PgQuery<'q>) -> Result<PgQueryResult>;

    async fn fetch_all<'q>(&self, ctx: &Context, query: PgQuery<'q>) -> Result<Vec<PgRow>>;

    async fn fetch_optional<'q>(&self, ctx: &Context, query: PgQuery<'q>) -> Result<Option<PgRow>>;

    /// Like `fetch_optional`, failing with `RowNotFound` when nothing matches
    async fn fetch_one<'q>(&self, ctx: &Context, query: PgQuery<'q>) -> Result<PgRow> {
        self.fetch_optional(ctx, query)
            .await?
            .ok_or(Error::Database(sqlx::Error::RowNotFound))
    }

    async fn fetch_all_as<'q, T>(&self, ctx: &Context, query: PgQuery<'q>) -> Result<Vec<T>>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        let rows = self.fetch_all(ctx, query).await?;
        Ok(rows.iter().map(T::from_row).collect::<Result<_, sqlx::Error>>()?)
    }

    async fn fetch_optional_as<'q, T>(&self, ctx: &Context, query: PgQuery<'q>) -> Result<Option<T>>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        let row = self.fetch_optional(ctx, query).await?;
        Ok(row.as_ref().map(T::from_row).transpose()?)
    }

    async fn fetch_one_as<'q, T>(&self, ctx: &Context, query: PgQuery<'q>) -> Result<T>
    where
        T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
    {
        let row = self.fetch_one(ctx, query).await?;
        Ok(T::from_row(&row)?)
    }
}

#[async_trait]
impl<'a, B> QueryExecutor for Executor<'a, B>
where
    B: TxBackend + QueryExecutor,
    B::Tx: QueryExecutor,
{
    async fn execute<'q>(&self, ctx: &Context, query: PgQuery<'q>) -> Result<PgQueryResult> {
        match self {
            Executor::Transaction(tx) => tx.execute(ctx, query).await,
            Executor::Direct(backend) => backend.execute(ctx, query).await,
        }
    }

    async fn fetch_all<'q>(&self, ctx: &Context, query: PgQuery<'q>) -> Result<Vec<PgRow>> {
        match self {
            Executor::Transaction(tx) => tx.fetch_all(ctx, query).await,
            Executor::Direct(backend) => backend.fetch_all(ctx, query).await,
        }
    }

    async fn fetch_optional<'q>(&self, ctx: &Context, query: PgQuery<'q>) -> Result<Option<PgRow>> {
        match self {
            Executor::Transaction(tx) => tx.fetch_optional(ctx, query).await,
            Executor::Direct(backend) => backend.fetch_optional(ctx, query).await,
        }
    }
}
