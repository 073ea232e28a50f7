//! PostgreSQL backend
//!
//! Begin observes the context deadline. Commit and rollback do not: once the
//! work unit has finished, the outcome is always delivered to the server.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgQueryResult, PgRow};

use super::SharedTx;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::executor::{PgQuery, QueryExecutor};
use crate::tx::{Relational, TxBackend, TxHandle};

#[derive(Debug, Clone)]
pub struct PostgresBackend {
    pool: PgPool,
}

impl PostgresBackend {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl TxBackend for PostgresBackend {
    type Family = Relational;
    type Tx = PostgresTx;
    type Error = Error;

    async fn begin(&self, ctx: &Context) -> Result<PostgresTx> {
        let inner = SharedTx::begin(&self.pool, ctx).await?;
        Ok(PostgresTx { inner })
    }
}

#[async_trait]
impl QueryExecutor for PostgresBackend {
    async fn execute<'q>(&self, ctx: &Context, query: PgQuery<'q>) -> Result<PgQueryResult> {
        self.pool.execute(ctx, query).await
    }

    async fn fetch_all<'q>(&self, ctx: &Context, query: PgQuery<'q>) -> Result<Vec<PgRow>> {
        self.pool.fetch_all(ctx, query).await
    }

    async fn fetch_optional<'q>(&self, ctx: &Context, query: PgQuery<'q>) -> Result<Option<PgRow>> {
        self.pool.fetch_optional(ctx, query).await
    }
}

/// An open PostgreSQL transaction. Clones refer to the same transaction.
#[derive(Debug, Clone)]
pub struct PostgresTx {
    inner: SharedTx,
}

impl PostgresTx {
    /// False once the transaction has been committed or rolled back
    pub async fn is_open(&self) -> bool {
        self.inner.is_open().await
    }

    /// A handle not backed by any connection, already closed.
    #[cfg(test)]
    pub(crate) fn detached() -> Self {
        Self {
            inner: SharedTx::closed(),
        }
    }
}

#[async_trait]
impl TxHandle for PostgresTx {
    type Error = Error;

    async fn commit(&self, _ctx: &Context) -> Result<()> {
        self.inner.commit().await
    }

    async fn rollback(&self, _ctx: &Context) -> Result<()> {
        self.inner.rollback().await
    }
}

#[async_trait]
impl QueryExecutor for PostgresTx {
    async fn execute<'q>(&self, ctx: &Context, query: PgQuery<'q>) -> Result<PgQueryResult> {
        self.inner.execute(ctx, query).await
    }

    async fn fetch_all<'q>(&self, ctx: &Context, query: PgQuery<'q>) -> Result<Vec<PgRow>> {
        self.inner.fetch_all(ctx, query).await
    }

    async fn fetch_optional<'q>(&self, ctx: &Context, query: PgQuery<'q>) -> Result<Option<PgRow>> {
        self.inner.fetch_optional(ctx, query).await
    }
}
