//! TimescaleDB backend
//!
//! Unlike the PostgreSQL backend, commit and rollback are bounded by the
//! context deadline as well. A commit abandoned on the deadline drops the
//! underlying transaction, which sqlx rolls back.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgQueryResult, PgRow};

use super::SharedTx;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::executor::{PgQuery, QueryExecutor};
use crate::tx::{TimeSeries, TxBackend, TxHandle};

#[derive(Debug, Clone)]
pub struct TimescaleBackend {
    pool: PgPool,
}

impl TimescaleBackend {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl TxBackend for TimescaleBackend {
    type Family = TimeSeries;
    type Tx = TimescaleTx;
    type Error = Error;

    async fn begin(&self, ctx: &Context) -> Result<TimescaleTx> {
        let inner = SharedTx::begin(&self.pool, ctx).await?;
        Ok(TimescaleTx { inner })
    }
}

#[async_trait]
impl QueryExecutor for TimescaleBackend {
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

#[derive(Debug, Clone)]
pub struct TimescaleTx {
    inner: SharedTx,
}

impl TimescaleTx {
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
impl TxHandle for TimescaleTx {
    type Error = Error;

    async fn commit(&self, ctx: &Context) -> Result<()> {
        ctx.bounded(self.inner.commit()).await?
    }

    async fn rollback(&self, ctx: &Context) -> Result<()> {
        ctx.bounded(self.inner.rollback()).await?
    }
}

#[async_trait]
impl QueryExecutor for TimescaleTx {
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

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::backends::silent_pool;
    use crate::tx::TxManager;

    #[tokio::test]
    async fn test_commit_and_rollback_give_up_at_context_deadline() {
        let tx = TimescaleTx::detached();
        let _busy = tx.inner.hold().await;
        let ctx = Context::background().with_timeout(Duration::from_millis(50));

        assert!(matches!(tx.commit(&ctx).await, Err(Error::DeadlineExceeded(_))));
        assert!(matches!(tx.rollback(&ctx).await, Err(Error::DeadlineExceeded(_))));
    }

    #[tokio::test]
    async fn test_commit_reaches_handle_within_deadline() {
        let tx = TimescaleTx::detached();
        let ctx = Context::background().with_timeout(Duration::from_secs(5));

        assert!(matches!(tx.commit(&ctx).await, Err(Error::TransactionClosed)));
        assert!(matches!(tx.rollback(&ctx).await, Err(Error::TransactionClosed)));
        assert!(!tx.is_open().await);
    }

    #[tokio::test]
    async fn test_begin_gives_up_at_context_deadline() {
        let manager = TxManager::new(TimescaleBackend::new(silent_pool().await));
        let ran = Arc::new(AtomicBool::new(false));
        let flag = ran.clone();
        let ctx = Context::background().with_timeout(Duration::from_millis(50));

        let result = manager
            .run_in_transaction(&ctx, move |_| async move {
                flag.store(true, Ordering::SeqCst);
                Ok::<_, Error>(())
            })
            .await;

        assert!(matches!(result, Err(Error::DeadlineExceeded(_))));
        assert!(!ran.load(Ordering::SeqCst));
    }
}
