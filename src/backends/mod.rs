//! sqlx-backed transaction backends
//!
//! Both backends speak the Postgres protocol (TimescaleDB is a Postgres
//! extension) and share [`SharedTx`]; they differ in their context key and in
//! whether commit/rollback observe the context deadline.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgQueryResult, PgRow};
use sqlx::{Postgres, Transaction};
use tokio::sync::Mutex;

use crate::context::Context;
use crate::error::{Error, Result};
use crate::executor::{PgQuery, QueryExecutor};

mod postgres;
mod timescale;

pub use postgres::{PostgresBackend, PostgresTx};
pub use timescale::{TimescaleBackend, TimescaleTx};

/// A transaction shared between the scope manager and every context clone
/// carrying it. `None` once committed or rolled back.
#[derive(Clone)]
pub(crate) struct SharedTx {
    inner: Arc<Mutex<Option<Transaction<'static, Postgres>>>>,
}

impl SharedTx {
    pub(crate) async fn begin(pool: &PgPool, ctx: &Context) -> Result<Self> {
        let tx = ctx.bounded(pool.begin()).await??;
        Ok(Self {
            inner: Arc::new(Mutex::new(Some(tx))),
        })
    }

    #[cfg(test)]
    pub(crate) fn closed() -> Self {
        Self {
            inner: Arc::new(Mutex::new(None)),
        }
    }

    /// Hold the transaction lock, as a concurrent query on another clone would.
    #[cfg(test)]
    pub(crate) async fn hold(&self) -> tokio::sync::MutexGuard<'_, Option<Transaction<'static, Postgres>>> {
        self.inner.lock().await
    }

    pub(crate) async fn is_open(&self) -> bool {
        self.inner.lock().await.is_some()
    }

    async fn take(&self) -> Result<Transaction<'static, Postgres>> {
        self.inner.lock().await.take().ok_or(Error::TransactionClosed)
    }

    pub(crate) async fn commit(&self) -> Result<()> {
        self.take().await?.commit().await?;
        Ok(())
    }

    pub(crate) async fn rollback(&self) -> Result<()> {
        self.take().await?.rollback().await?;
        Ok(())
    }
}

impl fmt::Debug for SharedTx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.inner.try_lock() {
            Ok(guard) if guard.is_some() => "open",
            Ok(_) => "closed",
            Err(_) => "busy",
        };
        f.debug_struct("SharedTx").field("state", &state).finish()
    }
}

// Waiting for the lock counts against the deadline too.
#[async_trait]
impl QueryExecutor for SharedTx {
    async fn execute<'q>(&self, ctx: &Context, query: PgQuery<'q>) -> Result<PgQueryResult> {
        ctx.bounded(async {
            let mut guard = self.inner.lock().await;
            let tx = guard.as_mut().ok_or(Error::TransactionClosed)?;
            Ok::<_, Error>(query.execute(&mut **tx).await?)
        })
        .await?
    }

    async fn fetch_all<'q>(&self, ctx: &Context, query: PgQuery<'q>) -> Result<Vec<PgRow>> {
        ctx.bounded(async {
            let mut guard = self.inner.lock().await;
            let tx = guard.as_mut().ok_or(Error::TransactionClosed)?;
            Ok::<_, Error>(query.fetch_all(&mut **tx).await?)
        })
        .await?
    }

    async fn fetch_optional<'q>(&self, ctx: &Context, query: PgQuery<'q>) -> Result<Option<PgRow>> {
        ctx.bounded(async {
            let mut guard = self.inner.lock().await;
            let tx = guard.as_mut().ok_or(Error::TransactionClosed)?;
            Ok::<_, Error>(query.fetch_optional(&mut **tx).await?)
        })
        .await?
    }
}

/// Queries straight against the pool, used outside any transaction.
#[async_trait]
impl QueryExecutor for PgPool {
    async fn execute<'q>(&self, ctx: &Context, query: PgQuery<'q>) -> Result<PgQueryResult> {
        Ok(ctx.bounded(query.execute(self)).await??)
    }

    async fn fetch_all<'q>(&self, ctx: &Context, query: PgQuery<'q>) -> Result<Vec<PgRow>> {
        Ok(ctx.bounded(query.fetch_all(self)).await??)
    }

    async fn fetch_optional<'q>(&self, ctx: &Context, query: PgQuery<'q>) -> Result<Option<PgRow>> {
        Ok(ctx.bounded(query.fetch_optional(self)).await??)
    }
}

/// A pool whose server accepts connections and never answers.
#[cfg(test)]
pub(crate) async fn silent_pool() -> PgPool {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    sqlx::postgres::PgPoolOptions::new()
        .connect_lazy(&format!("postgres://app@127.0.0.1:{}/app", port))
        .unwrap()
}
