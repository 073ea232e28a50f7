//! Usecase-facing transaction boundaries
//!
//! Usecases depend on [`TxRepository`] and wrap their work in
//! `with_postgres_tx` / `with_timescale_tx`. Repositories embed a [`BaseRepo`]
//! and issue queries through `postgres_executor(ctx)` /
//! `timescale_executor(ctx)`, which pick up whatever transaction the usecase
//! opened.

use std::future::Future;
use std::sync::Arc;

use sqlx::PgPool;

use crate::backends::{PostgresBackend, PostgresTx, TimescaleBackend, TimescaleTx};
use crate::config::DatabaseConfig;
use crate::context::Context;
use crate::error::{Error, Result};
use crate::tx::{Executor, TxManager};

/// Transaction boundaries for the usecase layer.
///
/// Both methods join a transaction already carried by `ctx`; otherwise they
/// open one, commit it when `f` succeeds and roll it back when `f` fails or
/// panics.
pub trait TxRepository: Send + Sync {
    fn with_postgres_tx<T, E, F, Fut>(
        &self,
        ctx: &Context,
        f: F,
    ) -> impl Future<Output = Result<T, E>> + Send
    where
        T: Send,
        E: From<Error> + Send,
        F: FnOnce(Context) -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send;

    fn with_timescale_tx<T, E, F, Fut>(
        &self,
        ctx: &Context,
        f: F,
    ) -> impl Future<Output = Result<T, E>> + Send
    where
        T: Send,
        E: From<Error> + Send,
        F: FnOnce(Context) -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send;
}

/// Transaction management for PostgreSQL and TimescaleDB.
#[derive(Clone)]
pub struct BaseRepo {
    postgres: TxManager<PostgresBackend>,
    timescale: TxManager<TimescaleBackend>,
}

impl BaseRepo {
    pub fn new(postgres: PgPool, timescale: PgPool) -> Self {
        Self {
            postgres: TxManager::new(PostgresBackend::new(postgres)),
            timescale: TxManager::new(TimescaleBackend::new(timescale)),
        }
    }

    /// Build lazily-connected pools from `config`.
    pub fn from_config(config: &DatabaseConfig) -> Result<Self> {
        let (postgres, timescale) = config.connect_lazy()?;
        Ok(Self::new(postgres, timescale))
    }

    /// Report rollback failures of either backend to `observer`.
    pub fn with_rollback_observer<F>(self, observer: F) -> Self
    where
        F: Fn(&Error) + Send + Sync + 'static,
    {
        let observer = Arc::new(observer);
        let postgres_observer = Arc::clone(&observer);
        Self {
            postgres: self
                .postgres
                .with_rollback_observer(move |err| postgres_observer(err)),
            timescale: self.timescale.with_rollback_observer(move |err| observer(err)),
        }
    }

    pub fn postgres(&self) -> &TxManager<PostgresBackend> {
        &self.postgres
    }

    pub fn timescale(&self) -> &TxManager<TimescaleBackend> {
        &self.timescale
    }

    pub fn postgres_tx(&self, ctx: &Context) -> Option<PostgresTx> {
        self.postgres.current(ctx)
    }

    pub fn timescale_tx(&self, ctx: &Context) -> Option<TimescaleTx> {
        self.timescale.current(ctx)
    }

    /// PostgreSQL query executor: the transaction on `ctx`, or the pool
    pub fn postgres_executor(&self, ctx: &Context) -> Executor<'_, PostgresBackend> {
        self.postgres.executor(ctx)
    }

    /// TimescaleDB query executor: the transaction on `ctx`, or the pool
    pub fn timescale_executor(&self, ctx: &Context) -> Executor<'_, TimescaleBackend> {
        self.timescale.executor(ctx)
    }
}

impl TxRepository for BaseRepo {
    fn with_postgres_tx<T, E, F, Fut>(
        &self,
        ctx: &Context,
        f: F,
    ) -> impl Future<Output = Result<T, E>> + Send
    where
        T: Send,
        E: From<Error> + Send,
        F: FnOnce(Context) -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send,
    {
        self.postgres.run_in_transaction(ctx, f)
    }

    fn with_timescale_tx<T, E, F, Fut>(
        &self,
        ctx: &Context,
        f: F,
    ) -> impl Future<Output = Result<T, E>> + Send
    where
        T: Send,
        E: From<Error> + Send,
        F: FnOnce(Context) -> Fut + Send,
        Fut: Future<Output = Result<T, E>> + Send,
    {
        self.timescale.run_in_transaction(ctx, f)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use sqlx::postgres::PgPoolOptions;

    use super::*;
    use crate::tx::carrier;

    fn lazy_repo() -> BaseRepo {
        let pool = |url: &str| PgPoolOptions::new().connect_lazy(url).unwrap();
        BaseRepo::new(
            pool("postgres://app@localhost/app"),
            pool("postgres://app@localhost/metrics"),
        )
    }

    #[tokio::test]
    async fn test_executors_fall_back_to_pools() {
        let repo = lazy_repo();
        let ctx = Context::background();

        assert!(repo.postgres_tx(&ctx).is_none());
        assert!(repo.timescale_tx(&ctx).is_none());
        assert!(!repo.postgres_executor(&ctx).is_transaction());
        assert!(!repo.timescale_executor(&ctx).is_transaction());
    }

    #[tokio::test]
    async fn test_executor_picks_transaction_per_backend() {
        let repo = lazy_repo();
        let ctx = carrier::attach::<PostgresBackend>(&Context::background(), PostgresTx::detached());

        assert!(repo.postgres_tx(&ctx).is_some());
        assert!(repo.postgres_executor(&ctx).is_transaction());
        assert!(repo.timescale_tx(&ctx).is_none());
        assert!(!repo.timescale_executor(&ctx).is_transaction());

        let ctx = carrier::attach::<TimescaleBackend>(&ctx, TimescaleTx::detached());
        assert!(repo.timescale_executor(&ctx).is_transaction());
    }

    #[tokio::test]
    async fn test_existing_transaction_is_joined_without_touching_database() {
        let repo = lazy_repo();
        let r = &repo;
        let ctx = carrier::attach::<PostgresBackend>(&Context::background(), PostgresTx::detached());

        let result = repo
            .with_postgres_tx(&ctx, |inner| async move {
                assert!(r.postgres_executor(&inner).is_transaction());
                Ok::<_, Error>(11)
            })
            .await;

        assert_eq!(result.unwrap(), 11);
    }

    /// Test double a usecase can run against instead of a database.
    #[derive(Default)]
    struct PassthroughRepo {
        calls: Mutex<Vec<&'static str>>,
    }

    impl TxRepository for PassthroughRepo {
        fn with_postgres_tx<T, E, F, Fut>(
            &self,
            ctx: &Context,
            f: F,
        ) -> impl Future<Output = Result<T, E>> + Send
        where
            T: Send,
            E: From<Error> + Send,
            F: FnOnce(Context) -> Fut + Send,
            Fut: Future<Output = Result<T, E>> + Send,
        {
            self.calls.lock().unwrap().push("postgres");
            f(ctx.clone())
        }

        fn with_timescale_tx<T, E, F, Fut>(
            &self,
            ctx: &Context,
            f: F,
        ) -> impl Future<Output = Result<T, E>> + Send
        where
            T: Send,
            E: From<Error> + Send,
            F: FnOnce(Context) -> Fut + Send,
            Fut: Future<Output = Result<T, E>> + Send,
        {
            self.calls.lock().unwrap().push("timescale");
            f(ctx.clone())
        }
    }

    async fn record_reading<R: TxRepository>(repo: &R, ctx: &Context, value: f64) -> Result<f64> {
        repo.with_postgres_tx(ctx, |ctx| async move {
            repo.with_timescale_tx(&ctx, |_| async move { Ok(value * 2.0) })
                .await
        })
        .await
    }

    #[tokio::test]
    async fn test_usecase_runs_against_fake_repository() {
        let repo = PassthroughRepo::default();

        let doubled = record_reading(&repo, &Context::background(), 2.5).await.unwrap();

        assert_eq!(doubled, 5.0);
        assert_eq!(*repo.calls.lock().unwrap(), vec!["postgres", "timescale"]);
    }
}
