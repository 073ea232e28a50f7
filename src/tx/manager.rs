use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use futures::FutureExt;

use super::{BackendFamily, TxBackend, TxHandle, carrier};
use crate::context::Context;

/// Callback receiving rollback failures that would otherwise only be logged.
pub type RollbackObserver<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Opens, reuses and terminates transactions for one backend.
pub struct TxManager<B: TxBackend> {
    backend: Arc<B>,
    on_rollback_error: Option<RollbackObserver<B::Error>>,
}

impl<B: TxBackend> Clone for TxManager<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            on_rollback_error: self.on_rollback_error.clone(),
        }
    }
}

impl<B: TxBackend> TxManager<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend: Arc::new(backend),
            on_rollback_error: None,
        }
    }

    /// Report rollback failures to `observer` instead of the log.
    ///
    /// The caller still receives the work unit's own error.
    pub fn with_rollback_observer<F>(mut self, observer: F) -> Self
    where
        F: Fn(&B::Error) + Send + Sync + 'static,
    {
        self.on_rollback_error = Some(Arc::new(observer));
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The transaction this backend's family has open on `ctx`, if any
    pub fn current(&self, ctx: &Context) -> Option<B::Tx> {
        carrier::extract::<B>(ctx)
    }

    pub fn in_transaction(&self, ctx: &Context) -> bool {
        self.current(ctx).is_some()
    }

    /// Where queries issued under `ctx` should go.
    ///
    /// The open transaction when `ctx` carries one, otherwise the backend
    /// itself.
    pub fn executor(&self, ctx: &Context) -> Executor<'_, B> {
        match self.current(ctx) {
            Some(tx) => Executor::Transaction(tx),
            None => Executor::Direct(&self.backend),
        }
    }

    /// Run `work` inside a transaction.
    ///
    /// If `ctx` already carries a transaction for this backend's family, `work`
    /// runs with `ctx` as is and its result is returned untouched; the call that
    /// opened the transaction owns its outcome.
    ///
    /// Otherwise a transaction is begun and attached to the context handed to
    /// `work`. It is committed when `work` returns `Ok`, and rolled back when
    /// `work` returns `Err` or panics. A rollback failure never replaces the
    /// work unit's error, and a panic is resumed with its original payload once
    /// the rollback has finished.
    pub async fn run_in_transaction<T, E, F, Fut>(&self, ctx: &Context, work: F) -> Result<T, E>
    where
        F: FnOnce(Context) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<B::Error>,
    {
        let family = <B::Family as BackendFamily>::NAME;

        if self.in_transaction(ctx) {
            log::trace!("joining open {} transaction", family);
            return work(ctx.clone()).await;
        }

        let tx = self.backend.begin(ctx).await?;
        log::debug!("began {} transaction", family);

        let tx_ctx = carrier::attach::<B>(ctx, tx.clone());

        // `work` is called inside the async block so a panic raised before its
        // future is built is caught as well.
        let outcome = AssertUnwindSafe(async move { work(tx_ctx).await })
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(value)) => {
                tx.commit(ctx).await?;
                log::debug!("committed {} transaction", family);
                Ok(value)
            }
            Ok(Err(err)) => {
                self.rollback(ctx, &tx).await;
                Err(err)
            }
            Err(payload) => {
                self.rollback(ctx, &tx).await;
                panic::resume_unwind(payload)
            }
        }
    }

    async fn rollback(&self, ctx: &Context, tx: &B::Tx) {
        let family = <B::Family as BackendFamily>::NAME;
        match tx.rollback(ctx).await {
            Ok(()) => log::debug!("rolled back {} transaction", family),
            Err(err) => match &self.on_rollback_error {
                Some(observer) => observer(&err),
                None => log::warn!("rollback of {} transaction failed: {}", family, err),
            },
        }
    }
}

/// Query target chosen by [`TxManager::executor`].
pub enum Executor<'a, B: TxBackend> {
    Transaction(B::Tx),
    Direct(&'a B),
}

impl<B: TxBackend> Executor<'_, B> {
    pub fn is_transaction(&self) -> bool {
        matches!(self, Executor::Transaction(_))
    }

    pub fn transaction(&self) -> Option<&B::Tx> {
        match self {
            Executor::Transaction(tx) => Some(tx),
            Executor::Direct(_) => None,
        }
    }
}
