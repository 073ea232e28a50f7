//! Transaction scope management
//!
//! The open-or-reuse / commit / rollback control flow lives once in
//! [`TxManager`], generic over a [`TxBackend`]. Each backend names its
//! [`BackendFamily`], and the family decides under which context key the
//! active transaction is carried, so a relational transaction and a
//! time-series transaction can be open on the same call chain independently.

use async_trait::async_trait;

use crate::context::Context;

pub mod carrier;
mod manager;
#[cfg(test)]
pub(crate) mod testing;

pub use manager::{Executor, RollbackObserver, TxManager};

/// Marker for a family of backends sharing one context key.
pub trait BackendFamily: Send + Sync + 'static {
    const NAME: &'static str;
}

/// Row-store backends (PostgreSQL)
pub enum Relational {}

/// Time-series backends (TimescaleDB)
pub enum TimeSeries {}

impl BackendFamily for Relational {
    const NAME: &'static str = "postgres";
}

impl BackendFamily for TimeSeries {
    const NAME: &'static str = "timescale";
}

/// A handle that can open transactions.
#[async_trait]
pub trait TxBackend: Send + Sync + 'static {
    type Family: BackendFamily;
    type Tx: TxHandle<Error = Self::Error>;
    type Error: std::error::Error + Send + Sync + 'static;

    async fn begin(&self, ctx: &Context) -> Result<Self::Tx, Self::Error>;
}

/// An open transaction.
///
/// Clones share the same underlying transaction; the context carries one clone
/// while the scope manager holds another to terminate it.
#[async_trait]
pub trait TxHandle: Clone + Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    async fn commit(&self, ctx: &Context) -> Result<(), Self::Error>;

    async fn rollback(&self, ctx: &Context) -> Result<(), Self::Error>;
}
