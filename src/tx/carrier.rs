//! Stores the active transaction of a backend family in a [`Context`].

use std::marker::PhantomData;

use super::{BackendFamily, TxBackend};
use crate::context::Context;

/// Context key for the transaction of family `F`. Never instantiated.
pub struct TxKey<F: BackendFamily>(PhantomData<F>);

/// Derive a child context carrying `tx` for the backend's family.
pub(crate) fn attach<B: TxBackend>(ctx: &Context, tx: B::Tx) -> Context {
    ctx.with_value::<TxKey<B::Family>, B::Tx>(tx)
}

/// Active transaction of the backend's family, if the context carries one.
pub fn extract<B: TxBackend>(ctx: &Context) -> Option<B::Tx> {
    ctx.value::<TxKey<B::Family>, B::Tx>().cloned()
}
