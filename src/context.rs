//! Call-chain context
//!
//! An immutable chain of typed key/value entries plus an optional deadline.
//! Deriving a child (`with_value`, `with_deadline`) allocates one node that
//! points at the parent, so the parent seen by sibling calls never changes and
//! clones are a pointer copy.

use std::any::{Any, TypeId};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::time::Instant;

/// Returned when an operation outlives the deadline carried by its context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("context deadline exceeded")]
pub struct DeadlineExceeded;

#[derive(Clone, Default)]
pub struct Context {
    head: Option<Arc<Entry>>,
    deadline: Option<Instant>,
}

struct Entry {
    key: TypeId,
    value: Box<dyn Any + Send + Sync>,
    parent: Option<Arc<Entry>>,
}

impl Context {
    /// Empty root context with no values and no deadline
    pub fn background() -> Self {
        Self::default()
    }

    /// Derive a child carrying `value` under the key type `K`.
    ///
    /// Keys are compared by `TypeId`, so a private key type can never collide
    /// with entries written by unrelated code. A later entry shadows an
    /// earlier one with the same key.
    pub fn with_value<K: 'static, V: Any + Send + Sync>(&self, value: V) -> Self {
        Self {
            head: Some(Arc::new(Entry {
                key: TypeId::of::<K>(),
                value: Box::new(value),
                parent: self.head.clone(),
            })),
            deadline: self.deadline,
        }
    }

    /// Look up the nearest entry under `K`.
    ///
    /// Returns `None` when the key is absent or when the stored value is not a `V`.
    pub fn value<K: 'static, V: Any>(&self) -> Option<&V> {
        let key = TypeId::of::<K>();
        let mut cursor = self.head.as_deref();
        while let Some(entry) = cursor {
            if entry.key == key {
                return entry.value.downcast_ref::<V>();
            }
            cursor = entry.parent.as_deref();
        }
        None
    }

    /// Derive a child whose deadline is the earlier of `deadline` and the
    /// parent's.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(current) if current <= deadline => current,
            _ => deadline,
        };
        Self {
            head: self.head.clone(),
            deadline: Some(deadline),
        }
    }

    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn is_expired(&self) -> bool {
        self.deadline.is_some_and(|d| d <= Instant::now())
    }

    /// Drive `fut` to completion, giving up once the deadline passes.
    ///
    /// Without a deadline this is a plain await.
    pub async fn bounded<F: Future>(&self, fut: F) -> Result<F::Output, DeadlineExceeded> {
        match self.deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, fut)
                .await
                .map_err(|_| DeadlineExceeded),
            None => Ok(fut.await),
        }
    }

    fn depth(&self) -> usize {
        let mut depth = 0;
        let mut cursor = self.head.as_deref();
        while let Some(entry) = cursor {
            depth += 1;
            cursor = entry.parent.as_deref();
        }
        depth
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("entries", &self.depth())
            .field("deadline", &self.deadline)
            .finish()
    }
}
