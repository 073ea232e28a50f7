//! Recording fake backend for exercising the scope manager without a database.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use thiserror::Error;

use super::{BackendFamily, TxBackend, TxHandle};
use crate::context::Context;

/// Route `log` output through the test harness.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Begin,
    Commit,
    Rollback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub family: &'static str,
    pub op: Op,
    pub tx: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FakeError {
    #[error("begin refused")]
    Begin,
    #[error("commit refused")]
    Commit,
    #[error("rollback refused")]
    Rollback,
    #[error("work failed: {0}")]
    Work(&'static str),
}

/// Shared log of every begin/commit/rollback, across families.
#[derive(Clone, Default)]
pub struct Recorder {
    events: Arc<Mutex<Vec<Event>>>,
    next_id: Arc<AtomicUsize>,
}

impl Recorder {
    fn record(&self, family: &'static str, op: Op, tx: usize) {
        self.events.lock().unwrap().push(Event { family, op, tx });
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, family: &'static str, op: Op) -> usize {
        self.events()
            .iter()
            .filter(|e| e.family == family && e.op == op)
            .count()
    }

    pub fn ops(&self, family: &'static str) -> Vec<Op> {
        self.events()
            .into_iter()
            .filter(|e| e.family == family)
            .map(|e| e.op)
            .collect()
    }
}

pub struct RecordingBackend<F: BackendFamily> {
    recorder: Recorder,
    fail_begin: bool,
    fail_commit: bool,
    fail_rollback: bool,
    _family: PhantomData<F>,
}

impl<F: BackendFamily> RecordingBackend<F> {
    pub fn new(recorder: Recorder) -> Self {
        Self {
            recorder,
            fail_begin: false,
            fail_commit: false,
            fail_rollback: false,
            _family: PhantomData,
        }
    }

    pub fn failing_begin(mut self) -> Self {
        self.fail_begin = true;
        self
    }

    pub fn failing_commit(mut self) -> Self {
        self.fail_commit = true;
        self
    }

    pub fn failing_rollback(mut self) -> Self {
        self.fail_rollback = true;
        self
    }

    /// A handle that was never begun through the backend; not recorded.
    pub fn open_handle(&self) -> RecordingTx {
        RecordingTx {
            id: self.recorder.next_id.fetch_add(1, Ordering::SeqCst),
            family: F::NAME,
            recorder: self.recorder.clone(),
            fail_commit: self.fail_commit,
            fail_rollback: self.fail_rollback,
        }
    }
}

#[derive(Clone)]
pub struct RecordingTx {
    id: usize,
    family: &'static str,
    recorder: Recorder,
    fail_commit: bool,
    fail_rollback: bool,
}

impl RecordingTx {
    pub fn id(&self) -> usize {
        self.id
    }
}

#[async_trait]
impl<F: BackendFamily> TxBackend for RecordingBackend<F> {
    type Family = F;
    type Tx = RecordingTx;
    type Error = FakeError;

    async fn begin(&self, _ctx: &Context) -> Result<RecordingTx, FakeError> {
        if self.fail_begin {
            return Err(FakeError::Begin);
        }
        let tx = self.open_handle();
        self.recorder.record(F::NAME, Op::Begin, tx.id);
        Ok(tx)
    }
}

#[async_trait]
impl TxHandle for RecordingTx {
    type Error = FakeError;

    async fn commit(&self, _ctx: &Context) -> Result<(), FakeError> {
        self.recorder.record(self.family, Op::Commit, self.id);
        if self.fail_commit {
            return Err(FakeError::Commit);
        }
        Ok(())
    }

    async fn rollback(&self, _ctx: &Context) -> Result<(), FakeError> {
        self.recorder.record(self.family, Op::Rollback, self.id);
        if self.fail_rollback {
            return Err(FakeError::Rollback);
        }
        Ok(())
    }
}
