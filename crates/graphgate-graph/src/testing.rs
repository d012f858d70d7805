//! Scripted in-memory backend for tests.
//!
//! Every driver built by one [`MockConnector`] shares a [`MockState`]. Each
//! `execute_read`/`run` call pops the next scripted [`Outcome`]; with nothing
//! scripted, reads return an empty graph and runs return no rows.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use crate::backend::{AccessMode, Connector, Driver, Record, Session, Statement};
use crate::client::GraphConfig;
use crate::error::BackendError;
use crate::raw::RawGraph;

/// Scripted result of one session call.
#[derive(Debug, Clone)]
pub enum Outcome {
    Graph(RawGraph),
    Records(Vec<Record>),
    Fail(BackendError),
}

/// A statement as the backend received it.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub database: Option<String>,
    pub mode: AccessMode,
    pub statement: Statement,
    /// Set for `execute_read`, `None` for `run`.
    pub timeout: Option<Duration>,
}

#[derive(Default)]
struct StateInner {
    outcomes: VecDeque<Outcome>,
    calls: Vec<RecordedCall>,
    verify_error: Option<BackendError>,
    close_error: Option<BackendError>,
    verifications: usize,
    closes: usize,
    sessions_opened: usize,
    sessions_released: usize,
}

#[derive(Default)]
pub struct MockState {
    inner: Mutex<StateInner>,
}

impl MockState {
    fn lock(&self) -> MutexGuard<'_, StateInner> {
        // A panicking test thread must not hide the state from the others.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn push(&self, outcome: Outcome) {
        self.lock().outcomes.push_back(outcome);
    }

    /// Fail the next connectivity check.
    pub fn fail_verification(&self, err: BackendError) {
        self.lock().verify_error = Some(err);
    }

    /// Fail the next driver close.
    pub fn fail_close(&self, err: BackendError) {
        self.lock().close_error = Some(err);
    }

    pub fn statements(&self) -> Vec<RecordedCall> {
        self.lock().calls.clone()
    }

    pub fn verifications(&self) -> usize {
        self.lock().verifications
    }

    pub fn closes(&self) -> usize {
        self.lock().closes
    }

    pub fn sessions_opened(&self) -> usize {
        self.lock().sessions_opened
    }

    pub fn sessions_released(&self) -> usize {
        self.lock().sessions_released
    }

    fn next(&self, call: RecordedCall) -> Option<Outcome> {
        let mut inner = self.lock();
        inner.calls.push(call);
        inner.outcomes.pop_front()
    }
}

#[derive(Clone, Default)]
pub struct MockConnector {
    state: Arc<MockState>,
    constructions: Arc<AtomicUsize>,
    connect_delay: Duration,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep inside `connect` to widen the window for racing callers.
    pub fn with_connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = delay;
        self
    }

    pub fn state(&self) -> Arc<MockState> {
        Arc::clone(&self.state)
    }

    /// Number of drivers constructed so far.
    pub fn constructions(&self) -> usize {
        self.constructions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, _config: &GraphConfig) -> Result<Arc<dyn Driver>, BackendError> {
        self.constructions.fetch_add(1, Ordering::SeqCst);
        if !self.connect_delay.is_zero() {
            tokio::time::sleep(self.connect_delay).await;
        }
        Ok(Arc::new(MockDriver {
            state: Arc::clone(&self.state),
        }))
    }
}

struct MockDriver {
    state: Arc<MockState>,
}

#[async_trait]
impl Driver for MockDriver {
    async fn verify_connectivity(&self) -> Result<(), BackendError> {
        let mut inner = self.state.lock();
        inner.verifications += 1;
        match inner.verify_error.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn session(
        &self,
        database: Option<&str>,
        mode: AccessMode,
    ) -> Result<Box<dyn Session>, BackendError> {
        self.state.lock().sessions_opened += 1;
        Ok(Box::new(MockSession {
            state: Arc::clone(&self.state),
            database: database.map(str::to_string),
            mode,
        }))
    }

    async fn close(&self) -> Result<(), BackendError> {
        let mut inner = self.state.lock();
        inner.closes += 1;
        match inner.close_error.take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

struct MockSession {
    state: Arc<MockState>,
    database: Option<String>,
    mode: AccessMode,
}

impl MockSession {
    fn record(&self, statement: &Statement, timeout: Option<Duration>) -> RecordedCall {
        RecordedCall {
            database: self.database.clone(),
            mode: self.mode,
            statement: statement.clone(),
            timeout,
        }
    }
}

#[async_trait]
impl Session for MockSession {
    async fn execute_read(
        &mut self,
        statement: &Statement,
        timeout: Duration,
    ) -> Result<RawGraph, BackendError> {
        match self.state.next(self.record(statement, Some(timeout))) {
            Some(Outcome::Graph(graph)) => Ok(graph),
            Some(Outcome::Fail(e)) => Err(e),
            Some(Outcome::Records(_)) | None => Ok(RawGraph::new()),
        }
    }

    async fn run(&mut self, statement: &Statement) -> Result<Vec<Record>, BackendError> {
        match self.state.next(self.record(statement, None)) {
            Some(Outcome::Records(rows)) => Ok(rows),
            Some(Outcome::Fail(e)) => Err(e),
            Some(Outcome::Graph(_)) | None => Ok(Vec::new()),
        }
    }
}

impl Drop for MockSession {
    fn drop(&mut self) {
        self.state.lock().sessions_released += 1;
    }
}
