//! Programmable engine double for fault injection.
//!
//! Records every call and fails entry points on demand so tests can verify
//! both the happy lifecycle and the cleanup paths. Shares its state through
//! an `Arc` so a test can keep a handle while the instance under test owns
//! another clone.

use std::sync::Arc;

use gridlock_core::{EngineFault, TrafficEngine};
use parking_lot::Mutex;

/// Scripted [`TrafficEngine`] double.
///
/// Every entry point records its call; a scripted fault makes the entry
/// point fail on each call until the script is changed. Clones share one
/// underlying record.
#[derive(Debug, Clone, Default)]
pub struct ScriptedEngine {
    inner: Arc<Mutex<ScriptedEngineInner>>,
}

#[derive(Debug, Default)]
struct ScriptedEngineInner {
    fail_start: Option<String>,
    fail_step: Option<String>,
    fail_close: Option<String>,
    start_args: Vec<Vec<String>>,
    step_count: usize,
    close_count: usize,
}

impl ScriptedEngine {
    /// Create an engine double that succeeds on every call.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following `start` call fail with the given message.
    pub fn fail_start(&self, message: impl Into<String>) {
        self.inner.lock().fail_start = Some(message.into());
    }

    /// Make every following `step` call fail with the given message.
    pub fn fail_step(&self, message: impl Into<String>) {
        self.inner.lock().fail_step = Some(message.into());
    }

    /// Make every following `close` call fail with the given message.
    pub fn fail_close(&self, message: impl Into<String>) {
        self.inner.lock().fail_close = Some(message.into());
    }

    /// Drop every scripted fault; subsequent calls succeed again.
    pub fn clear_faults(&self) {
        let mut inner = self.inner.lock();
        inner.fail_start = None;
        inner.fail_step = None;
        inner.fail_close = None;
    }

    /// Argument lists passed to `start`, in call order.
    #[must_use]
    pub fn start_args(&self) -> Vec<Vec<String>> {
        self.inner.lock().start_args.clone()
    }

    /// Number of `step` calls seen so far.
    #[must_use]
    pub fn step_count(&self) -> usize {
        self.inner.lock().step_count
    }

    /// Number of `close` calls seen so far.
    #[must_use]
    pub fn close_count(&self) -> usize {
        self.inner.lock().close_count
    }
}

impl TrafficEngine for ScriptedEngine {
    fn start(&self, args: &[String]) -> Result<(), EngineFault> {
        let mut inner = self.inner.lock();
        inner.start_args.push(args.to_vec());

        match &inner.fail_start {
            Some(message) => Err(EngineFault::new(message.clone())),
            None => Ok(()),
        }
    }

    fn step(&self) -> Result<(), EngineFault> {
        let mut inner = self.inner.lock();
        inner.step_count += 1;

        match &inner.fail_step {
            Some(message) => Err(EngineFault::new(message.clone())),
            None => Ok(()),
        }
    }

    fn close(&self) -> Result<(), EngineFault> {
        let mut inner = self.inner.lock();
        inner.close_count += 1;

        match &inner.fail_close {
            Some(message) => Err(EngineFault::new(message.clone())),
            None => Ok(()),
        }
    }
}
