//! Seam to the embedded simulation engine.
//!
//! The engine itself is an external collaborator. This module defines the
//! call convention the library backend drives ([`TrafficEngine`]) and the
//! process-wide exclusivity flag ([`EngineSlot`]) that the engine imposes:
//! only one simulation may be active per process, no matter how many
//! instance objects exist.

use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use thiserror::Error;

/// Simulation-level fault reported by the embedded engine.
///
/// The engine is opaque to this crate; all it reports back is a message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("engine fault: {0}")]
pub struct EngineFault(pub String);

impl EngineFault {
    /// Wrap an engine-reported message.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Call convention of the embedded simulation engine.
///
/// `start` takes the engine's argv-style option list; by the engine's
/// convention the first element is an unused executable-name slot and is
/// passed empty. Implementations must be shareable across threads. The
/// engine's one-active-simulation rule is enforced by [`EngineSlot`], not by
/// implementations of this trait.
pub trait TrafficEngine: Send + Sync + 'static {
    /// Load a simulation from the given argument list.
    fn start(&self, args: &[String]) -> Result<(), EngineFault>;

    /// Advance the active simulation by one step.
    fn step(&self) -> Result<(), EngineFault>;

    /// Tear down the active simulation.
    fn close(&self) -> Result<(), EngineFault>;
}

/// Process-wide flag gating the embedded engine.
///
/// Passed into constructors explicitly so tests get a fresh flag per case
/// and concurrent callers contend on a real lock instead of racing a bare
/// bool. Clones share the same underlying flag.
#[derive(Debug, Clone, Default)]
pub struct EngineSlot {
    /// True while some engine-backed instance is started
    active: Arc<Mutex<bool>>,
}

impl EngineSlot {
    /// Create a released slot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether some instance currently holds the slot.
    #[must_use]
    pub fn is_active(&self) -> bool {
        *self.active.lock()
    }

    /// Lock the flag for a check-call-set sequence.
    ///
    /// Held across the engine's start call so two instances cannot both pass
    /// the check before either sets the flag.
    pub(crate) fn guard(&self) -> MutexGuard<'_, bool> {
        self.active.lock()
    }
}
