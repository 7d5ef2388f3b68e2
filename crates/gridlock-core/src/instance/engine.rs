//! Engine-backed simulator instance.
//!
//! Drives the embedded simulation engine in-process instead of spawning a
//! simulator. The engine supports one active simulation per process, so all
//! instances of this backend share an [`EngineSlot`] and starting a second
//! instance while another holds the slot fails without touching the first.
//!
//! # State Machine
//!
//! ```text
//! ┌────────────┐   start   ┌─────────┐
//! │ NotStarted │──────────>│ Started │
//! │            │<──────────│         │
//! └────────────┘ stop/     └─────────┘
//!                failed step
//! ```
//!
//! A failed step tears the instance down before surfacing the fault, and
//! stop releases both the instance flag and the slot on every exit path.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use super::{CONFIGURATION_FLAG, InstanceError, SimInstance};
use crate::engine::{EngineSlot, TrafficEngine};

/// Simulator session backed by the embedded engine.
pub struct EngineInstance {
    /// Simulator configuration file, validated to exist at construction
    config: PathBuf,
    /// The embedded engine this instance drives
    engine: Arc<dyn TrafficEngine>,
    /// Process-wide single-simulation flag shared with sibling instances
    slot: EngineSlot,
    /// Lifecycle flag for this instance alone
    started: bool,
}

impl EngineInstance {
    /// Create a stopped instance for the given configuration.
    ///
    /// The configuration path is checked for existence here and never again.
    ///
    /// # Errors
    ///
    /// [`InstanceError::MissingConfig`] naming the missing path.
    pub fn new(
        config: impl Into<PathBuf>,
        engine: Arc<dyn TrafficEngine>,
        slot: EngineSlot,
    ) -> Result<Self, InstanceError> {
        let config = config.into();
        if !config.exists() {
            return Err(InstanceError::MissingConfig(config));
        }

        Ok(Self { config, engine, slot, started: false })
    }
}

impl SimInstance for EngineInstance {
    fn config(&self) -> &Path {
        &self.config
    }

    fn is_started(&self) -> bool {
        self.started
    }

    /// Load the simulation into the embedded engine and claim the slot.
    fn start(&mut self) -> Result<(), InstanceError> {
        if self.started {
            return Err(InstanceError::AlreadyStarted);
        }

        // Held across the engine call so no sibling can slip past the check.
        let mut active = self.slot.guard();
        if *active {
            return Err(InstanceError::EngineBusy);
        }

        // The first element is the engine convention's unused
        // executable-name slot.
        let args = [
            String::new(),
            CONFIGURATION_FLAG.to_owned(),
            self.config.display().to_string(),
        ];

        if let Err(fault) = self.engine.start(&args) {
            self.started = false;
            return Err(fault.into());
        }

        *active = true;
        drop(active);
        self.started = true;

        tracing::info!(config = %self.config.display(), "engine simulation started");

        Ok(())
    }

    /// Advance the simulation by one engine step.
    ///
    /// A fault from the engine stops this instance (best effort, the
    /// cleanup's own error is not surfaced) and then propagates, so a failed
    /// step always leaves the instance fully stopped.
    fn step(&mut self) -> Result<(), InstanceError> {
        if !self.started {
            return Err(InstanceError::NotStarted);
        }

        if let Err(fault) = self.engine.step() {
            if let Err(stop_error) = self.stop() {
                tracing::warn!(error = %stop_error, "cleanup stop after failed step also failed");
            }
            return Err(fault.into());
        }

        Ok(())
    }

    /// Close the engine's simulation and release the slot.
    ///
    /// The instance flag and the slot are cleared no matter what the engine's
    /// close reports; a close fault is still surfaced afterwards.
    fn stop(&mut self) -> Result<(), InstanceError> {
        if !self.started {
            return Err(InstanceError::NotStarted);
        }

        let result = self.engine.close();

        self.started = false;
        *self.slot.guard() = false;

        tracing::info!(config = %self.config.display(), "engine simulation stopped");

        result.map_err(InstanceError::from)
    }
}
