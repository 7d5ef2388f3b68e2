//! Simulator instance backends.
//!
//! One capability interface, two implementations: [`ProcessInstance`] drives
//! a spawned simulator process over a TCP control socket and
//! [`EngineInstance`] drives the embedded engine in-process. Instances are
//! created and handed out by the [`SimManager`](crate::manager::SimManager);
//! callers then drive start/step/stop on the instance directly.

mod engine;
mod process;

use std::path::{Path, PathBuf};

pub use engine::EngineInstance;
pub use process::ProcessInstance;
use thiserror::Error;

use crate::{connection::SocketError, engine::EngineFault};

/// Option flag that precedes the configuration path in both backends'
/// argument conventions.
pub(crate) const CONFIGURATION_FLAG: &str = "-c";

/// Errors from instance construction and lifecycle operations.
#[derive(Debug, Error)]
pub enum InstanceError {
    /// The configuration file was missing when the instance was constructed.
    #[error("provided configuration file {} does not exist", .0.display())]
    MissingConfig(PathBuf),

    /// The executable file was missing when the instance was constructed.
    #[error("provided executable file {} does not exist", .0.display())]
    MissingExecutable(PathBuf),

    /// The operation requires a stopped instance.
    #[error("this instance is already started")]
    AlreadyStarted,

    /// The operation requires a started instance.
    #[error("this instance is not started")]
    NotStarted,

    /// The OS could not spawn the simulator process.
    #[error("failed to spawn simulator process: {0}")]
    Spawn(#[source] std::io::Error),

    /// The process handle was accessed before a successful spawn.
    #[error("simulator process is not spawned")]
    ProcessNotSpawned,

    /// The control connection was accessed before it was established.
    #[error("control connection is not established")]
    NotConnected,

    /// Control-socket failure, propagated unchanged.
    #[error(transparent)]
    Socket(#[from] SocketError),

    /// The embedded engine reported a simulation-level fault.
    #[error(transparent)]
    Engine(#[from] EngineFault),

    /// Another engine-backed instance already holds the engine.
    #[error("the embedded engine supports only one simulation running at a time")]
    EngineBusy,

    /// The operation is declared but not implemented by this backend.
    #[error("`{operation}` is not implemented by this backend")]
    Unsupported {
        /// Name of the unsupported operation
        operation: &'static str,
    },
}

/// Uniform control surface over one managed simulator session.
///
/// Backends differ in how they reach the simulator, not in the lifecycle:
/// a constructed instance is stopped, `start` transitions it to started and
/// `stop` transitions it back. The configuration path is validated once, at
/// construction, and never re-checked. Nothing here interprets simulation
/// data.
pub trait SimInstance: Send {
    /// Path to the simulator configuration file this instance runs.
    fn config(&self) -> &Path;

    /// Whether the instance is currently started.
    fn is_started(&self) -> bool;

    /// Start the session.
    fn start(&mut self) -> Result<(), InstanceError>;

    /// Advance the simulation by one step.
    fn step(&mut self) -> Result<(), InstanceError>;

    /// Stop the session and clean up.
    fn stop(&mut self) -> Result<(), InstanceError>;
}
