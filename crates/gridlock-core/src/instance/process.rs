//! Process-backed simulator instance.
//!
//! Owns one spawned simulator process and the TCP control connection to it.
//! Spawning and connecting both happen inside `start`; the wire protocol
//! spoken over the established connection is out of scope, which is why
//! `step` and `stop` are declared but deliberately unimplemented on this
//! backend.
//!
//! # State Machine
//!
//! ```text
//! ┌────────────┐  start: spawn + connect  ┌─────────┐
//! │ NotStarted │─────────────────────────>│ Started │
//! └────────────┘                          └─────────┘
//! ```
//!
//! A failed spawn leaves the instance fully stopped. A failed connect leaves
//! the already-spawned process running: tearing it down gracefully needs the
//! wire protocol this backend does not speak yet.

use std::{
    net::Ipv4Addr,
    path::{Path, PathBuf},
    process::{Child, Command},
};

use super::{CONFIGURATION_FLAG, InstanceError, SimInstance};
use crate::connection::ControlConnection;

/// Spawned simulators are always reached on the loopback interface.
const LOCAL_HOST: Ipv4Addr = Ipv4Addr::LOCALHOST;

const REMOTE_PORT_FLAG: &str = "--remote-port";
const NUM_CLIENTS_FLAG: &str = "--num-clients";
const NUM_CLIENTS: &str = "1";

/// Simulator session backed by a spawned process and a TCP control socket.
///
/// The instance exclusively owns the process it spawns and the connection it
/// establishes; both are absent until `start` succeeds and accessing either
/// earlier is an error, never an empty value.
pub struct ProcessInstance {
    /// Simulator configuration file, validated to exist at construction
    config: PathBuf,
    /// Simulator executable, validated to exist at construction
    executable: PathBuf,
    /// Control port the simulator is told to listen on
    port: u16,
    /// Spawned simulator process, present after a successful spawn
    process: Option<Child>,
    /// Established control connection, present after a successful connect
    connection: Option<ControlConnection>,
    /// Lifecycle flag
    started: bool,
}

impl ProcessInstance {
    /// Create a stopped instance for the given configuration, executable,
    /// and control port.
    ///
    /// Both paths are checked for existence here and never again.
    ///
    /// # Errors
    ///
    /// [`InstanceError::MissingConfig`] or
    /// [`InstanceError::MissingExecutable`] naming the offending path.
    pub fn new(
        config: impl Into<PathBuf>,
        executable: impl Into<PathBuf>,
        port: u16,
    ) -> Result<Self, InstanceError> {
        let config = config.into();
        if !config.exists() {
            return Err(InstanceError::MissingConfig(config));
        }

        let executable = executable.into();
        if !executable.exists() {
            return Err(InstanceError::MissingExecutable(executable));
        }

        Ok(Self { config, executable, port, process: None, connection: None, started: false })
    }

    /// Path to the simulator executable used by this instance.
    #[must_use]
    pub fn executable(&self) -> &Path {
        &self.executable
    }

    /// Control port this instance spawns and connects on.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    /// The spawned simulator process.
    ///
    /// # Errors
    ///
    /// [`InstanceError::ProcessNotSpawned`] before a successful spawn.
    pub fn process(&self) -> Result<&Child, InstanceError> {
        self.process.as_ref().ok_or(InstanceError::ProcessNotSpawned)
    }

    /// The established control connection.
    ///
    /// # Errors
    ///
    /// [`InstanceError::NotConnected`] before a successful connect.
    pub fn connection(&self) -> Result<&ControlConnection, InstanceError> {
        self.connection.as_ref().ok_or(InstanceError::NotConnected)
    }

    /// Spawn the simulator process listening on our control port.
    fn spawn(&mut self) -> Result<(), InstanceError> {
        let child = Command::new(&self.executable)
            .arg(CONFIGURATION_FLAG)
            .arg(&self.config)
            .arg(REMOTE_PORT_FLAG)
            .arg(self.port.to_string())
            .arg(NUM_CLIENTS_FLAG)
            .arg(NUM_CLIENTS)
            .spawn()
            .map_err(InstanceError::Spawn)?;

        tracing::info!(pid = child.id(), port = self.port, "simulator process spawned");
        self.process = Some(child);

        Ok(())
    }

    /// Connect the control socket to the spawned simulator.
    fn connect(&mut self) -> Result<(), InstanceError> {
        let mut connection = ControlConnection::new(LOCAL_HOST, self.port)?;

        if let Err(error) = connection.connect() {
            // The spawned process stays running: stopping it needs the wire
            // protocol, which this backend does not speak yet.
            tracing::warn!(
                port = self.port,
                "control connect failed, simulator process left running"
            );
            return Err(error.into());
        }

        self.connection = Some(connection);

        Ok(())
    }
}

impl SimInstance for ProcessInstance {
    fn config(&self) -> &Path {
        &self.config
    }

    fn is_started(&self) -> bool {
        self.started
    }

    /// Spawn the simulator process and connect the control socket.
    ///
    /// This starts the session but does not run the simulation; stepping
    /// belongs to the wire protocol.
    fn start(&mut self) -> Result<(), InstanceError> {
        if self.started {
            return Err(InstanceError::AlreadyStarted);
        }

        self.spawn()?;
        self.connect()?;

        self.started = true;

        Ok(())
    }

    fn step(&mut self) -> Result<(), InstanceError> {
        Err(InstanceError::Unsupported { operation: "step" })
    }

    fn stop(&mut self) -> Result<(), InstanceError> {
        Err(InstanceError::Unsupported { operation: "stop" })
    }
}
