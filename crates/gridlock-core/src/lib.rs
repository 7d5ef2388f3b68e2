//! Lifecycle management for external traffic-simulation engines.
//!
//! This crate creates, hands out, and tears down named instances of a
//! traffic simulator behind one control surface (start / step / stop) with
//! two interchangeable backends:
//!
//! - **Process backend** ([`ProcessInstance`]): spawns a standalone simulator
//!   process and reaches it over a TCP control socket.
//! - **Engine backend** ([`EngineInstance`]): drives an in-process simulation
//!   engine that allows only one active simulation per process.
//!
//! The simulator's own wire protocol is deliberately out of scope: this crate
//! establishes and guards process and connection state, it never interprets
//! simulation data.
//!
//! # Components
//!
//! - [`SimManager`]: named-instance registry plus resource allocators
//!   (control ports, default executable lookup)
//! - [`SimInstance`]: the capability interface both backends implement
//! - [`ControlConnection`]: one outbound TCP endpoint and its raw handle
//! - [`TrafficEngine`] / [`EngineSlot`]: seam to the embedded engine and its
//!   process-wide single-simulation flag
//!
//! Callers ask the manager to create a named instance, later fetch it by name
//! and drive start/step/stop on it directly, and destroy it by name when
//! done. All operations are synchronous and block the caller for the duration
//! of the underlying spawn, connect, or engine call.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod connection;
pub mod engine;
pub mod instance;
pub mod manager;

pub use connection::{ControlConnection, SocketError};
pub use engine::{EngineFault, EngineSlot, TrafficEngine};
pub use instance::{EngineInstance, InstanceError, ProcessInstance, SimInstance};
pub use manager::{
    DEFAULT_INSTANCE_NAME, ManagerConfig, ManagerError, SharedInstance, SimManager,
};
