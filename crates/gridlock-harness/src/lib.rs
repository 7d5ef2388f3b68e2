//! Test harness for the gridlock workspace.
//!
//! Provides [`ScriptedEngine`], a programmable double of the embedded
//! simulation engine, so lifecycle behavior can be exercised without the
//! real engine installed. The integration suites under `tests/` drive the
//! real manager, real process spawns, and real sockets against it.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod scripted;

pub use scripted::ScriptedEngine;
