//! Named-instance registry and resource allocation.
//!
//! The [`SimManager`] is the only way instances are meant to be created and
//! torn down. It owns the name→instance map (one namespace across both
//! backends), allocates control ports for process-backed instances, and
//! locates the default simulator executable when the caller does not supply
//! one. Typically one instance under the default name is all a deployment
//! uses, but every operation takes an explicit name.
//!
//! The map and the port counter sit behind their own locks so the registry
//! invariants (unique names, strictly increasing ports) hold under
//! concurrent callers.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use parking_lot::Mutex;
use thiserror::Error;

use crate::{
    engine::{EngineSlot, TrafficEngine},
    instance::{EngineInstance, InstanceError, ProcessInstance, SimInstance},
};

/// Name given to the instance when callers do not choose one.
pub const DEFAULT_INSTANCE_NAME: &str = "default";

/// Shared handle to a managed instance.
///
/// Callers drive start/step/stop through this handle directly; the manager
/// keeps its own clone for lookup and destruction.
pub type SharedInstance = Arc<Mutex<dyn SimInstance + Send>>;

/// Tunables for a [`SimManager`].
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Command name resolved on the search path when no executable is given
    pub command: String,
    /// First control port handed out by the allocator
    pub starting_port: u16,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self { command: "sumo".to_owned(), starting_port: 8800 }
    }
}

/// Errors from registry operations.
#[derive(Debug, Error)]
pub enum ManagerError {
    /// No instance is registered under the name.
    #[error("instance '{0}' has not been created")]
    NotFound(String),

    /// The name is already taken, regardless of backend.
    #[error("instance '{0}' already exists")]
    AlreadyExists(String),

    /// The default executable lookup failed.
    #[error(
        "could not find the default `{command}` executable, ensure the command can be run from \
         the shell"
    )]
    ExecutableNotFound {
        /// Command name that was searched for
        command: String,
    },

    /// The underlying instance failed to construct or stop.
    #[error(transparent)]
    Instance(#[from] InstanceError),
}

/// Registry of named simulator instances plus resource allocators.
///
/// Names are unique across both backends: a name used for an engine-backed
/// instance blocks reuse for a process-backed one and vice versa. Control
/// ports are allocated read-then-increment and never recycled, not even
/// after the instance that held one is destroyed.
pub struct SimManager {
    /// Tunables fixed at construction
    config: ManagerConfig,
    /// Name → instance map, one namespace for both backends
    instances: Mutex<HashMap<String, SharedInstance>>,
    /// Next control port to hand out
    next_port: Mutex<u16>,
    /// Single-simulation flag handed to every engine-backed instance
    engine_slot: EngineSlot,
}

impl SimManager {
    /// Create a manager with a fresh engine slot.
    #[must_use]
    pub fn new(config: ManagerConfig) -> Self {
        Self::with_engine_slot(config, EngineSlot::new())
    }

    /// Create a manager sharing an existing engine slot.
    ///
    /// The slot is process-wide state: pass the same slot to every manager
    /// in the process if more than one exists.
    #[must_use]
    pub fn with_engine_slot(config: ManagerConfig, engine_slot: EngineSlot) -> Self {
        Self {
            next_port: Mutex::new(config.starting_port),
            instances: Mutex::new(HashMap::new()),
            engine_slot,
            config,
        }
    }

    /// The slot shared by this manager's engine-backed instances.
    #[must_use]
    pub fn engine_slot(&self) -> EngineSlot {
        self.engine_slot.clone()
    }

    /// Create a process-backed instance under `name`.
    ///
    /// When `executable` is absent the configured command name is resolved
    /// on the search path; when `port` is absent the next unused control
    /// port is allocated. The instance is returned and can be fetched again
    /// via [`get`](Self::get).
    ///
    /// # Errors
    ///
    /// [`ManagerError::AlreadyExists`] on a name collision,
    /// [`ManagerError::ExecutableNotFound`] if the lookup fails, or the
    /// instance's own construction error. Nothing is registered on failure.
    pub fn create_process_instance(
        &self,
        name: &str,
        config: impl AsRef<Path>,
        executable: Option<PathBuf>,
        port: Option<u16>,
    ) -> Result<Arc<Mutex<ProcessInstance>>, ManagerError> {
        let mut instances = self.instances.lock();
        if instances.contains_key(name) {
            return Err(ManagerError::AlreadyExists(name.to_owned()));
        }

        let executable = match executable {
            Some(path) => path,
            None => self.find_default_executable()?,
        };
        let port = port.unwrap_or_else(|| self.allocate_port());

        let instance =
            Arc::new(Mutex::new(ProcessInstance::new(config.as_ref(), executable, port)?));
        let shared: SharedInstance = instance.clone();
        instances.insert(name.to_owned(), shared);

        tracing::info!(name, port, "process-backed instance created");

        Ok(instance)
    }

    /// Create an engine-backed instance under `name`.
    ///
    /// The instance shares this manager's [`EngineSlot`], so only one
    /// engine-backed instance can be started at a time no matter how many
    /// are registered.
    ///
    /// # Errors
    ///
    /// [`ManagerError::AlreadyExists`] on a name collision, or the
    /// instance's own construction error. Nothing is registered on failure.
    pub fn create_engine_instance(
        &self,
        name: &str,
        config: impl AsRef<Path>,
        engine: Arc<dyn TrafficEngine>,
    ) -> Result<Arc<Mutex<EngineInstance>>, ManagerError> {
        let mut instances = self.instances.lock();
        if instances.contains_key(name) {
            return Err(ManagerError::AlreadyExists(name.to_owned()));
        }

        let instance = Arc::new(Mutex::new(EngineInstance::new(
            config.as_ref(),
            engine,
            self.engine_slot.clone(),
        )?));
        let shared: SharedInstance = instance.clone();
        instances.insert(name.to_owned(), shared);

        tracing::info!(name, "engine-backed instance created");

        Ok(instance)
    }

    /// Fetch the instance registered under `name`.
    ///
    /// # Errors
    ///
    /// [`ManagerError::NotFound`] if no instance has that name.
    pub fn get(&self, name: &str) -> Result<SharedInstance, ManagerError> {
        self.instances
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| ManagerError::NotFound(name.to_owned()))
    }

    /// Fetch the instance registered under [`DEFAULT_INSTANCE_NAME`].
    ///
    /// # Errors
    ///
    /// [`ManagerError::NotFound`] if no default instance exists.
    pub fn get_default(&self) -> Result<SharedInstance, ManagerError> {
        self.get(DEFAULT_INSTANCE_NAME)
    }

    /// Stop and unregister the instance under `name`.
    ///
    /// The entry is removed first and stays removed even when the stop that
    /// follows fails; the name is immediately free for reuse either way.
    ///
    /// # Errors
    ///
    /// [`ManagerError::NotFound`] if no instance has that name, or the
    /// instance's stop error after the entry is already gone.
    pub fn destroy(&self, name: &str) -> Result<(), ManagerError> {
        let Some(instance) = self.instances.lock().remove(name) else {
            return Err(ManagerError::NotFound(name.to_owned()));
        };

        tracing::info!(name, "instance destroyed");

        // The entry is already gone: a failing stop must not resurrect it.
        instance.lock().stop()?;

        Ok(())
    }

    /// Stop and unregister the instance under [`DEFAULT_INSTANCE_NAME`].
    ///
    /// # Errors
    ///
    /// Same as [`destroy`](Self::destroy).
    pub fn destroy_default(&self) -> Result<(), ManagerError> {
        self.destroy(DEFAULT_INSTANCE_NAME)
    }

    /// Whether an instance is registered under `name`.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.instances.lock().contains_key(name)
    }

    /// Number of registered instances across both backends.
    #[must_use]
    pub fn instance_count(&self) -> usize {
        self.instances.lock().len()
    }

    /// Resolve the configured command name on the executable search path.
    fn find_default_executable(&self) -> Result<PathBuf, ManagerError> {
        which::which(&self.config.command).map_err(|_| ManagerError::ExecutableNotFound {
            command: self.config.command.clone(),
        })
    }

    /// Hand out the next control port, read-then-increment.
    fn allocate_port(&self) -> u16 {
        let mut next = self.next_port.lock();
        let port = *next;
        *next += 1;
        port
    }
}

#[cfg(test)]
mod tests {
    use gridlock_harness::ScriptedEngine;
    use tempfile::NamedTempFile;

    use super::*;

    const STARTING_PORT: u16 = 8800;

    fn manager() -> SimManager {
        SimManager::new(ManagerConfig::default())
    }

    fn config_fixture() -> NamedTempFile {
        NamedTempFile::new().unwrap()
    }

    /// Any existing file passes construction; nothing is spawned at create.
    fn fake_executable(config: &NamedTempFile) -> Option<PathBuf> {
        Some(config.path().to_path_buf())
    }

    #[test]
    fn create_process_instance_with_explicit_resources() {
        let manager = manager();
        let config = config_fixture();

        let instance = manager
            .create_process_instance("a", config.path(), fake_executable(&config), Some(9800))
            .unwrap();

        assert_eq!(instance.lock().port(), 9800);
        assert!(!instance.lock().is_started());
        assert!(manager.contains("a"));
    }

    #[test]
    fn create_allocates_increasing_ports() {
        let manager = manager();
        let config = config_fixture();

        let first = manager
            .create_process_instance("a", config.path(), fake_executable(&config), None)
            .unwrap();
        let second = manager
            .create_process_instance("b", config.path(), fake_executable(&config), None)
            .unwrap();

        assert_eq!(first.lock().port(), STARTING_PORT);
        assert_eq!(second.lock().port(), STARTING_PORT + 1);
    }

    #[test]
    fn explicit_port_does_not_consume_allocator() {
        let manager = manager();
        let config = config_fixture();

        manager
            .create_process_instance("a", config.path(), fake_executable(&config), Some(9800))
            .unwrap();
        let auto = manager
            .create_process_instance("b", config.path(), fake_executable(&config), None)
            .unwrap();

        assert_eq!(auto.lock().port(), STARTING_PORT);
    }

    #[test]
    fn create_fails_when_default_executable_missing() {
        let manager = SimManager::new(ManagerConfig {
            command: "simulator-command-that-does-not-exist".to_owned(),
            ..ManagerConfig::default()
        });
        let config = config_fixture();

        let error = manager
            .create_process_instance("a", config.path(), None, Some(STARTING_PORT))
            .unwrap_err();

        assert!(matches!(error, ManagerError::ExecutableNotFound { .. }));
        assert!(error.to_string().contains("simulator-command-that-does-not-exist"));
        assert!(!manager.contains("a"));
    }

    #[test]
    fn create_fails_on_name_collision() {
        let manager = manager();
        let config = config_fixture();

        manager
            .create_process_instance("a", config.path(), fake_executable(&config), None)
            .unwrap();
        let error = manager
            .create_process_instance("a", config.path(), fake_executable(&config), None)
            .unwrap_err();

        assert!(matches!(error, ManagerError::AlreadyExists(_)));
        assert_eq!(manager.instance_count(), 1);
    }

    #[test]
    fn names_collide_across_backends() {
        let manager = manager();
        let config = config_fixture();

        manager
            .create_engine_instance("a", config.path(), Arc::new(ScriptedEngine::new()))
            .unwrap();
        let error = manager
            .create_process_instance("a", config.path(), fake_executable(&config), None)
            .unwrap_err();

        assert!(matches!(error, ManagerError::AlreadyExists(_)));
    }

    #[test]
    fn construction_failure_leaves_name_unregistered() {
        let manager = manager();
        let config = config_fixture();

        let error = manager
            .create_process_instance(
                "a",
                config.path(),
                Some(PathBuf::from("/nonexistent/simulator")),
                None,
            )
            .unwrap_err();

        assert!(matches!(
            error,
            ManagerError::Instance(InstanceError::MissingExecutable(_))
        ));
        assert!(!manager.contains("a"));
        assert!(matches!(manager.get("a"), Err(ManagerError::NotFound(_))));
    }

    #[test]
    fn get_returns_registered_instance() {
        let manager = manager();
        let config = config_fixture();

        manager
            .create_process_instance(
                DEFAULT_INSTANCE_NAME,
                config.path(),
                fake_executable(&config),
                None,
            )
            .unwrap();

        let shared = manager.get_default().unwrap();
        assert_eq!(shared.lock().config(), config.path());
    }

    #[test]
    fn get_fails_when_unknown() {
        let error = manager().get("missing").unwrap_err();

        assert!(matches!(error, ManagerError::NotFound(_)));
        assert!(error.to_string().contains("has not been created"));
    }

    #[test]
    fn destroy_fails_when_unknown() {
        let error = manager().destroy("missing").unwrap_err();

        assert!(matches!(error, ManagerError::NotFound(_)));
    }

    #[test]
    fn destroy_removes_entry_even_when_stop_fails() {
        let manager = manager();
        let config = config_fixture();

        manager
            .create_process_instance("a", config.path(), fake_executable(&config), None)
            .unwrap();

        // The process backend's stop is a deliberate placeholder, so destroy
        // surfaces its error; the entry must be gone regardless.
        let error = manager.destroy("a").unwrap_err();

        assert!(matches!(
            error,
            ManagerError::Instance(InstanceError::Unsupported { operation: "stop" })
        ));
        assert!(!manager.contains("a"));
    }

    #[test]
    fn destroy_frees_name_for_reuse() {
        let manager = manager();
        let config = config_fixture();

        manager
            .create_process_instance("a", config.path(), fake_executable(&config), None)
            .unwrap();
        let _ = manager.destroy("a");

        manager
            .create_process_instance("a", config.path(), fake_executable(&config), None)
            .unwrap();
        assert!(manager.contains("a"));
    }

    #[test]
    fn ports_are_not_recycled_after_destroy() {
        let manager = manager();
        let config = config_fixture();

        let first = manager
            .create_process_instance("a", config.path(), fake_executable(&config), None)
            .unwrap();
        assert_eq!(first.lock().port(), STARTING_PORT);

        let _ = manager.destroy("a");

        let second = manager
            .create_process_instance("b", config.path(), fake_executable(&config), None)
            .unwrap();
        assert_eq!(second.lock().port(), STARTING_PORT + 1);
    }

    #[test]
    fn destroy_stops_engine_instance() {
        let manager = manager();
        let config = config_fixture();
        let engine = ScriptedEngine::new();

        let instance = manager
            .create_engine_instance("a", config.path(), Arc::new(engine.clone()))
            .unwrap();
        instance.lock().start().unwrap();

        manager.destroy("a").unwrap();

        assert_eq!(engine.close_count(), 1);
        assert!(!manager.engine_slot().is_active());
        assert!(!manager.contains("a"));
    }
}
