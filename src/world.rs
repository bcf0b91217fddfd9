//! The boundary to the environment a nodenet is embodied in.

use crate::error::{NetError, NetResult};
use crate::net::FxIndexMap;

/// The adapter between a nodenet and its environment.
///
/// Sensors read named datasources, actors write named datatargets; the
/// engine calls [`WorldAdapter::snapshot`] once at the top of every step so
/// that all sensors of one tick observe a consistent environment state.
///
/// Implementations are owned behind the runtime's per-world mutex; they do
/// not need interior synchronization of their own.
pub trait WorldAdapter: Send {
    /// Fixes the environment state the upcoming step will observe.
    fn snapshot(&mut self) {}

    /// The datasource names readable by the given nodenet.
    fn available_datasources(&self, nodenet_uid: &str) -> Vec<String>;

    /// The datatarget names writable by the given nodenet.
    fn available_datatargets(&self, nodenet_uid: &str) -> Vec<String>;

    /// Reads one datasource, `None` if the name is unknown.
    fn read_datasource(&mut self, name: &str) -> Option<f64>;

    /// Writes one datatarget.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::InvalidArgument`] for an unknown name.
    fn write_datatarget(&mut self, name: &str, value: f64) -> NetResult<()>;
}

/// A dictionary-backed world, sufficient for tests and headless hosts.
#[derive(Debug, Clone, Default)]
pub struct DictWorld {
    datasources: FxIndexMap<String, f64>,
    datatargets: FxIndexMap<String, f64>,
}

impl DictWorld {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares datasources, all starting at 0.
    #[must_use]
    pub fn with_datasources<'a>(mut self, names: impl IntoIterator<Item = &'a str>) -> Self {
        for name in names {
            self.datasources.insert(name.to_string(), 0.0);
        }
        self
    }

    /// Declares datatargets, all starting at 0.
    #[must_use]
    pub fn with_datatargets<'a>(mut self, names: impl IntoIterator<Item = &'a str>) -> Self {
        for name in names {
            self.datatargets.insert(name.to_string(), 0.0);
        }
        self
    }

    /// Sets a datasource value, declaring the name if new.
    pub fn set_datasource(&mut self, name: &str, value: f64) {
        self.datasources.insert(name.to_string(), value);
    }

    /// The last value an actor wrote to the given datatarget.
    #[must_use]
    pub fn datatarget(&self, name: &str) -> Option<f64> {
        self.datatargets.get(name).copied()
    }
}

impl WorldAdapter for DictWorld {
    fn available_datasources(&self, _nodenet_uid: &str) -> Vec<String> {
        self.datasources.keys().cloned().collect()
    }

    fn available_datatargets(&self, _nodenet_uid: &str) -> Vec<String> {
        self.datatargets.keys().cloned().collect()
    }

    fn read_datasource(&mut self, name: &str) -> Option<f64> {
        self.datasources.get(name).copied()
    }

    fn write_datatarget(&mut self, name: &str, value: f64) -> NetResult<()> {
        match self.datatargets.get_mut(name) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(NetError::InvalidArgument(format!(
                "unknown datatarget '{name}'"
            ))),
        }
    }
}
