//! Per-step samplers of gate and slot activations.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Which terminal of a node a monitor samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TerminalKind {
    Gate,
    Slot,
}

/// A sampler reading one sheaf of one gate or slot, once per step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Monitor {
    pub uid: String,
    pub node_uid: String,
    pub kind: TerminalKind,
    /// The gate or slot name to sample.
    pub name: String,
    /// The sheaf lane to sample.
    pub sheaf: String,
    /// Sampled values by step number.
    pub values: BTreeMap<u64, f64>,
}

impl Monitor {
    #[must_use]
    pub fn new(
        uid: impl Into<String>,
        node_uid: impl Into<String>,
        kind: TerminalKind,
        name: impl Into<String>,
        sheaf: impl Into<String>,
    ) -> Self {
        Self {
            uid: uid.into(),
            node_uid: node_uid.into(),
            kind,
            name: name.into(),
            sheaf: sheaf.into(),
            values: BTreeMap::new(),
        }
    }

    /// Records a sample for the given step.
    pub fn record(&mut self, step: u64, value: f64) {
        self.values.insert(step, value);
    }

    /// Drops all recorded values, keeping the monitor attached.
    pub fn clear(&mut self) {
        self.values.clear();
    }
}
