//! Directed weighted edges between gates and slots.

use serde::{Deserialize, Serialize};

/// A directed edge from one node's gate to another node's slot.
///
/// Links are owned by the nodenet's link map; the gate and slot each hold
/// the link uid in their terminal sets. A link is uniquely identified by
/// its endpoints: relinking the same (gate, slot) pair overwrites weight
/// and certainty instead of creating a second edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub uid: String,
    pub source_node_uid: String,
    pub source_gate_name: String,
    pub target_node_uid: String,
    pub target_slot_name: String,
    pub weight: f64,
    pub certainty: f64,
}

impl Link {
    /// True if this link connects the given endpoints.
    #[must_use]
    pub fn connects(
        &self,
        source_node: &str,
        gate: &str,
        target_node: &str,
        slot: &str,
    ) -> bool {
        self.source_node_uid == source_node
            && self.source_gate_name == gate
            && self.target_node_uid == target_node
            && self.target_slot_name == slot
    }

    /// True if the link starts or ends at the given node.
    #[must_use]
    pub fn touches(&self, node_uid: &str) -> bool {
        self.source_node_uid == node_uid || self.target_node_uid == node_uid
    }
}
