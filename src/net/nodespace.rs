//! Hierarchical containers for nodes.

use crate::net::gate::GateFunction;
use crate::net::{FxIndexMap, FxIndexSet};

/// A subtree container for nodes and further nodespaces.
///
/// Besides containment, a nodespace scopes two behaviors: per
/// (nodetype, gate) overrides of the gate function, and the activator
/// bindings that gate directional propagation of the nodes it contains.
#[derive(Debug, Clone)]
pub struct Nodespace {
    uid: String,
    parent_nodespace: Option<String>,
    name: String,
    position: (f64, f64),
    index: u64,
    /// Uids of directly contained nodespaces.
    pub(crate) children: FxIndexSet<String>,
    /// Uids of directly contained nodes.
    pub(crate) nodes: FxIndexSet<String>,
    /// Gate function overrides: nodetype name -> gate name -> function.
    gatefunctions: FxIndexMap<String, FxIndexMap<String, GateFunction>>,
    /// Last published activation per activator type, refreshed every step.
    pub(crate) activators: FxIndexMap<String, f64>,
    /// The Activator node registered per activator type.
    pub(crate) activator_nodes: FxIndexMap<String, String>,
}

impl Nodespace {
    #[must_use]
    pub fn new(
        uid: impl Into<String>,
        parent_nodespace: Option<String>,
        name: impl Into<String>,
        position: (f64, f64),
        index: u64,
    ) -> Self {
        Self {
            uid: uid.into(),
            parent_nodespace,
            name: name.into(),
            position,
            index,
            children: FxIndexSet::default(),
            nodes: FxIndexSet::default(),
            gatefunctions: FxIndexMap::default(),
            activators: FxIndexMap::default(),
            activator_nodes: FxIndexMap::default(),
        }
    }

    #[must_use]
    pub fn uid(&self) -> &str {
        &self.uid
    }

    /// The parent nodespace uid; `None` only for the root.
    #[must_use]
    pub fn parent_nodespace(&self) -> Option<&str> {
        self.parent_nodespace.as_deref()
    }

    pub(crate) fn set_parent_nodespace(&mut self, parent: Option<String>) {
        self.parent_nodespace = parent;
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    #[must_use]
    pub fn position(&self) -> (f64, f64) {
        self.position
    }

    pub fn set_position(&mut self, position: (f64, f64)) {
        self.position = position;
    }

    #[must_use]
    pub fn index(&self) -> u64 {
        self.index
    }

    pub(crate) fn set_index(&mut self, index: u64) {
        self.index = index;
    }

    /// Uids of directly contained nodespaces, in insertion order.
    pub fn children(&self) -> impl Iterator<Item = &str> {
        self.children.iter().map(String::as_str)
    }

    /// Uids of directly contained nodes, in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(String::as_str)
    }

    /// Installs a gate function override for all contained nodes of the
    /// given type.
    pub fn set_gate_function(
        &mut self,
        nodetype: impl Into<String>,
        gate: impl Into<String>,
        function: GateFunction,
    ) {
        self.gatefunctions
            .entry(nodetype.into())
            .or_default()
            .insert(gate.into(), function);
    }

    /// Drops an override, reverting the pair to the default gate function.
    pub fn remove_gate_function(&mut self, nodetype: &str, gate: &str) {
        if let Some(by_gate) = self.gatefunctions.get_mut(nodetype) {
            by_gate.shift_remove(gate);
            if by_gate.is_empty() {
                self.gatefunctions.shift_remove(nodetype);
            }
        }
    }

    /// The gate function for a (nodetype, gate) pair, if overridden here.
    #[must_use]
    pub fn gate_function(&self, nodetype: &str, gate: &str) -> Option<GateFunction> {
        self.gatefunctions.get(nodetype)?.get(gate).copied()
    }

    /// All overrides as persisted names: nodetype -> gate -> function name.
    #[must_use]
    pub fn gatefunction_names(&self) -> FxIndexMap<String, FxIndexMap<String, String>> {
        self.gatefunctions
            .iter()
            .map(|(nodetype, by_gate)| {
                let by_gate = by_gate
                    .iter()
                    .map(|(gate, f)| (gate.clone(), f.name().to_string()))
                    .collect();
                (nodetype.clone(), by_gate)
            })
            .collect()
    }

    /// The last published activation of the activator with the given type
    /// parameter, if one lives here.
    #[must_use]
    pub fn activator_value(&self, activator_type: &str) -> Option<f64> {
        self.activators.get(activator_type).copied()
    }

    /// The Activator node registered for the given type, if any.
    #[must_use]
    pub fn activator_node(&self, activator_type: &str) -> Option<&str> {
        self.activator_nodes.get(activator_type).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_function_overrides_roundtrip() {
        let mut ns = Nodespace::new("Root", None, "Root", (0.0, 0.0), 0);
        assert_eq!(ns.gate_function("Pipe", "por"), None);

        ns.set_gate_function("Pipe", "por", GateFunction::Sigmoid);
        assert_eq!(ns.gate_function("Pipe", "por"), Some(GateFunction::Sigmoid));
        assert_eq!(ns.gatefunction_names()["Pipe"]["por"], "sigmoid");

        ns.remove_gate_function("Pipe", "por");
        assert_eq!(ns.gate_function("Pipe", "por"), None);
        assert!(ns.gatefunction_names().is_empty());
    }
}
