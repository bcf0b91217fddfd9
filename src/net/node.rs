//! Net vertices and the built-in node functions.

use serde_json::Value;

use crate::net::gate::Gate;
use crate::net::nodetype::Nodetype;
use crate::net::sheaf::DEFAULT_SHEAF;
use crate::net::slot::Slot;
use crate::net::FxIndexMap;

/// A single net entity carrying activation.
///
/// A node owns its gates and slots; links between nodes live in the
/// nodenet's link map and are referenced from the terminals by uid.
#[derive(Debug, Clone)]
pub struct Node {
    uid: String,
    typ: String,
    parent_nodespace: String,
    name: String,
    position: (f64, f64),
    index: u64,
    pub(crate) parameters: FxIndexMap<String, Value>,
    pub(crate) state: FxIndexMap<String, Value>,
    pub(crate) gates: FxIndexMap<String, Gate>,
    pub(crate) slots: FxIndexMap<String, Slot>,
    pub(crate) activation: f64,
}

impl Node {
    /// Creates a node of the given type, allocating all declared gates and
    /// slots with the nodetype's gate baselines and the `default` sheaf.
    #[must_use]
    pub fn new(
        uid: impl Into<String>,
        nodetype: &Nodetype,
        parent_nodespace: impl Into<String>,
        name: impl Into<String>,
        position: (f64, f64),
        index: u64,
    ) -> Self {
        let mut gates = FxIndexMap::default();
        for gate_name in nodetype.gate_names() {
            gates.insert(
                gate_name.clone(),
                Gate::new(gate_name.clone(), nodetype.gate_baseline(gate_name)),
            );
        }
        let mut slots = FxIndexMap::default();
        for slot_name in nodetype.slot_names() {
            slots.insert(slot_name.clone(), Slot::new(slot_name.clone()));
        }

        Self {
            uid: uid.into(),
            typ: nodetype.name().to_string(),
            parent_nodespace: parent_nodespace.into(),
            name: name.into(),
            position,
            index,
            parameters: nodetype.parameter_defaults().clone(),
            state: FxIndexMap::default(),
            gates,
            slots,
            activation: 0.0,
        }
    }

    #[must_use]
    pub fn uid(&self) -> &str {
        &self.uid
    }

    /// The nodetype name.
    #[must_use]
    pub fn nodetype(&self) -> &str {
        &self.typ
    }

    #[must_use]
    pub fn parent_nodespace(&self) -> &str {
        &self.parent_nodespace
    }

    pub(crate) fn set_parent_nodespace(&mut self, nodespace_uid: impl Into<String>) {
        self.parent_nodespace = nodespace_uid.into();
    }

    /// The display name; falls back to the uid when unnamed.
    #[must_use]
    pub fn name(&self) -> &str {
        if self.name.is_empty() {
            &self.uid
        } else {
            &self.name
        }
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

    /// The display name as stored, empty if unnamed.
    #[must_use]
    pub(crate) fn raw_name(&self) -> &str {
        &self.name
    }

    /// The creation index within the owning nodenet.
    #[must_use]
    pub fn index(&self) -> u64 {
        self.index
    }

    pub(crate) fn set_index(&mut self, index: u64) {
        self.index = index;
    }

    /// Reads a node parameter.
    #[must_use]
    pub fn get_parameter(&self, name: &str) -> Option<&Value> {
        self.parameters.get(name)
    }

    /// Reads a node parameter as a string slice, if it is one.
    #[must_use]
    pub fn parameter_str(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).and_then(Value::as_str)
    }

    /// Writes a node parameter.
    pub fn set_parameter(&mut self, name: impl Into<String>, value: Value) {
        self.parameters.insert(name.into(), value);
    }

    #[must_use]
    pub fn parameters(&self) -> &FxIndexMap<String, Value> {
        &self.parameters
    }

    /// The node's scratch state.
    #[must_use]
    pub fn state(&self) -> &FxIndexMap<String, Value> {
        &self.state
    }

    /// Writes one scratch state entry.
    pub fn set_state(&mut self, key: impl Into<String>, value: Value) {
        self.state.insert(key.into(), value);
    }

    #[must_use]
    pub fn gate(&self, name: &str) -> Option<&Gate> {
        self.gates.get(name)
    }

    pub fn gate_mut(&mut self, name: &str) -> Option<&mut Gate> {
        self.gates.get_mut(name)
    }

    #[must_use]
    pub fn slot(&self, name: &str) -> Option<&Slot> {
        self.slots.get(name)
    }

    pub fn slot_mut(&mut self, name: &str) -> Option<&mut Slot> {
        self.slots.get_mut(name)
    }

    pub fn gate_names(&self) -> impl Iterator<Item = &str> {
        self.gates.keys().map(String::as_str)
    }

    pub fn slot_names(&self) -> impl Iterator<Item = &str> {
        self.slots.keys().map(String::as_str)
    }

    /// The scalar activation of the node, mirroring the default sheaf of
    /// the `gen` gate.
    #[must_use]
    pub fn activation(&self) -> f64 {
        self.activation
    }

    /// Forces the node's activation, priming the default sheaf of every
    /// gate with the value. The activated node presents the activation on
    /// all of its output terminals until its node function next runs.
    pub fn set_activation(&mut self, activation: f64) {
        for gate in self.gates.values_mut() {
            gate.set_activation(DEFAULT_SHEAF, activation);
        }
        self.activation = activation;
    }

    /// Uids of every link touching this node, outgoing and incoming.
    #[must_use]
    pub fn associated_link_uids(&self) -> Vec<String> {
        let mut uids: Vec<String> = Vec::new();
        for gate in self.gates.values() {
            uids.extend(gate.outgoing().map(str::to_string));
        }
        for slot in self.slots.values() {
            uids.extend(slot.incoming().map(str::to_string));
        }
        uids
    }

    /// The sheaf universe of this node: every lane present on any slot or
    /// on the `gen` gate. Node functions evaluate their gates once per
    /// lane in this set.
    #[must_use]
    pub fn sheaf_universe(&self) -> Vec<String> {
        let mut lanes: Vec<String> = Vec::new();
        if let Some(gen) = self.gates.get("gen") {
            for id in gen.sheaves().keys() {
                if !lanes.contains(id) {
                    lanes.push(id.clone());
                }
            }
        }
        for slot in self.slots.values() {
            for id in slot.sheaves().keys() {
                if !lanes.contains(id) {
                    lanes.push(id.clone());
                }
            }
        }
        lanes
    }
}

/// The built-in node functions dispatched through the nodetype registry.
pub(crate) mod builtins {
    use tracing::warn;

    use crate::error::NetResult;
    use crate::net::netapi::NetApi;
    use crate::net::sheaf::DEFAULT_SHEAF;

    /// Passes the gen input through the gen gate function.
    pub(crate) fn register(api: &mut NetApi<'_, '_>, node_uid: &str) -> NetResult<()> {
        let lanes = api.net().node_or_err(node_uid)?.sheaf_universe();
        for sheaf in lanes {
            let base = api.net().gen_input(node_uid, &sheaf)?;
            api.net_mut().run_gate_function(node_uid, "gen", &sheaf, base)?;
        }
        Ok(())
    }

    /// Drives the gen gate from the gen input and every directional gate
    /// from its slot sum plus that base.
    pub(crate) fn pipe(api: &mut NetApi<'_, '_>, node_uid: &str) -> NetResult<()> {
        let node = api.net().node_or_err(node_uid)?;
        let lanes = node.sheaf_universe();
        let gate_names: Vec<String> = node.gate_names().map(str::to_string).collect();

        for sheaf in lanes {
            let base = api.net().gen_input(node_uid, &sheaf)?;
            api.net_mut().run_gate_function(node_uid, "gen", &sheaf, base)?;
            for gate_name in &gate_names {
                if gate_name == "gen" {
                    continue;
                }
                let slot_sum = api
                    .net()
                    .node_or_err(node_uid)?
                    .slot(gate_name)
                    .map_or(0.0, |slot| slot.activation(&sheaf));
                api.net_mut()
                    .run_gate_function(node_uid, gate_name, &sheaf, slot_sum + base)?;
            }
        }
        Ok(())
    }

    /// Reads the bound datasource from the world adapter into the gen gate.
    pub(crate) fn sensor(api: &mut NetApi<'_, '_>, node_uid: &str) -> NetResult<()> {
        let datasource = api
            .net()
            .node_or_err(node_uid)?
            .parameter_str("datasource")
            .map(str::to_string);

        let value = match datasource {
            Some(ref name) => match api.world_mut() {
                Some(world) => world.read_datasource(name).unwrap_or_else(|| {
                    warn!(node = node_uid, datasource = %name, "unknown datasource");
                    0.0
                }),
                None => 0.0,
            },
            None => 0.0,
        };
        api.net_mut()
            .run_gate_function(node_uid, "gen", DEFAULT_SHEAF, value)
    }

    /// Copies the gen slot to the bound datatarget on the world adapter.
    pub(crate) fn actor(api: &mut NetApi<'_, '_>, node_uid: &str) -> NetResult<()> {
        let node = api.net().node_or_err(node_uid)?;
        let value = node
            .slot("gen")
            .map_or(0.0, |slot| slot.activation(DEFAULT_SHEAF));
        let datatarget = node.parameter_str("datatarget").map(str::to_string);

        if let Some(name) = datatarget {
            if let Some(world) = api.world_mut() {
                world.write_datatarget(&name, value)?;
            }
        }
        api.net_mut()
            .run_gate_function(node_uid, "gen", DEFAULT_SHEAF, value)
    }

    /// Activators do nothing themselves; the step engine publishes their
    /// activation to the nodespace after the activator class has run.
    pub(crate) fn activator(_api: &mut NetApi<'_, '_>, _node_uid: &str) -> NetResult<()> {
        Ok(())
    }
}
