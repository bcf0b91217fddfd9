//! The central data structure: one complete agent graph.

use serde_json::Value;
use tracing::info;

use crate::error::{NetError, NetResult};
use crate::net::link::Link;
use crate::net::locks::LockRegistry;
use crate::net::monitor::{Monitor, TerminalKind};
use crate::net::node::Node;
use crate::net::nodespace::Nodespace;
use crate::net::nodetype::{NodetypeRegistry, STANDARD_NODETYPES};
use crate::net::FxIndexMap;
use crate::uid::{generate_uid, ROOT_UID};

mod merge;
mod step;

pub use self::step::{StepReport, UserPrompt};

/// A complete MicroPsi-style agent: the node graph, its monitors and its
/// locks.
///
/// All entities live in per-kind maps keyed by uid and reference each other
/// by uid only; the nodenet is the single owner of everything it contains.
/// Maps iterate in insertion order, which is what makes stepping
/// deterministic for a given construction sequence.
#[derive(Debug)]
pub struct Nodenet {
    uid: String,
    name: String,
    owner: String,
    /// Uid of the world this net is embedded in, if any.
    world: Option<String>,
    /// Name of the world adapter serving sensors and actors.
    worldadapter: Option<String>,
    settings: FxIndexMap<String, Value>,
    current_step: u64,
    is_active: bool,
    max_coords: (f64, f64),
    entity_index: u64,
    registry: NodetypeRegistry,
    pub(crate) nodespaces: FxIndexMap<String, Nodespace>,
    pub(crate) nodes: FxIndexMap<String, Node>,
    pub(crate) links: FxIndexMap<String, Link>,
    pub(crate) monitors: FxIndexMap<String, Monitor>,
    pub(crate) locks: LockRegistry,
    pub(crate) deferred_unlocks: Vec<String>,
    pub(crate) user_prompt: Option<UserPrompt>,
}

impl Nodenet {
    /// Creates an empty net containing only the root nodespace.
    #[must_use]
    pub fn new(uid: Option<String>, name: impl Into<String>, owner: impl Into<String>) -> Self {
        let uid = uid.unwrap_or_else(generate_uid);
        let name = name.into();
        info!(uid = %uid, name = %name, "setting up nodenet");

        let mut net = Self {
            uid,
            name,
            owner: owner.into(),
            world: None,
            worldadapter: None,
            settings: FxIndexMap::default(),
            current_step: 0,
            is_active: false,
            max_coords: (0.0, 0.0),
            entity_index: 0,
            registry: NodetypeRegistry::standard(),
            nodespaces: FxIndexMap::default(),
            nodes: FxIndexMap::default(),
            links: FxIndexMap::default(),
            monitors: FxIndexMap::default(),
            locks: LockRegistry::new(),
            deferred_unlocks: Vec::new(),
            user_prompt: None,
        };
        net.insert_root();
        net
    }

    fn insert_root(&mut self) {
        // the root keeps index 0 across clears so exports stay stable
        self.nodespaces.insert(
            ROOT_UID.to_string(),
            Nodespace::new(ROOT_UID, None, ROOT_UID, (0.0, 0.0), 0),
        );
        if self.entity_index == 0 {
            self.entity_index = 1;
        }
    }

    pub(crate) fn next_index(&mut self) -> u64 {
        let index = self.entity_index;
        self.entity_index += 1;
        index
    }

    #[must_use]
    pub fn uid(&self) -> &str {
        &self.uid
    }

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
    pub fn owner(&self) -> &str {
        &self.owner
    }

    #[must_use]
    pub fn current_step(&self) -> u64 {
        self.current_step
    }

    pub(crate) fn set_current_step(&mut self, step: u64) {
        self.current_step = step;
    }

    pub(crate) fn advance_step(&mut self) {
        self.current_step += 1;
    }

    /// Whether a runner should keep scheduling steps for this net.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.is_active
    }

    pub fn set_active(&mut self, active: bool) {
        self.is_active = active;
    }

    /// The world this net is bound to, if any.
    #[must_use]
    pub fn world(&self) -> Option<&str> {
        self.world.as_deref()
    }

    pub fn set_world(&mut self, world: Option<String>) {
        self.world = world;
    }

    /// The name of the bound world adapter, if any.
    #[must_use]
    pub fn worldadapter(&self) -> Option<&str> {
        self.worldadapter.as_deref()
    }

    pub fn set_worldadapter(&mut self, worldadapter: Option<String>) {
        self.worldadapter = worldadapter;
    }

    #[must_use]
    pub fn settings(&self) -> &FxIndexMap<String, Value> {
        &self.settings
    }

    pub fn set_setting(&mut self, key: impl Into<String>, value: Value) {
        self.settings.insert(key.into(), value);
    }

    /// The largest node position seen, as advisory canvas bounds.
    #[must_use]
    pub fn max_coords(&self) -> (f64, f64) {
        self.max_coords
    }

    /// The nodetype catalog of this net.
    #[must_use]
    pub fn registry(&self) -> &NodetypeRegistry {
        &self.registry
    }

    pub(crate) fn registry_mut(&mut self) -> &mut NodetypeRegistry {
        &mut self.registry
    }

    /// The pending user prompt, if a node function raised one.
    #[must_use]
    pub fn user_prompt(&self) -> Option<&UserPrompt> {
        self.user_prompt.as_ref()
    }

    /// Clears the pending user prompt; the caller resumes the net
    /// afterwards.
    pub fn clear_user_prompt(&mut self) {
        self.user_prompt = None;
    }

    // -- lookups ---------------------------------------------------------

    #[must_use]
    pub fn is_node(&self, uid: &str) -> bool {
        self.nodes.contains_key(uid)
    }

    #[must_use]
    pub fn is_nodespace(&self, uid: &str) -> bool {
        self.nodespaces.contains_key(uid)
    }

    #[must_use]
    pub fn node(&self, uid: &str) -> Option<&Node> {
        self.nodes.get(uid)
    }

    pub fn node_mut(&mut self, uid: &str) -> Option<&mut Node> {
        self.nodes.get_mut(uid)
    }

    /// Looks up a node, reporting a [`NetError::NotFound`] if absent.
    pub fn node_or_err(&self, uid: &str) -> NetResult<&Node> {
        self.nodes
            .get(uid)
            .ok_or_else(|| NetError::NotFound(uid.to_string()))
    }

    pub fn node_mut_or_err(&mut self, uid: &str) -> NetResult<&mut Node> {
        self.nodes
            .get_mut(uid)
            .ok_or_else(|| NetError::NotFound(uid.to_string()))
    }

    #[must_use]
    pub fn nodespace(&self, uid: &str) -> Option<&Nodespace> {
        self.nodespaces.get(uid)
    }

    pub fn nodespace_or_err(&self, uid: &str) -> NetResult<&Nodespace> {
        self.nodespaces
            .get(uid)
            .ok_or_else(|| NetError::NotFound(uid.to_string()))
    }

    pub fn nodespace_mut_or_err(&mut self, uid: &str) -> NetResult<&mut Nodespace> {
        self.nodespaces
            .get_mut(uid)
            .ok_or_else(|| NetError::NotFound(uid.to_string()))
    }

    #[must_use]
    pub fn link(&self, uid: &str) -> Option<&Link> {
        self.links.get(uid)
    }

    pub fn link_or_err(&self, uid: &str) -> NetResult<&Link> {
        self.links
            .get(uid)
            .ok_or_else(|| NetError::NotFound(uid.to_string()))
    }

    #[must_use]
    pub fn monitor(&self, uid: &str) -> Option<&Monitor> {
        self.monitors.get(uid)
    }

    pub fn node_uids(&self) -> Vec<String> {
        self.nodes.keys().cloned().collect()
    }

    pub fn nodespace_uids(&self) -> Vec<String> {
        self.nodespaces.keys().cloned().collect()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.links.values()
    }

    pub fn monitors(&self) -> impl Iterator<Item = &Monitor> {
        self.monitors.values()
    }

    // -- nodespace tree --------------------------------------------------

    /// Creates a nodespace under an existing parent.
    ///
    /// # Errors
    ///
    /// [`NetError::NotFound`] if the parent does not exist.
    pub fn create_nodespace(
        &mut self,
        parent_uid: &str,
        name: &str,
        position: (f64, f64),
        uid: Option<String>,
    ) -> NetResult<String> {
        if !self.is_nodespace(parent_uid) {
            return Err(NetError::NotFound(parent_uid.to_string()));
        }
        let uid = uid.unwrap_or_else(generate_uid);
        let index = self.next_index();
        self.nodespaces.insert(
            uid.clone(),
            Nodespace::new(&uid, Some(parent_uid.to_string()), name, position, index),
        );
        self.nodespaces[parent_uid].children.insert(uid.clone());
        Ok(uid)
    }

    /// Moves a nodespace under a new parent.
    ///
    /// # Errors
    ///
    /// Root cannot be moved; moving a nodespace into its own subtree is
    /// rejected.
    pub fn move_nodespace(&mut self, uid: &str, new_parent: &str) -> NetResult<()> {
        if uid == ROOT_UID {
            return Err(NetError::InvalidArgument(
                "the root nodespace cannot be moved".to_string(),
            ));
        }
        self.nodespace_or_err(uid)?;
        self.nodespace_or_err(new_parent)?;

        let mut cursor = Some(new_parent.to_string());
        while let Some(current) = cursor {
            if current == uid {
                return Err(NetError::InvalidArgument(format!(
                    "cannot move nodespace {uid} into its own subtree"
                )));
            }
            cursor = self
                .nodespaces
                .get(&current)
                .and_then(|ns| ns.parent_nodespace())
                .map(str::to_string);
        }

        let old_parent = self.nodespaces[uid]
            .parent_nodespace()
            .expect("non-root nodespace has a parent")
            .to_string();
        self.nodespaces[&old_parent].children.shift_remove(uid);
        self.nodespaces[new_parent].children.insert(uid.to_string());
        self.nodespaces[uid].set_parent_nodespace(Some(new_parent.to_string()));
        Ok(())
    }

    /// Deletes a nodespace and everything it contains, deepest first.
    ///
    /// # Errors
    ///
    /// Root cannot be deleted.
    pub fn delete_nodespace(&mut self, uid: &str) -> NetResult<()> {
        if uid == ROOT_UID {
            return Err(NetError::InvalidArgument(
                "the root nodespace cannot be deleted".to_string(),
            ));
        }
        self.nodespace_or_err(uid)?;

        let children: Vec<String> = self.nodespaces[uid].children().map(str::to_string).collect();
        for child in children {
            self.delete_nodespace(&child)?;
        }
        let nodes: Vec<String> = self.nodespaces[uid].nodes().map(str::to_string).collect();
        for node in nodes {
            self.delete_node(&node)?;
        }

        let parent = self.nodespaces[uid].parent_nodespace().map(str::to_string);
        if let Some(parent) = parent {
            if let Some(parent) = self.nodespaces.get_mut(&parent) {
                parent.children.shift_remove(uid);
            }
        }
        self.nodespaces.shift_remove(uid);
        Ok(())
    }

    // -- node lifecycle --------------------------------------------------

    /// Creates a node of a known type inside an existing nodespace.
    ///
    /// # Errors
    ///
    /// [`NetError::InvalidArgument`] for an unknown nodetype,
    /// [`NetError::NotFound`] for a missing nodespace.
    pub fn create_node(
        &mut self,
        nodetype: &str,
        nodespace_uid: &str,
        name: &str,
        position: (f64, f64),
        uid: Option<String>,
    ) -> NetResult<String> {
        let Some(definition) = self.registry.get(nodetype).cloned() else {
            return Err(NetError::InvalidArgument(format!(
                "unknown nodetype '{nodetype}'"
            )));
        };
        if !self.is_nodespace(nodespace_uid) {
            return Err(NetError::NotFound(nodespace_uid.to_string()));
        }

        let uid = uid.unwrap_or_else(generate_uid);
        let index = self.next_index();
        let node = Node::new(&uid, &definition, nodespace_uid, name, position, index);
        self.nodes.insert(uid.clone(), node);
        self.nodespaces[nodespace_uid].nodes.insert(uid.clone());
        self.register_activator(&uid);
        self.track_position(position);
        Ok(uid)
    }

    /// Deletes a node and every link touching it.
    pub fn delete_node(&mut self, uid: &str) -> NetResult<()> {
        let node = self.node_or_err(uid)?;
        let parent = node.parent_nodespace().to_string();
        let activator_type = if node.nodetype() == "Activator" {
            node.parameter_str("type").map(str::to_string)
        } else {
            None
        };

        for link_uid in self.node_or_err(uid)?.associated_link_uids() {
            self.remove_link(&link_uid);
        }
        if let Some(nodespace) = self.nodespaces.get_mut(&parent) {
            nodespace.nodes.shift_remove(uid);
            if let Some(activator_type) = activator_type {
                if nodespace.activator_node(&activator_type) == Some(uid) {
                    nodespace.activator_nodes.shift_remove(&activator_type);
                    nodespace.activators.shift_remove(&activator_type);
                }
            }
        }
        self.nodes.shift_remove(uid);
        Ok(())
    }

    /// Registers an Activator node with its nodespace, keyed by its `type`
    /// parameter.
    pub(crate) fn register_activator(&mut self, uid: &str) {
        let Some(node) = self.nodes.get(uid) else {
            return;
        };
        if node.nodetype() != "Activator" {
            return;
        }
        let Some(activator_type) = node.parameter_str("type").map(str::to_string) else {
            return;
        };
        let nodespace = node.parent_nodespace().to_string();
        if let Some(nodespace) = self.nodespaces.get_mut(&nodespace) {
            nodespace
                .activator_nodes
                .insert(activator_type, uid.to_string());
        }
    }

    fn track_position(&mut self, position: (f64, f64)) {
        if position.0 > self.max_coords.0 {
            self.max_coords.0 = position.0;
        }
        if position.1 > self.max_coords.1 {
            self.max_coords.1 = position.1;
        }
    }

    /// Recomputes the advisory canvas bounds from all node positions.
    pub(crate) fn refresh_max_coords(&mut self) {
        self.max_coords = (0.0, 0.0);
        let positions: Vec<(f64, f64)> = self.nodes.values().map(Node::position).collect();
        for position in positions {
            self.track_position(position);
        }
    }

    /// Repositions a node.
    pub fn set_node_position(&mut self, uid: &str, position: (f64, f64)) -> NetResult<()> {
        self.node_mut_or_err(uid)?.set_position(position);
        self.refresh_max_coords();
        Ok(())
    }

    /// Renames a node.
    pub fn set_node_name(&mut self, uid: &str, name: &str) -> NetResult<()> {
        self.node_mut_or_err(uid)?.set_name(name);
        Ok(())
    }

    /// Forces a node's activation onto all of its gates.
    pub fn set_node_activation(&mut self, uid: &str, activation: f64) -> NetResult<()> {
        self.node_mut_or_err(uid)?.set_activation(activation);
        Ok(())
    }

    /// Applies node parameters. An explicit `null` or empty-string value
    /// resets the parameter to its nodetype default.
    pub fn set_node_parameters(
        &mut self,
        uid: &str,
        parameters: impl IntoIterator<Item = (String, Value)>,
    ) -> NetResult<()> {
        let nodetype = self.node_or_err(uid)?.nodetype().to_string();
        let defaults = self
            .registry
            .get(&nodetype)
            .map(|nt| nt.parameter_defaults().clone())
            .unwrap_or_default();

        let node = self.node_mut_or_err(uid)?;
        for (key, value) in parameters {
            let reset = value.is_null() || value.as_str() == Some("");
            if reset {
                match defaults.get(&key) {
                    Some(default) => node.set_parameter(key, default.clone()),
                    None => {
                        node.parameters.shift_remove(&key);
                    }
                }
            } else {
                node.set_parameter(key, value);
            }
        }
        self.register_activator(uid);
        Ok(())
    }

    /// Applies gate parameter overrides to one gate of one node.
    ///
    /// # Errors
    ///
    /// [`NetError::InvalidArgument`] for an unknown gate or parameter name.
    pub fn set_gate_parameters(
        &mut self,
        uid: &str,
        gate_name: &str,
        parameters: impl IntoIterator<Item = (String, Value)>,
    ) -> NetResult<()> {
        let node = self.node_mut_or_err(uid)?;
        let Some(gate) = node.gate_mut(gate_name) else {
            return Err(NetError::InvalidArgument(format!(
                "node has no gate '{gate_name}'"
            )));
        };
        for (key, value) in parameters {
            gate.parameters_mut().set(&key, &value)?;
        }
        Ok(())
    }

    // -- links -----------------------------------------------------------

    /// Creates a link, or updates weight and certainty if the same
    /// (gate, slot) pair is already connected.
    ///
    /// # Errors
    ///
    /// [`NetError::NotFound`] for missing nodes,
    /// [`NetError::InvalidArgument`] for missing terminals.
    pub fn create_link(
        &mut self,
        source_node_uid: &str,
        gate_name: &str,
        target_node_uid: &str,
        slot_name: &str,
        weight: f64,
        certainty: f64,
    ) -> NetResult<String> {
        self.create_link_with_uid(
            None,
            source_node_uid,
            gate_name,
            target_node_uid,
            slot_name,
            weight,
            certainty,
        )
    }

    /// Like [`Nodenet::create_link`], but reuses a persisted link uid when
    /// it is still free.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn create_link_with_uid(
        &mut self,
        uid: Option<String>,
        source_node_uid: &str,
        gate_name: &str,
        target_node_uid: &str,
        slot_name: &str,
        weight: f64,
        certainty: f64,
    ) -> NetResult<String> {
        let source = self.node_or_err(source_node_uid)?;
        if source.gate(gate_name).is_none() {
            return Err(NetError::InvalidArgument(format!(
                "node {source_node_uid} has no gate '{gate_name}'"
            )));
        }
        let target = self.node_or_err(target_node_uid)?;
        if target.slot(slot_name).is_none() {
            return Err(NetError::InvalidArgument(format!(
                "node {target_node_uid} has no slot '{slot_name}'"
            )));
        }

        // idempotent update if the pair is already linked
        let existing = self.nodes[source_node_uid]
            .gate(gate_name)
            .expect("checked above")
            .outgoing()
            .find(|link_uid| {
                self.links.get(*link_uid).is_some_and(|link| {
                    link.connects(source_node_uid, gate_name, target_node_uid, slot_name)
                })
            })
            .map(str::to_string);
        if let Some(link_uid) = existing {
            let link = self.links.get_mut(&link_uid).expect("resolved above");
            link.weight = weight;
            link.certainty = certainty;
            return Ok(link_uid);
        }

        let link_uid = uid
            .filter(|candidate| !self.links.contains_key(candidate))
            .unwrap_or_else(generate_uid);
        self.links.insert(
            link_uid.clone(),
            Link {
                uid: link_uid.clone(),
                source_node_uid: source_node_uid.to_string(),
                source_gate_name: gate_name.to_string(),
                target_node_uid: target_node_uid.to_string(),
                target_slot_name: slot_name.to_string(),
                weight,
                certainty,
            },
        );
        self.nodes[source_node_uid]
            .gate_mut(gate_name)
            .expect("checked above")
            .outgoing
            .insert(link_uid.clone());
        self.nodes[target_node_uid]
            .slot_mut(slot_name)
            .expect("checked above")
            .incoming
            .insert(link_uid.clone());
        Ok(link_uid)
    }

    /// Removes a link by uid from the map and both terminal sets.
    pub(crate) fn remove_link(&mut self, link_uid: &str) {
        let Some(link) = self.links.shift_remove(link_uid) else {
            return;
        };
        if let Some(source) = self.nodes.get_mut(&link.source_node_uid) {
            if let Some(gate) = source.gate_mut(&link.source_gate_name) {
                gate.outgoing.shift_remove(link_uid);
            }
        }
        if let Some(target) = self.nodes.get_mut(&link.target_node_uid) {
            if let Some(slot) = target.slot_mut(&link.target_slot_name) {
                slot.incoming.shift_remove(link_uid);
            }
        }
    }

    /// Deletes every link originating at the given node that matches all
    /// supplied filters; a `None` filter matches anything. Returns the
    /// number of links removed.
    pub fn unlink(
        &mut self,
        source_node_uid: &str,
        gate_name: Option<&str>,
        target_node_uid: Option<&str>,
        slot_name: Option<&str>,
    ) -> NetResult<usize> {
        let source = self.node_or_err(source_node_uid)?;
        let mut doomed: Vec<String> = Vec::new();
        for link in source.associated_link_uids() {
            let Some(link) = self.links.get(&link) else {
                continue;
            };
            if link.source_node_uid != source_node_uid {
                continue;
            }
            if gate_name.is_some_and(|g| g != link.source_gate_name) {
                continue;
            }
            if target_node_uid.is_some_and(|t| t != link.target_node_uid) {
                continue;
            }
            if slot_name.is_some_and(|s| s != link.target_slot_name) {
                continue;
            }
            // self-links show up in both terminal sets
            if !doomed.contains(&link.uid) {
                doomed.push(link.uid.clone());
            }
        }
        for link_uid in &doomed {
            self.remove_link(link_uid);
        }
        Ok(doomed.len())
    }

    // -- class queries ---------------------------------------------------

    /// Uids of all Activator nodes, optionally restricted to one nodespace
    /// and one activator type.
    #[must_use]
    pub fn get_activators(
        &self,
        nodespace: Option<&str>,
        activator_type: Option<&str>,
    ) -> Vec<String> {
        self.nodes_of_type("Activator", nodespace)
            .into_iter()
            .filter(|uid| {
                activator_type.is_none()
                    || self.nodes[uid].parameter_str("type") == activator_type
            })
            .collect()
    }

    /// Uids of all Sensor nodes, optionally restricted to one nodespace.
    #[must_use]
    pub fn get_sensors(&self, nodespace: Option<&str>) -> Vec<String> {
        self.nodes_of_type("Sensor", nodespace)
    }

    /// Uids of all Actor nodes, optionally restricted to one nodespace.
    #[must_use]
    pub fn get_actors(&self, nodespace: Option<&str>) -> Vec<String> {
        self.nodes_of_type("Actor", nodespace)
    }

    /// Uids of all native-module nodes, optionally restricted to one
    /// nodespace.
    #[must_use]
    pub fn get_nativemodules(&self, nodespace: Option<&str>) -> Vec<String> {
        self.filtered_nodes(nodespace, |node| {
            !STANDARD_NODETYPES.contains(&node.nodetype())
        })
    }

    fn nodes_of_type(&self, nodetype: &str, nodespace: Option<&str>) -> Vec<String> {
        self.filtered_nodes(nodespace, |node| node.nodetype() == nodetype)
    }

    fn filtered_nodes(
        &self,
        nodespace: Option<&str>,
        predicate: impl Fn(&Node) -> bool,
    ) -> Vec<String> {
        self.nodes
            .values()
            .filter(|node| nodespace.is_none_or(|ns| node.parent_nodespace() == ns))
            .filter(|node| predicate(node))
            .map(|node| node.uid().to_string())
            .collect()
    }

    // -- locks -----------------------------------------------------------

    /// True if a lock of the given name is held.
    #[must_use]
    pub fn is_locked(&self, name: &str) -> bool {
        self.locks.is_locked(name)
    }

    /// True if a lock of the given name is held with the given key.
    #[must_use]
    pub fn is_locked_by(&self, name: &str, key: &str) -> bool {
        self.locks.is_locked_by(name, key)
    }

    /// Acquires a lock that times out after `ttl` steps.
    ///
    /// # Errors
    ///
    /// [`NetError::LockConflict`] if the name is already locked.
    pub fn lock(&mut self, name: &str, key: &str, ttl: u64) -> NetResult<()> {
        self.locks.lock(name, key, ttl)
    }

    /// Releases a lock immediately.
    pub fn unlock(&mut self, name: &str) {
        self.locks.unlock(name);
    }

    // -- monitors --------------------------------------------------------

    /// Attaches a monitor to a gate or slot of an existing node.
    ///
    /// # Errors
    ///
    /// [`NetError::NotFound`] for a missing node,
    /// [`NetError::InvalidArgument`] for a missing terminal.
    pub fn add_monitor(
        &mut self,
        node_uid: &str,
        kind: TerminalKind,
        terminal_name: &str,
        sheaf: Option<&str>,
    ) -> NetResult<String> {
        let node = self.node_or_err(node_uid)?;
        let present = match kind {
            TerminalKind::Gate => node.gate(terminal_name).is_some(),
            TerminalKind::Slot => node.slot(terminal_name).is_some(),
        };
        if !present {
            return Err(NetError::InvalidArgument(format!(
                "node {node_uid} has no such terminal '{terminal_name}'"
            )));
        }

        let uid = generate_uid();
        self.monitors.insert(
            uid.clone(),
            Monitor::new(
                &uid,
                node_uid,
                kind,
                terminal_name,
                sheaf.unwrap_or(crate::net::sheaf::DEFAULT_SHEAF),
            ),
        );
        Ok(uid)
    }

    /// Detaches a monitor.
    pub fn remove_monitor(&mut self, uid: &str) -> NetResult<()> {
        self.monitors
            .shift_remove(uid)
            .map(|_| ())
            .ok_or_else(|| NetError::NotFound(uid.to_string()))
    }

    /// Drops the recorded values of a monitor, keeping it attached.
    pub fn clear_monitor(&mut self, uid: &str) -> NetResult<()> {
        self.monitors
            .get_mut(uid)
            .map(Monitor::clear)
            .ok_or_else(|| NetError::NotFound(uid.to_string()))
    }
}
