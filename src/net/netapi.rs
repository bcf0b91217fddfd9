//! The facade node functions and recipes use to read and mutate the net.

use serde_json::Value;

use crate::error::{NetError, NetResult};
use crate::net::gate::GateFunction;
use crate::net::node::Node;
use crate::net::nodenet::{Nodenet, UserPrompt};
use crate::net::nodespace::Nodespace;
use crate::net::sheaf::DEFAULT_SHEAF;
use crate::world::WorldAdapter;

/// The reciprocal link pairings understood by
/// [`NetApi::link_with_reciprocal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReciprocalType {
    /// sub forward, sur backward.
    SubSur,
    /// por forward, ret backward.
    PorRet,
    /// cat forward, exp backward.
    CatExp,
    /// sym forward, ref backward.
    SymRef,
}

impl ReciprocalType {
    /// Parses the lowercase wire name (`subsur`, `porret`, `catexp`,
    /// `symref`).
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "subsur" => Self::SubSur,
            "porret" => Self::PorRet,
            "catexp" => Self::CatExp,
            "symref" => Self::SymRef,
            _ => return None,
        })
    }

    fn gates(self) -> (&'static str, &'static str) {
        match self {
            Self::SubSur => ("sub", "sur"),
            Self::PorRet => ("por", "ret"),
            Self::CatExp => ("cat", "exp"),
            Self::SymRef => ("sym", "ref"),
        }
    }
}

/// The stable surface node functions and recipes run against.
///
/// A `NetApi` borrows the net (and the world adapter, if one is bound) for
/// the duration of one step or one recipe run. Mutations take effect
/// immediately for everything evaluated later in the same tick; they never
/// rewrite propagation that already happened.
pub struct NetApi<'a, 'w> {
    net: &'a mut Nodenet,
    world: Option<&'w mut dyn WorldAdapter>,
}

impl<'a, 'w> NetApi<'a, 'w> {
    /// Wraps the net and an optional world adapter.
    pub fn new(net: &'a mut Nodenet, world: Option<&'w mut dyn WorldAdapter>) -> Self {
        Self { net, world }
    }

    /// The uid of the nodenet.
    #[must_use]
    pub fn uid(&self) -> &str {
        self.net.uid()
    }

    /// The current simulation step.
    #[must_use]
    pub fn step(&self) -> u64 {
        self.net.current_step()
    }

    /// A tracing span scoped to this nodenet, for node functions that want
    /// structured output.
    #[must_use]
    pub fn logger(&self) -> tracing::Span {
        tracing::info_span!("nodenet", uid = %self.net.uid())
    }

    /// Read access to the whole net.
    #[must_use]
    pub fn net(&self) -> &Nodenet {
        self.net
    }

    /// Full mutable access to the net, for behaviors the named methods do
    /// not cover.
    pub fn net_mut(&mut self) -> &mut Nodenet {
        self.net
    }

    /// The bound world adapter, if any.
    pub fn world_mut(&mut self) -> Option<&mut dyn WorldAdapter> {
        match &mut self.world {
            Some(world) => Some(&mut **world),
            None => None,
        }
    }

    // -- lookups ---------------------------------------------------------

    /// The node with the given uid.
    ///
    /// # Errors
    ///
    /// [`NetError::NotFound`] if it does not exist.
    pub fn get_node(&self, uid: &str) -> NetResult<&Node> {
        self.net.node_or_err(uid)
    }

    /// The nodespace with the given uid.
    pub fn get_nodespace(&self, uid: &str) -> NetResult<&Nodespace> {
        self.net.nodespace_or_err(uid)
    }

    /// Uids of the nodes in the given nodespace (anywhere if `None`) whose
    /// names start with the given prefix (all if `None`).
    #[must_use]
    pub fn get_nodes(&self, nodespace: Option<&str>, name_prefix: Option<&str>) -> Vec<String> {
        self.net
            .nodes()
            .filter(|node| nodespace.is_none_or(|ns| node.parent_nodespace() == ns))
            .filter(|node| name_prefix.is_none_or(|prefix| node.name().starts_with(prefix)))
            .map(|node| node.uid().to_string())
            .collect()
    }

    /// Uids of the nodes reachable over links leaving the given node,
    /// optionally restricted to one gate and one nodespace. Candidates
    /// that have outgoing links on any of the `excluded_gate_types` are
    /// skipped.
    pub fn get_nodes_in_gate_field(
        &self,
        node_uid: &str,
        gate: Option<&str>,
        excluded_gate_types: Option<&[&str]>,
        nodespace: Option<&str>,
    ) -> NetResult<Vec<String>> {
        let node = self.net.node_or_err(node_uid)?;
        let gates: Vec<String> = match gate {
            Some(gate) => vec![gate.to_string()],
            None => node.gate_names().map(str::to_string).collect(),
        };

        let mut found = Vec::new();
        for gate_name in gates {
            let Some(gate) = node.gate(&gate_name) else {
                continue;
            };
            for link_uid in gate.outgoing() {
                let Some(link) = self.net.link(link_uid) else {
                    continue;
                };
                let Some(candidate) = self.net.node(&link.target_node_uid) else {
                    continue;
                };
                if self.field_candidate_passes(candidate, excluded_gate_types, nodespace)
                    && !found.contains(&candidate.uid().to_string())
                {
                    found.push(candidate.uid().to_string());
                }
            }
        }
        Ok(found)
    }

    /// Uids of the nodes linking into the given node, optionally
    /// restricted to one slot and one nodespace; the symmetric variant of
    /// [`NetApi::get_nodes_in_gate_field`].
    pub fn get_nodes_in_slot_field(
        &self,
        node_uid: &str,
        slot: Option<&str>,
        excluded_gate_types: Option<&[&str]>,
        nodespace: Option<&str>,
    ) -> NetResult<Vec<String>> {
        let node = self.net.node_or_err(node_uid)?;
        let slots: Vec<String> = match slot {
            Some(slot) => vec![slot.to_string()],
            None => node.slot_names().map(str::to_string).collect(),
        };

        let mut found = Vec::new();
        for slot_name in slots {
            let Some(slot) = node.slot(&slot_name) else {
                continue;
            };
            for link_uid in slot.incoming() {
                let Some(link) = self.net.link(link_uid) else {
                    continue;
                };
                let Some(candidate) = self.net.node(&link.source_node_uid) else {
                    continue;
                };
                if self.field_candidate_passes(candidate, excluded_gate_types, nodespace)
                    && !found.contains(&candidate.uid().to_string())
                {
                    found.push(candidate.uid().to_string());
                }
            }
        }
        Ok(found)
    }

    fn field_candidate_passes(
        &self,
        candidate: &Node,
        excluded_gate_types: Option<&[&str]>,
        nodespace: Option<&str>,
    ) -> bool {
        if nodespace.is_some_and(|ns| candidate.parent_nodespace() != ns) {
            return false;
        }
        let Some(excluded) = excluded_gate_types else {
            return true;
        };
        !excluded.iter().any(|gate_name| {
            candidate
                .gate(gate_name)
                .is_some_and(|gate| gate.outgoing().count() > 0)
        })
    }

    /// Uids of the nodes in a nodespace whose activation reaches
    /// `min_activation`, optionally filtered by nodetype, on the given
    /// gate (the node activation if `None`) and sheaf.
    #[must_use]
    pub fn get_nodes_active(
        &self,
        nodespace: &str,
        nodetype: Option<&str>,
        min_activation: f64,
        gate: Option<&str>,
        sheaf: Option<&str>,
    ) -> Vec<String> {
        let sheaf = sheaf.unwrap_or(DEFAULT_SHEAF);
        self.get_nodes(Some(nodespace), None)
            .into_iter()
            .filter(|uid| {
                let node = self.net.node(uid).expect("listed");
                if nodetype.is_some_and(|t| node.nodetype() != t) {
                    return false;
                }
                let value = match gate {
                    Some(gate_name) => match node.gate(gate_name) {
                        Some(gate) => gate.activation(sheaf),
                        None => return false,
                    },
                    None => node
                        .gate("gen")
                        .map_or(node.activation(), |gate| gate.activation(sheaf)),
                };
                value >= min_activation
            })
            .collect()
    }

    // -- graph mutation --------------------------------------------------

    /// Creates a node (or, with nodetype `"Nodespace"`, a nodespace) in
    /// the given nodespace and returns its uid. The position is chosen
    /// beyond the current canvas bounds.
    pub fn create_node(
        &mut self,
        nodetype: &str,
        nodespace: &str,
        name: Option<&str>,
    ) -> NetResult<String> {
        let position = (self.net.max_coords().0 + 50.0, 100.0);
        let name = name.unwrap_or("");
        if nodetype == "Nodespace" {
            self.net.create_nodespace(nodespace, name, position, None)
        } else {
            self.net.create_node(nodetype, nodespace, name, position, None)
        }
    }

    /// Deletes a node (or nodespace) and all links connected to it.
    pub fn delete_node(&mut self, uid: &str) -> NetResult<()> {
        if self.net.is_nodespace(uid) {
            self.net.delete_nodespace(uid)
        } else {
            self.net.delete_node(uid)
        }
    }

    /// Creates or updates a link.
    pub fn link(
        &mut self,
        source_node: &str,
        source_gate: &str,
        target_node: &str,
        target_slot: &str,
        weight: f64,
        certainty: f64,
    ) -> NetResult<String> {
        self.net
            .create_link(source_node, source_gate, target_node, target_slot, weight, certainty)
    }

    /// Creates both directions of a reciprocal pairing between two nodes,
    /// falling back to the `gen` slot where the canonical slot is absent.
    pub fn link_with_reciprocal(
        &mut self,
        source_node: &str,
        target_node: &str,
        linktype: ReciprocalType,
        weight: f64,
        certainty: f64,
    ) -> NetResult<()> {
        let (forward, backward) = linktype.gates();
        let forward_slot = self.slot_or_gen(target_node, forward)?;
        let backward_slot = self.slot_or_gen(source_node, backward)?;
        self.net
            .create_link(source_node, forward, target_node, &forward_slot, weight, certainty)?;
        self.net
            .create_link(target_node, backward, source_node, &backward_slot, weight, certainty)?;
        Ok(())
    }

    fn slot_or_gen(&self, node_uid: &str, slot: &str) -> NetResult<String> {
        let node = self.net.node_or_err(node_uid)?;
        if node.slot(slot).is_some() {
            Ok(slot.to_string())
        } else {
            Ok("gen".to_string())
        }
    }

    /// Reciprocally links every node of the list to every other node of
    /// the list.
    pub fn link_full(
        &mut self,
        node_uids: &[String],
        linktype: ReciprocalType,
        weight: f64,
        certainty: f64,
    ) -> NetResult<()> {
        for source in node_uids {
            for target in node_uids {
                if source == target {
                    continue;
                }
                self.link_with_reciprocal(source, target, linktype, weight, certainty)?;
            }
        }
        Ok(())
    }

    /// Deletes links originating at the given node, filtered by any subset
    /// of gate, target node and target slot.
    pub fn unlink(
        &mut self,
        source_node: &str,
        source_gate: Option<&str>,
        target_node: Option<&str>,
        target_slot: Option<&str>,
    ) -> NetResult<usize> {
        self.net
            .unlink(source_node, source_gate, target_node, target_slot)
    }

    /// Deletes all linkage of one direction at a node: links leaving the
    /// gate of that name and links arriving at the slot of that name.
    pub fn unlink_direction(&mut self, node_uid: &str, gateslot: Option<&str>) -> NetResult<()> {
        let node = self.net.node_or_err(node_uid)?;
        let mut doomed: Vec<String> = Vec::new();
        for link_uid in node.associated_link_uids() {
            let Some(link) = self.net.link(&link_uid) else {
                continue;
            };
            let outgoing_match = link.source_node_uid == node_uid
                && gateslot.is_none_or(|g| g == link.source_gate_name);
            let incoming_match = link.target_node_uid == node_uid
                && gateslot.is_none_or(|g| g == link.target_slot_name);
            if outgoing_match || incoming_match {
                doomed.push(link_uid);
            }
        }
        for link_uid in doomed {
            self.net.remove_link(&link_uid);
        }
        Ok(())
    }

    // -- sensor / actor wiring -------------------------------------------

    /// Links a node to the actor bound to `datatarget` in the node's
    /// nodespace, creating the actor if none exists. The link runs from
    /// the given gate (default `sub`) into the actor's `gen` slot.
    pub fn link_actor(
        &mut self,
        node_uid: &str,
        datatarget: &str,
        weight: f64,
        certainty: f64,
        gate: Option<&str>,
    ) -> NetResult<String> {
        let nodenet_uid = self.net.uid().to_string();
        let available = self
            .world
            .as_deref_mut()
            .map(|world| world.available_datatargets(&nodenet_uid))
            .unwrap_or_default();
        if !available.iter().any(|t| t == datatarget) {
            return Err(NetError::InvalidArgument(format!(
                "datatarget '{datatarget}' not found"
            )));
        }

        let nodespace = self.net.node_or_err(node_uid)?.parent_nodespace().to_string();
        let actor = self.find_or_create_bound_node("Actor", "datatarget", datatarget, &nodespace)?;
        self.net.create_link(
            node_uid,
            gate.unwrap_or("sub"),
            &actor,
            "gen",
            weight,
            certainty,
        )?;
        Ok(actor)
    }

    /// Links the sensor bound to `datasource` in the node's nodespace into
    /// the node, creating the sensor if none exists. The link runs from
    /// the sensor's `gen` gate into the given slot (default `sur`).
    pub fn link_sensor(
        &mut self,
        node_uid: &str,
        datasource: &str,
        slot: Option<&str>,
    ) -> NetResult<String> {
        let nodenet_uid = self.net.uid().to_string();
        let available = self
            .world
            .as_deref_mut()
            .map(|world| world.available_datasources(&nodenet_uid))
            .unwrap_or_default();
        if !available.iter().any(|s| s == datasource) {
            return Err(NetError::InvalidArgument(format!(
                "datasource '{datasource}' not found"
            )));
        }

        let nodespace = self.net.node_or_err(node_uid)?.parent_nodespace().to_string();
        let sensor = self.find_or_create_bound_node("Sensor", "datasource", datasource, &nodespace)?;
        let slot = self.slot_or_gen(node_uid, slot.unwrap_or("sur"))?;
        self.net
            .create_link(&sensor, "gen", node_uid, &slot, 1.0, 1.0)?;
        Ok(sensor)
    }

    /// Ensures an actor exists in the nodespace for every available
    /// datatarget (optionally filtered by name prefix); returns all their
    /// uids.
    pub fn import_actors(
        &mut self,
        nodespace: &str,
        datatarget_prefix: Option<&str>,
    ) -> NetResult<Vec<String>> {
        let nodenet_uid = self.net.uid().to_string();
        let Some(world) = self.world.as_deref_mut() else {
            return Ok(Vec::new());
        };
        let targets = world.available_datatargets(&nodenet_uid);

        let mut actors = Vec::new();
        for datatarget in targets {
            if datatarget_prefix.is_some_and(|prefix| !datatarget.starts_with(prefix)) {
                continue;
            }
            actors.push(self.find_or_create_bound_node(
                "Actor",
                "datatarget",
                &datatarget,
                nodespace,
            )?);
        }
        Ok(actors)
    }

    /// Ensures a sensor exists in the nodespace for every available
    /// datasource (optionally filtered by name prefix); returns all their
    /// uids.
    pub fn import_sensors(
        &mut self,
        nodespace: &str,
        datasource_prefix: Option<&str>,
    ) -> NetResult<Vec<String>> {
        let nodenet_uid = self.net.uid().to_string();
        let Some(world) = self.world.as_deref_mut() else {
            return Ok(Vec::new());
        };
        let sources = world.available_datasources(&nodenet_uid);

        let mut sensors = Vec::new();
        for datasource in sources {
            if datasource_prefix.is_some_and(|prefix| !datasource.starts_with(prefix)) {
                continue;
            }
            sensors.push(self.find_or_create_bound_node(
                "Sensor",
                "datasource",
                &datasource,
                nodespace,
            )?);
        }
        Ok(sensors)
    }

    fn find_or_create_bound_node(
        &mut self,
        nodetype: &str,
        parameter: &str,
        value: &str,
        nodespace: &str,
    ) -> NetResult<String> {
        let candidates = match nodetype {
            "Actor" => self.net.get_actors(Some(nodespace)),
            _ => self.net.get_sensors(Some(nodespace)),
        };
        for uid in candidates {
            if self.net.node_or_err(&uid)?.parameter_str(parameter) == Some(value) {
                return Ok(uid);
            }
        }
        let uid = self.create_node(nodetype, nodespace, Some(value))?;
        self.net
            .node_mut_or_err(&uid)?
            .set_parameter(parameter, Value::from(value));
        Ok(uid)
    }

    // -- gate functions --------------------------------------------------

    /// Installs (or, with `None`, removes) a gate function override for
    /// gates of the given type on nodes of the given type within a
    /// nodespace.
    pub fn set_gatefunction(
        &mut self,
        nodespace: &str,
        nodetype: &str,
        gate: &str,
        function_name: Option<&str>,
    ) -> NetResult<()> {
        let nodespace = self.net.nodespace_mut_or_err(nodespace)?;
        match function_name {
            None => nodespace.remove_gate_function(nodetype, gate),
            Some(name) => {
                let Some(function) = GateFunction::from_name(name) else {
                    return Err(NetError::InvalidArgument(format!(
                        "unknown gate function '{name}'"
                    )));
                };
                nodespace.set_gate_function(nodetype, gate, function);
            }
        }
        Ok(())
    }

    // -- locks -----------------------------------------------------------

    /// True if the given lock is held in the current net step.
    #[must_use]
    pub fn is_locked(&self, name: &str) -> bool {
        self.net.is_locked(name)
    }

    /// True if the given lock is held with the given key.
    #[must_use]
    pub fn is_locked_by(&self, name: &str, key: &str) -> bool {
        self.net.is_locked_by(name, key)
    }

    /// Acquires a lock with immediate effect. Of two node functions
    /// racing for the same lock within one step, the one evaluated first
    /// wins.
    pub fn lock(&mut self, name: &str, key: &str, ttl: u64) -> NetResult<()> {
        self.net.lock(name, key, ttl)
    }

    /// Releases a lock at the end of the net step, after all node
    /// functions have run. Deferring the release keeps lock observations
    /// within one step independent of evaluation order.
    pub fn unlock(&mut self, name: &str) {
        self.net.deferred_unlocks.push(name.to_string());
    }

    // -- user interaction ------------------------------------------------

    /// Suspends the runner and presents a message to the user.
    pub fn notify_user(&mut self, node_uid: &str, msg: &str) {
        self.net.user_prompt = Some(UserPrompt {
            node_uid: node_uid.to_string(),
            msg: msg.to_string(),
            options: None,
        });
        self.net.set_active(false);
    }

    /// Suspends the runner and asks the user to supply parameter values;
    /// the descriptors are passed through to the frontend untouched.
    pub fn ask_user_for_parameter(&mut self, node_uid: &str, msg: &str, options: Value) {
        self.net.user_prompt = Some(UserPrompt {
            node_uid: node_uid.to_string(),
            msg: msg.to_string(),
            options: Some(options),
        });
        self.net.set_active(false);
    }
}
