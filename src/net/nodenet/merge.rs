//! Export, load and merge of persisted snapshots.

use fxhash::FxHashMap;
use serde_json::Value;
use tracing::warn;

use crate::error::NetResult;
use crate::net::gate::GateFunction;
use crate::net::link::Link;
use crate::net::monitor::Monitor;
use crate::net::nodetype::NativeModuleSpec;
use crate::net::snapshot::{MaxCoords, NodeData, NodenetData, NodespaceData, NODENET_VERSION};
use crate::net::FxIndexMap;
use crate::uid::{generate_uid, ROOT_UID};

use super::Nodenet;

impl Nodenet {
    /// Builds the persisted document of the current net state.
    #[must_use]
    pub fn export_data(&self) -> NodenetData {
        let mut nodespaces = FxIndexMap::default();
        for nodespace in self.nodespaces.values() {
            let data = NodespaceData {
                uid: nodespace.uid().to_string(),
                parent_nodespace: nodespace.parent_nodespace().map(str::to_string),
                name: nodespace.name().to_string(),
                position: nodespace.position(),
                gatefunctions: nodespace.gatefunction_names(),
                index: nodespace.index(),
            };
            nodespaces.insert(
                data.uid.clone(),
                serde_json::to_value(data).expect("nodespace serialization cannot fail"),
            );
        }

        let mut nodes = FxIndexMap::default();
        for node in self.nodes.values() {
            let mut gate_parameters = FxIndexMap::default();
            for gate_name in node.gate_names().map(str::to_string).collect::<Vec<_>>() {
                let overrides = node.gate(&gate_name).expect("own gate").parameter_overrides();
                if !overrides.is_empty() {
                    gate_parameters.insert(gate_name, overrides);
                }
            }
            let data = NodeData {
                uid: node.uid().to_string(),
                nodetype: node.nodetype().to_string(),
                parent_nodespace: node.parent_nodespace().to_string(),
                name: node.raw_name().to_string(),
                position: node.position(),
                parameters: node.parameters().clone(),
                gate_parameters,
                state: node.state().clone(),
                index: node.index(),
            };
            nodes.insert(
                data.uid.clone(),
                serde_json::to_value(data).expect("node serialization cannot fail"),
            );
        }

        let mut links = FxIndexMap::default();
        for link in self.links.values() {
            links.insert(
                link.uid.clone(),
                serde_json::to_value(link).expect("link serialization cannot fail"),
            );
        }

        let mut monitors = FxIndexMap::default();
        for monitor in self.monitors.values() {
            monitors.insert(
                monitor.uid.clone(),
                serde_json::to_value(monitor).expect("monitor serialization cannot fail"),
            );
        }

        NodenetData {
            version: NODENET_VERSION,
            uid: self.uid().to_string(),
            owner: self.owner().to_string(),
            name: self.name().to_string(),
            current_step: self.current_step(),
            is_active: self.is_active(),
            world: self.world().map(str::to_string),
            worldadapter: self.worldadapter().map(str::to_string),
            settings: self.settings().clone(),
            max_coords: MaxCoords {
                x: self.max_coords().0,
                y: self.max_coords().1,
            },
            nodespaces,
            nodes,
            links,
            monitors,
        }
    }

    /// Serializes the net to a snapshot document.
    #[must_use]
    pub fn export_json(&self) -> String {
        self.export_data().to_json()
    }

    /// Removes every entity, leaving an empty net with only the root
    /// nodespace. Locks survive a clear.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.links.clear();
        self.monitors.clear();
        self.nodespaces.clear();
        self.insert_root();
        self.refresh_max_coords();
    }

    /// Instantiates a net from a parsed snapshot document.
    ///
    /// # Errors
    ///
    /// Forwards merge failures; corrupt entities inside the document are
    /// dropped with warnings instead of failing the load.
    pub fn from_data(data: NodenetData) -> NetResult<Self> {
        let mut net = Self::new(Some(data.uid.clone()), data.name.clone(), data.owner.clone());
        net.adopt(&data);
        net.merge_data(&data, false)?;
        Ok(net)
    }

    /// Replaces the live net with the contents of a snapshot document.
    pub fn load_data(&mut self, data: &NodenetData) -> NetResult<()> {
        self.clear();
        self.adopt(data);
        self.merge_data(data, false)
    }

    fn adopt(&mut self, data: &NodenetData) {
        self.set_current_step(data.current_step);
        self.set_active(data.is_active);
        self.set_world(data.world.clone());
        self.set_worldadapter(data.worldadapter.clone());
        for (key, value) in &data.settings {
            self.set_setting(key.clone(), value.clone());
        }
    }

    /// Merges a snapshot into the live net.
    ///
    /// Nodespaces are inserted parent before child; nodes of unknown types
    /// are dropped with a warning; links with a missing endpoint are
    /// dropped silently; monitors are copied verbatim. With
    /// `rename_on_collision`, incoming entities whose uid is already taken
    /// get fresh uids and all incoming references are rewritten.
    pub fn merge_data(&mut self, data: &NodenetData, rename_on_collision: bool) -> NetResult<()> {
        if !data.name.is_empty() {
            self.set_name(data.name.clone());
        }

        let ns_rename = self.merge_nodespaces(data, rename_on_collision);
        let node_rename = self.merge_nodes(data, &ns_rename, rename_on_collision);
        self.merge_links(data, &node_rename);
        self.merge_monitors(data, &node_rename);
        self.refresh_max_coords();
        Ok(())
    }

    fn merge_nodespaces(
        &mut self,
        data: &NodenetData,
        rename_on_collision: bool,
    ) -> FxHashMap<String, String> {
        let mut decoded: Vec<NodespaceData> = Vec::new();
        for (uid, value) in &data.nodespaces {
            if uid == ROOT_UID {
                continue;
            }
            match serde_json::from_value::<NodespaceData>(value.clone()) {
                Ok(nodespace) => decoded.push(nodespace),
                Err(err) => warn!(uid = %uid, error = %err, "dropping corrupt nodespace"),
            }
        }

        let incoming: Vec<String> = decoded.iter().map(|d| d.uid.clone()).collect();
        let mut rename: FxHashMap<String, String> = FxHashMap::default();
        if rename_on_collision {
            for uid in &incoming {
                if self.nodespaces.contains_key(uid) {
                    rename.insert(uid.clone(), generate_uid());
                }
            }
        }

        // insert parent before child; unresolvable parents fall back to Root
        let mut pending = decoded;
        loop {
            let mut progressed = false;
            let mut deferred = Vec::new();
            for nodespace in pending {
                let parent_orig = nodespace
                    .parent_nodespace
                    .clone()
                    .unwrap_or_else(|| ROOT_UID.to_string());
                let parent_effective = rename
                    .get(&parent_orig)
                    .cloned()
                    .unwrap_or_else(|| parent_orig.clone());

                let parent_ready = self.nodespaces.contains_key(&parent_effective);
                let parent_incoming = incoming.contains(&parent_orig);
                if parent_ready {
                    self.insert_nodespace_data(&nodespace, &parent_effective, &rename);
                    progressed = true;
                } else if parent_incoming {
                    deferred.push(nodespace);
                } else {
                    warn!(
                        uid = %nodespace.uid,
                        parent = %parent_orig,
                        "nodespace parent missing, attaching to root"
                    );
                    self.insert_nodespace_data(&nodespace, ROOT_UID, &rename);
                    progressed = true;
                }
            }
            if deferred.is_empty() {
                break;
            }
            if !progressed {
                for nodespace in deferred {
                    warn!(uid = %nodespace.uid, "nodespace parent cycle, attaching to root");
                    self.insert_nodespace_data(&nodespace, ROOT_UID, &rename);
                }
                break;
            }
            pending = deferred;
        }
        rename
    }

    fn insert_nodespace_data(
        &mut self,
        data: &NodespaceData,
        parent: &str,
        rename: &FxHashMap<String, String>,
    ) {
        let uid = rename.get(&data.uid).cloned().unwrap_or_else(|| data.uid.clone());
        if self.nodespaces.contains_key(&uid) {
            return;
        }
        let created = self.create_nodespace(parent, &data.name, data.position, Some(uid.clone()));
        let Ok(uid) = created else {
            return;
        };
        self.bump_entity_index(data.index);
        let nodespace = self.nodespaces.get_mut(&uid).expect("just created");
        nodespace.set_index(data.index);
        for (nodetype, by_gate) in &data.gatefunctions {
            for (gate, function_name) in by_gate {
                match GateFunction::from_name(function_name) {
                    Some(function) => nodespace.set_gate_function(nodetype, gate, function),
                    None => warn!(
                        name = %function_name,
                        "unknown gate function, keeping default"
                    ),
                }
            }
        }
    }

    fn merge_nodes(
        &mut self,
        data: &NodenetData,
        ns_rename: &FxHashMap<String, String>,
        rename_on_collision: bool,
    ) -> FxHashMap<String, String> {
        let mut rename: FxHashMap<String, String> = FxHashMap::default();

        for (uid, value) in &data.nodes {
            let decoded = match serde_json::from_value::<NodeData>(value.clone()) {
                Ok(node) => node,
                Err(err) => {
                    warn!(uid = %uid, error = %err, "dropping corrupt node");
                    continue;
                }
            };
            if !self.registry().contains(&decoded.nodetype) {
                warn!(
                    uid = %uid,
                    nodetype = %decoded.nodetype,
                    "dropping node of unknown type"
                );
                continue;
            }

            let mut effective_uid = decoded.uid.clone();
            if self.nodes.contains_key(&effective_uid) {
                if !rename_on_collision {
                    warn!(uid = %effective_uid, "dropping node with duplicate uid");
                    continue;
                }
                effective_uid = generate_uid();
                rename.insert(decoded.uid.clone(), effective_uid.clone());
            }

            let mut parent = ns_rename
                .get(&decoded.parent_nodespace)
                .cloned()
                .unwrap_or_else(|| decoded.parent_nodespace.clone());
            if !self.nodespaces.contains_key(&parent) {
                warn!(
                    uid = %effective_uid,
                    nodespace = %parent,
                    "node parent nodespace missing, attaching to root"
                );
                parent = ROOT_UID.to_string();
            }

            let created = self.create_node(
                &decoded.nodetype,
                &parent,
                &decoded.name,
                decoded.position,
                Some(effective_uid.clone()),
            );
            if created.is_err() {
                continue;
            }

            let node = self.node_mut_or_err(&effective_uid).expect("just created");
            for (key, value) in &decoded.parameters {
                node.set_parameter(key.clone(), value.clone());
            }
            for (key, value) in &decoded.state {
                node.set_state(key.clone(), value.clone());
            }
            for (gate_name, overrides) in &decoded.gate_parameters {
                if let Some(gate) = node.gate_mut(gate_name) {
                    gate.parameters_mut().apply(overrides);
                }
            }
            node.set_index(decoded.index);
            self.bump_entity_index(decoded.index);
            self.register_activator(&effective_uid);
        }
        rename
    }

    fn merge_links(&mut self, data: &NodenetData, node_rename: &FxHashMap<String, String>) {
        for value in data.links.values() {
            let Ok(link) = serde_json::from_value::<Link>(value.clone()) else {
                continue;
            };
            let source = node_rename
                .get(&link.source_node_uid)
                .cloned()
                .unwrap_or(link.source_node_uid);
            let target = node_rename
                .get(&link.target_node_uid)
                .cloned()
                .unwrap_or(link.target_node_uid);
            if !self.nodes.contains_key(&source) || !self.nodes.contains_key(&target) {
                continue;
            }
            let _ = self.create_link_with_uid(
                Some(link.uid),
                &source,
                &link.source_gate_name,
                &target,
                &link.target_slot_name,
                link.weight,
                link.certainty,
            );
        }
    }

    fn merge_monitors(&mut self, data: &NodenetData, node_rename: &FxHashMap<String, String>) {
        for (uid, value) in &data.monitors {
            let Ok(mut monitor) = serde_json::from_value::<Monitor>(value.clone()) else {
                warn!(uid = %uid, "dropping corrupt monitor");
                continue;
            };
            if let Some(renamed) = node_rename.get(&monitor.node_uid) {
                monitor.node_uid = renamed.clone();
            }
            if self.monitors.contains_key(&monitor.uid) {
                monitor.uid = generate_uid();
            }
            self.monitors.insert(monitor.uid.clone(), monitor);
        }
    }

    fn bump_entity_index(&mut self, seen: u64) {
        if seen >= self.entity_index {
            self.entity_index = seen + 1;
        }
    }

    /// Replaces the native module catalog and reinstantiates the whole net
    /// against it.
    ///
    /// Nodes whose type is unknown after the reload are dropped with a
    /// warning, together with the links touching them.
    pub fn reload_native_modules(&mut self, specs: Vec<NativeModuleSpec>) -> NetResult<()> {
        self.registry_mut().replace_native_modules(specs);
        let saved = self.export_data();
        self.clear();
        self.merge_data(&saved, false)
    }

    /// Copies a set of nodes (and optionally nodespaces) into a target
    /// nodespace, rewriting links among the copies. Copies always receive
    /// fresh uids when their originals' uids are taken. With
    /// `copy_associated_links`, links connecting the copied set to the
    /// rest of the net are duplicated as well.
    ///
    /// Returns the uid mapping original -> copy for the nodes.
    pub fn copy_nodes(
        &mut self,
        node_uids: &[String],
        nodespace_uids: &[String],
        target_nodespace: Option<&str>,
        copy_associated_links: bool,
    ) -> NetResult<FxHashMap<String, String>> {
        let target = target_nodespace.unwrap_or(ROOT_UID).to_string();
        self.nodespace_or_err(&target)?;
        for uid in node_uids {
            self.node_or_err(uid)?;
        }
        for uid in nodespace_uids {
            self.nodespace_or_err(uid)?;
        }

        // nodespace copies, parents fixed after all of them exist
        let mut ns_rename: FxHashMap<String, String> = FxHashMap::default();
        let mut original_parents: FxHashMap<String, Option<String>> = FxHashMap::default();
        for uid in nodespace_uids {
            let original = &self.nodespaces[uid.as_str()];
            original_parents.insert(
                uid.clone(),
                original.parent_nodespace().map(str::to_string),
            );
            let name = original.name().to_string();
            let position = original.position();
            let gatefunctions = original.gatefunction_names();

            let copy_uid = if self.nodespaces.contains_key(uid) {
                generate_uid()
            } else {
                uid.clone()
            };
            let created =
                self.create_nodespace(&target, &name, position, Some(copy_uid.clone()))?;
            let copy = self.nodespaces.get_mut(&created).expect("just created");
            for (nodetype, by_gate) in &gatefunctions {
                for (gate, function_name) in by_gate {
                    if let Some(function) = GateFunction::from_name(function_name) {
                        copy.set_gate_function(nodetype, gate, function);
                    }
                }
            }
            ns_rename.insert(uid.clone(), created);
        }
        for uid in nodespace_uids {
            if let Some(Some(parent)) = original_parents.get(uid) {
                if let Some(parent_copy) = ns_rename.get(parent).cloned() {
                    let copy_uid = ns_rename[uid].clone();
                    self.move_nodespace(&copy_uid, &parent_copy)?;
                }
            }
        }

        // node copies
        let mut node_rename: FxHashMap<String, String> = FxHashMap::default();
        for uid in node_uids {
            let original = &self.nodes[uid.as_str()];
            let nodetype = original.nodetype().to_string();
            let name = original.raw_name().to_string();
            let position = original.position();
            let parameters = original.parameters().clone();
            let state = original.state().clone();
            let parent_orig = original.parent_nodespace().to_string();
            let gate_overrides: Vec<(String, FxIndexMap<String, Value>)> = original
                .gates
                .values()
                .map(|gate| (gate.name().to_string(), gate.parameter_overrides()))
                .filter(|(_, overrides)| !overrides.is_empty())
                .collect();

            let parent = ns_rename
                .get(&parent_orig)
                .cloned()
                .unwrap_or_else(|| target.clone());
            let copy_uid = if self.nodes.contains_key(uid) {
                generate_uid()
            } else {
                uid.clone()
            };
            let created =
                self.create_node(&nodetype, &parent, &name, position, Some(copy_uid))?;

            let copy = self.node_mut_or_err(&created).expect("just created");
            for (key, value) in parameters {
                copy.set_parameter(key, value);
            }
            for (key, value) in state {
                copy.set_state(key, value);
            }
            for (gate_name, overrides) in gate_overrides {
                if let Some(gate) = copy.gate_mut(&gate_name) {
                    gate.parameters_mut().apply(&overrides);
                }
            }
            self.register_activator(&created);
            node_rename.insert(uid.clone(), created);
        }

        // links among the copied set, plus associated links if requested
        let mut links_to_copy: Vec<Link> = Vec::new();
        let mut seen: std::collections::HashSet<String> = std::collections::HashSet::new();
        for uid in node_uids {
            for link_uid in self.nodes[uid.as_str()].associated_link_uids() {
                let Some(link) = self.links.get(&link_uid) else {
                    continue;
                };
                if !seen.insert(link.uid.clone()) {
                    continue;
                }
                let source_copied = node_rename.contains_key(&link.source_node_uid);
                let target_copied = node_rename.contains_key(&link.target_node_uid);
                let keep = (source_copied && target_copied)
                    || (copy_associated_links && (source_copied || target_copied));
                if keep {
                    links_to_copy.push(link.clone());
                }
            }
        }
        for link in links_to_copy {
            let source = node_rename
                .get(&link.source_node_uid)
                .cloned()
                .unwrap_or(link.source_node_uid);
            let target = node_rename
                .get(&link.target_node_uid)
                .cloned()
                .unwrap_or(link.target_node_uid);
            if let Err(err) = self.create_link(
                &source,
                &link.source_gate_name,
                &target,
                &link.target_slot_name,
                link.weight,
                link.certainty,
            ) {
                warn!(
                    link = %link.uid,
                    error = %err,
                    "dropping link that could not be copied"
                );
            }
        }

        Ok(node_rename)
    }

    /// Moves nodes (and nodespaces) into a target nodespace as
    /// copy-then-delete: the copies keep all links among themselves and to
    /// the rest of the net, then the originals are removed.
    ///
    /// Returns the uid mapping original -> moved copy.
    pub fn move_nodes(
        &mut self,
        node_uids: &[String],
        nodespace_uids: &[String],
        target_nodespace: Option<&str>,
    ) -> NetResult<FxHashMap<String, String>> {
        let renames = self.copy_nodes(node_uids, nodespace_uids, target_nodespace, true)?;
        for uid in node_uids {
            self.delete_node(uid)?;
        }
        for uid in nodespace_uids {
            if self.is_nodespace(uid) {
                self.delete_nodespace(uid)?;
            }
        }
        Ok(renames)
    }
}
