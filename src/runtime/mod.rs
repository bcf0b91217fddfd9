//! The composition root: owns all nodenets, worlds and runners and exposes
//! the synchronous control surface.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use fxhash::FxHashMap;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::{NetError, NetResult};
use crate::net::monitor::{Monitor, TerminalKind};
use crate::net::netapi::NetApi;
use crate::net::nodenet::{Nodenet, StepReport};
use crate::net::nodetype::NativeModuleSpec;
use crate::net::snapshot::NodenetData;
use crate::net::FxIndexMap;
use crate::world::WorldAdapter;

mod recipes;
mod runner;

pub use self::recipes::{Recipe, RecipeFn, RecipeParameter};
use self::runner::RunnerHandle;

/// The default runner timestep in milliseconds.
pub const DEFAULT_TIMESTEP_MS: u64 = 500;

/// A shared, lockable world adapter.
pub type SharedWorld = Arc<Mutex<dyn WorldAdapter>>;

/// The central component of a nodenet installation.
///
/// A runtime holds any number of nodenets and worlds, steps nets on
/// background runner threads and persists them below its resource path.
/// Every control call is synchronous and serializes against the target
/// net's mutation lock. There is exactly one runtime per process by
/// convention, constructed at startup and dropped at shutdown; nothing
/// here is a global.
pub struct Runtime {
    resource_path: PathBuf,
    nodenets: FxIndexMap<String, Arc<Mutex<Nodenet>>>,
    worlds: FxIndexMap<String, SharedWorld>,
    runners: FxHashMap<String, RunnerHandle>,
    timestep_ms: Arc<AtomicU64>,
    native_modules: Vec<NativeModuleSpec>,
    recipes: FxIndexMap<String, Recipe>,
}

impl Runtime {
    /// Sets up a runtime storing agents below the given resource path.
    #[must_use]
    pub fn new(resource_path: impl Into<PathBuf>) -> Self {
        let resource_path = resource_path.into();
        info!(path = %resource_path.display(), "setting up runtime");
        Self {
            resource_path,
            nodenets: FxIndexMap::default(),
            worlds: FxIndexMap::default(),
            runners: FxHashMap::default(),
            timestep_ms: Arc::new(AtomicU64::new(DEFAULT_TIMESTEP_MS)),
            native_modules: Vec::new(),
            recipes: FxIndexMap::default(),
        }
    }

    fn nodenet_file(&self, uid: &str) -> PathBuf {
        self.resource_path.join("nodenets").join(format!("{uid}.json"))
    }

    /// The shared handle of a loaded nodenet.
    ///
    /// # Errors
    ///
    /// [`NetError::NotFound`] if no net with this uid is loaded.
    pub fn nodenet(&self, uid: &str) -> NetResult<Arc<Mutex<Nodenet>>> {
        self.nodenets
            .get(uid)
            .cloned()
            .ok_or_else(|| NetError::NotFound(uid.to_string()))
    }

    fn locked(&self, uid: &str) -> NetResult<MutexGuard<'_, Nodenet>> {
        let net = self
            .nodenets
            .get(uid)
            .ok_or_else(|| NetError::NotFound(uid.to_string()))?;
        Ok(net.lock().expect("nodenet lock poisoned"))
    }

    /// Uids and names of all loaded nodenets.
    #[must_use]
    pub fn available_nodenets(&self) -> Vec<(String, String)> {
        self.nodenets
            .iter()
            .map(|(uid, net)| {
                let net = net.lock().expect("nodenet lock poisoned");
                (uid.clone(), net.name().to_string())
            })
            .collect()
    }

    // -- world management ------------------------------------------------

    /// Registers a world adapter under a world uid.
    pub fn register_world(&mut self, world_uid: impl Into<String>, world: SharedWorld) {
        self.worlds.insert(world_uid.into(), world);
    }

    /// The world adapter a nodenet is bound to, if any.
    #[must_use]
    pub fn world_for(&self, net: &Nodenet) -> Option<SharedWorld> {
        net.world().and_then(|uid| self.worlds.get(uid).cloned())
    }

    /// Binds a nodenet to a registered world (or unbinds it with `None`).
    pub fn set_nodenet_world(
        &mut self,
        nodenet_uid: &str,
        world_uid: Option<&str>,
        worldadapter: Option<&str>,
    ) -> NetResult<()> {
        if let Some(world_uid) = world_uid {
            if !self.worlds.contains_key(world_uid) {
                return Err(NetError::NotFound(world_uid.to_string()));
            }
        }
        let mut net = self.locked(nodenet_uid)?;
        net.set_world(world_uid.map(str::to_string));
        net.set_worldadapter(worldadapter.map(str::to_string));
        Ok(())
    }

    /// The datasource names available to a nodenet.
    pub fn get_available_datasources(&self, nodenet_uid: &str) -> NetResult<Vec<String>> {
        let net = self.locked(nodenet_uid)?;
        Ok(match self.world_for(&net) {
            Some(world) => world
                .lock()
                .expect("world lock poisoned")
                .available_datasources(nodenet_uid),
            None => Vec::new(),
        })
    }

    /// The datatarget names available to a nodenet.
    pub fn get_available_datatargets(&self, nodenet_uid: &str) -> NetResult<Vec<String>> {
        let net = self.locked(nodenet_uid)?;
        Ok(match self.world_for(&net) {
            Some(world) => world
                .lock()
                .expect("world lock poisoned")
                .available_datatargets(nodenet_uid),
            None => Vec::new(),
        })
    }

    /// Binds a sensor node to a datasource.
    pub fn bind_datasource_to_sensor(
        &self,
        nodenet_uid: &str,
        sensor_uid: &str,
        datasource: &str,
    ) -> NetResult<()> {
        let mut net = self.locked(nodenet_uid)?;
        let node = net.node_or_err(sensor_uid)?;
        if node.nodetype() != "Sensor" {
            return Err(NetError::InvalidArgument(format!(
                "node {sensor_uid} is not a Sensor"
            )));
        }
        net.node_mut_or_err(sensor_uid)?
            .set_parameter("datasource", Value::from(datasource));
        Ok(())
    }

    /// Binds an actor node to a datatarget.
    pub fn bind_datatarget_to_actor(
        &self,
        nodenet_uid: &str,
        actor_uid: &str,
        datatarget: &str,
    ) -> NetResult<()> {
        let mut net = self.locked(nodenet_uid)?;
        let node = net.node_or_err(actor_uid)?;
        if node.nodetype() != "Actor" {
            return Err(NetError::InvalidArgument(format!(
                "node {actor_uid} is not an Actor"
            )));
        }
        net.node_mut_or_err(actor_uid)?
            .set_parameter("datatarget", Value::from(datatarget));
        Ok(())
    }

    // -- nodenet lifecycle -----------------------------------------------

    /// Creates and registers a fresh nodenet; returns its uid.
    pub fn new_nodenet(
        &mut self,
        name: &str,
        owner: &str,
        world: Option<&str>,
        worldadapter: Option<&str>,
    ) -> NetResult<String> {
        let mut net = Nodenet::new(None, name, owner);
        net.set_world(world.map(str::to_string));
        net.set_worldadapter(worldadapter.map(str::to_string));
        if !self.native_modules.is_empty() {
            net.reload_native_modules(self.native_modules.clone())?;
        }

        let uid = net.uid().to_string();
        self.nodenets.insert(uid.clone(), Arc::new(Mutex::new(net)));
        Ok(uid)
    }

    /// Unloads a nodenet and removes its persisted file.
    pub fn delete_nodenet(&mut self, uid: &str) -> NetResult<()> {
        self.stop_nodenetrunner(uid)?;
        self.nodenets
            .shift_remove(uid)
            .ok_or_else(|| NetError::NotFound(uid.to_string()))?;
        let file = self.nodenet_file(uid);
        if file.exists() {
            if let Err(err) = fs::remove_file(&file) {
                warn!(file = %file.display(), error = %err, "could not remove nodenet file");
            }
        }
        Ok(())
    }

    /// Persists a nodenet below the resource path, keeping it loaded.
    pub fn save_nodenet(&self, uid: &str) -> NetResult<()> {
        let json = self.export_nodenet(uid)?;
        let file = self.nodenet_file(uid);
        if let Some(parent) = file.parent() {
            fs::create_dir_all(parent)
                .map_err(|err| NetError::InvalidArgument(err.to_string()))?;
        }
        fs::write(&file, json).map_err(|err| NetError::InvalidArgument(err.to_string()))?;
        info!(uid = %uid, file = %file.display(), "nodenet saved");
        Ok(())
    }

    /// Loads a persisted nodenet from the resource path.
    pub fn load_nodenet(&mut self, uid: &str) -> NetResult<()> {
        let file = self.nodenet_file(uid);
        let json = fs::read_to_string(&file)
            .map_err(|_| NetError::NotFound(format!("no persisted nodenet {uid}")))?;
        self.import_nodenet(&json)?;
        Ok(())
    }

    /// Returns a nodenet to its last saved state.
    pub fn revert_nodenet(&mut self, uid: &str) -> NetResult<()> {
        let file = self.nodenet_file(uid);
        let json = fs::read_to_string(&file)
            .map_err(|_| NetError::NotFound(format!("no persisted nodenet {uid}")))?;
        let data = NodenetData::from_json(&json)?;
        let mut net = self.locked(uid)?;
        net.load_data(&data)
    }

    /// Serializes a nodenet to its snapshot document.
    pub fn export_nodenet(&self, uid: &str) -> NetResult<String> {
        Ok(self.locked(uid)?.export_json())
    }

    /// Instantiates a nodenet from a snapshot document, replacing a loaded
    /// net of the same uid. Returns the uid.
    pub fn import_nodenet(&mut self, json: &str) -> NetResult<String> {
        let data = NodenetData::from_json(json)?;
        let uid = data.uid.clone();
        match self.nodenets.get(&uid) {
            Some(net) => {
                let mut net = net.lock().expect("nodenet lock poisoned");
                net.load_data(&data)?;
            }
            None => {
                let mut net = Nodenet::from_data(data)?;
                if !self.native_modules.is_empty() {
                    net.reload_native_modules(self.native_modules.clone())?;
                }
                self.nodenets.insert(uid.clone(), Arc::new(Mutex::new(net)));
            }
        }
        Ok(uid)
    }

    /// Merges a snapshot document into a loaded nodenet, renaming incoming
    /// entities on uid collision.
    pub fn merge_nodenet(&self, uid: &str, json: &str) -> NetResult<()> {
        let data = NodenetData::from_json(json)?;
        let mut net = self.locked(uid)?;
        net.merge_data(&data, true)
    }

    // -- runner control --------------------------------------------------

    /// Advances a nodenet by one step.
    pub fn step_nodenet(&self, uid: &str) -> NetResult<StepReport> {
        let mut net = self.locked(uid)?;
        let world = self.world_for(&net);
        Ok(match world {
            Some(world) => {
                let mut world = world.lock().expect("world lock poisoned");
                net.step(Some(&mut *world))
            }
            None => net.step(None),
        })
    }

    /// Starts the background runner for a nodenet.
    pub fn start_nodenetrunner(&mut self, uid: &str) -> NetResult<()> {
        if self.runners.get(uid).is_some_and(RunnerHandle::is_running) {
            return Ok(());
        }
        let net = self.nodenet(uid)?;
        let world = {
            let guard = net.lock().expect("nodenet lock poisoned");
            self.world_for(&guard)
        };
        net.lock().expect("nodenet lock poisoned").set_active(true);

        let handle = RunnerHandle::spawn(net, world, Arc::clone(&self.timestep_ms));
        self.runners.insert(uid.to_string(), handle);
        Ok(())
    }

    /// Stops the background runner of a nodenet, letting an in-flight
    /// step finish.
    pub fn stop_nodenetrunner(&mut self, uid: &str) -> NetResult<()> {
        if let Some(net) = self.nodenets.get(uid) {
            net.lock().expect("nodenet lock poisoned").set_active(false);
        }
        if let Some(mut handle) = self.runners.remove(uid) {
            handle.stop();
        }
        Ok(())
    }

    /// True while a runner thread is scheduling steps for the nodenet.
    #[must_use]
    pub fn is_nodenet_running(&self, uid: &str) -> bool {
        self.runners.get(uid).is_some_and(RunnerHandle::is_running)
    }

    /// Sets the runner interval in milliseconds, for all runners.
    pub fn set_runner_timestep(&self, milliseconds: u64) {
        self.timestep_ms.store(milliseconds, Ordering::SeqCst);
    }

    /// The configured runner interval in milliseconds.
    #[must_use]
    pub fn get_runner_timestep(&self) -> u64 {
        self.timestep_ms.load(Ordering::SeqCst)
    }

    // -- node & link CRUD ------------------------------------------------

    /// Creates a node; returns its uid.
    pub fn add_node(
        &self,
        nodenet_uid: &str,
        nodetype: &str,
        position: (f64, f64),
        nodespace: &str,
        name: &str,
    ) -> NetResult<String> {
        self.locked(nodenet_uid)?
            .create_node(nodetype, nodespace, name, position, None)
    }

    /// Creates a nodespace; returns its uid.
    pub fn add_nodespace(
        &self,
        nodenet_uid: &str,
        position: (f64, f64),
        parent: &str,
        name: &str,
    ) -> NetResult<String> {
        self.locked(nodenet_uid)?
            .create_nodespace(parent, name, position, None)
    }

    /// Deletes a node, or a nodespace with everything it contains.
    pub fn delete_node(&self, nodenet_uid: &str, uid: &str) -> NetResult<()> {
        let mut net = self.locked(nodenet_uid)?;
        if net.is_nodespace(uid) {
            net.delete_nodespace(uid)
        } else {
            net.delete_node(uid)
        }
    }

    /// Repositions a node.
    pub fn set_node_position(
        &self,
        nodenet_uid: &str,
        node_uid: &str,
        position: (f64, f64),
    ) -> NetResult<()> {
        self.locked(nodenet_uid)?.set_node_position(node_uid, position)
    }

    /// Renames a node.
    pub fn set_node_name(&self, nodenet_uid: &str, node_uid: &str, name: &str) -> NetResult<()> {
        self.locked(nodenet_uid)?.set_node_name(node_uid, name)
    }

    /// Forces a node's activation.
    pub fn set_node_activation(
        &self,
        nodenet_uid: &str,
        node_uid: &str,
        activation: f64,
    ) -> NetResult<()> {
        self.locked(nodenet_uid)?.set_node_activation(node_uid, activation)
    }

    /// Applies node parameters; `null` values reset to nodetype defaults.
    pub fn set_node_parameters(
        &self,
        nodenet_uid: &str,
        node_uid: &str,
        parameters: FxIndexMap<String, Value>,
    ) -> NetResult<()> {
        self.locked(nodenet_uid)?.set_node_parameters(node_uid, parameters)
    }

    /// Applies gate parameter overrides.
    pub fn set_gate_parameters(
        &self,
        nodenet_uid: &str,
        node_uid: &str,
        gate: &str,
        parameters: FxIndexMap<String, Value>,
    ) -> NetResult<()> {
        self.locked(nodenet_uid)?
            .set_gate_parameters(node_uid, gate, parameters)
    }

    /// Creates or updates a link; returns the link uid.
    pub fn add_link(
        &self,
        nodenet_uid: &str,
        source_node: &str,
        gate: &str,
        target_node: &str,
        slot: &str,
        weight: f64,
        certainty: f64,
    ) -> NetResult<String> {
        self.locked(nodenet_uid)?
            .create_link(source_node, gate, target_node, slot, weight, certainty)
    }

    /// Updates the weight of an existing connection (same call as
    /// [`Runtime::add_link`], the operation is idempotent).
    pub fn set_link_weight(
        &self,
        nodenet_uid: &str,
        source_node: &str,
        gate: &str,
        target_node: &str,
        slot: &str,
        weight: f64,
        certainty: f64,
    ) -> NetResult<String> {
        self.add_link(nodenet_uid, source_node, gate, target_node, slot, weight, certainty)
    }

    /// Deletes the link between the given terminals.
    pub fn delete_link(
        &self,
        nodenet_uid: &str,
        source_node: &str,
        gate: &str,
        target_node: &str,
        slot: &str,
    ) -> NetResult<()> {
        let removed = self.locked(nodenet_uid)?.unlink(
            source_node,
            Some(gate),
            Some(target_node),
            Some(slot),
        )?;
        if removed == 0 {
            return Err(NetError::NotFound(format!(
                "no link {source_node}:{gate} -> {target_node}:{slot}"
            )));
        }
        Ok(())
    }

    /// Moves nodes and nodespaces into a target nodespace, preserving
    /// links; returns the uid mapping original -> moved node.
    pub fn move_nodes(
        &self,
        nodenet_uid: &str,
        node_uids: &[String],
        nodespace_uids: &[String],
        target_nodespace: Option<&str>,
    ) -> NetResult<FxHashMap<String, String>> {
        self.locked(nodenet_uid)?
            .move_nodes(node_uids, nodespace_uids, target_nodespace)
    }

    // -- monitors --------------------------------------------------------

    /// Attaches a monitor to a gate; returns the monitor uid.
    pub fn add_gate_monitor(
        &self,
        nodenet_uid: &str,
        node_uid: &str,
        gate: &str,
        sheaf: Option<&str>,
    ) -> NetResult<String> {
        self.locked(nodenet_uid)?
            .add_monitor(node_uid, TerminalKind::Gate, gate, sheaf)
    }

    /// Attaches a monitor to a slot; returns the monitor uid.
    pub fn add_slot_monitor(
        &self,
        nodenet_uid: &str,
        node_uid: &str,
        slot: &str,
        sheaf: Option<&str>,
    ) -> NetResult<String> {
        self.locked(nodenet_uid)?
            .add_monitor(node_uid, TerminalKind::Slot, slot, sheaf)
    }

    /// Detaches a monitor.
    pub fn remove_monitor(&self, nodenet_uid: &str, monitor_uid: &str) -> NetResult<()> {
        self.locked(nodenet_uid)?.remove_monitor(monitor_uid)
    }

    /// Drops a monitor's recorded values.
    pub fn clear_monitor(&self, nodenet_uid: &str, monitor_uid: &str) -> NetResult<()> {
        self.locked(nodenet_uid)?.clear_monitor(monitor_uid)
    }

    /// All monitors of a nodenet with their recorded values.
    pub fn get_monitor_data(&self, nodenet_uid: &str) -> NetResult<Vec<Monitor>> {
        Ok(self.locked(nodenet_uid)?.monitors().cloned().collect())
    }

    // -- native modules & recipes ----------------------------------------

    /// Replaces the native module catalog and reinstantiates every loaded
    /// nodenet against it. Nodes of types that disappeared are dropped
    /// with a warning.
    pub fn reload_native_modules(&mut self, specs: Vec<NativeModuleSpec>) -> NetResult<()> {
        self.native_modules = specs;
        for net in self.nodenets.values() {
            let mut net = net.lock().expect("nodenet lock poisoned");
            net.reload_native_modules(self.native_modules.clone())?;
        }
        Ok(())
    }

    /// The names of the registered native modules.
    #[must_use]
    pub fn get_available_native_module_types(&self) -> Vec<String> {
        self.native_modules
            .iter()
            .map(|spec| spec.name.clone())
            .collect()
    }

    /// Registers a recipe.
    pub fn register_recipe(&mut self, recipe: Recipe) {
        self.recipes.insert(recipe.name().to_string(), recipe);
    }

    /// Name and parameters of every registered recipe.
    #[must_use]
    pub fn get_available_recipes(&self) -> Vec<(String, Vec<RecipeParameter>)> {
        self.recipes
            .values()
            .map(|recipe| (recipe.name().to_string(), recipe.parameters().to_vec()))
            .collect()
    }

    /// Runs a recipe once against a nodenet, under the net's mutation
    /// lock.
    pub fn run_recipe(
        &self,
        nodenet_uid: &str,
        name: &str,
        arguments: FxIndexMap<String, Value>,
    ) -> NetResult<Value> {
        let recipe = self
            .recipes
            .get(name)
            .ok_or_else(|| NetError::NotFound(format!("no recipe '{name}'")))?;
        let mut net = self.locked(nodenet_uid)?;
        let world = self.world_for(&net);
        match world {
            Some(world) => {
                let mut world = world.lock().expect("world lock poisoned");
                let mut api = NetApi::new(&mut net, Some(&mut *world));
                recipe.run(&mut api, arguments)
            }
            None => {
                let mut api = NetApi::new(&mut net, None);
                recipe.run(&mut api, arguments)
            }
        }
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("resource_path", &self.resource_path)
            .field("nodenets", &self.nodenets.keys().collect::<Vec<_>>())
            .field("worlds", &self.worlds.keys().collect::<Vec<_>>())
            .field("runners", &self.runners.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        for (_, mut handle) in self.runners.drain() {
            handle.stop();
        }
    }
}

/// Crawls the resource path for persisted nodenet documents and returns
/// (uid, name, file) triples, without instantiating anything.
pub fn crawl_nodenet_files(resource_path: &Path) -> Vec<(String, String, PathBuf)> {
    let dir = resource_path.join("nodenets");
    let mut found = Vec::new();
    let Ok(entries) = fs::read_dir(&dir) else {
        return found;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.extension().is_none_or(|ext| ext != "json") {
            continue;
        }
        let Ok(json) = fs::read_to_string(&path) else {
            warn!(file = %path.display(), "could not read nodenet file");
            continue;
        };
        match NodenetData::from_json(&json) {
            Ok(data) => found.push((data.uid.clone(), data.name, path)),
            Err(err) => warn!(file = %path.display(), error = %err, "invalid nodenet file"),
        }
    }
    found
}
