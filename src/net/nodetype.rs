//! The catalog of node types: built-in standard types plus native modules.

use std::fmt::Debug;
use std::sync::Arc;

use serde_json::Value;

use crate::error::NetResult;
use crate::net::gate::GateParameters;
use crate::net::netapi::NetApi;
use crate::net::node::builtins;
use crate::net::FxIndexMap;

/// The names of the built-in node types. Everything else is a native
/// module.
pub const STANDARD_NODETYPES: [&str; 5] = ["Register", "Pipe", "Sensor", "Actor", "Activator"];

/// Gate and slot names of a `Pipe`, in declaration order.
pub const PIPE_GATES: [&str; 9] = [
    "gen", "por", "ret", "sub", "sur", "cat", "exp", "sym", "ref",
];

/// A node function implemented inside this crate.
pub type BuiltinFn = fn(&mut NetApi<'_, '_>, &str) -> NetResult<()>;

/// A node function injected at runtime as part of a native module.
pub type NativeFn = Arc<dyn Fn(&mut NetApi<'_, '_>, &str) -> NetResult<()> + Send + Sync>;

/// The behavior attached to a nodetype, called once per node per step.
#[derive(Clone)]
pub enum NodeFunction {
    Builtin(BuiltinFn),
    Native(NativeFn),
}

impl NodeFunction {
    /// Runs the function for the node with the given uid.
    ///
    /// # Errors
    ///
    /// Forwards whatever the node function reports; the step engine logs
    /// and continues.
    pub fn call(&self, api: &mut NetApi<'_, '_>, node_uid: &str) -> NetResult<()> {
        match self {
            Self::Builtin(f) => f(api, node_uid),
            Self::Native(f) => f(api, node_uid),
        }
    }
}

impl Debug for NodeFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Builtin(_) => f.write_str("NodeFunction::Builtin"),
            Self::Native(_) => f.write_str("NodeFunction::Native"),
        }
    }
}

/// The definition of one node type.
#[derive(Debug, Clone)]
pub struct Nodetype {
    name: String,
    gate_names: Vec<String>,
    slot_names: Vec<String>,
    parameter_names: Vec<String>,
    parameter_defaults: FxIndexMap<String, Value>,
    gate_defaults: FxIndexMap<String, FxIndexMap<String, Value>>,
    node_function: NodeFunction,
}

impl Nodetype {
    /// Creates a new nodetype definition.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        gate_names: Vec<String>,
        slot_names: Vec<String>,
        node_function: NodeFunction,
    ) -> Self {
        Self {
            name: name.into(),
            gate_names,
            slot_names,
            parameter_names: Vec::new(),
            parameter_defaults: FxIndexMap::default(),
            gate_defaults: FxIndexMap::default(),
            node_function,
        }
    }

    /// Declares the parameters nodes of this type accept.
    #[must_use]
    pub fn with_parameters(
        mut self,
        names: impl IntoIterator<Item = &'static str>,
        defaults: impl IntoIterator<Item = (&'static str, Value)>,
    ) -> Self {
        self.parameter_names = names.into_iter().map(str::to_string).collect();
        self.parameter_defaults = defaults
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        self
    }

    /// Installs per-gate parameter defaults.
    #[must_use]
    pub fn with_gate_defaults(
        mut self,
        defaults: FxIndexMap<String, FxIndexMap<String, Value>>,
    ) -> Self {
        self.gate_defaults = defaults;
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn gate_names(&self) -> &[String] {
        &self.gate_names
    }

    #[must_use]
    pub fn slot_names(&self) -> &[String] {
        &self.slot_names
    }

    #[must_use]
    pub fn parameter_names(&self) -> &[String] {
        &self.parameter_names
    }

    #[must_use]
    pub fn parameter_defaults(&self) -> &FxIndexMap<String, Value> {
        &self.parameter_defaults
    }

    #[must_use]
    pub fn gate_defaults(&self) -> &FxIndexMap<String, FxIndexMap<String, Value>> {
        &self.gate_defaults
    }

    #[must_use]
    pub fn node_function(&self) -> &NodeFunction {
        &self.node_function
    }

    /// The baseline parameters for one gate: global defaults overlaid with
    /// this nodetype's per-gate defaults.
    #[must_use]
    pub fn gate_baseline(&self, gate_name: &str) -> GateParameters {
        let mut params = GateParameters::default();
        if let Some(overrides) = self.gate_defaults.get(gate_name) {
            params.apply(overrides);
        }
        params
    }
}

/// The manifest plus behavior of a user-supplied node type.
#[derive(Clone)]
pub struct NativeModuleSpec {
    pub name: String,
    pub gate_names: Vec<String>,
    pub slot_names: Vec<String>,
    pub parameter_names: Vec<String>,
    pub parameter_defaults: FxIndexMap<String, Value>,
    pub gate_defaults: FxIndexMap<String, FxIndexMap<String, Value>>,
    pub node_function: NativeFn,
}

impl NativeModuleSpec {
    /// A minimal native module with gen-only terminals.
    #[must_use]
    pub fn new(name: impl Into<String>, node_function: NativeFn) -> Self {
        Self {
            name: name.into(),
            gate_names: vec!["gen".to_string()],
            slot_names: vec!["gen".to_string()],
            parameter_names: Vec::new(),
            parameter_defaults: FxIndexMap::default(),
            gate_defaults: FxIndexMap::default(),
            node_function,
        }
    }

    fn into_nodetype(self) -> Nodetype {
        Nodetype {
            name: self.name,
            gate_names: self.gate_names,
            slot_names: self.slot_names,
            parameter_names: self.parameter_names,
            parameter_defaults: self.parameter_defaults,
            gate_defaults: self.gate_defaults,
            node_function: NodeFunction::Native(self.node_function),
        }
    }
}

impl Debug for NativeModuleSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeModuleSpec")
            .field("name", &self.name)
            .field("gate_names", &self.gate_names)
            .field("slot_names", &self.slot_names)
            .finish()
    }
}

/// The nodetype catalog of one nodenet.
#[derive(Debug, Clone)]
pub struct NodetypeRegistry {
    standard: FxIndexMap<String, Arc<Nodetype>>,
    native: FxIndexMap<String, Arc<Nodetype>>,
}

impl NodetypeRegistry {
    /// Builds a registry holding the built-in standard types and no native
    /// modules.
    #[must_use]
    pub fn standard() -> Self {
        let mut standard = FxIndexMap::default();

        let register = Nodetype::new(
            "Register",
            vec!["gen".to_string()],
            vec!["gen".to_string()],
            NodeFunction::Builtin(builtins::register),
        );

        let pipe_terminals: Vec<String> = PIPE_GATES.iter().map(|g| g.to_string()).collect();
        let pipe = Nodetype::new(
            "Pipe",
            pipe_terminals.clone(),
            pipe_terminals,
            NodeFunction::Builtin(builtins::pipe),
        )
        .with_parameters(
            ["expectation", "wait"],
            [("expectation", Value::from(1.0)), ("wait", Value::from(10))],
        );

        let sensor = Nodetype::new(
            "Sensor",
            vec!["gen".to_string()],
            Vec::new(),
            NodeFunction::Builtin(builtins::sensor),
        )
        .with_parameters(["datasource"], []);

        let actor = Nodetype::new(
            "Actor",
            vec!["gen".to_string()],
            vec!["gen".to_string()],
            NodeFunction::Builtin(builtins::actor),
        )
        .with_parameters(["datatarget"], []);

        let activator = Nodetype::new(
            "Activator",
            vec!["gen".to_string()],
            vec!["gen".to_string()],
            NodeFunction::Builtin(builtins::activator),
        )
        .with_parameters(["type"], []);

        for nodetype in [register, pipe, sensor, actor, activator] {
            standard.insert(nodetype.name().to_string(), Arc::new(nodetype));
        }

        Self {
            standard,
            native: FxIndexMap::default(),
        }
    }

    /// True if the name denotes a built-in type rather than a native
    /// module.
    #[must_use]
    pub fn is_standard_name(name: &str) -> bool {
        STANDARD_NODETYPES.contains(&name)
    }

    /// Looks up a nodetype by name, native modules included.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<Nodetype>> {
        self.standard.get(name).or_else(|| self.native.get(name))
    }

    /// True if a type of this name is known.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// The names of the currently registered native modules.
    pub fn native_names(&self) -> impl Iterator<Item = &str> {
        self.native.keys().map(String::as_str)
    }

    /// Replaces the full set of native modules.
    ///
    /// Standard types cannot be shadowed; a spec reusing a standard name is
    /// dropped with a warning.
    pub fn replace_native_modules(&mut self, specs: Vec<NativeModuleSpec>) {
        self.native.clear();
        for spec in specs {
            if Self::is_standard_name(&spec.name) {
                tracing::warn!(
                    name = %spec.name,
                    "native module shadows a standard nodetype, dropped"
                );
                continue;
            }
            self.native
                .insert(spec.name.clone(), Arc::new(spec.into_nodetype()));
        }
    }
}

impl Default for NodetypeRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_registry_is_complete() {
        let registry = NodetypeRegistry::standard();
        for name in STANDARD_NODETYPES {
            assert!(registry.contains(name), "missing {name}");
        }
        assert!(!registry.contains("Frobnicator"));
    }

    #[test]
    fn pipe_declares_directional_terminals() {
        let registry = NodetypeRegistry::standard();
        let pipe = registry.get("Pipe").unwrap();
        assert_eq!(pipe.gate_names().len(), PIPE_GATES.len());
        assert_eq!(pipe.slot_names().len(), PIPE_GATES.len());
    }

    #[test]
    fn native_module_cannot_shadow_standard_type() {
        let mut registry = NodetypeRegistry::standard();
        let spec = NativeModuleSpec::new(
            "Register",
            Arc::new(|_api: &mut NetApi, _uid: &str| Ok(())),
        );
        registry.replace_native_modules(vec![spec]);
        assert!(registry.native_names().next().is_none());
    }

    #[test]
    fn gate_baseline_merges_nodetype_defaults() {
        let mut gate_defaults = FxIndexMap::default();
        let mut foo = FxIndexMap::default();
        foo.insert("amplification".to_string(), Value::from(13.0));
        gate_defaults.insert("foo".to_string(), foo);

        let nodetype = Nodetype::new(
            "Testnode",
            vec!["gen".to_string(), "foo".to_string()],
            vec!["gen".to_string()],
            NodeFunction::Builtin(builtins::register),
        )
        .with_gate_defaults(gate_defaults);

        assert_eq!(nodetype.gate_baseline("foo").amplification, 13.0);
        assert_eq!(nodetype.gate_baseline("gen").amplification, 1.0);
    }
}
