//! The step engine: one propagate + evaluate cycle.

use serde_json::Value;
use tracing::{debug, error, warn};

use crate::error::NetResult;
use crate::net::gate::GateFunction;
use crate::net::monitor::{Monitor, TerminalKind};
use crate::net::netapi::NetApi;
use crate::net::nodetype::NodetypeRegistry;
use crate::net::sheaf::{fold_sheaf_id, DEFAULT_SHEAF};
use crate::world::WorldAdapter;

use super::Nodenet;

/// An inline suspension raised by a node function.
///
/// Prompts are not errors: the step completes normally, the runner stops
/// scheduling, and the caller resumes by clearing the prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct UserPrompt {
    /// The node that raised the prompt.
    pub node_uid: String,
    /// The message to present.
    pub msg: String,
    /// Parameter descriptors for `ask_user_for_parameter`, `None` for a
    /// plain notification.
    pub options: Option<Value>,
}

/// What one call to [`Nodenet::step`] produced.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub struct StepReport {
    /// The step counter after the tick.
    pub current_step: u64,
    /// The prompt raised during the tick, if any.
    pub user_prompt: Option<UserPrompt>,
}

impl Nodenet {
    /// Advances the net by one simulation step.
    ///
    /// The node set is snapshotted at the top of the tick: nodes created or
    /// deleted by node functions join in the next tick. Within the tick,
    /// classes evaluate in the fixed order activators, native modules,
    /// everything else; inside a class, nodes run in insertion order.
    pub fn step(&mut self, mut world: Option<&mut dyn WorldAdapter>) -> StepReport {
        self.user_prompt = None;
        if let Some(world) = world.as_deref_mut() {
            world.snapshot();
        }

        let snapshot = self.node_uids();
        self.propagate(&snapshot);
        self.locks.tick();

        let mut activators = Vec::new();
        let mut native_modules = Vec::new();
        let mut everything_else = Vec::new();
        for uid in &snapshot {
            let Some(node) = self.nodes.get(uid) else {
                continue;
            };
            if node.nodetype() == "Activator" {
                activators.push(uid.clone());
            } else if !NodetypeRegistry::is_standard_name(node.nodetype()) {
                native_modules.push(uid.clone());
            } else {
                everything_else.push(uid.clone());
            }
        }

        {
            let mut api = NetApi::new(self, world);
            evaluate_class(&mut api, &activators);
            api.net_mut().refresh_activators(&activators);
            evaluate_class(&mut api, &native_modules);
            evaluate_class(&mut api, &everything_else);
        }

        for name in std::mem::take(&mut self.deferred_unlocks) {
            self.locks.unlock(&name);
        }

        self.advance_step();
        self.sample_monitors();

        debug!(step = self.current_step(), "step complete");
        StepReport {
            current_step: self.current_step(),
            user_prompt: self.user_prompt.clone(),
        }
    }

    /// Publishes the activation of every evaluated Activator to its
    /// nodespace, making the gating state visible to later classes.
    fn refresh_activators(&mut self, activators: &[String]) {
        for uid in activators {
            let Some(node) = self.nodes.get(uid) else {
                continue;
            };
            let Some(activator_type) = node.parameter_str("type").map(str::to_string) else {
                continue;
            };
            let activation = node.activation();
            let nodespace = node.parent_nodespace().to_string();
            if let Some(nodespace) = self.nodespaces.get_mut(&nodespace) {
                nodespace
                    .activator_nodes
                    .insert(activator_type.clone(), uid.clone());
                nodespace.activators.insert(activator_type, activation);
            }
        }
    }

    /// The link function: moves activation from gates to slots.
    ///
    /// Phase A zeroes all slot lanes. Phase B carries lane existence from
    /// spreading gates to downstream slots. Phase C sums the weighted
    /// contributions per lane, collapsing lanes into `default` at actors
    /// and folding origin-tagged lanes back into their parent at the
    /// tagging node.
    pub(crate) fn propagate(&mut self, snapshot: &[String]) {
        // Phase A
        for uid in snapshot {
            if let Some(node) = self.nodes.get_mut(uid) {
                for slot in node.slots.values_mut() {
                    slot.reset();
                }
            }
        }

        // Phase B
        for uid in snapshot {
            let Some(node) = self.nodes.get(uid) else {
                continue;
            };
            let spreading: Vec<String> = node
                .gates
                .values()
                .filter(|gate| gate.parameters().spreadsheaves)
                .map(|gate| gate.name().to_string())
                .collect();

            for gate_name in spreading {
                let gate = self.nodes[uid.as_str()].gate(&gate_name).expect("collected");
                let lanes: Vec<(String, String)> = gate
                    .sheaves()
                    .values()
                    .map(|sheaf| (sheaf.uid.clone(), sheaf.name.clone()))
                    .collect();
                let targets: Vec<String> = gate
                    .outgoing()
                    .filter_map(|link_uid| self.links.get(link_uid))
                    .map(|link| link.target_node_uid.clone())
                    .collect();

                for target_uid in targets {
                    let Some(target) = self.nodes.get_mut(&target_uid) else {
                        continue;
                    };
                    if target.nodetype() == "Actor" {
                        continue;
                    }
                    for (lane_uid, lane_name) in &lanes {
                        // lanes tagged with this node fold here instead
                        if fold_sheaf_id(lane_uid, &target_uid).is_some() {
                            continue;
                        }
                        for slot in target.slots.values_mut() {
                            if !slot.sheaves().contains_key(lane_uid) {
                                slot.ensure_sheaf(lane_uid).name = lane_name.clone();
                            }
                        }
                    }
                }
            }
        }

        // Phase C
        for uid in snapshot {
            let Some(node) = self.nodes.get(uid) else {
                continue;
            };
            let nodespace_uid = node.parent_nodespace().to_string();
            let gate_names: Vec<String> = node.gate_names().map(str::to_string).collect();

            for gate_name in gate_names {
                if self.gate_is_blocked(&nodespace_uid, &gate_name) {
                    continue;
                }

                let gate = self.nodes[uid.as_str()].gate(&gate_name).expect("listed");
                let mut contributions: Vec<(String, String, String, f64)> = Vec::new();
                for link_uid in gate.outgoing() {
                    let Some(link) = self.links.get(link_uid) else {
                        continue;
                    };
                    let target_is_actor = self
                        .nodes
                        .get(&link.target_node_uid)
                        .is_some_and(|t| t.nodetype() == "Actor");

                    for sheaf in gate.sheaves().values() {
                        let amount = sheaf.activation * link.weight;
                        let lane = if target_is_actor {
                            DEFAULT_SHEAF.to_string()
                        } else {
                            sheaf.uid.clone()
                        };
                        contributions.push((
                            link.target_node_uid.clone(),
                            link.target_slot_name.clone(),
                            lane,
                            amount,
                        ));
                    }
                }

                for (target_uid, slot_name, lane, amount) in contributions {
                    let Some(target) = self.nodes.get_mut(&target_uid) else {
                        continue;
                    };
                    let Some(slot) = target.slot_mut(&slot_name) else {
                        continue;
                    };
                    if slot.sheaves().contains_key(&lane) {
                        slot.add_activation(&lane, amount);
                    } else if let Some(parent) = fold_sheaf_id(&lane, &target_uid) {
                        let parent = parent.to_string();
                        slot.add_activation(&parent, amount);
                    }
                    // contributions into unknown lanes are discarded
                }
            }
        }
    }

    /// True if links from gates of this name are currently suppressed by
    /// an inactive Activator in the given nodespace.
    fn gate_is_blocked(&self, nodespace_uid: &str, gate_name: &str) -> bool {
        let Some(nodespace) = self.nodespaces.get(nodespace_uid) else {
            return false;
        };
        let Some(activator_uid) = nodespace.activator_node(gate_name) else {
            return false;
        };
        let Some(activator) = self.nodes.get(activator_uid) else {
            return false;
        };
        activator
            .gate("gen")
            .map_or(0.0, |gate| gate.activation(DEFAULT_SHEAF))
            <= 0.0
    }

    /// The gen input of a node for one lane: the gen slot sum while the
    /// slot is driven, otherwise the gate's held activation.
    pub(crate) fn gen_input(&self, node_uid: &str, sheaf: &str) -> NetResult<f64> {
        let node = self.node_or_err(node_uid)?;
        let driven = node.slot("gen").is_some_and(|slot| slot.incoming().count() > 0);
        if driven {
            Ok(node.slot("gen").expect("checked").activation(sheaf))
        } else {
            Ok(node.gate("gen").map_or(0.0, |gate| gate.activation(sheaf)))
        }
    }

    /// Runs the gate function of one gate for one lane and stores the
    /// output.
    ///
    /// The function is the nodespace override for the node's
    /// (nodetype, gate) pair if one is installed, the default transfer
    /// function otherwise.
    pub(crate) fn run_gate_function(
        &mut self,
        node_uid: &str,
        gate_name: &str,
        sheaf: &str,
        input: f64,
    ) -> NetResult<()> {
        let node = self.node_or_err(node_uid)?;
        let nodetype = node.nodetype().to_string();
        let nodespace = node.parent_nodespace().to_string();
        let Some(gate) = node.gate(gate_name) else {
            return Err(crate::error::NetError::InvalidArgument(format!(
                "node {node_uid} has no gate '{gate_name}'"
            )));
        };
        let params = *gate.parameters();

        let function = self
            .nodespaces
            .get(&nodespace)
            .and_then(|ns| ns.gate_function(&nodetype, gate_name))
            .unwrap_or(GateFunction::Threshold);
        let output = function.apply(input, &params);

        let node = self.node_mut_or_err(node_uid)?;
        node.gate_mut(gate_name)
            .expect("checked above")
            .set_activation(sheaf, output);
        if gate_name == "gen" && sheaf == DEFAULT_SHEAF {
            node.activation = output;
        }
        Ok(())
    }

    fn sample_monitors(&mut self) {
        let step = self.current_step();
        let mut samples: Vec<(String, f64)> = Vec::new();
        for (uid, monitor) in &self.monitors {
            if let Some(value) = self.sample_monitor(monitor) {
                samples.push((uid.clone(), value));
            }
        }
        for (uid, value) in samples {
            if let Some(monitor) = self.monitors.get_mut(&uid) {
                monitor.record(step, value);
            }
        }
    }

    /// Reads the value a monitor points at; `None` if its node or terminal
    /// is gone.
    fn sample_monitor(&self, monitor: &Monitor) -> Option<f64> {
        let node = self.nodes.get(&monitor.node_uid)?;
        match monitor.kind {
            TerminalKind::Gate => Some(node.gate(&monitor.name)?.activation(&monitor.sheaf)),
            TerminalKind::Slot => Some(node.slot(&monitor.name)?.activation(&monitor.sheaf)),
        }
    }
}

fn evaluate_class(api: &mut NetApi<'_, '_>, uids: &[String]) {
    for uid in uids {
        if !api.net().is_node(uid) {
            // deleted earlier in this tick
            continue;
        }
        let nodetype_name = api.net().node(uid).expect("checked").nodetype().to_string();
        let Some(nodetype) = api.net().registry().get(&nodetype_name).cloned() else {
            warn!(node = %uid, nodetype = %nodetype_name, "node of unknown type skipped");
            continue;
        };
        if let Err(err) = nodetype.node_function().call(api, uid) {
            error!(node = %uid, error = %err, "node function failed");
        }
    }
}
