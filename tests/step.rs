use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::Value;

use nodenet::prelude::*;

fn pipe(net: &mut Nodenet, name: &str) -> String {
    net.create_node("Pipe", ROOT_UID, name, (100.0, 100.0), None)
        .unwrap()
}

#[test]
fn two_pipe_chain_carries_activation() {
    let mut net = Nodenet::new(None, "chain", "");
    let a = pipe(&mut net, "A");
    let b = pipe(&mut net, "B");
    net.create_link(&a, "por", &b, "gen", 1.0, 1.0).unwrap();

    net.set_node_activation(&a, 1.0).unwrap();
    net.step(None);

    let activation = net.node(&b).unwrap().gate("gen").unwrap().activation(DEFAULT_SHEAF);
    assert!((-1.0..=1.0).contains(&activation));
    assert!((activation - 1.0).abs() < 1e-12);
}

#[test]
fn activator_gates_directional_propagation() {
    let mut net = Nodenet::new(None, "gating", "");
    let activator = net
        .create_node("Activator", ROOT_UID, "act", (0.0, 0.0), None)
        .unwrap();
    net.set_node_parameters(&activator, [("type".to_string(), Value::from("por"))])
        .unwrap();

    let x = pipe(&mut net, "X");
    let y = pipe(&mut net, "Y");
    net.create_link(&x, "por", &y, "gen", 1.0, 1.0).unwrap();
    net.set_node_activation(&x, 1.0).unwrap();

    net.step(None);
    assert_eq!(
        net.node(&y).unwrap().gate("gen").unwrap().activation(DEFAULT_SHEAF),
        0.0,
        "inactive activator must suppress por propagation"
    );

    net.set_node_activation(&activator, 1.0).unwrap();
    net.step(None);
    assert!(
        net.node(&y).unwrap().gate("gen").unwrap().activation(DEFAULT_SHEAF) > 0.0,
        "active activator must let por propagation through"
    );
}

#[test]
fn step_counter_increases_by_one() {
    let mut net = Nodenet::new(None, "steps", "");
    pipe(&mut net, "A");
    for expected in 1..=5 {
        let report = net.step(None);
        assert_eq!(report.current_step, expected);
        assert_eq!(net.current_step(), expected);
    }
}

#[test]
fn default_sheaf_survives_stepping() {
    let mut net = Nodenet::new(None, "sheaves", "");
    let a = pipe(&mut net, "A");
    let b = pipe(&mut net, "B");
    net.create_link(&a, "gen", &b, "gen", 1.0, 1.0).unwrap();
    net.step(None);
    net.step(None);

    for uid in [&a, &b] {
        let node = net.node(uid).unwrap();
        for gate_name in node.gate_names().map(str::to_string).collect::<Vec<_>>() {
            assert!(node.gate(&gate_name).unwrap().sheaves().contains_key(DEFAULT_SHEAF));
        }
        for slot_name in node.slot_names().map(str::to_string).collect::<Vec<_>>() {
            assert!(node.slot(&slot_name).unwrap().sheaves().contains_key(DEFAULT_SHEAF));
        }
    }
}

#[test]
fn split_sheaf_folds_at_its_origin_node() {
    let mut net = Nodenet::new(None, "fold", "");
    let a = net
        .create_node("Register", ROOT_UID, "A", (0.0, 0.0), None)
        .unwrap();
    let y = net
        .create_node("Register", ROOT_UID, "Y", (50.0, 0.0), None)
        .unwrap();
    net.create_link(&a, "gen", &y, "gen", 1.0, 1.0).unwrap();
    net.set_gate_parameters(&a, "gen", [("spreadsheaves".to_string(), Value::from(true))])
        .unwrap();

    let split_id = split_sheaf_id(DEFAULT_SHEAF, &y);
    {
        let gate = net.node_mut(&a).unwrap().gate_mut("gen").unwrap();
        gate.set_activation(DEFAULT_SHEAF, 0.5);
        gate.set_activation(&split_id, 0.4);
    }

    net.step(None);

    let slot = net.node(&y).unwrap().slot("gen").unwrap();
    assert!(
        !slot.sheaves().contains_key(&split_id),
        "a lane tagged with the target node must not be spread onto it"
    );
    assert!((slot.activation(DEFAULT_SHEAF) - 0.9).abs() < 1e-12);
}

#[test]
fn zero_weight_link_still_spreads_sheaves() {
    let mut net = Nodenet::new(None, "spread", "");
    let a = pipe(&mut net, "A");
    let b = pipe(&mut net, "B");
    net.create_link(&a, "gen", &b, "gen", 0.0, 1.0).unwrap();
    net.set_gate_parameters(&a, "gen", [("spreadsheaves".to_string(), Value::from(true))])
        .unwrap();
    net.node_mut(&a)
        .unwrap()
        .gate_mut("gen")
        .unwrap()
        .set_activation("context", 0.8);

    net.step(None);

    let slot = net.node(&b).unwrap().slot("gen").unwrap();
    assert!(slot.sheaves().contains_key("context"));
    assert_eq!(slot.activation("context"), 0.0);
}

#[test]
fn actors_receive_into_the_default_sheaf() {
    let mut net = Nodenet::new(None, "actor", "");
    let a = net
        .create_node("Register", ROOT_UID, "A", (0.0, 0.0), None)
        .unwrap();
    let actor = net
        .create_node("Actor", ROOT_UID, "motor", (50.0, 0.0), None)
        .unwrap();
    net.create_link(&a, "gen", &actor, "gen", 1.0, 1.0).unwrap();
    {
        let gate = net.node_mut(&a).unwrap().gate_mut("gen").unwrap();
        gate.set_activation(DEFAULT_SHEAF, 0.3);
        gate.set_activation("context", 0.7);
    }

    net.step(None);

    let slot = net.node(&actor).unwrap().slot("gen").unwrap();
    assert!(!slot.sheaves().contains_key("context"));
    assert!((slot.activation(DEFAULT_SHEAF) - 1.0).abs() < 1e-12);
}

#[test]
fn gate_function_override_applies_per_nodespace() {
    let mut net = Nodenet::new(None, "override", "");
    let a = net
        .create_node("Register", ROOT_UID, "A", (0.0, 0.0), None)
        .unwrap();
    {
        let mut api = NetApi::new(&mut net, None);
        api.set_gatefunction(ROOT_UID, "Register", "gen", Some("zero"))
            .unwrap();
    }
    net.set_node_activation(&a, 0.7).unwrap();
    net.step(None);

    assert_eq!(
        net.node(&a).unwrap().gate("gen").unwrap().activation(DEFAULT_SHEAF),
        0.0
    );
}

#[test]
fn nodes_created_during_a_tick_join_the_next_tick() {
    let mut net = Nodenet::new(None, "snapshot", "");
    let calls = Arc::new(AtomicUsize::new(0));
    let spawner_calls = Arc::clone(&calls);

    let spec = NativeModuleSpec::new(
        "Spawner",
        Arc::new(move |api: &mut NetApi, _uid: &str| {
            spawner_calls.fetch_add(1, Ordering::SeqCst);
            api.create_node("Register", ROOT_UID, Some("spawned"))?;
            Ok(())
        }),
    );
    net.reload_native_modules(vec![spec]).unwrap();
    net.create_node("Spawner", ROOT_UID, "spawner", (0.0, 0.0), None)
        .unwrap();

    net.step(None);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(net.node_uids().len(), 2);

    net.step(None);
    assert_eq!(net.node_uids().len(), 3);
}

#[test]
fn failing_node_function_does_not_abort_the_step() {
    let mut net = Nodenet::new(None, "errors", "");
    let spec = NativeModuleSpec::new(
        "Broken",
        Arc::new(|_api: &mut NetApi, uid: &str| {
            Err(NetError::InvalidArgument(format!("{uid} is broken")))
        }),
    );
    net.reload_native_modules(vec![spec]).unwrap();
    net.create_node("Broken", ROOT_UID, "broken", (0.0, 0.0), None)
        .unwrap();
    let a = pipe(&mut net, "A");

    let report = net.step(None);
    assert_eq!(report.current_step, 1);
    assert!(net.is_node(&a));
}

#[test]
fn links_survive_stepping() {
    let mut net = Nodenet::new(None, "links", "");
    let a = pipe(&mut net, "A");
    let b = pipe(&mut net, "B");
    net.create_link(&a, "por", &b, "gen", 0.5, 1.0).unwrap();
    net.step(None);

    for link in net.links() {
        assert!(net.is_node(&link.source_node_uid));
        assert!(net.is_node(&link.target_node_uid));
    }
}
