use std::sync::Arc;

use serde_json::{json, Value};

use nodenet::prelude::*;

fn build_net() -> Nodenet {
    let mut net = Nodenet::new(Some("netuid00000000aa".to_string()), "fixture", "alice");
    let space = net
        .create_nodespace(ROOT_UID, "inner", (200.0, 100.0), None)
        .unwrap();
    let a = net
        .create_node("Pipe", ROOT_UID, "A", (100.0, 100.0), None)
        .unwrap();
    let b = net.create_node("Pipe", &space, "B", (300.0, 100.0), None).unwrap();
    let s = net
        .create_node("Sensor", ROOT_UID, "S", (100.0, 300.0), None)
        .unwrap();
    net.set_node_parameters(&s, [("datasource".to_string(), Value::from("light"))])
        .unwrap();
    net.set_gate_parameters(&a, "gen", [("maximum".to_string(), Value::from(0.5))])
        .unwrap();
    net.create_link(&a, "por", &b, "gen", 0.7, 0.9).unwrap();
    net.create_link(&s, "gen", &a, "gen", 1.0, 1.0).unwrap();
    net.add_monitor(&a, TerminalKind::Gate, "gen", None).unwrap();
    net.step(None);
    net.step(None);
    net
}

#[test]
fn save_load_roundtrip_preserves_the_net() {
    let original = build_net();
    let json = original.export_json();

    let data = NodenetData::from_json(&json).unwrap();
    let restored = Nodenet::from_data(data).unwrap();

    assert_eq!(restored.uid(), original.uid());
    assert_eq!(restored.name(), original.name());
    assert_eq!(restored.owner(), original.owner());
    assert_eq!(restored.current_step(), original.current_step());
    assert_eq!(restored.node_uids(), original.node_uids());
    assert_eq!(restored.nodespace_uids(), original.nodespace_uids());

    for node in original.nodes() {
        let restored_node = restored.node(node.uid()).unwrap();
        assert_eq!(restored_node.nodetype(), node.nodetype());
        assert_eq!(restored_node.parent_nodespace(), node.parent_nodespace());
        assert_eq!(restored_node.parameters(), node.parameters());
        assert_eq!(restored_node.position(), node.position());
    }
    for link in original.links() {
        assert_eq!(restored.link(&link.uid), Some(link));
    }
    for monitor in original.monitors() {
        assert_eq!(restored.monitor(&monitor.uid), Some(monitor));
    }

    // a second roundtrip is byte-stable
    assert_eq!(restored.export_json(), json);
}

#[test]
fn gate_parameter_overrides_roundtrip_as_deltas() {
    let original = build_net();
    let json = original.export_json();
    let document: Value = serde_json::from_str(&json).unwrap();

    let a_uid = original
        .nodes()
        .find(|n| n.name() == "A")
        .unwrap()
        .uid()
        .to_string();
    assert_eq!(
        document["nodes"][&a_uid]["gate_parameters"],
        json!({ "gen": { "maximum": 0.5 } })
    );

    let restored = Nodenet::from_data(NodenetData::from_json(&json).unwrap()).unwrap();
    let gate = restored.node(&a_uid).unwrap().gate("gen").unwrap();
    assert_eq!(gate.parameters().maximum, 0.5);
    assert_eq!(gate.parameters().minimum, -1.0);
}

#[test]
fn version_mismatch_aborts_the_load() {
    let mut document: Value = serde_json::from_str(&build_net().export_json()).unwrap();
    document["version"] = json!(1);
    assert_eq!(
        NodenetData::from_json(&document.to_string()),
        Err(NetError::VersionMismatch {
            expected: NODENET_VERSION,
            found: 1
        })
    );
}

#[test]
fn corrupt_entities_are_dropped_not_fatal() {
    let mut document: Value = serde_json::from_str(&build_net().export_json()).unwrap();
    document["nodespaces"]["broken"] = json!({ "name": "no uid in here" });
    document["nodes"]["alsobroken"] = json!({ "uid": "alsobroken" });

    let data = NodenetData::from_json(&document.to_string()).unwrap();
    let restored = Nodenet::from_data(data).unwrap();

    assert!(!restored.is_nodespace("broken"));
    assert!(!restored.is_node("alsobroken"));
    assert_eq!(restored.node_uids().len(), 3);
}

#[test]
fn unknown_nodetypes_are_dropped_with_their_links() {
    let mut document: Value = serde_json::from_str(&build_net().export_json()).unwrap();
    document["nodes"]["stranger0000000x"] = json!({
        "uid": "stranger0000000x",
        "type": "Flux",
        "parent_nodespace": "Root",
    });
    document["links"]["strangelink0000x"] = json!({
        "uid": "strangelink0000x",
        "source_node_uid": "stranger0000000x",
        "source_gate_name": "gen",
        "target_node_uid": "stranger0000000x",
        "target_slot_name": "gen",
        "weight": 1.0,
        "certainty": 1.0,
    });

    let restored = Nodenet::from_data(NodenetData::from_json(&document.to_string()).unwrap())
        .unwrap();
    assert!(!restored.is_node("stranger0000000x"));
    assert!(restored.link("strangelink0000x").is_none());
}

#[test]
fn merge_with_uid_collision_renames_the_incoming_side() {
    let mut net = build_net();
    let nodes_before = net.node_uids();
    let links_before: Vec<String> = net.links().map(|l| l.uid.clone()).collect();
    let snapshot = net.export_data();

    net.merge_data(&snapshot, true).unwrap();

    // the original entities are untouched
    for uid in &nodes_before {
        assert!(net.is_node(uid));
    }
    for uid in &links_before {
        assert!(net.link(uid).is_some());
    }

    // the incoming side arrived under fresh uids, links rewritten
    assert_eq!(net.node_uids().len(), nodes_before.len() * 2);
    assert_eq!(net.links().count(), links_before.len() * 2);
    for link in net.links() {
        assert!(net.is_node(&link.source_node_uid));
        assert!(net.is_node(&link.target_node_uid));
    }
}

#[test]
fn native_module_reload_preserves_the_export() {
    let mut net = Nodenet::new(None, "reload", "");
    let spec = || {
        NativeModuleSpec::new(
            "Testnode",
            Arc::new(|_api: &mut NetApi, _uid: &str| Ok(())),
        )
    };
    net.reload_native_modules(vec![spec()]).unwrap();

    let t = net
        .create_node("Testnode", ROOT_UID, "t", (10.0, 10.0), None)
        .unwrap();
    let a = net
        .create_node("Register", ROOT_UID, "a", (20.0, 10.0), None)
        .unwrap();
    net.create_link(&a, "gen", &t, "gen", 1.0, 1.0).unwrap();

    let before = net.export_data();
    net.reload_native_modules(vec![spec()]).unwrap();
    assert_eq!(net.export_data(), before);

    // dropping the module drops its nodes and their links
    net.reload_native_modules(Vec::new()).unwrap();
    assert!(!net.is_node(&t));
    assert!(net.is_node(&a));
    assert_eq!(net.links().count(), 0);
}

#[test]
fn nodetype_gate_defaults_reach_untouched_gates_on_reload() {
    let testnode = |amplification: f64| {
        let mut gate_defaults = FxIndexMap::default();
        let mut foo = FxIndexMap::default();
        foo.insert("amplification".to_string(), Value::from(amplification));
        gate_defaults.insert("foo".to_string(), foo);

        let mut spec = NativeModuleSpec::new(
            "Testnode",
            Arc::new(|_api: &mut NetApi, _uid: &str| Ok(())),
        );
        spec.gate_names = vec!["gen".to_string(), "foo".to_string()];
        spec.slot_names = vec!["gen".to_string()];
        spec.gate_defaults = gate_defaults;
        spec
    };

    let mut net = Nodenet::new(None, "defaults", "");
    net.reload_native_modules(vec![testnode(13.0)]).unwrap();
    let uid = net
        .create_node("Testnode", ROOT_UID, "t", (10.0, 10.0), None)
        .unwrap();
    // an explicit per-node override must survive the reload
    net.set_gate_parameters(&uid, "gen", [("maximum".to_string(), Value::from(0.5))])
        .unwrap();
    assert_eq!(
        net.node(&uid).unwrap().gate("foo").unwrap().parameters().amplification,
        13.0
    );

    net.reload_native_modules(vec![testnode(5.0)]).unwrap();
    let node = net.node(&uid).unwrap();
    assert_eq!(node.gate("foo").unwrap().parameters().amplification, 5.0);
    assert_eq!(node.gate("gen").unwrap().parameters().maximum, 0.5);
}

#[test]
fn runtime_saves_and_reverts_nodenets() {
    let dir = std::env::temp_dir().join(format!("nodenet-rt-{}", generate_uid()));
    let mut runtime = Runtime::new(&dir);

    let uid = runtime.new_nodenet("persisted", "bob", None, None).unwrap();
    let node = runtime
        .add_node(&uid, "Register", (10.0, 20.0), ROOT_UID, "keeper")
        .unwrap();
    runtime.save_nodenet(&uid).unwrap();

    // mutate, then revert to the saved state
    runtime.delete_node(&uid, &node).unwrap();
    {
        let net = runtime.nodenet(&uid).unwrap();
        assert_eq!(net.lock().unwrap().node_uids().len(), 0);
    }
    runtime.revert_nodenet(&uid).unwrap();
    {
        let net = runtime.nodenet(&uid).unwrap();
        let net = net.lock().unwrap();
        assert!(net.is_node(&node));
        assert_eq!(net.node(&node).unwrap().name(), "keeper");
    }

    runtime.delete_nodenet(&uid).unwrap();
    assert!(runtime.nodenet(&uid).is_err());
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn runtime_steps_and_monitors() {
    let dir = std::env::temp_dir().join(format!("nodenet-rt-{}", generate_uid()));
    let mut runtime = Runtime::new(&dir);
    let uid = runtime.new_nodenet("stepper", "", None, None).unwrap();
    let a = runtime
        .add_node(&uid, "Register", (0.0, 0.0), ROOT_UID, "A")
        .unwrap();
    runtime.set_node_activation(&uid, &a, 0.6).unwrap();
    let monitor = runtime.add_gate_monitor(&uid, &a, "gen", None).unwrap();

    let report = runtime.step_nodenet(&uid).unwrap();
    assert_eq!(report.current_step, 1);

    let monitors = runtime.get_monitor_data(&uid).unwrap();
    assert_eq!(monitors.len(), 1);
    assert_eq!(monitors[0].uid, monitor);
    assert!((monitors[0].values[&1] - 0.6).abs() < 1e-12);

    runtime.clear_monitor(&uid, &monitor).unwrap();
    let monitors = runtime.get_monitor_data(&uid).unwrap();
    assert!(monitors[0].values.is_empty());
}

#[test]
fn move_nodes_keeps_links_while_relocating() {
    let mut net = Nodenet::new(None, "movers", "");
    let space = net
        .create_nodespace(ROOT_UID, "target", (0.0, 0.0), None)
        .unwrap();
    let a = net.create_node("Pipe", ROOT_UID, "A", (0.0, 0.0), None).unwrap();
    let b = net.create_node("Pipe", ROOT_UID, "B", (10.0, 0.0), None).unwrap();
    let outside = net
        .create_node("Pipe", ROOT_UID, "keep", (20.0, 0.0), None)
        .unwrap();
    net.create_link(&a, "por", &b, "gen", 0.5, 1.0).unwrap();
    net.create_link(&outside, "sub", &a, "sub", 0.25, 1.0).unwrap();

    let renames = net
        .move_nodes(&[a.clone(), b.clone()], &[], Some(&space))
        .unwrap();

    assert!(!net.is_node(&a));
    assert!(!net.is_node(&b));
    let moved_a = &renames[&a];
    let moved_b = &renames[&b];
    assert_eq!(net.node(moved_a).unwrap().parent_nodespace(), space);
    assert_eq!(net.node(moved_b).unwrap().parent_nodespace(), space);

    let links: Vec<_> = net.links().collect();
    assert_eq!(links.len(), 2);
    assert!(links
        .iter()
        .any(|l| l.source_node_uid == *moved_a && l.target_node_uid == *moved_b && l.weight == 0.5));
    assert!(links
        .iter()
        .any(|l| l.source_node_uid == outside && l.target_node_uid == *moved_a && l.weight == 0.25));
}
