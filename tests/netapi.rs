use std::sync::{Arc, Mutex};

use serde_json::Value;

use nodenet::prelude::*;

fn pipes(net: &mut Nodenet, names: &[&str]) -> Vec<String> {
    names
        .iter()
        .map(|name| {
            net.create_node("Pipe", ROOT_UID, name, (100.0, 100.0), None)
                .unwrap()
        })
        .collect()
}

#[test]
fn relinking_overwrites_instead_of_duplicating() {
    let mut net = Nodenet::new(None, "idempotent", "");
    let nodes = pipes(&mut net, &["A", "B"]);

    let first = net.create_link(&nodes[0], "por", &nodes[1], "gen", 0.5, 1.0).unwrap();
    let second = net.create_link(&nodes[0], "por", &nodes[1], "gen", 1.0, 0.1).unwrap();

    assert_eq!(first, second);
    assert_eq!(net.links().count(), 1);
    let link = net.link(&first).unwrap();
    assert_eq!(link.weight, 1.0);
    assert_eq!(link.certainty, 0.1);
}

#[test]
fn deleting_a_node_removes_all_its_links() {
    let mut net = Nodenet::new(None, "delete", "");
    let nodes = pipes(&mut net, &["A", "B", "C"]);
    net.create_link(&nodes[0], "por", &nodes[1], "gen", 1.0, 1.0).unwrap();
    net.create_link(&nodes[1], "por", &nodes[2], "gen", 1.0, 1.0).unwrap();
    net.create_link(&nodes[2], "ret", &nodes[1], "gen", 1.0, 1.0).unwrap();

    net.delete_node(&nodes[1]).unwrap();

    assert_eq!(net.links().count(), 0);
    for uid in [&nodes[0], &nodes[2]] {
        let node = net.node(uid).unwrap();
        assert!(node.associated_link_uids().is_empty());
    }
}

#[test]
fn reciprocal_links_pick_the_matching_slots() {
    let mut net = Nodenet::new(None, "reciprocal", "");
    let nodes = pipes(&mut net, &["A", "B"]);
    {
        let mut api = NetApi::new(&mut net, None);
        api.link_with_reciprocal(&nodes[0], &nodes[1], ReciprocalType::PorRet, 1.0, 1.0)
            .unwrap();
    }

    let links: Vec<_> = net.links().collect();
    assert_eq!(links.len(), 2);
    assert!(links.iter().any(|l| {
        l.source_node_uid == nodes[0]
            && l.source_gate_name == "por"
            && l.target_slot_name == "por"
    }));
    assert!(links.iter().any(|l| {
        l.source_node_uid == nodes[1]
            && l.source_gate_name == "ret"
            && l.target_slot_name == "ret"
    }));
}

#[test]
fn reciprocal_links_fall_back_to_gen_slots() {
    let mut net = Nodenet::new(None, "fallback", "");
    let a = net
        .create_node("Pipe", ROOT_UID, "A", (0.0, 0.0), None)
        .unwrap();
    let b = net
        .create_node("Register", ROOT_UID, "B", (50.0, 0.0), None)
        .unwrap();
    {
        let mut api = NetApi::new(&mut net, None);
        // a register has no sub slot, so the forward link lands on gen;
        // the backward direction needs the register's sur gate and fails
        api.link(&a, "sub", &b, "gen", 1.0, 1.0).unwrap();
        let err = api.link_with_reciprocal(&a, &b, ReciprocalType::SubSur, 1.0, 1.0);
        assert!(err.is_err());
    }
}

#[test]
fn link_full_connects_every_pair_reciprocally() {
    let mut net = Nodenet::new(None, "full", "");
    let nodes = pipes(&mut net, &["A", "B", "C"]);
    {
        let mut api = NetApi::new(&mut net, None);
        api.link_full(&nodes, ReciprocalType::PorRet, 1.0, 1.0).unwrap();
    }
    // 3 unordered pairs, 4 distinct directed links each (por and ret both
    // ways), deduplicated by the idempotent link operation
    assert_eq!(net.links().count(), 12);
}

#[test]
fn gate_field_queries_filter_by_exclusion_and_nodespace() {
    let mut net = Nodenet::new(None, "fields", "");
    let nodes = pipes(&mut net, &["A", "B", "C"]);
    net.create_link(&nodes[0], "por", &nodes[1], "gen", 1.0, 1.0).unwrap();
    net.create_link(&nodes[0], "por", &nodes[2], "gen", 1.0, 1.0).unwrap();
    // B has outgoing sub links, C has none
    net.create_link(&nodes[1], "sub", &nodes[2], "gen", 1.0, 1.0).unwrap();

    let api = NetApi::new(&mut net, None);
    let all = api
        .get_nodes_in_gate_field(&nodes[0], Some("por"), None, None)
        .unwrap();
    assert_eq!(all.len(), 2);

    let filtered = api
        .get_nodes_in_gate_field(&nodes[0], Some("por"), Some(&["sub"]), None)
        .unwrap();
    assert_eq!(filtered, vec![nodes[2].clone()]);

    let slot_side = api
        .get_nodes_in_slot_field(&nodes[2], Some("gen"), None, None)
        .unwrap();
    assert_eq!(slot_side.len(), 2);
}

#[test]
fn active_node_query_respects_threshold_and_gate() {
    let mut net = Nodenet::new(None, "active", "");
    let nodes = pipes(&mut net, &["A", "B"]);
    net.set_node_activation(&nodes[0], 0.9).unwrap();
    net.set_node_activation(&nodes[1], 0.2).unwrap();

    let api = NetApi::new(&mut net, None);
    let active = api.get_nodes_active(ROOT_UID, Some("Pipe"), 0.5, Some("gen"), None);
    assert_eq!(active, vec![nodes[0].clone()]);

    let all = api.get_nodes_active(ROOT_UID, None, 0.1, None, None);
    assert_eq!(all.len(), 2);
}

#[test]
fn sensors_and_actors_close_the_world_loop() {
    let mut world = DictWorld::new()
        .with_datasources(["light"])
        .with_datatargets(["motor"]);
    world.set_datasource("light", 0.8);

    let mut net = Nodenet::new(None, "embodied", "");
    let sensor = net
        .create_node("Sensor", ROOT_UID, "light", (0.0, 0.0), None)
        .unwrap();
    net.set_node_parameters(&sensor, [("datasource".to_string(), Value::from("light"))])
        .unwrap();
    let actor = net
        .create_node("Actor", ROOT_UID, "motor", (50.0, 0.0), None)
        .unwrap();
    net.set_node_parameters(&actor, [("datatarget".to_string(), Value::from("motor"))])
        .unwrap();
    net.create_link(&sensor, "gen", &actor, "gen", 1.0, 1.0).unwrap();

    net.step(Some(&mut world));
    assert!(
        (net.node(&sensor).unwrap().activation() - 0.8).abs() < 1e-12,
        "the sensor reads its datasource during the first step"
    );

    net.step(Some(&mut world));
    assert!((world.datatarget("motor").unwrap() - 0.8).abs() < 1e-12);
}

#[test]
fn import_sensors_is_idempotent() {
    let mut world = DictWorld::new().with_datasources(["pos_x", "pos_y", "vel"]);
    let mut net = Nodenet::new(None, "import", "");
    {
        let mut api = NetApi::new(&mut net, Some(&mut world));
        let first = api.import_sensors(ROOT_UID, Some("pos_")).unwrap();
        assert_eq!(first.len(), 2);
        let second = api.import_sensors(ROOT_UID, Some("pos_")).unwrap();
        assert_eq!(first, second);
    }
    assert_eq!(net.get_sensors(Some(ROOT_UID)).len(), 2);
}

#[test]
fn link_actor_creates_and_reuses_the_bound_actor() {
    let mut world = DictWorld::new().with_datatargets(["grip"]);
    let mut net = Nodenet::new(None, "actors", "");
    let a = net
        .create_node("Pipe", ROOT_UID, "A", (0.0, 0.0), None)
        .unwrap();
    let b = net
        .create_node("Pipe", ROOT_UID, "B", (10.0, 0.0), None)
        .unwrap();

    let mut api = NetApi::new(&mut net, Some(&mut world));
    let actor = api.link_actor(&a, "grip", 1.0, 1.0, None).unwrap();
    let again = api.link_actor(&b, "grip", 1.0, 1.0, None).unwrap();
    assert_eq!(actor, again);

    assert!(matches!(
        api.link_actor(&a, "nonexistent", 1.0, 1.0, None),
        Err(NetError::InvalidArgument(_))
    ));
}

#[test]
fn unlink_direction_removes_both_sides_of_a_linktype() {
    let mut net = Nodenet::new(None, "direction", "");
    let nodes = pipes(&mut net, &["A", "B", "C"]);
    net.create_link(&nodes[0], "por", &nodes[1], "por", 1.0, 1.0).unwrap();
    net.create_link(&nodes[2], "por", &nodes[0], "por", 1.0, 1.0).unwrap();
    net.create_link(&nodes[0], "sub", &nodes[1], "sub", 1.0, 1.0).unwrap();

    {
        let mut api = NetApi::new(&mut net, None);
        api.unlink_direction(&nodes[0], Some("por")).unwrap();
    }

    let remaining: Vec<_> = net.links().collect();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].source_gate_name, "sub");
}

#[test]
fn deleting_a_nodespace_empties_its_subtree() {
    let mut net = Nodenet::new(None, "tree", "");
    let outer = net
        .create_nodespace(ROOT_UID, "outer", (0.0, 0.0), None)
        .unwrap();
    let inner = net.create_nodespace(&outer, "inner", (0.0, 0.0), None).unwrap();
    let kept = net.create_node("Pipe", ROOT_UID, "kept", (0.0, 0.0), None).unwrap();
    let doomed = net.create_node("Pipe", &inner, "doomed", (0.0, 0.0), None).unwrap();
    net.create_link(&kept, "por", &doomed, "gen", 1.0, 1.0).unwrap();

    net.delete_nodespace(&outer).unwrap();

    assert!(!net.is_nodespace(&outer));
    assert!(!net.is_nodespace(&inner));
    assert!(!net.is_node(&doomed));
    assert!(net.is_node(&kept));
    assert_eq!(net.links().count(), 0);
    assert!(net.nodes().all(|n| net.is_nodespace(n.parent_nodespace())));

    assert!(net.delete_nodespace(ROOT_UID).is_err());
}

#[test]
fn self_links_are_permitted() {
    let mut net = Nodenet::new(None, "selfref", "");
    let a = net.create_node("Pipe", ROOT_UID, "A", (0.0, 0.0), None).unwrap();
    net.create_link(&a, "gen", &a, "gen", 1.0, 1.0).unwrap();

    net.set_node_activation(&a, 0.5).unwrap();
    net.step(None);
    // the gen loop sustains the activation through its own link
    assert!((net.node(&a).unwrap().activation() - 0.5).abs() < 1e-12);

    let removed = net.unlink(&a, Some("gen"), Some(&a), Some("gen")).unwrap();
    assert_eq!(removed, 1);
    assert_eq!(net.links().count(), 0);
}

#[test]
fn notify_user_raises_a_prompt_and_deactivates_the_net() {
    let mut net = Nodenet::new(None, "prompt", "");
    let spec = NativeModuleSpec::new(
        "Asker",
        Arc::new(|api: &mut NetApi, uid: &str| {
            let uid = uid.to_string();
            api.notify_user(&uid, "please decide");
            Ok(())
        }),
    );
    net.reload_native_modules(vec![spec]).unwrap();
    let asker = net
        .create_node("Asker", ROOT_UID, "asker", (0.0, 0.0), None)
        .unwrap();
    net.set_active(true);

    let report = net.step(None);
    let prompt = report.user_prompt.expect("prompt raised during the step");
    assert_eq!(prompt.node_uid, asker);
    assert_eq!(prompt.msg, "please decide");
    assert!(!net.is_active());

    // stepping again clears the old prompt before the node re-raises it
    let report = net.step(None);
    assert_eq!(report.user_prompt.map(|p| p.msg), Some("please decide".to_string()));
}

#[test]
fn recipes_run_once_with_merged_defaults() {
    let mut runtime = Runtime::new(std::env::temp_dir().join("nodenet-recipe-test"));
    let uid = runtime.new_nodenet("recipes", "", None, None).unwrap();

    let seen: Arc<Mutex<Option<Value>>> = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&seen);
    runtime.register_recipe(
        Recipe::new(
            "count_nodes",
            Arc::new(move |api: &mut NetApi, params: &FxIndexMap<String, Value>| {
                *sink.lock().unwrap() = params.get("count").cloned();
                Ok(Value::from(api.get_nodes(None, None).len()))
            }),
        )
        .with_parameter("count", Some(Value::from(23))),
    );

    let recipes = runtime.get_available_recipes();
    assert_eq!(recipes.len(), 1);
    assert_eq!(recipes[0].0, "count_nodes");

    let result = runtime
        .run_recipe(&uid, "count_nodes", Default::default())
        .unwrap();
    assert_eq!(result, Value::from(0));
    assert_eq!(*seen.lock().unwrap(), Some(Value::from(23)));
}
