use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use nodenet::prelude::*;

#[test]
fn locks_time_out_after_ttl_steps() {
    let mut net = Nodenet::new(None, "ttl", "");
    net.lock("m", "k", 3).unwrap();

    net.step(None);
    assert!(net.is_locked("m"));
    net.step(None);
    assert!(net.is_locked("m"));
    net.step(None);
    assert!(!net.is_locked("m"));
}

#[test]
fn acquiring_a_held_lock_conflicts() {
    let mut net = Nodenet::new(None, "conflict", "");
    net.lock("m", "k", 10).unwrap();
    assert_eq!(
        net.lock("m", "other", 10),
        Err(NetError::LockConflict("m".to_string()))
    );
    assert!(net.is_locked_by("m", "k"));
    assert!(!net.is_locked_by("m", "other"));
}

#[test]
fn netapi_unlock_is_deferred_to_end_of_step() {
    let mut net = Nodenet::new(None, "deferred", "");

    let observed_locked = Arc::new(AtomicBool::new(false));
    let observer_flag = Arc::clone(&observed_locked);

    let unlocker = NativeModuleSpec::new(
        "Unlocker",
        Arc::new(|api: &mut NetApi, _uid: &str| {
            api.unlock("L");
            Ok(())
        }),
    );
    let observer = NativeModuleSpec::new(
        "Observer",
        Arc::new(move |api: &mut NetApi, _uid: &str| {
            observer_flag.store(api.is_locked("L"), Ordering::SeqCst);
            Ok(())
        }),
    );
    net.reload_native_modules(vec![unlocker, observer]).unwrap();

    // insertion order decides evaluation order within the class
    net.create_node("Unlocker", ROOT_UID, "m1", (0.0, 0.0), None)
        .unwrap();
    net.create_node("Observer", ROOT_UID, "m2", (50.0, 0.0), None)
        .unwrap();

    net.lock("L", "k", 100).unwrap();
    net.step(None);

    assert!(
        observed_locked.load(Ordering::SeqCst),
        "a module evaluated after the unlock call must still see the lock"
    );
    assert!(!net.is_locked("L"), "the deferred release lands at end of step");
}

#[test]
fn immediate_unlock_through_the_net_is_synchronous() {
    let mut net = Nodenet::new(None, "sync", "");
    net.lock("m", "k", 100).unwrap();
    net.unlock("m");
    assert!(!net.is_locked("m"));
}

#[test]
fn locks_survive_native_module_reload() {
    let mut net = Nodenet::new(None, "reload", "");
    net.lock("m", "k", 100).unwrap();
    net.reload_native_modules(Vec::new()).unwrap();
    assert!(net.is_locked("m"));
}
