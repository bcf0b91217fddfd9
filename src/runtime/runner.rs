//! The background thread stepping one nodenet.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use tracing::info;

use crate::net::nodenet::Nodenet;
use crate::world::WorldAdapter;

/// Handle to the runner thread of one nodenet.
#[derive(Debug)]
pub(crate) struct RunnerHandle {
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl RunnerHandle {
    /// Spawns a thread that advances the net by one step per timestep
    /// while the net stays active. An in-flight step always completes; the
    /// thread exits once the net deactivates itself (e.g. through a user
    /// prompt) or the handle is stopped.
    pub(crate) fn spawn(
        net: Arc<Mutex<Nodenet>>,
        world: Option<Arc<Mutex<dyn WorldAdapter>>>,
        timestep_ms: Arc<AtomicU64>,
    ) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let thread_flag = Arc::clone(&running);

        let thread = std::thread::spawn(move || {
            loop {
                if !thread_flag.load(Ordering::SeqCst) {
                    break;
                }
                {
                    let mut net = net.lock().expect("nodenet lock poisoned");
                    if !net.is_active() {
                        thread_flag.store(false, Ordering::SeqCst);
                        break;
                    }
                    match &world {
                        Some(world) => {
                            let mut world = world.lock().expect("world lock poisoned");
                            net.step(Some(&mut *world));
                        }
                        None => {
                            net.step(None);
                        }
                    }
                }
                let ms = timestep_ms.load(Ordering::SeqCst);
                std::thread::sleep(Duration::from_millis(ms));
            }
            info!("nodenet runner stopped");
        });

        Self {
            running,
            thread: Some(thread),
        }
    }

    /// True while the runner thread is scheduling steps.
    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Stops scheduling and waits for the in-flight step to finish.
    pub(crate) fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for RunnerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
