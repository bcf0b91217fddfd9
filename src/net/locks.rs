//! Cooperative named locks with per-step timeout.

use fxhash::FxHashMap;

use crate::error::{NetError, NetResult};

/// One registered lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lock {
    /// Steps this lock has been held.
    pub age: u64,
    /// Steps after which the lock expires.
    pub ttl: u64,
    /// The key it was acquired with.
    pub key: String,
}

/// The lock registry of one nodenet.
///
/// Locks are purely cooperative: node functions check and acquire them to
/// coordinate multi-step behaviors. Every step ages all locks by one;
/// a lock whose age reaches its ttl is dropped, so a crashed behavior can
/// never wedge the net.
#[derive(Debug, Clone, Default)]
pub struct LockRegistry {
    locks: FxHashMap<String, Lock>,
}

impl LockRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True if a lock of the given name is held.
    #[must_use]
    pub fn is_locked(&self, name: &str) -> bool {
        self.locks.contains_key(name)
    }

    /// True if a lock of the given name is held with the given key.
    #[must_use]
    pub fn is_locked_by(&self, name: &str, key: &str) -> bool {
        self.locks.get(name).is_some_and(|lock| lock.key == key)
    }

    /// Acquires a lock.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::LockConflict`] if the name is already locked,
    /// whoever holds it.
    pub fn lock(&mut self, name: &str, key: &str, ttl: u64) -> NetResult<()> {
        if self.is_locked(name) {
            return Err(NetError::LockConflict(name.to_string()));
        }
        self.locks.insert(
            name.to_string(),
            Lock {
                age: 0,
                ttl,
                key: key.to_string(),
            },
        );
        Ok(())
    }

    /// Releases a lock immediately; releasing an unheld lock is a no-op.
    pub fn unlock(&mut self, name: &str) {
        self.locks.remove(name);
    }

    /// Ages every lock by one step and removes the expired ones.
    pub fn tick(&mut self) {
        self.locks.retain(|_, lock| {
            lock.age += 1;
            lock.age < lock.ttl
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_expires_after_ttl_steps() {
        let mut registry = LockRegistry::new();
        registry.lock("m", "k", 3).unwrap();

        registry.tick();
        assert!(registry.is_locked("m"));
        registry.tick();
        assert!(registry.is_locked("m"));
        registry.tick();
        assert!(!registry.is_locked("m"));
    }

    #[test]
    fn double_lock_conflicts() {
        let mut registry = LockRegistry::new();
        registry.lock("m", "k", 10).unwrap();
        assert_eq!(
            registry.lock("m", "other", 10),
            Err(NetError::LockConflict("m".to_string()))
        );
    }

    #[test]
    fn key_is_checked() {
        let mut registry = LockRegistry::new();
        registry.lock("m", "k", 10).unwrap();
        assert!(registry.is_locked_by("m", "k"));
        assert!(!registry.is_locked_by("m", "other"));
        assert!(!registry.is_locked_by("n", "k"));
    }

    #[test]
    fn unlock_is_immediate_and_idempotent() {
        let mut registry = LockRegistry::new();
        registry.lock("m", "k", 10).unwrap();
        registry.unlock("m");
        assert!(!registry.is_locked("m"));
        registry.unlock("m");
    }
}
