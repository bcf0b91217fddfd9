//! Process-wide uid generation for net entities.

use rand::{rngs::StdRng, Rng, SeedableRng};
use std::sync::Mutex;

static UID_RNG: Mutex<Option<StdRng>> = Mutex::new(None);

/// The reserved uid of the root nodespace.
pub const ROOT_UID: &str = "Root";

const UID_LEN: usize = 16;
const HEX: &[u8; 16] = b"0123456789abcdef";

/// Generates a fresh 16-character hex uid.
///
/// Uids are unique per process with overwhelming probability; collision
/// handling on merge is done by the caller, not here.
#[must_use]
pub fn generate_uid() -> String {
    let mut guard = UID_RNG.lock().expect("uid rng poisoned");
    let rng = guard.get_or_insert_with(StdRng::from_entropy);

    let mut uid = String::with_capacity(UID_LEN);
    for _ in 0..UID_LEN {
        uid.push(HEX[rng.gen_range(0..16)] as char);
    }
    uid
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uids_are_well_formed() {
        let uid = generate_uid();
        assert_eq!(uid.len(), 16);
        assert!(uid.bytes().all(|b| b.is_ascii_hexdigit()));
    }

    #[test]
    fn uids_do_not_repeat() {
        let mut seen = std::collections::HashSet::new();
        for _ in 0..1000 {
            assert!(seen.insert(generate_uid()));
        }
    }
}
