//! Parallel activation lanes on gates and slots.

use serde::{Deserialize, Serialize};

use crate::net::FxIndexMap;

/// The sheaf id that exists on every gate and slot for its entire life.
pub const DEFAULT_SHEAF: &str = "default";

/// One activation lane of a gate or slot.
///
/// Sheaves let a node carry several activation contexts in parallel; the
/// `default` lane always exists. A sheaf that splits at a node is tagged
/// with the origin node uid (`"<parent>:<node_uid>"`) so that propagation
/// can fold it back into its parent lane at that node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sheaf {
    /// The uid of the lane, equal to its key in the sheaf map.
    pub uid: String,
    /// A display name for the lane.
    pub name: String,
    /// The current activation carried in this lane.
    pub activation: f64,
}

impl Sheaf {
    /// Creates a new lane with activation 0.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            uid: id.clone(),
            name: id,
            activation: 0.0,
        }
    }
}

/// The map of all lanes on one gate or slot, keyed by sheaf id.
pub type SheafMap = FxIndexMap<String, Sheaf>;

/// A sheaf map holding only the `default` lane.
#[must_use]
pub fn default_sheaves() -> SheafMap {
    let mut sheaves = SheafMap::default();
    sheaves.insert(DEFAULT_SHEAF.to_string(), Sheaf::new(DEFAULT_SHEAF));
    sheaves
}

/// Derives the lane id for a sheaf splitting at the given node.
///
/// Node functions that open a parallel lane tag it with their own node uid
/// through this helper; propagation recognizes the tag via
/// [`fold_sheaf_id`] and folds the lane back into `parent` when it reaches
/// that node.
#[must_use]
pub fn split_sheaf_id(parent: &str, node_uid: &str) -> String {
    format!("{parent}:{node_uid}")
}

/// Strips the split tag of a lane id if it names the given node,
/// recovering the parent lane id.
#[must_use]
pub fn fold_sheaf_id<'a>(sheaf_id: &'a str, node_uid: &str) -> Option<&'a str> {
    let stem = sheaf_id.strip_suffix(node_uid)?;
    stem.strip_suffix(':')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_and_fold_are_inverse() {
        let id = split_sheaf_id("default", "abc123");
        assert_eq!(id, "default:abc123");
        assert_eq!(fold_sheaf_id(&id, "abc123"), Some("default"));
        assert_eq!(fold_sheaf_id(&id, "other"), None);
        assert_eq!(fold_sheaf_id("default", "abc123"), None);
    }
}
