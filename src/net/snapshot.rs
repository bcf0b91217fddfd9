//! The persisted form of a nodenet.
//!
//! The schema is semantic, not a bit layout: entities are stored as
//! per-kind uid maps, decoded one by one so that a single corrupt entity
//! does not take the whole document down.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{NetError, NetResult};
use crate::net::FxIndexMap;

/// The snapshot version this build reads and writes.
pub const NODENET_VERSION: u32 = 2;

/// Advisory canvas bounds.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MaxCoords {
    pub x: f64,
    pub y: f64,
}

/// One persisted nodespace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodespaceData {
    pub uid: String,
    pub parent_nodespace: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub position: (f64, f64),
    /// Gate function overrides: nodetype -> gate -> function name.
    #[serde(default)]
    pub gatefunctions: FxIndexMap<String, FxIndexMap<String, String>>,
    #[serde(default)]
    pub index: u64,
}

/// One persisted node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeData {
    pub uid: String,
    #[serde(rename = "type")]
    pub nodetype: String,
    pub parent_nodespace: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub position: (f64, f64),
    #[serde(default)]
    pub parameters: FxIndexMap<String, Value>,
    /// Non-default gate parameter overrides: gate -> parameter -> value.
    #[serde(default)]
    pub gate_parameters: FxIndexMap<String, FxIndexMap<String, Value>>,
    #[serde(default)]
    pub state: FxIndexMap<String, Value>,
    #[serde(default)]
    pub index: u64,
}

/// The full persisted document of one nodenet.
///
/// The entity maps hold raw JSON values; [`super::Nodenet`] decodes them
/// entity by entity on merge, dropping corrupt entries with a warning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodenetData {
    pub version: u32,
    pub uid: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub current_step: u64,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub world: Option<String>,
    #[serde(default)]
    pub worldadapter: Option<String>,
    #[serde(default)]
    pub settings: FxIndexMap<String, Value>,
    #[serde(default)]
    pub max_coords: MaxCoords,
    #[serde(default)]
    pub nodespaces: FxIndexMap<String, Value>,
    #[serde(default)]
    pub nodes: FxIndexMap<String, Value>,
    #[serde(default)]
    pub links: FxIndexMap<String, Value>,
    #[serde(default)]
    pub monitors: FxIndexMap<String, Value>,
}

impl NodenetData {
    /// Parses a snapshot document and checks its version.
    ///
    /// # Errors
    ///
    /// [`NetError::SnapshotCorruption`] if the document is not valid JSON
    /// or misses required top-level fields;
    /// [`NetError::VersionMismatch`] if it was written by an incompatible
    /// build.
    pub fn from_json(json: &str) -> NetResult<Self> {
        let data: Self = serde_json::from_str(json)
            .map_err(|err| NetError::SnapshotCorruption(err.to_string()))?;
        if data.version != NODENET_VERSION {
            return Err(NetError::VersionMismatch {
                expected: NODENET_VERSION,
                found: data.version,
            });
        }
        Ok(data)
    }

    /// Serializes the document.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).expect("snapshot serialization cannot fail")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_mismatch_is_rejected() {
        let json = r#"{"version": 1, "uid": "abc"}"#;
        assert_eq!(
            NodenetData::from_json(json),
            Err(NetError::VersionMismatch {
                expected: NODENET_VERSION,
                found: 1
            })
        );
    }

    #[test]
    fn malformed_document_is_corruption() {
        assert!(matches!(
            NodenetData::from_json("{"),
            Err(NetError::SnapshotCorruption(_))
        ));
        assert!(matches!(
            NodenetData::from_json(r#"{"version": 2}"#),
            Err(NetError::SnapshotCorruption(_))
        ));
    }

    #[test]
    fn minimal_document_parses() {
        let data = NodenetData::from_json(r#"{"version": 2, "uid": "abc"}"#).unwrap();
        assert_eq!(data.uid, "abc");
        assert!(data.nodes.is_empty());
        assert!(!data.is_active);
    }
}
