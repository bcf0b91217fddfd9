//! The in-memory nodenet data model and its step engine.

use fxhash::FxBuildHasher;
use indexmap::{IndexMap, IndexSet};

pub mod gate;
pub mod link;
pub mod locks;
pub mod monitor;
pub mod netapi;
pub mod node;
pub mod nodenet;
pub mod nodespace;
pub mod nodetype;
pub mod sheaf;
pub mod slot;
pub mod snapshot;

/// An insertion-ordered map with the fxhash hasher.
///
/// Entity maps must iterate deterministically (insertion order) for node
/// evaluation to be reproducible across runs.
pub type FxIndexMap<K, V> = IndexMap<K, V, FxBuildHasher>;

/// An insertion-ordered set with the fxhash hasher.
pub type FxIndexSet<T> = IndexSet<T, FxBuildHasher>;

pub use self::gate::{Gate, GateFunction, GateParameters};
pub use self::link::Link;
pub use self::locks::{Lock, LockRegistry};
pub use self::monitor::{Monitor, TerminalKind};
pub use self::netapi::{NetApi, ReciprocalType};
pub use self::node::Node;
pub use self::nodenet::{Nodenet, StepReport, UserPrompt};
pub use self::nodespace::Nodespace;
pub use self::nodetype::{
    NativeModuleSpec, NodeFunction, Nodetype, NodetypeRegistry, STANDARD_NODETYPES,
};
pub use self::sheaf::{fold_sheaf_id, split_sheaf_id, Sheaf, SheafMap, DEFAULT_SHEAF};
pub use self::slot::Slot;
pub use self::snapshot::{NodeData, NodenetData, NodespaceData, NODENET_VERSION};
