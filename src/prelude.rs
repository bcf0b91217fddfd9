//! A quick import for the common surface of the crate.
//!
//! ```
//! use nodenet::prelude::*;
//! ```

pub use crate::error::{NetError, NetResult};

pub use crate::net::FxIndexMap;
pub use crate::net::FxIndexSet;

pub use crate::net::Gate;
pub use crate::net::GateFunction;
pub use crate::net::GateParameters;
pub use crate::net::Link;
pub use crate::net::Monitor;
pub use crate::net::NetApi;
pub use crate::net::Node;
pub use crate::net::Nodenet;
pub use crate::net::Nodespace;
pub use crate::net::Nodetype;
pub use crate::net::ReciprocalType;
pub use crate::net::Sheaf;
pub use crate::net::Slot;
pub use crate::net::{fold_sheaf_id, split_sheaf_id};
pub use crate::net::StepReport;
pub use crate::net::TerminalKind;
pub use crate::net::UserPrompt;
pub use crate::net::DEFAULT_SHEAF;

pub use crate::net::NativeModuleSpec;
pub use crate::net::NodeFunction;
pub use crate::net::NodetypeRegistry;
pub use crate::net::STANDARD_NODETYPES;

pub use crate::net::NodenetData;
pub use crate::net::NODENET_VERSION;

pub use crate::runtime::{Recipe, Runtime};
pub use crate::uid::{generate_uid, ROOT_UID};
pub use crate::world::{DictWorld, WorldAdapter};
