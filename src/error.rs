use std::{
    error::Error as StdError,
    fmt::{Debug, Display},
    io,
};

/// A result type for all fallible nodenet operations.
pub type NetResult<T> = Result<T, NetError>;

/// An error raised by a nodenet or the surrounding runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum NetError {
    /// No entity with the given uid exists.
    NotFound(String),
    /// A request was structurally valid but semantically impossible,
    /// e.g. an unknown nodetype or gate name.
    InvalidArgument(String),
    /// The named lock is already held.
    LockConflict(String),
    /// A persisted snapshot was written by an incompatible version.
    VersionMismatch {
        /// The version this build reads and writes.
        expected: u32,
        /// The version found in the snapshot document.
        found: u32,
    },
    /// A persisted entity was missing required fields.
    SnapshotCorruption(String),
}

impl Display for NetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(uid) => write!(f, "no such entity: {uid}"),
            Self::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            Self::LockConflict(name) => write!(f, "lock {name} is already locked"),
            Self::VersionMismatch { expected, found } => {
                write!(f, "snapshot version {found}, expected {expected}")
            }
            Self::SnapshotCorruption(msg) => write!(f, "corrupt snapshot: {msg}"),
        }
    }
}

impl StdError for NetError {}

impl From<NetError> for io::Error {
    fn from(err: NetError) -> Self {
        io::Error::new(io::ErrorKind::InvalidInput, err)
    }
}
