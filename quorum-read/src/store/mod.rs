//! Data types exchanged with the replica fan-out reader.
//!
//! The quorum engine never talks to the wire itself. It consumes
//! [`StoreReader`](crate::StoreReader) and reasons about the
//! [`StoreOutcome`] values it returns.

mod outcome;

pub mod reader;
pub mod request;
pub mod response;
pub mod status;

use std::fmt;

pub use outcome::StoreOutcome;

/// How replicas are selected for a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[derive(serde::Deserialize, serde::Serialize)]
pub enum ReadMode {
    /// Read the primary replica only.
    Primary,
    /// Quorum read with read-barrier convergence.
    Strong,
    /// Quorum read without a primary read barrier.
    BoundedStaleness,
    /// Any single replica.
    Any,
}

impl fmt::Display for ReadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReadMode::Primary => "Primary",
            ReadMode::Strong => "Strong",
            ReadMode::BoundedStaleness => "BoundedStaleness",
            ReadMode::Any => "Any",
        };
        write!(f, "{}", s)
    }
}

/// The consistency level requested for a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[derive(serde::Deserialize, serde::Serialize)]
pub enum ConsistencyLevel {
    Strong,
    BoundedStaleness,
    Session,
    ConsistentPrefix,
    Eventual,
}

impl fmt::Display for ConsistencyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConsistencyLevel::Strong => "Strong",
            ConsistencyLevel::BoundedStaleness => "BoundedStaleness",
            ConsistencyLevel::Session => "Session",
            ConsistencyLevel::ConsistentPrefix => "ConsistentPrefix",
            ConsistencyLevel::Eventual => "Eventual",
        };
        write!(f, "{}", s)
    }
}

/// Per-request quorum requirement, supplied by the caller.
///
/// The caller guarantees `read_quorum` does not exceed the replica set size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[derive(serde::Deserialize, serde::Serialize)]
pub struct QuorumTarget {
    /// Replica-count threshold, e.g. 3 of 4.
    pub read_quorum: i32,
    pub read_mode: ReadMode,
    pub consistency_level: ConsistencyLevel,
}

impl QuorumTarget {
    pub fn new(
        read_quorum: i32,
        read_mode: ReadMode,
        consistency_level: ConsistencyLevel,
    ) -> Self {
        Self {
            read_quorum,
            read_mode,
            consistency_level,
        }
    }

    /// Whether the read must additionally confirm the global committed LSN,
    /// i.e. it is a multi-region strong read.
    pub(crate) fn is_global_strong_read(&self) -> bool {
        self.read_mode == ReadMode::Strong
            && self.consistency_level == ConsistencyLevel::Strong
    }
}
