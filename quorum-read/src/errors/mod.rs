//! Error types exposed by this crate.
//!
//! Throttling and topology changes are handled inside the engine and never
//! surface here. Only two conditions cross the crate boundary: a quorum that
//! could not be met within the bounded internal retries (retryable by a
//! higher-level policy) and a protocol invariant violation (fatal).

use std::fmt;

use anyerror::AnyError;

use crate::store::StoreOutcome;

/// The phase of the read state machine in which a failure was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[derive(serde::Deserialize, serde::Serialize)]
pub enum ReadPhase {
    SecondaryQuorumRead,
    PrimaryRead,
    Timeout,
}

impl fmt::Display for ReadPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReadPhase::SecondaryQuorumRead => "secondary-quorum-read",
            ReadPhase::PrimaryRead => "primary-read",
            ReadPhase::Timeout => "timeout",
        };
        write!(f, "{}", s)
    }
}

/// Not enough replicas agreed within the bounded internal retries.
///
/// Transient: the caller's higher-level retry policy (typically
/// address-refresh-and-retry) decides whether to try again. Carries the
/// per-replica outcome summaries of the last attempt so a failed convergence
/// can be reconstructed from logs.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[derive(serde::Deserialize, serde::Serialize)]
#[error("read quorum of {read_quorum} not met in {phase} phase; replica responses: {responses:?}")]
pub struct QuorumNotMet {
    pub read_quorum: i32,
    pub phase: ReadPhase,
    pub responses: Vec<String>,
}

/// The backend returned an internally inconsistent primary response.
///
/// Fatal and never retried: a primary reporting a non-positive replica set
/// size or negative LSNs violates the replication protocol, and retrying
/// cannot produce a trustworthy read.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[derive(serde::Deserialize, serde::Serialize)]
#[error(
    "protocol violation in primary response: replica_set_size {replica_set_size}, lsn {lsn}, quorum_acked_lsn {quorum_acked_lsn}"
)]
pub struct ProtocolViolation {
    pub replica_set_size: i32,
    pub lsn: i64,
    pub quorum_acked_lsn: i64,
}

/// Any failure a quorum read can surface to its caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[derive(serde::Deserialize, serde::Serialize)]
pub enum ReadError {
    #[error(transparent)]
    QuorumNotMet(#[from] QuorumNotMet),

    #[error(transparent)]
    ProtocolViolation(#[from] ProtocolViolation),

    /// A captured transport failure from a primary probe, re-raised when the
    /// primary's answer was required to make progress.
    #[error("replica probe failed: {source}")]
    ReplicaFailure { source: AnyError },
}

impl ReadError {
    /// Whether a higher-level policy may retry the whole read.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ReadError::QuorumNotMet(_) | ReadError::ReplicaFailure { .. }
        )
    }
}

/// Re-raise the failure captured in an invalid probe outcome.
pub(crate) fn probe_failure(outcome: &StoreOutcome) -> ReadError {
    let source = match &outcome.error {
        Some(e) => e.clone(),
        None => AnyError::error(outcome.to_string()),
    };
    ReadError::ReplicaFailure { source }
}
