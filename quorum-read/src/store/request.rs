//! Read requests, the per-request context the engine mutates between
//! attempts, and barrier probe requests.

use std::time::Duration;

use tokio::time::Instant;

use crate::errors::QuorumNotMet;
use crate::errors::ReadPhase;
use crate::store::ConsistencyLevel;
use crate::store::StoreOutcome;

/// Tracks the overall elapsed-time budget of one logical read.
///
/// Every outer-loop iteration and every barrier attempt checks this guard
/// first, so a read aborts promptly instead of burning its remaining retries
/// once the budget is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutGuard {
    started_at: Instant,
    budget: Duration,
}

impl TimeoutGuard {
    pub fn new(budget: Duration) -> Self {
        Self {
            started_at: Instant::now(),
            budget,
        }
    }

    pub fn remaining(&self) -> Duration {
        self.budget.saturating_sub(self.started_at.elapsed())
    }

    pub fn is_elapsed(&self) -> bool {
        self.remaining().is_zero()
    }

    /// Fail with a quorum-not-met class error when the budget is exhausted.
    pub(crate) fn check_elapsed(
        &self,
        read_quorum: i32,
    ) -> Result<(), QuorumNotMet> {
        if self.is_elapsed() {
            return Err(QuorumNotMet {
                read_quorum,
                phase: ReadPhase::Timeout,
                responses: vec![],
            });
        }
        Ok(())
    }
}

/// Context the quorum engine records on a request between attempts.
///
/// Mutated only by the orchestrator between outer-loop iterations and by the
/// barrier wait for the refresh flag; never concurrently.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestContext {
    /// The response locked on by a previous quorum-selected read, kept so a
    /// retried quorum read can skip re-reading the replicas.
    pub quorum_selected_outcome: Option<StoreOutcome>,
    pub quorum_selected_lsn: i64,
    pub global_committed_selected_lsn: i64,

    /// Ask the fan-out reader to refresh its replica address cache before
    /// the next probe.
    pub force_refresh_address_cache: bool,

    /// Display summaries of the last fan-out batch, kept for diagnostics on
    /// a quorum-not-met failure.
    pub store_responses: Vec<String>,

    pub timeout: TimeoutGuard,
}

impl RequestContext {
    pub fn new(timeout: Duration) -> Self {
        Self {
            quorum_selected_outcome: None,
            quorum_selected_lsn: -1,
            global_committed_selected_lsn: -1,
            force_refresh_address_cache: false,
            store_responses: vec![],
            timeout: TimeoutGuard::new(timeout),
        }
    }
}

/// A document read addressed to a partition's replica set.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadRequest {
    pub partition_key_range_id: String,
    pub consistency_level: ConsistencyLevel,
    pub context: RequestContext,
}

impl ReadRequest {
    pub fn new(
        partition_key_range_id: impl Into<String>,
        consistency_level: ConsistencyLevel,
        timeout: Duration,
    ) -> Self {
        Self {
            partition_key_range_id: partition_key_range_id.into(),
            consistency_level,
            context: RequestContext::new(timeout),
        }
    }
}

/// A lightweight probe asking replicas "have you reached LSN X yet?".
///
/// Carries no payload; it shares the base request's routing and its timeout
/// budget, but keeps its own copy of the mutable context so barrier attempts
/// do not disturb the caller's cached quorum-selected state.
#[derive(Debug, Clone, PartialEq)]
pub struct BarrierRequest {
    pub request: ReadRequest,
    pub target_lsn: i64,
    /// `-1` when the read does not need global-commit confirmation.
    pub target_global_committed_lsn: i64,
}

impl BarrierRequest {
    pub fn new(
        base: &ReadRequest,
        target_lsn: i64,
        target_global_committed_lsn: Option<i64>,
    ) -> Self {
        Self {
            request: base.clone(),
            target_lsn,
            target_global_committed_lsn: target_global_committed_lsn
                .unwrap_or(-1),
        }
    }
}
