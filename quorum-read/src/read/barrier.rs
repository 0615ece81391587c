//! Read-barrier convergence: re-probe replicas until a read quorum has
//! observed the barrier LSN (and, for global strong reads, until the global
//! committed LSN has caught up).

use std::time::Duration;

use openraft_macros::add_async_trait;
use tokio::time::sleep;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::errors::probe_failure;
use crate::errors::ReadError;
use crate::read::DELAY_BETWEEN_READ_BARRIER_CALLS;
use crate::read::MAX_READ_BARRIER_RETRIES;
use crate::store::reader::StoreReader;
use crate::store::request::BarrierRequest;
use crate::store::ReadMode;
use crate::store::StoreOutcome;

pub(crate) const MAX_BARRIER_RETRIES_MULTI_REGION: usize = 30;
pub(crate) const BARRIER_INTERVAL_MULTI_REGION: Duration =
    Duration::from_millis(30);

pub(crate) const MAX_SHORT_BARRIER_RETRIES_MULTI_REGION: usize = 4;
pub(crate) const SHORT_BARRIER_INTERVAL_MULTI_REGION: Duration =
    Duration::from_millis(10);

/// Inter-attempt delays of the budgeted barrier wait: the leading short
/// delays pace local-region LSN convergence, the trailing ones cross-region
/// commit propagation. The total delay budget of one wait is the sum.
#[rustfmt::skip]
pub(crate) const BARRIER_RETRY_DELAYS_MS: &[u64] = &[
    5, 5, 5, 5, 5, 5,
    10, 10, 10, 10,
    30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30,
    30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30, 30,
];

/// How a barrier wait ended.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum BarrierWait {
    /// A read quorum observed the barrier LSN (and the global-commit target,
    /// when one was requested).
    Converged,
    /// The retry budget ran out before convergence.
    Exhausted,
    /// Every probed replica reported throttling; the caller's backoff policy
    /// owns what happens next.
    Throttled(StoreOutcome),
}

/// State carried across the attempts of a single barrier wait.
#[derive(Debug, Clone, Default)]
struct ConvergeState {
    has_converged_on_lsn: bool,
    max_global_committed_lsn_seen: i64,
    /// Summaries of the most recent batch, kept so an exhausted wait can
    /// trace what the replicas last reported.
    last_responses: String,
}

enum AttemptOutcome {
    Converged,
    NotYet,
    Throttled(StoreOutcome),
}

/// One barrier attempt, shared by both converger implementations so they
/// cannot drift apart in anything but pacing.
async fn barrier_attempt<S>(
    store: &S,
    barrier: &mut BarrierRequest,
    allow_primary: bool,
    read_quorum: i32,
    read_mode: ReadMode,
    state: &mut ConvergeState,
) -> Result<AttemptOutcome, ReadError>
where
    S: StoreReader,
{
    // Once the LSN target is met only the global committed LSN still needs
    // confirming, and a single replica's report suffices.
    let replica_count = if state.has_converged_on_lsn { 1 } else { read_quorum };

    let mut responses = store
        .fan_out_read(
            &barrier.request,
            allow_primary,
            replica_count,
            true,
            read_mode,
            false,
            !state.has_converged_on_lsn,
        )
        .await;

    if !responses.is_empty() && responses.iter().all(|r| r.is_throttled()) {
        let first = responses.swap_remove(0);
        return Ok(AttemptOutcome::Throttled(first));
    }

    state.last_responses = summarize(&responses);

    if responses.iter().any(|r| r.is_topology_changed()) {
        let converged = read_primary_barrier(store, barrier).await?;
        barrier.request.context.force_refresh_address_cache = false;
        if converged {
            return Ok(AttemptOutcome::Converged);
        }
        return Ok(AttemptOutcome::NotYet);
    }

    let max_global_committed_lsn = responses
        .iter()
        .filter(|r| r.is_valid)
        .map(|r| r.global_committed_lsn)
        .max()
        .unwrap_or(0);
    if max_global_committed_lsn > state.max_global_committed_lsn_seen {
        state.max_global_committed_lsn_seen = max_global_committed_lsn;
    }

    let at_barrier = responses
        .iter()
        .filter(|r| r.is_valid && r.lsn >= barrier.target_lsn)
        .count();
    if at_barrier as i32 >= read_quorum {
        state.has_converged_on_lsn = true;
    }

    if state.has_converged_on_lsn
        && (barrier.target_global_committed_lsn <= 0
            || state.max_global_committed_lsn_seen
                >= barrier.target_global_committed_lsn)
    {
        return Ok(AttemptOutcome::Converged);
    }

    debug!(
        target_lsn = barrier.target_lsn,
        target_global_committed_lsn = barrier.target_global_committed_lsn,
        has_converged_on_lsn = state.has_converged_on_lsn,
        responses = display(&state.last_responses),
        "barrier attempt did not converge"
    );

    // Only refresh addresses on the first barrier attempt of the wait.
    barrier.request.context.force_refresh_address_cache = false;

    Ok(AttemptOutcome::NotYet)
}

/// Primary-only barrier probe, used when secondaries report a topology
/// change: refresh the address cache and ask the primary alone whether the
/// barrier targets are met.
///
/// A failure of the probe itself propagates; the orchestrator's outer retry
/// loop owns any further attempt.
async fn read_primary_barrier<S>(
    store: &S,
    barrier: &mut BarrierRequest,
) -> Result<bool, ReadError>
where
    S: StoreReader,
{
    barrier.request.context.force_refresh_address_cache = true;
    let outcome = store.read_primary(&barrier.request, true).await;

    if !outcome.is_valid || outcome.is_topology_changed() {
        warn!(
            outcome = display(&outcome),
            "primary barrier probe failed after topology change"
        );
        return Err(probe_failure(&outcome));
    }

    Ok((barrier.target_lsn <= 0 || outcome.lsn >= barrier.target_lsn)
        && (barrier.target_global_committed_lsn <= 0
            || outcome.global_committed_lsn
                >= barrier.target_global_committed_lsn))
}

/// One line per outcome, for attempt traces and the exhaustion report.
pub(crate) fn summarize(responses: &[StoreOutcome]) -> String {
    responses
        .iter()
        .map(|r| r.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// A strategy for waiting until the read barrier is met.
///
/// Two implementations exist behind [`Converger`]; they share
/// [`barrier_attempt`] and differ only in retry pacing.
#[add_async_trait]
pub(crate) trait BarrierConverger<S>: Send + Sync + 'static
where
    S: StoreReader,
{
    /// Wait for a read quorum to observe `barrier.target_lsn` (and the
    /// global-commit target when set).
    async fn wait_for_read_barrier(
        &self,
        store: &S,
        barrier: &mut BarrierRequest,
        allow_primary: bool,
        read_quorum: i32,
        read_mode: ReadMode,
    ) -> Result<BarrierWait, ReadError>;
}

/// Budgeted-delay barrier wait: one fixed table of inter-attempt delays and
/// a total delay budget equal to its sum, consumed on every sleep.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct BudgetedConverger;

impl<S> BarrierConverger<S> for BudgetedConverger
where
    S: StoreReader,
{
    async fn wait_for_read_barrier(
        &self,
        store: &S,
        barrier: &mut BarrierRequest,
        allow_primary: bool,
        read_quorum: i32,
        read_mode: ReadMode,
    ) -> Result<BarrierWait, ReadError> {
        let mut state = ConvergeState::default();
        let mut remaining_delay_budget: Duration = Duration::from_millis(
            BARRIER_RETRY_DELAYS_MS.iter().sum::<u64>(),
        );

        for (attempt, delay_ms) in BARRIER_RETRY_DELAYS_MS.iter().enumerate() {
            barrier
                .request
                .context
                .timeout
                .check_elapsed(read_quorum)?;

            match barrier_attempt(
                store,
                barrier,
                allow_primary,
                read_quorum,
                read_mode,
                &mut state,
            )
            .await?
            {
                AttemptOutcome::Converged => return Ok(BarrierWait::Converged),
                AttemptOutcome::Throttled(r) => {
                    return Ok(BarrierWait::Throttled(r))
                }
                AttemptOutcome::NotYet => {}
            }

            // No sleep after the final attempt; the wait is already over.
            if attempt + 1 < BARRIER_RETRY_DELAYS_MS.len() {
                let delay = Duration::from_millis(*delay_ms)
                    .min(remaining_delay_budget);
                if delay.is_zero() {
                    debug!(attempt, "barrier delay budget exhausted");
                    break;
                }
                sleep(delay).await;
                remaining_delay_budget -= delay;
            }
        }

        info!(
            target_lsn = barrier.target_lsn,
            target_global_committed_lsn = barrier.target_global_committed_lsn,
            max_global_committed_lsn_seen = state.max_global_committed_lsn_seen,
            has_converged_on_lsn = state.has_converged_on_lsn,
            responses = display(&state.last_responses),
            "barrier wait exhausted its delay budget"
        );
        Ok(BarrierWait::Exhausted)
    }
}

/// Legacy fixed-retry barrier wait: a short single-region phase, then a
/// longer multi-region phase when a global-commit target is requested.
///
/// Deprecated; kept for one release behind
/// [`Config::legacy_read_barrier`](crate::Config::legacy_read_barrier).
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct LegacyConverger;

impl<S> BarrierConverger<S> for LegacyConverger
where
    S: StoreReader,
{
    async fn wait_for_read_barrier(
        &self,
        store: &S,
        barrier: &mut BarrierRequest,
        allow_primary: bool,
        read_quorum: i32,
        read_mode: ReadMode,
    ) -> Result<BarrierWait, ReadError> {
        let mut state = ConvergeState::default();

        for attempt in 0..MAX_READ_BARRIER_RETRIES {
            barrier
                .request
                .context
                .timeout
                .check_elapsed(read_quorum)?;

            match barrier_attempt(
                store,
                barrier,
                allow_primary,
                read_quorum,
                read_mode,
                &mut state,
            )
            .await?
            {
                AttemptOutcome::Converged => return Ok(BarrierWait::Converged),
                AttemptOutcome::Throttled(r) => {
                    return Ok(BarrierWait::Throttled(r))
                }
                AttemptOutcome::NotYet => {}
            }

            if attempt + 1 < MAX_READ_BARRIER_RETRIES {
                sleep(DELAY_BETWEEN_READ_BARRIER_CALLS).await;
            }
        }

        // Multi-region phase, only for global strong requests.
        if barrier.target_global_committed_lsn > 0 {
            for attempt in 0..MAX_BARRIER_RETRIES_MULTI_REGION {
                barrier
                    .request
                    .context
                    .timeout
                    .check_elapsed(read_quorum)?;

                match barrier_attempt(
                    store,
                    barrier,
                    allow_primary,
                    read_quorum,
                    read_mode,
                    &mut state,
                )
                .await?
                {
                    AttemptOutcome::Converged => {
                        return Ok(BarrierWait::Converged)
                    }
                    AttemptOutcome::Throttled(r) => {
                        return Ok(BarrierWait::Throttled(r))
                    }
                    AttemptOutcome::NotYet => {}
                }

                if attempt + 1 < MAX_BARRIER_RETRIES_MULTI_REGION {
                    if attempt < MAX_SHORT_BARRIER_RETRIES_MULTI_REGION {
                        sleep(SHORT_BARRIER_INTERVAL_MULTI_REGION).await;
                    } else {
                        sleep(BARRIER_INTERVAL_MULTI_REGION).await;
                    }
                }
            }
        }

        info!(
            target_lsn = barrier.target_lsn,
            target_global_committed_lsn = barrier.target_global_committed_lsn,
            max_global_committed_lsn_seen = state.max_global_committed_lsn_seen,
            responses = display(&state.last_responses),
            "legacy barrier wait exhausted its retries"
        );
        Ok(BarrierWait::Exhausted)
    }
}

/// The converger selected once at construction from configuration.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Converger {
    Budgeted(BudgetedConverger),
    Legacy(LegacyConverger),
}

impl Converger {
    pub(crate) fn from_legacy_flag(legacy: bool) -> Self {
        if legacy {
            Converger::Legacy(LegacyConverger)
        } else {
            Converger::Budgeted(BudgetedConverger)
        }
    }
}

impl<S> BarrierConverger<S> for Converger
where
    S: StoreReader,
{
    async fn wait_for_read_barrier(
        &self,
        store: &S,
        barrier: &mut BarrierRequest,
        allow_primary: bool,
        read_quorum: i32,
        read_mode: ReadMode,
    ) -> Result<BarrierWait, ReadError> {
        match self {
            Converger::Budgeted(c) => {
                c.wait_for_read_barrier(
                    store,
                    barrier,
                    allow_primary,
                    read_quorum,
                    read_mode,
                )
                .await
            }
            Converger::Legacy(c) => {
                c.wait_for_read_barrier(
                    store,
                    barrier,
                    allow_primary,
                    read_quorum,
                    read_mode,
                )
                .await
            }
        }
    }
}
