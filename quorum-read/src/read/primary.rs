//! Primary-read fallback and the primary LSN catch-up wait.

use tokio::time::sleep;
use tracing::error;
use tracing::warn;

use crate::errors::probe_failure;
use crate::errors::ProtocolViolation;
use crate::errors::ReadError;
use crate::read::DELAY_BETWEEN_READ_BARRIER_CALLS;
use crate::read::MAX_PRIMARY_READ_RETRIES;
use crate::store::reader::StoreReader;
use crate::store::request::BarrierRequest;
use crate::store::request::ReadRequest;
use crate::store::StoreOutcome;

/// Result of a direct primary read.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PrimaryResult {
    pub(crate) is_successful: bool,
    /// The replica set turned out larger than the read quorum; the
    /// orchestrator should retry on secondaries with the primary included.
    pub(crate) should_retry_on_secondary: bool,
    pub(crate) response: Option<StoreOutcome>,
}

impl PrimaryResult {
    fn successful(response: StoreOutcome) -> Self {
        Self {
            is_successful: true,
            should_retry_on_secondary: false,
            response: Some(response),
        }
    }

    fn retry_on_secondary() -> Self {
        Self {
            is_successful: false,
            should_retry_on_secondary: true,
            response: None,
        }
    }

    fn failed() -> Self {
        Self {
            is_successful: false,
            should_retry_on_secondary: false,
            response: None,
        }
    }
}

/// Outcome of waiting for the primary to reach a target LSN.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PrimaryLsnWait {
    /// Primary durably reached the target.
    QuorumMet,
    /// The primary never caught up within the retry bound.
    QuorumNotMet,
    /// Secondary replicas appeared; the current quorum must be deduced by
    /// reading them.
    QuorumInconclusive,
}

/// Read the primary replica directly and validate its replication metadata.
///
/// A throttled primary is treated as an answer: the throttled body is
/// returned and the caller's own throttle-retry policy decides what happens
/// next.
pub(crate) async fn read_primary<S>(
    store: &S,
    request: &mut ReadRequest,
    read_quorum: i32,
) -> Result<PrimaryResult, ReadError>
where
    S: StoreReader,
{
    request.context.timeout.check_elapsed(read_quorum)?;

    // Addresses were already refreshed on the way here.
    request.context.force_refresh_address_cache = false;

    let outcome = store.read_primary(request, true).await;

    if outcome.is_throttled() {
        return Ok(PrimaryResult::successful(outcome));
    }

    if !outcome.is_valid {
        return Err(probe_failure(&outcome));
    }

    if outcome.current_replica_set_size <= 0
        || outcome.lsn < 0
        || outcome.quorum_acked_lsn < 0
    {
        // Replica set size may be missing while the primary is still
        // rebuilding secondaries; missing LSNs are a harder violation.
        error!(
            replica_set_size = outcome.current_replica_set_size,
            lsn = outcome.lsn,
            quorum_acked_lsn = outcome.quorum_acked_lsn,
            "invalid replication metadata in primary response"
        );
        return Err(ReadError::ProtocolViolation(ProtocolViolation {
            replica_set_size: outcome.current_replica_set_size,
            lsn: outcome.lsn,
            quorum_acked_lsn: outcome.quorum_acked_lsn,
        }));
    }

    if outcome.current_replica_set_size > read_quorum {
        warn!(
            replica_set_size = outcome.current_replica_set_size,
            read_quorum, "replica set is larger than the read quorum"
        );
        return Ok(PrimaryResult::retry_on_secondary());
    }

    // The store LSN and the quorum-acknowledged LSN can disagree under
    // asynchronous replication. Wait for the primary alone to reach the
    // higher of the two before trusting its answer.
    if outcome.lsn != outcome.quorum_acked_lsn {
        warn!(
            lsn = outcome.lsn,
            quorum_acked_lsn = outcome.quorum_acked_lsn,
            "store LSN and quorum acked LSN do not match"
        );
        let higher_lsn = outcome.lsn.max(outcome.quorum_acked_lsn);

        let mut barrier = BarrierRequest::new(request, higher_lsn, None);
        return match wait_for_primary_lsn(
            store,
            &mut barrier,
            higher_lsn,
            read_quorum,
        )
        .await?
        {
            PrimaryLsnWait::QuorumMet => Ok(PrimaryResult::successful(outcome)),
            PrimaryLsnWait::QuorumInconclusive => {
                Ok(PrimaryResult::retry_on_secondary())
            }
            PrimaryLsnWait::QuorumNotMet => Ok(PrimaryResult::failed()),
        };
    }

    Ok(PrimaryResult::successful(outcome))
}

/// Re-read the primary with a barrier probe until both its store LSN and its
/// quorum-acknowledged LSN reach `lsn_to_wait_for`.
async fn wait_for_primary_lsn<S>(
    store: &S,
    barrier: &mut BarrierRequest,
    lsn_to_wait_for: i64,
    read_quorum: i32,
) -> Result<PrimaryLsnWait, ReadError>
where
    S: StoreReader,
{
    for attempt in 0..MAX_PRIMARY_READ_RETRIES {
        barrier.request.context.timeout.check_elapsed(read_quorum)?;

        barrier.request.context.force_refresh_address_cache = false;
        let outcome = store.read_primary(&barrier.request, true).await;

        if !outcome.is_valid {
            return Err(probe_failure(&outcome));
        }

        if outcome.current_replica_set_size > read_quorum {
            warn!(
                replica_set_size = outcome.current_replica_set_size,
                read_quorum,
                "replica set grew while waiting for the primary LSN"
            );
            return Ok(PrimaryLsnWait::QuorumInconclusive);
        }

        if outcome.lsn < lsn_to_wait_for
            || outcome.quorum_acked_lsn < lsn_to_wait_for
        {
            warn!(
                lsn = outcome.lsn,
                quorum_acked_lsn = outcome.quorum_acked_lsn,
                lsn_to_wait_for,
                "primary has not reached the expected LSN yet"
            );
            if attempt + 1 < MAX_PRIMARY_READ_RETRIES {
                sleep(DELAY_BETWEEN_READ_BARRIER_CALLS).await;
            }
            continue;
        }

        return Ok(PrimaryLsnWait::QuorumMet);
    }

    Ok(PrimaryLsnWait::QuorumNotMet)
}
