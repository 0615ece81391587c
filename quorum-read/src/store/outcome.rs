//! Per-replica probe outcomes.

use std::fmt;

use anyerror::AnyError;

use crate::store::response::StoreResponse;
use crate::store::status::StatusCode;
use crate::store::status::SubStatusCode;

/// The result of probing one replica, successful or not.
///
/// Produced once per fan-out call by the [`StoreReader`] implementation and
/// never mutated afterwards. A transport failure is captured in `error` with
/// `is_valid == false` instead of aborting the whole batch; the quorum
/// arithmetic simply excludes such outcomes.
///
/// [`StoreReader`]: crate::StoreReader
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOutcome {
    pub is_valid: bool,
    pub status: StatusCode,
    pub sub_status: SubStatusCode,

    /// The replica's log position.
    pub lsn: i64,
    /// The highest LSN a quorum of replicas has durably accepted, as reported
    /// by this replica.
    pub quorum_acked_lsn: i64,
    /// The LSN confirmed durable across all configured regions.
    pub global_committed_lsn: i64,
    /// The LSN at which the returned item itself was last written, `-1` when
    /// not applicable (e.g. barrier probes and non-point reads).
    pub item_lsn: i64,

    pub current_replica_set_size: i32,
    pub number_of_read_regions: i32,
    pub partition_key_range_id: String,

    pub response: Option<StoreResponse>,
    /// Captured probe failure; populated iff `is_valid` is false.
    pub error: Option<AnyError>,
}

impl StoreOutcome {
    /// A valid outcome at the given LSN. The remaining headers default to
    /// "not reported" and can be filled in by the caller.
    pub fn valid(lsn: i64, response: StoreResponse) -> Self {
        Self {
            is_valid: true,
            status: response.status,
            sub_status: SubStatusCode::UNKNOWN,
            lsn,
            quorum_acked_lsn: -1,
            global_committed_lsn: -1,
            item_lsn: -1,
            current_replica_set_size: -1,
            number_of_read_regions: -1,
            partition_key_range_id: String::new(),
            response: Some(response),
            error: None,
        }
    }

    /// An outcome carrying a captured probe failure.
    pub fn failed(error: AnyError) -> Self {
        Self {
            is_valid: false,
            status: StatusCode::INTERNAL_SERVER_ERROR,
            sub_status: SubStatusCode::UNKNOWN,
            lsn: -1,
            quorum_acked_lsn: -1,
            global_committed_lsn: -1,
            item_lsn: -1,
            current_replica_set_size: -1,
            number_of_read_regions: -1,
            partition_key_range_id: String::new(),
            response: None,
            error: Some(error),
        }
    }

    pub fn is_throttled(&self) -> bool {
        self.status.is_throttled()
    }

    /// Whether this replica no longer serves the addressed partition.
    pub fn is_topology_changed(&self) -> bool {
        self.status.is_gone() && self.sub_status.is_topology_changed()
    }
}

impl fmt::Display for StoreOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "StoreOutcome{{valid:{}, status:{}/{}, lsn:{}, quorumAckedLsn:{}, \
             globalCommittedLsn:{}, itemLsn:{}, replicaSetSize:{}, pkRange:{}}}",
            self.is_valid,
            self.status,
            self.sub_status,
            self.lsn,
            self.quorum_acked_lsn,
            self.global_committed_lsn,
            self.item_lsn,
            self.current_replica_set_size,
            self.partition_key_range_id,
        )
    }
}
