use std::sync::atomic::AtomicI32;
use std::sync::atomic::Ordering;
use std::sync::Mutex;

use futures::future::join_all;
use quorum_read::store::status::StatusCode;
use quorum_read::ReadMode;
use quorum_read::ReadRequest;
use quorum_read::StoreOutcome;
use quorum_read::StoreReader;
use quorum_read::StoreResponse;
use tracing::debug;

/// The partition's current value on one replica, with the LSN it was written
/// at.
#[derive(Debug, Clone)]
struct Value {
    body: String,
    lsn: i64,
}

#[derive(Debug)]
struct ReplicaState {
    lsn: i64,
    global_committed_lsn: i64,
    value: Option<Value>,
}

impl ReplicaState {
    fn new() -> Self {
        Self {
            lsn: 0,
            global_committed_lsn: -1,
            value: None,
        }
    }
}

/// An in-memory replica set implementing the [`StoreReader`] trait.
///
/// Replica `0` is the primary; writes land there and reach the secondaries
/// only through [`replicate_to`](Self::replicate_to) or
/// [`replicate_all`](Self::replicate_all), so tests control exactly how far
/// each secondary lags.
///
/// The quorum-acked LSN each probe reports is derived from the global view:
/// the LSN a majority of replicas has reached.
#[derive(Debug)]
pub struct MemReplicaSet {
    replicas: Vec<Mutex<ReplicaState>>,
    read_regions: AtomicI32,
}

impl MemReplicaSet {
    /// A replica set of `n` replicas: one primary and `n - 1` secondaries.
    pub fn new(n: usize) -> Self {
        Self {
            replicas: (0..n).map(|_| Mutex::new(ReplicaState::new())).collect(),
            read_regions: AtomicI32::new(0),
        }
    }

    /// Report this many read regions on every probe. With more than one, a
    /// global strong read also waits for the global committed LSN.
    pub fn set_read_regions(&self, n: i32) {
        self.read_regions.store(n, Ordering::Relaxed);
    }

    /// Write a new value to the primary. Returns the LSN of the write; the
    /// secondaries do not see it until it is replicated.
    pub fn write(&self, body: impl ToString) -> i64 {
        let mut primary = self.replicas[0].lock().unwrap();
        primary.lsn += 1;
        primary.value = Some(Value {
            body: body.to_string(),
            lsn: primary.lsn,
        });

        debug!("MemReplicaSet::write: lsn={}", primary.lsn);
        primary.lsn
    }

    /// Copy the primary's log position and value to secondary `i`.
    pub fn replicate_to(&self, i: usize) {
        assert!(i > 0, "replica 0 is the primary");

        let (lsn, value) = {
            let primary = self.replicas[0].lock().unwrap();
            (primary.lsn, primary.value.clone())
        };

        let mut replica = self.replicas[i].lock().unwrap();
        replica.lsn = lsn;
        replica.value = value;

        debug!("MemReplicaSet::replicate_to: i={}, lsn={}", i, lsn);
    }

    /// Bring every secondary up to the primary's log position.
    pub fn replicate_all(&self) {
        for i in 1..self.replicas.len() {
            self.replicate_to(i);
        }
    }

    /// Mark `lsn` as committed across all configured regions, on every
    /// replica.
    pub fn set_global_committed(&self, lsn: i64) {
        for replica in &self.replicas {
            replica.lock().unwrap().global_committed_lsn = lsn;
        }

        debug!("MemReplicaSet::set_global_committed: lsn={}", lsn);
    }

    /// The LSN a majority of replicas has reached.
    fn quorum_acked_lsn(&self) -> i64 {
        let mut lsns: Vec<i64> = self
            .replicas
            .iter()
            .map(|r| r.lock().unwrap().lsn)
            .collect();
        lsns.sort_unstable_by(|a, b| b.cmp(a));

        let majority = self.replicas.len() / 2 + 1;
        lsns[majority - 1]
    }

    async fn probe(&self, i: usize) -> StoreOutcome {
        let quorum_acked_lsn = self.quorum_acked_lsn();
        let replica = self.replicas[i].lock().unwrap();

        let (status, body, item_lsn) = match &replica.value {
            Some(v) => (StatusCode::OK, v.body.clone(), v.lsn),
            None => (StatusCode::NOT_FOUND, String::new(), -1),
        };

        let mut outcome =
            StoreOutcome::valid(replica.lsn, StoreResponse::new(status, body));
        outcome.quorum_acked_lsn = quorum_acked_lsn;
        outcome.global_committed_lsn = replica.global_committed_lsn;
        outcome.item_lsn = item_lsn;
        outcome.current_replica_set_size = self.replicas.len() as i32;
        outcome.number_of_read_regions = self.read_regions.load(Ordering::Relaxed);
        outcome
    }
}

impl StoreReader for MemReplicaSet {
    async fn fan_out_read(
        &self,
        request: &ReadRequest,
        include_primary: bool,
        replica_count: i32,
        _requires_valid_lsn: bool,
        _read_mode: ReadMode,
        _check_min_lsn: bool,
        force_read_all: bool,
    ) -> Vec<StoreOutcome> {
        let first = if include_primary { 0 } else { 1 };
        let candidates: Vec<usize> = (first..self.replicas.len()).collect();

        let probed: Vec<usize> = if force_read_all {
            candidates
        } else {
            candidates
                .into_iter()
                .take(replica_count.max(0) as usize)
                .collect()
        };

        debug!(
            "MemReplicaSet::fan_out_read: pk_range={}, probed={:?}",
            request.partition_key_range_id, probed
        );

        join_all(probed.into_iter().map(|i| self.probe(i))).await
    }

    async fn read_primary(
        &self,
        request: &ReadRequest,
        _requires_valid_lsn: bool,
    ) -> StoreOutcome {
        debug!(
            "MemReplicaSet::read_primary: pk_range={}",
            request.partition_key_range_id
        );
        self.probe(0).await
    }
}
