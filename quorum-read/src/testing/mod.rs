//! Testing utilities for quorum-read.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Mutex;
use std::time::Duration;

use anyerror::AnyError;

use crate::store::reader::StoreReader;
use crate::store::request::ReadRequest;
use crate::store::response::StoreResponse;
use crate::store::status::StatusCode;
use crate::store::status::SubStatusCode;
use crate::store::ConsistencyLevel;
use crate::store::QuorumTarget;
use crate::store::ReadMode;
use crate::store::StoreOutcome;

/// Unit test harness: initializes tracing and drives the async test on a
/// fresh runtime with a paused clock, so sleep-based pacing is measured in
/// deterministic virtual time rather than racing the wall clock.
///
/// ```ignore
/// #[test_harness::test(harness = ut_harness)]
/// async fn my_test() -> anyhow::Result<()> { .. }
/// ```
pub fn ut_harness<E, Fut>(test: impl FnOnce() -> Fut)
where
    E: std::fmt::Debug,
    Fut: Future<Output = Result<(), E>>,
{
    init_tracing();

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .start_paused(true)
        .build()
        .expect("tokio runtime");
    rt.block_on(test()).expect("test returned an error");
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Build a read request with the given overall timeout.
pub fn read_request(timeout: Duration) -> ReadRequest {
    ReadRequest::new("42", ConsistencyLevel::Strong, timeout)
}

/// A global strong quorum target.
pub fn strong_target(read_quorum: i32) -> QuorumTarget {
    QuorumTarget::new(read_quorum, ReadMode::Strong, ConsistencyLevel::Strong)
}

/// Builds a [`StoreOutcome`], for testing purposes.
#[derive(Debug, Clone)]
pub struct OutcomeBuilder {
    o: StoreOutcome,
}

/// A valid replica outcome at the given LSN, with the quorum-acknowledged
/// LSN defaulted to the same value and an empty OK body.
pub fn outcome(lsn: i64) -> OutcomeBuilder {
    let mut o =
        StoreOutcome::valid(lsn, StoreResponse::new(StatusCode::OK, "{}"));
    o.quorum_acked_lsn = lsn;
    OutcomeBuilder { o }
}

/// An invalid outcome carrying a captured probe failure.
pub fn failed_outcome(msg: impl std::fmt::Display) -> OutcomeBuilder {
    OutcomeBuilder {
        o: StoreOutcome::failed(AnyError::error(msg)),
    }
}

/// A throttled outcome with a 429 response body attached.
pub fn throttled_outcome() -> OutcomeBuilder {
    let mut o = StoreOutcome::failed(AnyError::error("throttled"));
    o.status = StatusCode::TOO_MANY_REQUESTS;
    o.response =
        Some(StoreResponse::new(StatusCode::TOO_MANY_REQUESTS, "backoff"));
    OutcomeBuilder { o }
}

impl OutcomeBuilder {
    pub fn lsn(mut self, lsn: i64) -> Self {
        self.o.lsn = lsn;
        self
    }

    pub fn quorum_acked_lsn(mut self, lsn: i64) -> Self {
        self.o.quorum_acked_lsn = lsn;
        self
    }

    pub fn global_committed_lsn(mut self, lsn: i64) -> Self {
        self.o.global_committed_lsn = lsn;
        self
    }

    pub fn item_lsn(mut self, lsn: i64) -> Self {
        self.o.item_lsn = lsn;
        self
    }

    pub fn replica_set_size(mut self, n: i32) -> Self {
        self.o.current_replica_set_size = n;
        self
    }

    pub fn read_regions(mut self, n: i32) -> Self {
        self.o.number_of_read_regions = n;
        self
    }

    pub fn status(mut self, status: StatusCode) -> Self {
        self.o.status = status;
        self
    }

    pub fn sub_status(mut self, sub_status: SubStatusCode) -> Self {
        self.o.sub_status = sub_status;
        self
    }

    pub fn body(mut self, body: &'static str) -> Self {
        self.o.response = Some(StoreResponse::new(self.o.status, body));
        self
    }

    pub fn build(self) -> StoreOutcome {
        self.o
    }
}

/// Arguments of one recorded `fan_out_read` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FanOutCall {
    pub include_primary: bool,
    pub replica_count: i32,
    pub force_read_all: bool,
    pub force_refresh: bool,
}

/// A scripted [`StoreReader`]: fan-out batches and primary outcomes are
/// queued up front and served in order. The last scripted entry of each
/// queue is sticky, so "the replicas always answer X" needs one entry.
#[derive(Debug, Default)]
pub struct ScriptedStore {
    fan_outs: Mutex<VecDeque<Vec<StoreOutcome>>>,
    primaries: Mutex<VecDeque<StoreOutcome>>,

    fan_out_log: Mutex<Vec<FanOutCall>>,
    primary_calls: AtomicUsize,
}

impl ScriptedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_fan_out(&self, batch: Vec<StoreOutcome>) -> &Self {
        self.fan_outs.lock().unwrap().push_back(batch);
        self
    }

    pub fn push_primary(&self, outcome: StoreOutcome) -> &Self {
        self.primaries.lock().unwrap().push_back(outcome);
        self
    }

    /// All `fan_out_read` calls seen so far, in order.
    pub fn fan_out_log(&self) -> Vec<FanOutCall> {
        self.fan_out_log.lock().unwrap().clone()
    }

    pub fn fan_out_calls(&self) -> usize {
        self.fan_out_log.lock().unwrap().len()
    }

    pub fn primary_calls(&self) -> usize {
        self.primary_calls.load(Ordering::Relaxed)
    }

    fn next_fan_out(&self) -> Vec<StoreOutcome> {
        let mut q = self.fan_outs.lock().unwrap();
        if q.len() > 1 {
            q.pop_front().unwrap_or_default()
        } else {
            q.front().cloned().unwrap_or_default()
        }
    }

    fn next_primary(&self) -> StoreOutcome {
        let mut q = self.primaries.lock().unwrap();
        let got = if q.len() > 1 {
            q.pop_front()
        } else {
            q.front().cloned()
        };
        got.unwrap_or_else(|| {
            StoreOutcome::failed(AnyError::error("unscripted primary read"))
        })
    }
}

impl StoreReader for ScriptedStore {
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
        self.fan_out_log.lock().unwrap().push(FanOutCall {
            include_primary,
            replica_count,
            force_read_all,
            force_refresh: request.context.force_refresh_address_cache,
        });
        self.next_fan_out()
    }

    async fn read_primary(
        &self,
        _request: &ReadRequest,
        _requires_valid_lsn: bool,
    ) -> StoreOutcome {
        self.primary_calls.fetch_add(1, Ordering::Relaxed);
        self.next_primary()
    }
}
