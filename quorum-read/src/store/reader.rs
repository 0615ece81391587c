//! The replica fan-out interface the quorum engine consumes.

use openraft_macros::add_async_trait;

use crate::store::request::ReadRequest;
use crate::store::ReadMode;
use crate::store::StoreOutcome;

/// Issues reads against the replicas serving a partition.
///
/// Implementations own wire encoding, connection pooling, and address
/// resolution. They must honor
/// [`force_refresh_address_cache`](crate::store::request::RequestContext::force_refresh_address_cache)
/// on the request context, and must capture per-replica transport failures as
/// invalid [`StoreOutcome`]s rather than failing the batch.
///
/// All probes within one `fan_out_read` call are expected to be issued
/// concurrently; completion order is irrelevant to the engine.
#[add_async_trait]
pub trait StoreReader: Send + Sync + 'static {
    /// Probe several replicas in parallel and return one outcome per probed
    /// replica.
    ///
    /// `replica_count` is the number of outcomes wanted; with
    /// `force_read_all` the reader probes every available replica to put
    /// together that many. `include_primary` adds the primary to the probed
    /// set. With `requires_valid_lsn`, outcomes lacking a usable LSN are
    /// marked invalid. `check_min_lsn` applies the session minimum-LSN check
    /// (unused by quorum reads, part of the collaborator contract).
    async fn fan_out_read(
        &self,
        request: &ReadRequest,
        include_primary: bool,
        replica_count: i32,
        requires_valid_lsn: bool,
        read_mode: ReadMode,
        check_min_lsn: bool,
        force_read_all: bool,
    ) -> Vec<StoreOutcome>;

    /// Read the primary replica alone.
    async fn read_primary(
        &self,
        request: &ReadRequest,
        requires_valid_lsn: bool,
    ) -> StoreOutcome;
}
