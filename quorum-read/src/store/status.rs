//! Status and sub-status codes carried by replica probe outcomes.

use std::fmt;

/// HTTP-style status code reported by a replica.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(serde::Deserialize, serde::Serialize)]
pub struct StatusCode(pub u16);

impl StatusCode {
    pub const OK: Self = Self(200);
    pub const NOT_FOUND: Self = Self(404);
    pub const GONE: Self = Self(410);
    pub const TOO_MANY_REQUESTS: Self = Self(429);
    pub const INTERNAL_SERVER_ERROR: Self = Self(500);

    /// The first code treated as an error when selecting among replicas at
    /// the same LSN.
    pub const STARTING_ERROR_CODE: Self = Self(400);

    pub fn is_error(&self) -> bool {
        self.0 >= Self::STARTING_ERROR_CODE.0
    }

    /// The replica asked the caller to back off.
    pub fn is_throttled(&self) -> bool {
        *self == Self::TOO_MANY_REQUESTS
    }

    pub fn is_gone(&self) -> bool {
        *self == Self::GONE
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Backend sub-status qualifying a [`StatusCode::GONE`] response.
///
/// The topology-change class of sub-statuses means the replica the client
/// addressed no longer serves the partition: the address cache is stale, the
/// partition range was split or migrated away, or the replica lost its lease.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[derive(serde::Deserialize, serde::Serialize)]
pub struct SubStatusCode(pub u16);

impl SubStatusCode {
    pub const UNKNOWN: Self = Self(0);
    pub const NAME_CACHE_IS_STALE: Self = Self(1000);
    pub const PARTITION_KEY_RANGE_GONE: Self = Self(1002);
    pub const COMPLETING_SPLIT: Self = Self(1007);
    pub const COMPLETING_PARTITION_MIGRATION: Self = Self(1008);
    pub const LEASE_NOT_FOUND: Self = Self(1022);

    pub fn is_topology_changed(&self) -> bool {
        matches!(
            *self,
            Self::NAME_CACHE_IS_STALE
                | Self::PARTITION_KEY_RANGE_GONE
                | Self::COMPLETING_SPLIT
                | Self::COMPLETING_PARTITION_MIGRATION
                | Self::LEASE_NOT_FOUND
        )
    }
}

impl fmt::Display for SubStatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
