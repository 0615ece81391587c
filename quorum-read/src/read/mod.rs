//! The quorum read state machine.
//!
//! ```text
//!               ------------------- PrimaryRead -------------------------------------
//!               |                       ^                                           |
//!         [RetryOnSecondary]            |                                           |
//!               |                   [NotSelected]                                   |
//!              \/                       |                                          \/
//! Start------------------------->SecondaryQuorumRead---------[Met]------------->Result
//!                                       |                                           ^
//!                                   [Selected]                                      |
//!                                       |                                           |
//!                                      \/                                           |
//!                                 ReadBarrier----------------------------------------
//! ```
//!
//! `BoundedStaleness` runs the same machine without the primary read barrier
//! after `Selected`, since under asynchronous replication the primary may be
//! permanently ahead of the quorum-acknowledged LSN.

mod barrier;
mod decision;
mod primary;
mod quorum_reader;

#[cfg(test)]
mod decision_test;
#[cfg(test)]
mod quorum_reader_test;

use std::time::Duration;

pub use quorum_reader::QuorumReader;

pub(crate) const MAX_READ_QUORUM_RETRIES: usize = 6;
pub(crate) const MAX_PRIMARY_READ_RETRIES: usize = 6;
pub(crate) const MAX_READ_BARRIER_RETRIES: usize = 6;
pub(crate) const DELAY_BETWEEN_READ_BARRIER_CALLS: Duration =
    Duration::from_millis(5);
