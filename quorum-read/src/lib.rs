#![doc = include_str!("lib_readme.md")]
#![allow(clippy::bool_assert_comparison)]
#![allow(clippy::bool_comparison)]
#![allow(clippy::result_large_err)]
#![deny(unused_qualifications)]

mod read;

pub mod config;
pub mod errors;
pub mod store;
pub mod testing;

pub use anyerror;
pub use anyerror::AnyError;
pub use openraft_macros::add_async_trait;

pub use crate::config::Config;
pub use crate::errors::ReadError;
pub use crate::read::QuorumReader;
pub use crate::store::reader::StoreReader;
pub use crate::store::request::BarrierRequest;
pub use crate::store::request::ReadRequest;
pub use crate::store::response::StoreResponse;
pub use crate::store::ConsistencyLevel;
pub use crate::store::QuorumTarget;
pub use crate::store::ReadMode;
pub use crate::store::StoreOutcome;
