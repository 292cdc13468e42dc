//! aerodb-client - asynchronous driver core for an AeroDB document cluster
//!
//! The protocol-level pieces of the driver:
//! - `query`: prepared plan cache and the PREPARE/EXECUTE retry protocol
//! - `durability`: persistence/replication quorum polling
//! - `routing`: key-to-node resolution (partition table and ketama ring)
//! - `deferred`: status/result polling for long-running queries
//! - `transport`: the request/response seam and the subscription guard
//!
//! The wire transport is supplied by the caller through [`transport::Transport`].

pub mod cli;
pub mod client;
pub mod config;
pub mod deferred;
pub mod durability;
pub mod errors;
pub mod observability;
pub mod query;
pub mod routing;
pub mod transport;

pub use client::Bucket;
pub use config::ClientConfig;
pub use errors::{ClientError, ClientResult};
