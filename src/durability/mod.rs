//! Durability
//!
//! Confirms that a mutation reached a minimum number of persisted and/or
//! replicated copies by polling observe state on the key's master and
//! replicas.

mod coordinator;
mod quorum;
mod status;

pub use coordinator::DurabilityCoordinator;
pub use quorum::{evaluate, ObserveSample, QuorumState, StatusIdentifiers};
pub use status::{ObserveStatus, PersistTo, ReplicateTo};
