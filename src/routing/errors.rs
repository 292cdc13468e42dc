//! # Routing Errors

use thiserror::Error;

/// Result type for routing operations
pub type RoutingResult<T> = Result<T, RoutingError>;

/// Key routing errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoutingError {
    /// Partition has no master assigned yet (index -1)
    #[error("Topology incomplete: partition {partition} has no assigned node")]
    TopologyIncomplete { partition: usize },

    /// Replica slot is not configured for this partition (index -2) or bucket
    #[error("Replica {replica} is not configured")]
    ReplicaNotConfigured { replica: usize },

    /// Replica numbers run from 1 to 3
    #[error("Invalid replica index {0} (expected 1..=3)")]
    InvalidReplicaIndex(usize),

    /// Partition table points past the node list
    #[error("Node index {index} out of range ({nodes} nodes)")]
    NodeIndexOutOfRange { index: usize, nodes: usize },

    /// Ketama ring has no points
    #[error("Ketama ring is empty")]
    EmptyRing,

    /// No node advertises the query service
    #[error("No node provides the query service")]
    NoQueryNodes,

    /// Operation needs a partitioned bucket
    #[error("Operation not supported for {0} buckets")]
    UnsupportedBucketLayout(&'static str),

    /// Topology descriptor failed validation
    #[error("Invalid topology: {0}")]
    InvalidTopology(String),
}
