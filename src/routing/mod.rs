//! Key routing
//!
//! Maps document keys to the nodes that own them:
//! - Partitioned buckets: CRC32 partition hash into a master/replica table
//! - Ketama buckets: MD5 consistent-hash ring

mod errors;
pub mod hash;
mod locator;
mod topology;

pub use errors::{RoutingError, RoutingResult};
pub use locator::NodeLocator;
pub use topology::{
    BucketLayout, ClusterTopology, LayoutDescriptor, NodeInfo, PartitionEntry, Service,
    TopologyDescriptor, MAX_REPLICAS, NODE_UNASSIGNED, REPLICA_NOT_CONFIGURED,
};
