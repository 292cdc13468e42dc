//! Cluster topology snapshots
//!
//! A snapshot is immutable once built. Partitioned buckets route through a
//! partition table whose entries index into the bucket's own server list;
//! ketama buckets route through a sorted ring of points.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::errors::{RoutingError, RoutingResult};
use super::hash::{ketama_hash, ketama_points, partition_index};

/// Partition table value: no node owns the partition yet
pub const NODE_UNASSIGNED: i16 = -1;
/// Partition table value: replica slot not configured
pub const REPLICA_NOT_CONFIGURED: i16 = -2;
/// Highest replica number a bucket supports
pub const MAX_REPLICAS: usize = 3;

/// Services a node may run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Service {
    Kv,
    Query,
    Index,
    Search,
}

fn default_port() -> u16 {
    11210
}

fn default_services() -> Vec<Service> {
    vec![Service::Kv]
}

/// A cluster node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub hostname: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_services")]
    pub services: Vec<Service>,
}

impl NodeInfo {
    pub fn new(hostname: impl Into<String>, port: u16, services: Vec<Service>) -> Self {
        Self {
            hostname: hostname.into(),
            port,
            services,
        }
    }

    /// `host:port`, the node identifier used throughout routing
    pub fn address(&self) -> String {
        format!("{}:{}", self.hostname, self.port)
    }

    pub fn has_service(&self, service: Service) -> bool {
        self.services.contains(&service)
    }
}

/// One row of the partition table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionEntry {
    pub master: i16,
    pub replicas: Vec<i16>,
}

impl PartitionEntry {
    /// Server list index for replica `n` (1-based)
    pub fn replica(&self, n: usize) -> i16 {
        n.checked_sub(1)
            .and_then(|i| self.replicas.get(i))
            .copied()
            .unwrap_or(REPLICA_NOT_CONFIGURED)
    }
}

/// How keys map to nodes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BucketLayout {
    Partitioned {
        replicas: usize,
        server_list: Vec<String>,
        partitions: Vec<PartitionEntry>,
    },
    Ketama {
        ring: BTreeMap<u32, String>,
    },
}

impl BucketLayout {
    pub fn name(&self) -> &'static str {
        match self {
            BucketLayout::Partitioned { .. } => "partitioned",
            BucketLayout::Ketama { .. } => "ketama",
        }
    }
}

/// Immutable topology snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterTopology {
    rev: u64,
    nodes: Vec<NodeInfo>,
    layout: BucketLayout,
}

impl ClusterTopology {
    /// Partitioned topology; validates table shape and indexes
    pub fn partitioned(
        rev: u64,
        nodes: Vec<NodeInfo>,
        server_list: Vec<String>,
        partitions: Vec<PartitionEntry>,
        replicas: usize,
    ) -> RoutingResult<Self> {
        if partitions.is_empty() || !partitions.len().is_power_of_two() {
            return Err(RoutingError::InvalidTopology(format!(
                "partition count {} is not a power of two",
                partitions.len()
            )));
        }
        if replicas > MAX_REPLICAS {
            return Err(RoutingError::InvalidTopology(format!(
                "{} replicas configured, at most {} supported",
                replicas, MAX_REPLICAS
            )));
        }
        for entry in &partitions {
            for &index in std::iter::once(&entry.master).chain(entry.replicas.iter()) {
                if index >= 0 && index as usize >= server_list.len() {
                    return Err(RoutingError::NodeIndexOutOfRange {
                        index: index as usize,
                        nodes: server_list.len(),
                    });
                }
            }
        }
        Ok(Self {
            rev,
            nodes,
            layout: BucketLayout::Partitioned {
                replicas,
                server_list,
                partitions,
            },
        })
    }

    /// Ketama topology with the ring derived from every kv node
    pub fn ketama(rev: u64, nodes: Vec<NodeInfo>) -> RoutingResult<Self> {
        let mut ring = BTreeMap::new();
        for node in nodes.iter().filter(|n| n.has_service(Service::Kv)) {
            let address = node.address();
            for point in ketama_points(&address) {
                ring.insert(point, address.clone());
            }
        }
        Self::ketama_with_ring(rev, nodes, ring)
    }

    /// Ketama topology with an explicit ring
    pub fn ketama_with_ring(
        rev: u64,
        nodes: Vec<NodeInfo>,
        ring: BTreeMap<u32, String>,
    ) -> RoutingResult<Self> {
        if ring.is_empty() {
            return Err(RoutingError::EmptyRing);
        }
        Ok(Self {
            rev,
            nodes,
            layout: BucketLayout::Ketama { ring },
        })
    }

    pub fn rev(&self) -> u64 {
        self.rev
    }

    pub fn nodes(&self) -> &[NodeInfo] {
        &self.nodes
    }

    pub fn layout(&self) -> &BucketLayout {
        &self.layout
    }

    /// Nodes advertising the query service
    pub fn query_nodes(&self) -> Vec<&NodeInfo> {
        self.nodes
            .iter()
            .filter(|n| n.has_service(Service::Query))
            .collect()
    }

    /// Configured replica count; ketama buckets have none
    pub fn replica_count(&self) -> usize {
        match &self.layout {
            BucketLayout::Partitioned { replicas, .. } => *replicas,
            BucketLayout::Ketama { .. } => 0,
        }
    }

    /// Partition a key hashes to, for partitioned buckets
    pub fn partition_of(&self, key: &str) -> Option<usize> {
        match &self.layout {
            BucketLayout::Partitioned { partitions, .. } => {
                Some(partition_index(key.as_bytes(), partitions.len()))
            }
            BucketLayout::Ketama { .. } => None,
        }
    }

    /// Node owning the active copy of `key`
    pub fn owner_of(&self, key: &str) -> RoutingResult<String> {
        match &self.layout {
            BucketLayout::Partitioned {
                server_list,
                partitions,
                ..
            } => {
                let partition = partition_index(key.as_bytes(), partitions.len());
                let index = partitions[partition].master;
                if index < 0 {
                    return Err(RoutingError::TopologyIncomplete { partition });
                }
                resolve(server_list, index)
            }
            BucketLayout::Ketama { ring } => {
                let hash = ketama_hash(key.as_bytes());
                ring.range(hash..)
                    .next()
                    .or_else(|| ring.iter().next())
                    .map(|(_, address)| address.clone())
                    .ok_or(RoutingError::EmptyRing)
            }
        }
    }

    /// Node holding replica `n` (1..=3) of `key`
    pub fn replica_of(&self, key: &str, n: usize) -> RoutingResult<String> {
        if !(1..=MAX_REPLICAS).contains(&n) {
            return Err(RoutingError::InvalidReplicaIndex(n));
        }
        match &self.layout {
            BucketLayout::Partitioned {
                replicas,
                server_list,
                partitions,
            } => {
                if n > *replicas {
                    return Err(RoutingError::ReplicaNotConfigured { replica: n });
                }
                let partition = partition_index(key.as_bytes(), partitions.len());
                match partitions[partition].replica(n) {
                    NODE_UNASSIGNED => Err(RoutingError::TopologyIncomplete { partition }),
                    REPLICA_NOT_CONFIGURED => {
                        Err(RoutingError::ReplicaNotConfigured { replica: n })
                    }
                    index => resolve(server_list, index),
                }
            }
            layout => Err(RoutingError::UnsupportedBucketLayout(layout.name())),
        }
    }

    /// Replica nodes of `key` in replica order
    pub fn replicas_of(&self, key: &str) -> RoutingResult<Vec<String>> {
        match &self.layout {
            BucketLayout::Partitioned { replicas, .. } => (1..=*replicas)
                .map(|n| self.replica_of(key, n))
                .collect(),
            layout => Err(RoutingError::UnsupportedBucketLayout(layout.name())),
        }
    }
}

fn resolve(server_list: &[String], index: i16) -> RoutingResult<String> {
    let i = usize::try_from(index).map_err(|_| RoutingError::NodeIndexOutOfRange {
        index: 0,
        nodes: server_list.len(),
    })?;
    server_list
        .get(i)
        .cloned()
        .ok_or(RoutingError::NodeIndexOutOfRange {
            index: i,
            nodes: server_list.len(),
        })
}

// ==================
// JSON descriptor
// ==================

/// Serialized form of a topology
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopologyDescriptor {
    #[serde(default)]
    pub rev: u64,
    pub nodes: Vec<NodeInfo>,
    pub layout: LayoutDescriptor,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutDescriptor {
    Partitioned {
        #[serde(default)]
        replicas: usize,
        server_list: Vec<String>,
        /// One `[master, replica1, ...]` row per partition
        partition_map: Vec<Vec<i16>>,
    },
    Ketama,
}

impl TopologyDescriptor {
    pub fn from_json_str(json: &str) -> RoutingResult<Self> {
        serde_json::from_str(json).map_err(|e| RoutingError::InvalidTopology(e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> RoutingResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            RoutingError::InvalidTopology(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&content)
    }

    pub fn into_topology(self) -> RoutingResult<ClusterTopology> {
        match self.layout {
            LayoutDescriptor::Partitioned {
                replicas,
                server_list,
                partition_map,
            } => {
                let partitions = partition_map
                    .into_iter()
                    .map(|row| {
                        let mut cells = row.into_iter();
                        let master = cells.next().unwrap_or(NODE_UNASSIGNED);
                        PartitionEntry {
                            master,
                            replicas: cells.collect(),
                        }
                    })
                    .collect();
                ClusterTopology::partitioned(self.rev, self.nodes, server_list, partitions, replicas)
            }
            LayoutDescriptor::Ketama => ClusterTopology::ketama(self.rev, self.nodes),
        }
    }
}
