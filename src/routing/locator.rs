//! Node locator
//!
//! Holds the current topology snapshot behind an atomically swapped `Arc`.
//! Every lookup clones the `Arc` once and resolves against that snapshot,
//! so a concurrent update can never be observed half-applied.

use std::sync::{Arc, RwLock};

use crate::observability::{log_event, ClientMetrics, Event};

use super::errors::RoutingResult;
use super::topology::{ClusterTopology, NodeInfo};

/// Key-to-node resolution against the latest topology
#[derive(Debug)]
pub struct NodeLocator {
    current: RwLock<Arc<ClusterTopology>>,
    metrics: Arc<ClientMetrics>,
}

impl NodeLocator {
    pub fn new(topology: ClusterTopology) -> Self {
        Self::with_metrics(topology, Arc::new(ClientMetrics::new()))
    }

    pub fn with_metrics(topology: ClusterTopology, metrics: Arc<ClientMetrics>) -> Self {
        Self {
            current: RwLock::new(Arc::new(topology)),
            metrics,
        }
    }

    /// Current snapshot
    pub fn snapshot(&self) -> Arc<ClusterTopology> {
        let guard = self
            .current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&guard)
    }

    /// Install `topology` if it is newer than the current snapshot.
    ///
    /// Returns whether the swap happened.
    pub fn update(&self, topology: ClusterTopology) -> bool {
        let mut guard = self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let old_rev = guard.rev();
        let new_rev = topology.rev();
        if new_rev <= old_rev {
            drop(guard);
            log_event(
                Event::TopologyStale,
                &[
                    ("current_rev", &old_rev.to_string()),
                    ("offered_rev", &new_rev.to_string()),
                ],
            );
            return false;
        }
        *guard = Arc::new(topology);
        drop(guard);

        self.metrics.increment_topology_swaps();
        log_event(
            Event::TopologySwapped,
            &[
                ("old_rev", &old_rev.to_string()),
                ("new_rev", &new_rev.to_string()),
            ],
        );
        true
    }

    pub fn owner_of(&self, key: &str) -> RoutingResult<String> {
        self.snapshot().owner_of(key)
    }

    pub fn replicas_of(&self, key: &str) -> RoutingResult<Vec<String>> {
        self.snapshot().replicas_of(key)
    }

    pub fn replica_of(&self, key: &str, n: usize) -> RoutingResult<String> {
        self.snapshot().replica_of(key, n)
    }

    pub fn nodes(&self) -> Vec<NodeInfo> {
        self.snapshot().nodes().to_vec()
    }

    pub fn query_nodes(&self) -> Vec<NodeInfo> {
        self.snapshot().query_nodes().into_iter().cloned().collect()
    }

    pub fn replica_count(&self) -> usize {
        self.snapshot().replica_count()
    }

    pub fn rev(&self) -> u64 {
        self.snapshot().rev()
    }
}
