//! Bucket handle
//!
//! One `Bucket` owns the shared state for a bucket: the topology snapshot,
//! the prepared plan cache and the metrics registry. Queries, durability
//! checks and deferred handles created from it all share that state.

use std::sync::Arc;
use std::time::Duration;

use crate::config::ClientConfig;
use crate::deferred::DeferredQueryHandle;
use crate::durability::{DurabilityCoordinator, PersistTo, ReplicateTo};
use crate::errors::ClientResult;
use crate::observability::{ClientMetrics, MetricsSnapshot};
use crate::query::{AsyncQueryResult, PreparedPlanCache, QueryExecutor, QueryRequest, QueryResult};
use crate::routing::{ClusterTopology, NodeLocator, RoutingResult};
use crate::transport::Transport;

/// Client handle for one bucket
pub struct Bucket {
    name: String,
    transport: Arc<dyn Transport>,
    locator: Arc<NodeLocator>,
    metrics: Arc<ClientMetrics>,
    executor: QueryExecutor,
    durability: DurabilityCoordinator,
    config: ClientConfig,
}

impl std::fmt::Debug for Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bucket")
            .field("name", &self.name)
            .field("rev", &self.locator.rev())
            .field("executor", &self.executor)
            .finish()
    }
}

impl Bucket {
    pub fn new(
        name: impl Into<String>,
        transport: Arc<dyn Transport>,
        topology: ClusterTopology,
        config: ClientConfig,
    ) -> ClientResult<Self> {
        config.validate()?;
        let name = name.into();
        let metrics = Arc::new(ClientMetrics::new());
        let locator = Arc::new(NodeLocator::with_metrics(topology, Arc::clone(&metrics)));
        let cache = Arc::new(PreparedPlanCache::with_metrics(
            config.query.plan_cache_capacity,
            Arc::clone(&metrics),
        ));
        let executor = QueryExecutor::new(
            name.clone(),
            Arc::clone(&transport),
            Arc::clone(&locator),
            cache,
            Arc::clone(&metrics),
            &config.query,
        );
        let durability = DurabilityCoordinator::new(
            Arc::clone(&transport),
            Arc::clone(&locator),
            Arc::clone(&metrics),
            &config.durability,
        );
        Ok(Self {
            name,
            transport,
            locator,
            metrics,
            executor,
            durability,
            config,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Run a query and collect the full result
    pub async fn query(&self, request: QueryRequest) -> ClientResult<QueryResult> {
        self.executor.query(request).await
    }

    /// Run a query and stream its sections
    pub async fn execute(&self, request: QueryRequest) -> ClientResult<AsyncQueryResult> {
        self.executor.execute(request).await
    }

    /// Wait for a stored mutation to meet the durability requirement
    pub async fn await_durability(
        &self,
        key: &str,
        cas: u64,
        persist_to: PersistTo,
        replicate_to: ReplicateTo,
        timeout: Duration,
    ) -> ClientResult<()> {
        self.durability
            .await_durability(key, cas, false, persist_to, replicate_to, timeout)
            .await
    }

    /// Wait for a removal to meet the durability requirement
    pub async fn await_removal_durability(
        &self,
        key: &str,
        cas: u64,
        persist_to: PersistTo,
        replicate_to: ReplicateTo,
        timeout: Duration,
    ) -> ClientResult<()> {
        self.durability
            .await_durability(key, cas, true, persist_to, replicate_to, timeout)
            .await
    }

    pub fn owner_of(&self, key: &str) -> RoutingResult<String> {
        self.locator.owner_of(key)
    }

    pub fn replicas_of(&self, key: &str) -> RoutingResult<Vec<String>> {
        self.locator.replicas_of(key)
    }

    /// Install a newer topology; stale revisions are ignored
    pub fn update_topology(&self, topology: ClusterTopology) -> bool {
        self.locator.update(topology)
    }

    /// Handle for a deferred query given its status URI
    pub fn deferred_handle(&self, status_uri: impl Into<String>) -> DeferredQueryHandle {
        DeferredQueryHandle::new(
            status_uri,
            Arc::clone(&self.transport),
            Arc::clone(&self.metrics),
            &self.config.deferred,
        )
    }

    /// Drop every cached plan, returning how many there were
    pub fn invalidate_query_cache(&self) -> usize {
        self.executor.invalidate_query_cache()
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}
