//! Client-side counters
//!
//! - Counters only
//! - Monotonic increase
//! - Thread-safe, lock-free

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Operational counters shared by every component of one client.
///
/// Uses Relaxed ordering; counters are independent and read for reporting only.
#[derive(Debug, Default)]
pub struct ClientMetrics {
    prepares: AtomicU64,
    executes: AtomicU64,
    adhoc_executes: AtomicU64,
    prepared_retries: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    cache_evictions: AtomicU64,
    observe_polls: AtomicU64,
    durability_timeouts: AtomicU64,
    durability_failures: AtomicU64,
    deferred_retries: AtomicU64,
    topology_swaps: AtomicU64,
    undelivered_released: AtomicU64,
}

impl ClientMetrics {
    /// Create a registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    // Query metrics

    pub fn increment_prepares(&self) {
        self.prepares.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_executes(&self) {
        self.executes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_adhoc_executes(&self) {
        self.adhoc_executes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_prepared_retries(&self) {
        self.prepared_retries.fetch_add(1, Ordering::Relaxed);
    }

    // Plan cache metrics

    pub fn increment_cache_hits(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_cache_misses(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_cache_evictions(&self, count: u64) {
        self.cache_evictions.fetch_add(count, Ordering::Relaxed);
    }

    // Durability metrics

    pub fn increment_observe_polls(&self) {
        self.observe_polls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_durability_timeouts(&self) {
        self.durability_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_durability_failures(&self) {
        self.durability_failures.fetch_add(1, Ordering::Relaxed);
    }

    // Deferred, routing and transport metrics

    pub fn increment_deferred_retries(&self) {
        self.deferred_retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_topology_swaps(&self) {
        self.topology_swaps.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_undelivered_released(&self) {
        self.undelivered_released.fetch_add(1, Ordering::Relaxed);
    }

    /// Get all counters as a point-in-time snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            prepares: self.prepares.load(Ordering::Relaxed),
            executes: self.executes.load(Ordering::Relaxed),
            adhoc_executes: self.adhoc_executes.load(Ordering::Relaxed),
            prepared_retries: self.prepared_retries.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            cache_evictions: self.cache_evictions.load(Ordering::Relaxed),
            observe_polls: self.observe_polls.load(Ordering::Relaxed),
            durability_timeouts: self.durability_timeouts.load(Ordering::Relaxed),
            durability_failures: self.durability_failures.load(Ordering::Relaxed),
            deferred_retries: self.deferred_retries.load(Ordering::Relaxed),
            topology_swaps: self.topology_swaps.load(Ordering::Relaxed),
            undelivered_released: self.undelivered_released.load(Ordering::Relaxed),
        }
    }

    /// Snapshot rendered as a JSON object
    pub fn to_json(&self) -> String {
        serde_json::to_string(&self.snapshot()).unwrap_or_else(|_| "{}".to_string())
    }
}

/// A point-in-time snapshot of all counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub prepares: u64,
    pub executes: u64,
    pub adhoc_executes: u64,
    pub prepared_retries: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_evictions: u64,
    pub observe_polls: u64,
    pub durability_timeouts: u64,
    pub durability_failures: u64,
    pub deferred_retries: u64,
    pub topology_swaps: u64,
    pub undelivered_released: u64,
}
