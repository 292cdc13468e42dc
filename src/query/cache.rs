//! Prepared plan cache
//!
//! Bounded LRU map from statement text to prepared plan. Every operation
//! takes the lock once, so `get`, `put` and `remove` are each atomic and
//! `get` refreshes recency.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};

use lru::LruCache;

use crate::observability::ClientMetrics;

use super::plan::PreparedPlan;

/// Default number of cached plans
pub const DEFAULT_PLAN_CACHE_CAPACITY: usize = 5000;

/// Concurrency-safe LRU of prepared plans
#[derive(Debug)]
pub struct PreparedPlanCache {
    plans: Mutex<LruCache<String, PreparedPlan>>,
    metrics: Arc<ClientMetrics>,
}

impl Default for PreparedPlanCache {
    fn default() -> Self {
        Self::new(DEFAULT_PLAN_CACHE_CAPACITY)
    }
}

impl PreparedPlanCache {
    /// Capacity 0 is treated as 1
    pub fn new(capacity: usize) -> Self {
        Self::with_metrics(capacity, Arc::new(ClientMetrics::new()))
    }

    pub fn with_metrics(capacity: usize, metrics: Arc<ClientMetrics>) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            plans: Mutex::new(LruCache::new(capacity)),
            metrics,
        }
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<String, PreparedPlan>> {
        self.plans
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Look up a plan and mark it most recently used
    pub fn get(&self, statement: &str) -> Option<PreparedPlan> {
        let plan = self.lock().get(statement).cloned();
        if plan.is_some() {
            self.metrics.increment_cache_hits();
        } else {
            self.metrics.increment_cache_misses();
        }
        plan
    }

    /// Look up without touching recency
    pub fn peek(&self, statement: &str) -> Option<PreparedPlan> {
        self.lock().peek(statement).cloned()
    }

    /// Insert or replace a plan, evicting the least recently used on overflow.
    ///
    /// Returns the evicted statement, if any.
    pub fn put(&self, statement: impl Into<String>, plan: PreparedPlan) -> Option<String> {
        let statement = statement.into();
        let displaced = self.lock().push(statement.clone(), plan);
        match displaced {
            Some((old_key, _)) if old_key != statement => {
                self.metrics.add_cache_evictions(1);
                Some(old_key)
            }
            _ => None,
        }
    }

    pub fn remove(&self, statement: &str) -> Option<PreparedPlan> {
        self.lock().pop(statement)
    }

    /// Drop every plan and return how many were held
    pub fn clear(&self) -> usize {
        let mut plans = self.lock();
        let size = plans.len();
        plans.clear();
        size
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.lock().cap().get()
    }

    pub fn contains(&self, statement: &str) -> bool {
        self.lock().contains(statement)
    }
}
