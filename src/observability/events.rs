//! Observability events for the AeroDB client
//!
//! Every driver-side decision that an operator may need to reconstruct
//! after the fact is named here. Events are explicit and typed.

use std::fmt;

/// Severity an event is emitted at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventLevel {
    Debug,
    Info,
    Warn,
}

/// Observable events in the client driver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Configuration
    /// Client configuration loaded
    ConfigLoaded,

    // Query operations
    /// Ad-hoc statement dispatched
    AdhocExecuted,
    /// PREPARE sent for a statement with no cached plan
    PrepareIssued,
    /// PREPARE broadcast to every query node
    PrepareBroadcast,
    /// Plan inserted into the prepared plan cache
    PlanCached,
    /// Cached plan served an EXECUTE
    PlanCacheHit,
    /// Plan dropped after the server rejected it
    PlanInvalidated,
    /// PREPARE and EXECUTE repeated after a stale-plan error
    PreparedRetry,
    /// Entire prepared plan cache cleared
    PlanCacheCleared,

    // Durability
    /// Durability wait started
    DurabilityBegin,
    /// Quorum reached
    DurabilitySatisfied,
    /// Quorum not reached before the deadline
    DurabilityTimeout,
    /// A probe failed while polling
    DurabilityFailed,

    // Routing
    /// New topology snapshot installed
    TopologySwapped,
    /// Topology snapshot ignored because it was not newer
    TopologyStale,

    // Deferred queries
    /// Deferred status or result fetch retried after a transient failure
    DeferredRetry,
    /// Deferred fetch gave up
    DeferredExhausted,

    // Subscription guard
    /// Item produced for a departed consumer and released by the guard
    UndeliveredReleased,
}

impl Event {
    /// Returns the canonical event name
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",

            Event::AdhocExecuted => "QUERY_ADHOC",
            Event::PrepareIssued => "PREPARE_ISSUED",
            Event::PrepareBroadcast => "PREPARE_BROADCAST",
            Event::PlanCached => "PLAN_CACHED",
            Event::PlanCacheHit => "PLAN_CACHE_HIT",
            Event::PlanInvalidated => "PLAN_INVALIDATED",
            Event::PreparedRetry => "PREPARED_RETRY",
            Event::PlanCacheCleared => "PLAN_CACHE_CLEARED",

            Event::DurabilityBegin => "DURABILITY_BEGIN",
            Event::DurabilitySatisfied => "DURABILITY_SATISFIED",
            Event::DurabilityTimeout => "DURABILITY_TIMEOUT",
            Event::DurabilityFailed => "DURABILITY_FAILED",

            Event::TopologySwapped => "TOPOLOGY_SWAPPED",
            Event::TopologyStale => "TOPOLOGY_STALE",

            Event::DeferredRetry => "DEFERRED_RETRY",
            Event::DeferredExhausted => "DEFERRED_EXHAUSTED",

            Event::UndeliveredReleased => "UNDELIVERED_RELEASED",
        }
    }

    /// Level the event is logged at
    pub fn level(&self) -> EventLevel {
        match self {
            Event::DurabilityTimeout
            | Event::DurabilityFailed
            | Event::DeferredExhausted
            | Event::PlanInvalidated => EventLevel::Warn,
            Event::ConfigLoaded
            | Event::PreparedRetry
            | Event::PlanCacheCleared
            | Event::TopologySwapped => EventLevel::Info,
            _ => EventLevel::Debug,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
