//! Deferred (long-running) queries
//!
//! Status and result polling for queries the server runs asynchronously.

mod backoff;
mod poller;

pub use backoff::{is_transient, RetryPolicy};
pub use poller::DeferredQueryHandle;
