//! Observability for the AeroDB client
//!
//! This module provides:
//! - Typed driver events emitted through `tracing`
//! - Lock-free operational counters
//!
//! # Usage
//!
//! ```ignore
//! use aerodb_client::observability::{log_event, ClientMetrics, Event};
//!
//! log_event(Event::PlanCached, &[("statement", "SELECT 1")]);
//!
//! let metrics = ClientMetrics::new();
//! metrics.increment_prepares();
//! ```

mod events;
mod metrics;

pub use events::{Event, EventLevel};
pub use metrics::{ClientMetrics, MetricsSnapshot};

/// Log a driver event with key/value fields.
///
/// Fields are rendered as a single `fields` value so that any subscriber
/// sees the same flat `key=value` list.
pub fn log_event(event: Event, fields: &[(&str, &str)]) {
    let rendered = render_fields(fields);
    match event.level() {
        EventLevel::Debug => tracing::debug!(event = event.as_str(), fields = %rendered),
        EventLevel::Info => tracing::info!(event = event.as_str(), fields = %rendered),
        EventLevel::Warn => tracing::warn!(event = event.as_str(), fields = %rendered),
    }
}

fn render_fields(fields: &[(&str, &str)]) -> String {
    fields
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_event() {
        // No subscriber installed; must not panic
        log_event(Event::ConfigLoaded, &[]);
        log_event(Event::DurabilityTimeout, &[("key", "user::1")]);
    }

    #[test]
    fn test_render_fields() {
        assert_eq!(render_fields(&[]), "");
        assert_eq!(
            render_fields(&[("key", "a"), ("node", "n1")]),
            "key=a node=n1"
        );
    }
}
