//! Requests the driver hands to a transport

use std::time::Duration;

use serde_json::Value;

/// One request to a cluster node
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// Query service request (ad-hoc, PREPARE or EXECUTE)
    Query(QueryFrame),
    /// Per-node persistence/replication probe for one key
    Observe(ObserveProbe),
    /// Poll a deferred query's status handle
    DeferredStatus { uri: String },
    /// Fetch a deferred query's result handle
    DeferredResult { uri: String },
}

impl Request {
    pub fn kind(&self) -> &'static str {
        match self {
            Request::Query(_) => "query",
            Request::Observe(_) => "observe",
            Request::DeferredStatus { .. } => "deferred_status",
            Request::DeferredResult { .. } => "deferred_result",
        }
    }

    pub fn as_query(&self) -> Option<&QueryFrame> {
        match self {
            Request::Query(frame) => Some(frame),
            _ => None,
        }
    }

    pub fn as_observe(&self) -> Option<&ObserveProbe> {
        match self {
            Request::Observe(probe) => Some(probe),
            _ => None,
        }
    }
}

/// JSON body for the query service plus routing hints
#[derive(Debug, Clone, PartialEq)]
pub struct QueryFrame {
    pub body: Value,
    /// Specific node to send to; `None` lets the transport pick
    pub target: Option<String>,
    pub client_context_id: String,
    pub timeout: Option<Duration>,
}

impl QueryFrame {
    pub fn new(body: Value, client_context_id: impl Into<String>) -> Self {
        Self {
            body,
            target: None,
            client_context_id: client_context_id.into(),
            timeout: None,
        }
    }

    pub fn with_target(mut self, node: impl Into<String>) -> Self {
        self.target = Some(node.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Statement text, present for ad-hoc and PREPARE bodies
    pub fn statement(&self) -> Option<&str> {
        self.body.get("statement").and_then(Value::as_str)
    }

    /// Prepared name, present for EXECUTE bodies
    pub fn prepared_name(&self) -> Option<&str> {
        self.body.get("prepared").and_then(Value::as_str)
    }

    pub fn is_prepare(&self) -> bool {
        self.statement()
            .map(|s| s.trim_start().to_ascii_uppercase().starts_with("PREPARE "))
            .unwrap_or(false)
    }

    pub fn is_execute(&self) -> bool {
        self.prepared_name().is_some()
    }
}

/// Observe probe for one key on one node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObserveProbe {
    pub key: String,
    pub cas: u64,
    /// Address of the node being probed
    pub node: String,
    /// 0 for the master, 1..=3 for replicas
    pub replica: usize,
    pub partition: Option<u16>,
}

impl ObserveProbe {
    pub fn is_master(&self) -> bool {
        self.replica == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_prepare_detection() {
        let prepare = QueryFrame::new(json!({"statement": "PREPARE `p` FROM SELECT 1"}), "c");
        assert!(prepare.is_prepare());
        assert!(!prepare.is_execute());

        let adhoc = QueryFrame::new(json!({"statement": "SELECT 1"}), "c");
        assert!(!adhoc.is_prepare());
    }

    #[test]
    fn test_execute_detection() {
        let execute = QueryFrame::new(json!({"prepared": "p1", "encoded_plan": "abc"}), "c");
        assert!(execute.is_execute());
        assert_eq!(execute.prepared_name(), Some("p1"));
        assert_eq!(execute.statement(), None);
    }

    #[test]
    fn test_request_kind() {
        let req = Request::DeferredStatus { uri: "/status".into() };
        assert_eq!(req.kind(), "deferred_status");
        assert!(req.as_query().is_none());
    }
}
