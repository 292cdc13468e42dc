//! In-memory transport for tests and local tooling
//!
//! [`ScriptedTransport`] records every request and answers each one by
//! calling a handler closure. The helper constructors build the response
//! shapes a query or data node would produce.

use std::sync::Mutex;

use futures_util::{future, stream, StreamExt};
use serde_json::{json, Value};

use super::{
    ConsumerWatch, DeferredResponse, ObserveResponse, QueryFrame, QueryResponse, Request,
    Response, ResponseStatus, ResponseStream, Transport, TransportResult,
};
use super::buffer::BufferStream;

type Handler = dyn Fn(&Request) -> TransportResult<Response> + Send + Sync;

/// Transport answering from a closure
pub struct ScriptedTransport {
    handler: Box<Handler>,
    requests: Mutex<Vec<Request>>,
}

impl ScriptedTransport {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&Request) -> TransportResult<Response> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Every request seen so far, in send order
    pub fn requests(&self) -> Vec<Request> {
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn query_frames(&self) -> Vec<QueryFrame> {
        self.requests()
            .into_iter()
            .filter_map(|r| match r {
                Request::Query(frame) => Some(frame),
                _ => None,
            })
            .collect()
    }

    pub fn prepare_count(&self) -> usize {
        self.query_frames().iter().filter(|f| f.is_prepare()).count()
    }

    pub fn execute_count(&self) -> usize {
        self.query_frames().iter().filter(|f| f.is_execute()).count()
    }

    pub fn adhoc_count(&self) -> usize {
        self.query_frames()
            .iter()
            .filter(|f| !f.is_prepare() && !f.is_execute())
            .count()
    }

    pub fn observe_count(&self) -> usize {
        self.requests()
            .iter()
            .filter(|r| matches!(r, Request::Observe(_)))
            .count()
    }
}

impl std::fmt::Debug for ScriptedTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScriptedTransport")
            .field("requests", &self.requests().len())
            .finish()
    }
}

impl Transport for ScriptedTransport {
    fn send(&self, request: Request, _watch: ConsumerWatch) -> ResponseStream {
        let result = (self.handler)(&request);
        self.requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(request);
        stream::once(future::ready(result)).boxed()
    }
}

// ==================
// Response builders
// ==================

fn encode(value: &Value) -> Vec<u8> {
    serde_json::to_vec(value).unwrap_or_default()
}

/// Build a complete query response
pub fn query_response(
    status: ResponseStatus,
    final_status: &str,
    rows: &[Value],
    errors: &[Value],
) -> Response {
    let (response, sender) = QueryResponse::channel(status, "mock-request", "mock-context");
    sender.signature(encode(&json!({"*": "*"})));
    for row in rows {
        sender.row(encode(row));
    }
    for error in errors {
        sender.error(encode(error));
    }
    sender.info(encode(&json!({
        "elapsedTime": "1.5ms",
        "executionTime": "1.2ms",
        "resultCount": rows.len(),
        "resultSize": rows.iter().map(|r| encode(r).len()).sum::<usize>(),
        "errorCount": errors.len(),
    })));
    sender.finish(final_status);
    Response::Query(response)
}

/// Successful query with the given rows
pub fn query_success(rows: &[Value]) -> Response {
    query_response(ResponseStatus::Success, "success", rows, &[])
}

/// Failed query carrying server error objects
pub fn query_failure(errors: &[Value]) -> Response {
    query_response(ResponseStatus::Failure, "fatal", &[], errors)
}

/// Failed query with one `{code, msg}` error
pub fn query_error(code: i64, msg: &str) -> Response {
    query_failure(&[json!({"code": code, "msg": msg})])
}

/// Successful PREPARE result
pub fn prepared(name: &str, encoded_plan: Option<&str>) -> Response {
    let mut row = json!({"name": name});
    if let Some(plan) = encoded_plan {
        row["encoded_plan"] = Value::String(plan.to_string());
    }
    query_success(&[row])
}

/// Observe answer for one node
pub fn observe(key_state: u8, master: bool) -> Response {
    Response::Observe(ObserveResponse {
        status: ResponseStatus::Success,
        key_state,
        master,
        cas: 0,
    })
}

/// Deferred status answer
pub fn deferred_status(query_status: &str, result_handle: Option<&str>) -> Response {
    Response::Deferred(DeferredResponse::status_only(
        ResponseStatus::Success,
        query_status,
        result_handle.map(str::to_string),
    ))
}

/// Deferred result answer with rows
pub fn deferred_rows(rows: &[Value]) -> Response {
    Response::Deferred(DeferredResponse {
        status: ResponseStatus::Success,
        query_status: "success".to_string(),
        result_handle: None,
        rows: BufferStream::from_payloads(rows.iter().map(encode)),
    })
}
