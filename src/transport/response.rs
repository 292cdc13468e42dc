//! Responses a transport produces
//!
//! A query response is split into sections that flow independently: rows,
//! signature, info (metrics), errors and profile. The final status string
//! arrives last on its own channel.

use bytes::Bytes;
use tokio::sync::oneshot;

use super::buffer::{BufferSink, BufferStream};
use super::errors::{TransportError, TransportResult};
use super::Releasable;

/// Transport-level classification of a response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseStatus {
    Success,
    /// Retrying later may succeed
    TemporaryFailure,
    Failure,
}

impl ResponseStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, ResponseStatus::Success)
    }
}

/// Any response from the transport
#[derive(Debug)]
pub enum Response {
    Query(QueryResponse),
    Observe(ObserveResponse),
    Deferred(DeferredResponse),
}

impl Response {
    fn kind(&self) -> &'static str {
        match self {
            Response::Query(_) => "query",
            Response::Observe(_) => "observe",
            Response::Deferred(_) => "deferred",
        }
    }

    fn mismatch(self, expected: &str) -> TransportError {
        let err = TransportError::io(format!(
            "expected {} response, transport produced {}",
            expected,
            self.kind()
        ));
        self.release();
        err
    }

    pub fn into_query(self) -> TransportResult<QueryResponse> {
        match self {
            Response::Query(r) => Ok(r),
            other => Err(other.mismatch("query")),
        }
    }

    pub fn into_observe(self) -> TransportResult<ObserveResponse> {
        match self {
            Response::Observe(r) => Ok(r),
            other => Err(other.mismatch("observe")),
        }
    }

    pub fn into_deferred(self) -> TransportResult<DeferredResponse> {
        match self {
            Response::Deferred(r) => Ok(r),
            other => Err(other.mismatch("deferred")),
        }
    }
}

impl Releasable for Response {
    fn release(self) {
        match self {
            Response::Query(r) => r.release(),
            Response::Observe(_) => {}
            Response::Deferred(r) => r.release(),
        }
    }
}

/// Streaming query service response
#[derive(Debug)]
pub struct QueryResponse {
    pub status: ResponseStatus,
    pub request_id: String,
    pub client_context_id: String,
    pub rows: BufferStream,
    pub signature: BufferStream,
    pub info: BufferStream,
    pub errors: BufferStream,
    pub profile: BufferStream,
    /// Final status string (`success`, `running`, `fatal`, ...)
    pub query_status: oneshot::Receiver<String>,
}

impl QueryResponse {
    /// Create an open response and the sender that fills it
    pub fn channel(
        status: ResponseStatus,
        request_id: impl Into<String>,
        client_context_id: impl Into<String>,
    ) -> (QueryResponse, QueryResponseSender) {
        let (rows_tx, rows) = BufferStream::channel();
        let (signature_tx, signature) = BufferStream::channel();
        let (info_tx, info) = BufferStream::channel();
        let (errors_tx, errors) = BufferStream::channel();
        let (profile_tx, profile) = BufferStream::channel();
        let (status_tx, query_status) = oneshot::channel();

        let response = QueryResponse {
            status,
            request_id: request_id.into(),
            client_context_id: client_context_id.into(),
            rows,
            signature,
            info,
            errors,
            profile,
            query_status,
        };
        let sender = QueryResponseSender {
            rows: rows_tx,
            signature: signature_tx,
            info: info_tx,
            errors: errors_tx,
            profile: profile_tx,
            status: status_tx,
        };
        (response, sender)
    }
}

impl Releasable for QueryResponse {
    fn release(self) {
        self.rows.release();
        self.signature.release();
        self.info.release();
        self.errors.release();
        self.profile.release();
    }
}

/// Producer side of a [`QueryResponse`]
///
/// Sections stay open until the sender is finished or dropped.
#[derive(Debug)]
pub struct QueryResponseSender {
    rows: BufferSink,
    signature: BufferSink,
    info: BufferSink,
    errors: BufferSink,
    profile: BufferSink,
    status: oneshot::Sender<String>,
}

impl QueryResponseSender {
    pub fn row(&self, payload: impl Into<Bytes>) -> &Self {
        self.rows.push(payload);
        self
    }

    pub fn signature(&self, payload: impl Into<Bytes>) -> &Self {
        self.signature.push(payload);
        self
    }

    pub fn info(&self, payload: impl Into<Bytes>) -> &Self {
        self.info.push(payload);
        self
    }

    pub fn error(&self, payload: impl Into<Bytes>) -> &Self {
        self.errors.push(payload);
        self
    }

    pub fn profile(&self, payload: impl Into<Bytes>) -> &Self {
        self.profile.push(payload);
        self
    }

    /// Complete every section and publish the final status
    pub fn finish(self, query_status: impl Into<String>) {
        let _ = self.status.send(query_status.into());
    }
}

/// Observe result for one node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObserveResponse {
    pub status: ResponseStatus,
    /// Raw key state byte reported by the node
    pub key_state: u8,
    pub master: bool,
    pub cas: u64,
}

/// Deferred query status or result response
#[derive(Debug)]
pub struct DeferredResponse {
    pub status: ResponseStatus,
    /// Server-side query status (`running`, `success`, ...)
    pub query_status: String,
    /// Result handle URI, once the server has published one
    pub result_handle: Option<String>,
    pub rows: BufferStream,
}

impl DeferredResponse {
    pub fn status_only(
        status: ResponseStatus,
        query_status: impl Into<String>,
        result_handle: Option<String>,
    ) -> Self {
        Self {
            status,
            query_status: query_status.into(),
            result_handle,
            rows: BufferStream::empty(),
        }
    }
}

impl Releasable for DeferredResponse {
    fn release(self) {
        self.rows.release();
    }
}
