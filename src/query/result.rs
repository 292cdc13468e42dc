//! Query results
//!
//! [`AsyncQueryResult`] exposes each response section as its own decoded
//! stream. Every buffer is decoded and released as it is pulled, so a
//! section that is never read only holds what the transport already queued.

use futures_util::future::BoxFuture;
use futures_util::stream::{self, BoxStream};
use futures_util::{FutureExt, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{ClientError, ClientResult};
use crate::transport::{BufferStream, QueryResponse, TransportError};

use super::errors::QueryServerError;

/// Decoded stream of one response section
pub type SectionStream = BoxStream<'static, ClientResult<Value>>;

fn zero_duration() -> String {
    "0s".to_string()
}

/// Server-reported execution metrics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryMetrics {
    #[serde(default = "zero_duration")]
    pub elapsed_time: String,
    #[serde(default = "zero_duration")]
    pub execution_time: String,
    #[serde(default)]
    pub result_count: u64,
    #[serde(default)]
    pub result_size: u64,
    #[serde(default)]
    pub error_count: u64,
    #[serde(default)]
    pub warning_count: u64,
    #[serde(default)]
    pub mutation_count: u64,
    #[serde(default)]
    pub sort_count: u64,
}

impl Default for QueryMetrics {
    fn default() -> Self {
        Self {
            elapsed_time: zero_duration(),
            execution_time: zero_duration(),
            result_count: 0,
            result_size: 0,
            error_count: 0,
            warning_count: 0,
            mutation_count: 0,
            sort_count: 0,
        }
    }
}

/// `success` and `completed` are the only successful final states
pub fn is_final_success(status: &str) -> bool {
    status.eq_ignore_ascii_case("success") || status.eq_ignore_ascii_case("completed")
}

pub(crate) fn decode_section(buffers: BufferStream, section: &'static str) -> SectionStream {
    buffers
        .map(move |buf| {
            buf.decode_json()
                .map_err(|e| ClientError::decode_with(format!("query {}", section), e))
        })
        .boxed()
}

/// Streaming result of one query execution
pub struct AsyncQueryResult {
    /// Whether the server accepted the request
    pub parse_success: bool,
    pub request_id: String,
    pub client_context_id: String,
    pub rows: SectionStream,
    pub signature: SectionStream,
    pub info: BoxStream<'static, ClientResult<QueryMetrics>>,
    pub errors: SectionStream,
    pub profile: SectionStream,
    /// Final status string, available once the response completes
    pub status: BoxFuture<'static, ClientResult<String>>,
}

impl std::fmt::Debug for AsyncQueryResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncQueryResult")
            .field("parse_success", &self.parse_success)
            .field("request_id", &self.request_id)
            .field("client_context_id", &self.client_context_id)
            .finish_non_exhaustive()
    }
}

impl AsyncQueryResult {
    /// Split a transport response into decoded sections
    pub fn from_response(response: QueryResponse) -> Self {
        let QueryResponse {
            status,
            request_id,
            client_context_id,
            rows,
            signature,
            info,
            errors,
            profile,
            query_status,
        } = response;

        let info = decode_section(info, "info")
            .map(|value| {
                value.and_then(|v| {
                    serde_json::from_value::<QueryMetrics>(v)
                        .map_err(|e| ClientError::decode_with("query metrics", e))
                })
            })
            .boxed();

        let status_future = query_status
            .map(|received| {
                received.map_err(|_| {
                    ClientError::from(TransportError::closed(
                        "query response ended without a final status",
                    ))
                })
            })
            .boxed();

        Self {
            parse_success: status.is_success(),
            request_id,
            client_context_id,
            rows: decode_section(rows, "rows"),
            signature: decode_section(signature, "signature"),
            info,
            errors: decode_section(errors, "errors"),
            profile: decode_section(profile, "profile"),
            status: status_future,
        }
    }

    /// Replace the error section with already-collected items
    pub(crate) fn with_errors(mut self, errors: Vec<ClientResult<Value>>) -> Self {
        self.errors = stream::iter(errors).boxed();
        self
    }

    /// Drain every section into a materialized result
    pub async fn collect(self) -> ClientResult<QueryResult> {
        let errors: Vec<Value> = self.errors.try_collect().await?;
        let rows: Vec<Value> = self.rows.try_collect().await?;
        let mut signatures: Vec<Value> = self.signature.try_collect().await?;
        let mut infos: Vec<QueryMetrics> = self.info.try_collect().await?;
        let mut profiles: Vec<Value> = self.profile.try_collect().await?;
        let status = self.status.await?;

        Ok(QueryResult {
            final_success: is_final_success(&status),
            status,
            parse_success: self.parse_success,
            request_id: self.request_id,
            client_context_id: self.client_context_id,
            rows,
            signature: signatures.pop(),
            metrics: infos.pop().unwrap_or_default(),
            errors,
            profile: profiles.pop(),
        })
    }
}

/// Fully materialized query result
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub parse_success: bool,
    /// `success`, `running`, `fatal`, `timeout`, ...
    pub status: String,
    pub final_success: bool,
    pub request_id: String,
    pub client_context_id: String,
    pub rows: Vec<Value>,
    pub signature: Option<Value>,
    pub metrics: QueryMetrics,
    pub errors: Vec<Value>,
    pub profile: Option<Value>,
}

impl QueryResult {
    /// Error section parsed into `{code, message}` pairs
    pub fn server_errors(&self) -> Vec<QueryServerError> {
        self.errors.iter().map(QueryServerError::from_value).collect()
    }
}
