//! Client Error Types
//!
//! Unified error handling for every driver operation. Subsystem errors
//! convert in through `From` so `?` works across layers.

use std::time::Duration;

use thiserror::Error;

use crate::query::QueryServerError;
use crate::routing::RoutingError;
use crate::transport::TransportError;

/// Client result type
pub type ClientResult<T> = Result<T, ClientError>;

/// Client error type
#[derive(Debug, Error)]
pub enum ClientError {
    // ==================
    // Passthrough
    // ==================
    /// Transport failure, never interpreted by the driver
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Key could not be routed against the current topology
    #[error(transparent)]
    Routing(#[from] RoutingError),

    // ==================
    // Payload Errors
    // ==================
    /// Response payload could not be decoded
    #[error("Decode error in {context}")]
    Decode {
        context: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // ==================
    // Query Errors
    // ==================
    /// Error reported by a query node
    #[error(transparent)]
    QueryServer(#[from] QueryServerError),

    /// The single PREPARE attempt failed
    #[error("Error while preparing plan: {0}")]
    Prepare(Box<ClientError>),

    /// PREPARE failed with several errors
    #[error("Error while preparing plan ({} errors)", .0.len())]
    CompositePrepare(Vec<ClientError>),

    // ==================
    // Durability Errors
    // ==================
    /// Quorum not reached before the deadline
    #[error("Durability requirement for {key} not met within {timeout:?}")]
    DurabilityTimeout { key: String, timeout: Duration },

    /// A probe failed while waiting for durability
    #[error("Durability check for {key} failed")]
    DurabilityFailed {
        key: String,
        #[source]
        source: Box<ClientError>,
    },

    // ==================
    // Caller Errors
    // ==================
    /// Operation invoked in a state that does not allow it
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// Configuration rejected
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ClientError {
    /// Create a decode error without an underlying parser error
    pub fn decode(context: impl Into<String>) -> Self {
        Self::Decode {
            context: context.into(),
            source: None,
        }
    }

    /// Create a decode error wrapping a parser error
    pub fn decode_with(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Decode {
            context: context.into(),
            source: Some(source),
        }
    }

    /// Create a precondition error
    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Collapse PREPARE failures: one error stays single, several aggregate
    pub fn from_prepare_failures(mut errors: Vec<ClientError>) -> Self {
        if errors.len() == 1 {
            if let Some(err) = errors.pop() {
                return Self::Prepare(Box::new(err));
            }
        }
        Self::CompositePrepare(errors)
    }

    /// Stable error code
    ///
    /// Format: AERO_CLIENT_NAME
    pub fn code(&self) -> &'static str {
        match self {
            Self::Transport(_) => "AERO_CLIENT_TRANSPORT",
            Self::Routing(_) => "AERO_CLIENT_ROUTING",
            Self::Decode { .. } => "AERO_CLIENT_DECODE",
            Self::QueryServer(_) => "AERO_CLIENT_QUERY_SERVER",
            Self::Prepare(_) => "AERO_CLIENT_PREPARE",
            Self::CompositePrepare(_) => "AERO_CLIENT_PREPARE_COMPOSITE",
            Self::DurabilityTimeout { .. } => "AERO_CLIENT_DURABILITY_TIMEOUT",
            Self::DurabilityFailed { .. } => "AERO_CLIENT_DURABILITY_FAILED",
            Self::Precondition(_) => "AERO_CLIENT_PRECONDITION",
            Self::Config(_) => "AERO_CLIENT_CONFIG",
        }
    }

    /// Transport error at the root of this error, if any
    pub fn transport(&self) -> Option<&TransportError> {
        match self {
            Self::Transport(e) => Some(e),
            Self::Prepare(inner) => inner.transport(),
            Self::DurabilityFailed { source, .. } => source.transport(),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self {
        Self::decode_with("json payload", e)
    }
}
