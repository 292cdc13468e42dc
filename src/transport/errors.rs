//! # Transport Errors
//!
//! Failures surfaced by a [`Transport`](super::Transport). The driver never
//! interprets these beyond the transient/non-transient split; they pass
//! through to the caller unchanged.

use std::fmt;

use thiserror::Error;

/// Result type for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

/// Transport failure classes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Socket or channel I/O failed
    Io,
    /// Request exceeded its deadline
    Timeout,
    /// Request rejected because the send queue is full
    Backpressure,
    /// Request cancelled before a response arrived
    Cancelled,
    /// Node asked the client to try again later
    TemporaryFailure,
    /// Response stream ended without producing a response
    Closed,
}

impl TransportErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportErrorKind::Io => "io",
            TransportErrorKind::Timeout => "timeout",
            TransportErrorKind::Backpressure => "backpressure",
            TransportErrorKind::Cancelled => "cancelled",
            TransportErrorKind::TemporaryFailure => "temporary_failure",
            TransportErrorKind::Closed => "closed",
        }
    }
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transport error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("transport {kind}: {message}")]
pub struct TransportError {
    kind: TransportErrorKind,
    message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn io(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Io, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Timeout, message)
    }

    pub fn backpressure(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Backpressure, message)
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Cancelled, message)
    }

    pub fn temporary(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::TemporaryFailure, message)
    }

    pub fn closed(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Closed, message)
    }

    pub fn kind(&self) -> TransportErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether a bounded retry may succeed
    pub fn is_transient(&self) -> bool {
        self.kind == TransportErrorKind::TemporaryFailure
    }
}
