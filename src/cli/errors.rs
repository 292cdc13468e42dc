//! CLI-specific error types

use std::fmt;
use std::io;

use crate::errors::ClientError;
use crate::routing::RoutingError;

/// CLI error codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Configuration file error
    ConfigError,
    /// Topology file could not be read or is invalid
    TopologyError,
    /// Key could not be routed
    RoutingError,
    /// I/O error (stdout)
    IoError,
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "AERO_CLI_CONFIG_ERROR",
            Self::TopologyError => "AERO_CLI_TOPOLOGY_ERROR",
            Self::RoutingError => "AERO_CLI_ROUTING_ERROR",
            Self::IoError => "AERO_CLI_IO_ERROR",
        }
    }
}

/// CLI error
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    pub fn topology_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::TopologyError, msg)
    }

    pub fn routing_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::RoutingError, msg)
    }

    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    pub fn code(&self) -> &CliErrorCode {
        &self.code
    }

    /// Get the error code string
    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::io_error(format!("JSON error: {}", e))
    }
}

impl From<ClientError> for CliError {
    fn from(e: ClientError) -> Self {
        Self::config_error(e.to_string())
    }
}

impl From<RoutingError> for CliError {
    fn from(e: RoutingError) -> Self {
        match e {
            RoutingError::InvalidTopology(_)
            | RoutingError::NodeIndexOutOfRange { .. }
            | RoutingError::EmptyRing => Self::topology_error(e.to_string()),
            other => Self::routing_error(other.to_string()),
        }
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;
