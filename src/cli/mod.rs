//! CLI module for the client tooling
//!
//! Provides offline helpers that exercise the driver without a cluster:
//! - locate: Resolve a key against a topology descriptor
//! - plan-name: Show the prepared name generated for a statement
//! - check-config: Validate a client configuration file

mod args;
mod commands;
mod errors;

pub use args::{Cli, Command};
pub use commands::{check_config, locate, plan_name, run, run_command};
pub use errors::{CliError, CliErrorCode, CliResult};
