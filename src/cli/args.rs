//! CLI argument definitions using clap
//!
//! Commands:
//! - aerodb-client locate --topology <path> <key>
//! - aerodb-client plan-name <statement>
//! - aerodb-client check-config --config <path>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// AeroDB client tooling
#[derive(Parser, Debug)]
#[command(name = "aerodb-client")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Resolve the owner and replicas of a key
    Locate {
        /// Path to a topology descriptor (JSON)
        #[arg(long, default_value = "./topology.json")]
        topology: PathBuf,

        /// Document key
        key: String,
    },

    /// Print the prepared name and PREPARE text for a statement
    PlanName {
        /// N1QL statement
        statement: String,
    },

    /// Validate a client configuration file and print the effective settings
    CheckConfig {
        /// Path to configuration file
        #[arg(long, default_value = "./aerodb-client.json")]
        config: PathBuf,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
