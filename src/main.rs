//! aerodb-client entry point
//!
//! Initializes logging, then delegates to `cli::run`. Log output goes to
//! stderr so stdout carries only the command's JSON.

use aerodb_client::cli;
use tracing_subscriber::EnvFilter;

fn main() {
    init_tracing();
    if let Err(e) = cli::run() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
