//! CLI command implementations
//!
//! Commands build a JSON value; `run` prints it as the single output line.

use std::io::{self, Write};
use std::path::Path;

use serde_json::{json, Value};

use crate::config::ClientConfig;
use crate::query::prepare_statement;
use crate::routing::{BucketLayout, NodeLocator, TopologyDescriptor};

use super::args::{Cli, Command};
use super::errors::CliResult;

/// Parse arguments, run the command and print its outcome
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    match run_command(cli.command) {
        Ok(data) => print_json(&json!({"status": "ok", "data": data})),
        Err(e) => {
            print_json(&json!({
                "status": "error",
                "code": e.code_str(),
                "message": e.message(),
            }))?;
            Err(e)
        }
    }
}

pub fn run_command(cmd: Command) -> CliResult<Value> {
    match cmd {
        Command::Locate { topology, key } => locate(&topology, &key),
        Command::PlanName { statement } => Ok(plan_name(&statement)),
        Command::CheckConfig { config } => check_config(&config),
    }
}

/// Owner and replicas of `key` under the topology in `path`
pub fn locate(path: &Path, key: &str) -> CliResult<Value> {
    let topology = TopologyDescriptor::load(path)?.into_topology()?;
    let partition = topology.partition_of(key);
    let layout = topology.layout().name();
    let has_replicas = matches!(topology.layout(), BucketLayout::Partitioned { .. });

    let locator = NodeLocator::new(topology);
    let owner = locator.owner_of(key)?;
    let replicas = if has_replicas {
        locator.replicas_of(key)?
    } else {
        Vec::new()
    };

    Ok(json!({
        "key": key,
        "rev": locator.rev(),
        "layout": layout,
        "partition": partition,
        "owner": owner,
        "replicas": replicas,
    }))
}

/// Generated prepared name and PREPARE text for `statement`
pub fn plan_name(statement: &str) -> Value {
    let (name, prepare) = prepare_statement(statement);
    json!({
        "name": name,
        "prepare": prepare,
    })
}

/// Load and validate the configuration, echoing the effective settings
pub fn check_config(path: &Path) -> CliResult<Value> {
    let config = ClientConfig::load(path)?;
    config.validate()?;
    Ok(serde_json::to_value(&config)?)
}

fn print_json(value: &Value) -> CliResult<()> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, value)?;
    writeln!(stdout)?;
    stdout.flush()?;
    Ok(())
}
