//! # periscope - Main Entry Point
//!
//! Loads a script tree, optionally connects to a control plane, and drives
//! an entry function in a loop so installed traces have something to
//! observe. Trace output goes to stdout unless `--quiet` is given; with an
//! `--endpoint` it is also shipped upstream.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use log::info;
use periscope_script::host::ScriptHost;
use periscope_script::value::Value;

use periscope::agent::Agent;
use periscope::cli::Args;
use periscope::config::ProbeConfig;
use periscope::engine::Probe;
use periscope::inventory;
use periscope::sink::{SinkRegistry, StdoutSink};

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_USAGE: i32 = 2;

fn main() {
    env_logger::init();
    std::process::exit(match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            exit_code_for(&e)
        }
    });
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    let msg = err.to_string();
    if msg.contains("must be of the form")
        || msg.contains("does not exist")
        || msg.contains("is not a valid")
    {
        EXIT_USAGE
    } else {
        EXIT_ERROR
    }
}

fn run() -> Result<()> {
    let args = Args::parse();

    if !args.scripts.is_dir() {
        bail!(
            "Script root {} does not exist or is not a directory",
            args.scripts.display()
        );
    }
    let (entry_module, entry_function) = args
        .entry
        .split_once(':')
        .ok_or_else(|| anyhow!("Entry `{}` must be of the form `<module>:<function>`", args.entry))?;

    let host = Arc::new(ScriptHost::new());
    let loaded = inventory::load_tree(&host, &args.scripts, &args.exclude)?;
    if loaded == 0 {
        bail!("No scripts found under {}", args.scripts.display());
    }
    info!("Loaded {loaded} script modules from {}", args.scripts.display());

    let sinks = Arc::new(SinkRegistry::new());
    let probe = Arc::new(Probe::new(
        Arc::clone(&host),
        args.package.clone(),
        Arc::clone(&sinks),
    ));

    let _stdout_guard = if args.quiet {
        None
    } else {
        Some(sinks.register(Arc::new(StdoutSink)))
    };

    // The handle keeps the agent alive for the rest of main; dropping it
    // on any exit path retracts the installed traces.
    let _agent = match &args.endpoint {
        Some(endpoint) => {
            let config = ProbeConfig {
                endpoint: endpoint.clone(),
                package: args.package.clone(),
                script_root: args.scripts.clone(),
                exclude: args.exclude.clone(),
                ..ProbeConfig::default()
            };
            Some(Agent::start(config, Arc::clone(&probe))?)
        }
        None => None,
    };

    let call_args: Vec<Value> = args.args.iter().map(|raw| parse_value(raw)).collect();
    loop {
        let value = host
            .call(entry_module, entry_function, call_args.clone())
            .with_context(|| format!("Failed to run {}", args.entry))?;
        if !args.quiet && !matches!(value, Value::Unit) {
            println!("{value}");
        }
        if args.loop_ms == 0 {
            break;
        }
        thread::sleep(Duration::from_millis(args.loop_ms));
    }
    Ok(())
}

/// Interprets a CLI argument as the most specific script value it parses
/// as; anything else is passed through as a string.
fn parse_value(raw: &str) -> Value {
    if let Ok(int) = raw.parse::<i64>() {
        return Value::Int(int);
    }
    if let Ok(float) = raw.parse::<f64>() {
        return Value::Float(float);
    }
    match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::Str(raw.to_string()),
    }
}
