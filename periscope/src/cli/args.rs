//! CLI argument definitions

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "periscope",
    about = "Run a script tree with live, remotely managed log injection",
    after_help = "\
EXAMPLES:
    periscope --scripts ./scripts --entry 'fib:main'
        Run fib.psc's main() once, printing trace output to stdout

    periscope --scripts ./scripts --entry 'fib:main' --arg 25 --loop-ms 500 \\
              --endpoint 127.0.0.1:9000 --package fib
        Loop the entry call while a control plane manages traces"
)]
pub struct Args {
    /// Directory containing the .psc script tree
    #[arg(long, value_name = "DIR")]
    pub scripts: PathBuf,

    /// Entry point to invoke, as '<module>:<function>'
    #[arg(long, value_name = "PATH")]
    pub entry: String,

    /// Argument passed to the entry function (repeatable, in order)
    #[arg(long = "arg", value_name = "VALUE")]
    pub args: Vec<String>,

    /// Control plane address; when omitted, no agent is started
    #[arg(long, value_name = "ADDR")]
    pub endpoint: Option<String>,

    /// Root package for relative trace paths
    #[arg(long, default_value = "main")]
    pub package: String,

    /// Relative path excluded from loading and inventory (repeatable)
    #[arg(long = "exclude", value_name = "PATH")]
    pub exclude: Vec<String>,

    /// Re-invoke the entry function every N milliseconds (0 = run once)
    #[arg(long, default_value = "0", value_name = "N")]
    pub loop_ms: u64,

    /// Suppress stdout trace output and result printing
    #[arg(short, long)]
    pub quiet: bool,
}
