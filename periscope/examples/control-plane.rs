//! Minimal control plane for driving a periscope probe by hand.
//!
//! Listens for one probe at a time, prints everything the probe reports,
//! and pushes the desired trace set from a JSON file (an array of trace
//! records). Edit and save the file while both sides run to watch
//! statements appear, change, and disappear in the live process.
//!
//! Run with: cargo run --example control-plane -- 127.0.0.1:9000 traces.json

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use periscope_wire::{ClientMessage, ServerMessage, TraceSpec};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let mut args = std::env::args().skip(1);
    let (addr, traces_path) = match (args.next(), args.next()) {
        (Some(addr), Some(path)) => (addr, PathBuf::from(path)),
        _ => {
            eprintln!("usage: control-plane <listen-addr> <traces.json>");
            std::process::exit(2);
        }
    };

    let listener = TcpListener::bind(&addr).await.expect("Failed to bind");
    println!("Listening on {addr}; desired set comes from {}", traces_path.display());

    loop {
        let (stream, peer) = listener.accept().await.expect("Failed to accept");
        println!("\n=== Probe connected from {peer} ===");
        handle_probe(stream, &traces_path).await;
        println!("=== Probe disconnected ===");
    }
}

async fn handle_probe(stream: TcpStream, traces_path: &Path) {
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    let mut last_push: Option<SystemTime> = None;

    loop {
        tokio::select! {
            line = lines.next_line() => match line {
                Ok(Some(line)) => print_report(&line),
                Ok(None) | Err(_) => return,
            },
            _ = ticker.tick() => {
                let modified = std::fs::metadata(traces_path)
                    .and_then(|meta| meta.modified())
                    .ok();
                if modified == last_push {
                    continue;
                }
                match load_traces(traces_path) {
                    Ok(traces) => {
                        println!("[push] desired set with {} traces", traces.len());
                        let message = ServerMessage::DesiredSet { traces };
                        let mut line = serde_json::to_string(&message).expect("Failed to encode");
                        line.push('\n');
                        if write_half.write_all(line.as_bytes()).await.is_err() {
                            return;
                        }
                        last_push = modified;
                    }
                    Err(err) => eprintln!("[push] cannot load {}: {err}", traces_path.display()),
                }
            }
        }
    }
}

fn load_traces(path: &Path) -> Result<Vec<TraceSpec>, Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

fn print_report(line: &str) {
    match serde_json::from_str::<ClientMessage>(line) {
        Ok(ClientMessage::Hello { probe_name, version, package }) => {
            println!("[hello] {probe_name} v{version}, package {package}");
        }
        Ok(ClientMessage::ModuleInventory { files }) => {
            println!("[inventory] {} files", files.len());
            for file in files {
                println!(
                    "  {} ({} lines, {} functions, {} groups)",
                    file.name,
                    file.lines,
                    file.summary.functions.len(),
                    file.summary.groups.len()
                );
            }
        }
        Ok(ClientMessage::Heartbeat { seq }) => println!("[heartbeat] seq {seq}"),
        Ok(ClientMessage::Log { text }) => println!("[log] {text}"),
        Ok(ClientMessage::TraceFailure { trace_id, message }) => {
            println!("[failure] trace {trace_id:?}: {message}");
        }
        Err(err) => eprintln!("[?] unreadable probe message: {err}"),
    }
}
