//! One connected control-plane session.
//!
//! The socket's write half is owned by a single writer task; everything
//! that talks upstream goes through its channel, so wire messages never
//! interleave. The session's own task reads and dispatches server
//! messages until the peer goes away or shutdown is requested.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, error, info, warn};
use periscope_wire::{ClientMessage, ServerMessage};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;

use crate::config::ProbeConfig;
use crate::engine::Probe;
use crate::inventory;
use crate::sink::{ChannelSink, SinkEvent};

const WRITER_QUEUE: usize = 64;

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionEnd {
    /// Shutdown was requested locally.
    Stopped,
    /// The connection dropped or the peer closed it.
    ConnectionLost,
}

pub(crate) async fn run(
    config: &ProbeConfig,
    probe: &Probe,
    stream: TcpStream,
    stop: &mut watch::Receiver<bool>,
) -> SessionEnd {
    let (read_half, write_half) = stream.into_split();
    let (tx, rx) = mpsc::channel::<ClientMessage>(WRITER_QUEUE);
    let writer = tokio::spawn(write_loop(write_half, rx));

    // Session preamble: identify ourselves, then upload the script
    // inventory so the control plane can offer trace targets.
    let hello = ClientMessage::Hello {
        probe_name: config.probe_name.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        package: config.package.clone(),
    };
    let files = match inventory::scan(&config.script_root, &config.exclude) {
        Ok(files) => files,
        Err(err) => {
            warn!("Failed to build script inventory: {err}");
            Vec::new()
        }
    };
    let preamble_sent = tx.send(hello).await.is_ok()
        && tx.send(ClientMessage::ModuleInventory { files }).await.is_ok();
    if !preamble_sent {
        let _ = writer.await;
        return SessionEnd::ConnectionLost;
    }

    // Trace output flows through a bounded channel for the lifetime of
    // this session; the guard unhooks the sink when the session ends.
    let (sink, events) = ChannelSink::new(config.log_buffer);
    let _sink_guard = probe.sinks().register(sink);
    let shipper = tokio::spawn(ship_events(events, tx.clone()));

    let seq = Arc::new(AtomicU64::new(0));
    let heartbeat = tokio::spawn(heartbeat_loop(
        tx.clone(),
        config.heartbeat_interval,
        Arc::clone(&seq),
    ));

    let mut lines = BufReader::new(read_half).lines();
    let end = loop {
        tokio::select! {
            changed = stop.changed() => {
                if changed.is_err() || *stop.borrow() {
                    break SessionEnd::Stopped;
                }
            }
            line = lines.next_line() => match line {
                Ok(Some(line)) => dispatch(&line, probe, &tx, &seq).await,
                Ok(None) => {
                    info!("Control plane closed the connection");
                    break SessionEnd::ConnectionLost;
                }
                Err(err) => {
                    warn!("Failed to read from control plane: {err}");
                    break SessionEnd::ConnectionLost;
                }
            }
        }
    };

    heartbeat.abort();
    shipper.abort();
    drop(tx);
    // The writer drains queued messages before exiting.
    let _ = writer.await;
    end
}

async fn dispatch(
    line: &str,
    probe: &Probe,
    tx: &mpsc::Sender<ClientMessage>,
    seq: &AtomicU64,
) {
    let message: ServerMessage = match serde_json::from_str(line) {
        Ok(message) => message,
        Err(err) => {
            warn!("Ignoring malformed control message: {err}");
            return;
        }
    };
    match message {
        ServerMessage::DesiredSet { traces } => {
            debug!("Received desired set with {} traces", traces.len());
            if let Err(errors) = probe.reconcile(&traces) {
                warn!("Reconciliation failed for {} bindings", errors.len());
                for (key, failure) in errors.iter() {
                    let report = ClientMessage::TraceFailure {
                        trace_id: failure.trace_id.clone(),
                        message: format!("{key}: {}", failure.error),
                    };
                    if tx.send(report).await.is_err() {
                        return;
                    }
                }
            }
        }
        ServerMessage::Ping => {
            let answer = ClientMessage::Heartbeat {
                seq: seq.fetch_add(1, Ordering::Relaxed),
            };
            let _ = tx.send(answer).await;
        }
    }
}

async fn write_loop(mut half: OwnedWriteHalf, mut rx: mpsc::Receiver<ClientMessage>) {
    while let Some(message) = rx.recv().await {
        let mut line = match serde_json::to_string(&message) {
            Ok(line) => line,
            Err(err) => {
                error!("Failed to encode wire message: {err}");
                continue;
            }
        };
        line.push('\n');
        if let Err(err) = half.write_all(line.as_bytes()).await {
            warn!("Failed to write to control plane: {err}");
            break;
        }
    }
}

async fn ship_events(mut events: mpsc::Receiver<SinkEvent>, tx: mpsc::Sender<ClientMessage>) {
    while let Some(event) = events.recv().await {
        let message = match event {
            SinkEvent::Log(text) => ClientMessage::Log { text },
            SinkEvent::TraceError { trace_id, message } => ClientMessage::TraceFailure {
                trace_id: Some(trace_id),
                message,
            },
        };
        if tx.send(message).await.is_err() {
            break;
        }
    }
}

async fn heartbeat_loop(
    tx: mpsc::Sender<ClientMessage>,
    interval: Duration,
    seq: Arc<AtomicU64>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        let message = ClientMessage::Heartbeat {
            seq: seq.fetch_add(1, Ordering::Relaxed),
        };
        if tx.send(message).await.is_err() {
            break;
        }
    }
}
