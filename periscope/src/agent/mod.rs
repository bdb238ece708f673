//! Control-plane agent: a background thread that keeps this probe's
//! traces converged with the control plane's desired state.
//!
//! The agent owns its own current-thread tokio runtime on a dedicated
//! thread, so embedding it never requires the host application to run an
//! async runtime. It reconnects with capped exponential backoff; every
//! (re)connect replays the handshake and the next desired set arrives as a
//! wholesale replacement, so a reconnect is always a full reconciliation.

mod session;

use std::fmt;
use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result};
use log::{error, info, warn};
use tokio::net::TcpStream;
use tokio::sync::watch;

use crate::config::ProbeConfig;
use crate::engine::Probe;
use session::SessionEnd;

pub struct Agent;

impl Agent {
    /// Validates `config` and starts the agent thread.
    ///
    /// The returned handle owns the thread; shutting it down (or dropping
    /// it) stops the session and retracts every active trace.
    pub fn start(config: ProbeConfig, probe: Arc<Probe>) -> Result<AgentHandle> {
        config.validate()?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("Failed to build agent runtime")?;

        let (stop_tx, stop_rx) = watch::channel(false);
        let thread_probe = Arc::clone(&probe);
        let thread = thread::Builder::new()
            .name("periscope-agent".to_string())
            .spawn(move || {
                runtime.block_on(run_loop(config, &thread_probe, stop_rx));
            })
            .context("Failed to spawn agent thread")?;

        Ok(AgentHandle {
            stop: stop_tx,
            thread: Some(thread),
            probe,
        })
    }
}

/// Owner of the running agent thread.
pub struct AgentHandle {
    stop: watch::Sender<bool>,
    thread: Option<thread::JoinHandle<()>>,
    probe: Arc<Probe>,
}

impl fmt::Debug for AgentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentHandle").finish_non_exhaustive()
    }
}

impl AgentHandle {
    /// Stops the agent, joins its thread, and retracts all traces.
    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        let _ = self.stop.send(true);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("Agent thread panicked");
            }
            // Leave nothing injected once the agent is gone.
            self.probe.shutdown();
        }
    }
}

impl Drop for AgentHandle {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

async fn run_loop(config: ProbeConfig, probe: &Probe, mut stop: watch::Receiver<bool>) {
    let mut backoff = config.reconnect_initial;
    loop {
        if *stop.borrow() {
            break;
        }

        let connected = tokio::select! {
            changed = stop.changed() => {
                if changed.is_err() || *stop.borrow() {
                    break;
                }
                continue;
            }
            connected = TcpStream::connect(&config.endpoint) => connected,
        };

        match connected {
            Ok(stream) => {
                info!("Connected to control plane at {}", config.endpoint);
                backoff = config.reconnect_initial;
                match session::run(&config, probe, stream, &mut stop).await {
                    SessionEnd::Stopped => break,
                    SessionEnd::ConnectionLost => {
                        warn!("Session ended; reconnecting");
                    }
                }
            }
            Err(err) => {
                warn!("Failed to connect to {}: {err}", config.endpoint);
            }
        }

        tokio::select! {
            changed = stop.changed() => {
                if changed.is_err() || *stop.borrow() {
                    break;
                }
            }
            () = tokio::time::sleep(backoff) => {}
        }
        backoff = (backoff * 2).min(config.reconnect_max);
    }
}
