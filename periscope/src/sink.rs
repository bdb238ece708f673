//! Output fan-out for emitted log lines and guarded trace failures.
//!
//! Script code reports through one emit hook; the registry fans each event
//! out to every registered sink. Sinks are registered scoped: dropping the
//! returned guard removes the sink, so a disconnected session cannot leave
//! a dangling consumer behind.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock, Weak};

use log::warn;
use periscope_script::host::EmitHook;
use tokio::sync::mpsc;

/// Consumer of trace output.
///
/// Both methods are called from whatever thread runs the traced script
/// code and must not block it.
pub trait Sink: Send + Sync {
    /// One formatted log line produced by an installed trace.
    fn log(&self, value: &str);
    /// A runtime failure inside a trace statement, attributed to its trace.
    fn error(&self, trace_id: &str, message: &str);
}

struct Slot {
    id: u64,
    sink: Arc<dyn Sink>,
}

/// Fan-out dispatcher over a dynamic set of sinks.
pub struct SinkRegistry {
    slots: RwLock<Vec<Slot>>,
    next_id: AtomicU64,
}

impl Default for SinkRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SinkRegistry {
    #[must_use]
    pub fn new() -> Self {
        SinkRegistry {
            slots: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Adds a sink; it receives events until the guard is dropped.
    #[must_use]
    pub fn register(self: &Arc<Self>, sink: Arc<dyn Sink>) -> SinkGuard {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.slots
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Slot { id, sink });
        SinkGuard {
            registry: Arc::downgrade(self),
            id,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn remove(&self, id: u64) {
        self.slots
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|slot| slot.id != id);
    }

    /// Snapshot under the lock, dispatch outside it. Sinks may register or
    /// deregister from their own callbacks without deadlocking.
    fn each(&self, mut call: impl FnMut(&dyn Sink)) {
        let snapshot: Vec<Arc<dyn Sink>> = self
            .slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|slot| Arc::clone(&slot.sink))
            .collect();
        for sink in snapshot {
            // A panicking consumer must not take down script threads or
            // starve the other sinks.
            if panic::catch_unwind(AssertUnwindSafe(|| call(sink.as_ref()))).is_err() {
                warn!("Sink panicked while handling an event; continuing with remaining sinks");
            }
        }
    }
}

impl Sink for SinkRegistry {
    fn log(&self, value: &str) {
        self.each(|sink| sink.log(value));
    }

    fn error(&self, trace_id: &str, message: &str) {
        self.each(|sink| sink.error(trace_id, message));
    }
}

impl EmitHook for SinkRegistry {
    fn log(&self, message: &str) {
        Sink::log(self, message);
    }

    fn error(&self, trace_id: &str, message: &str) {
        Sink::error(self, trace_id, message);
    }
}

/// Scoped registration handle; dropping it removes the sink.
#[must_use = "the sink is deregistered when this guard drops"]
pub struct SinkGuard {
    registry: Weak<SinkRegistry>,
    id: u64,
}

impl Drop for SinkGuard {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
    }
}

/// Prints log lines to stdout and discards trace errors.
#[derive(Debug, Default)]
pub struct StdoutSink;

impl Sink for StdoutSink {
    fn log(&self, value: &str) {
        println!("{value}");
    }

    fn error(&self, _trace_id: &str, _message: &str) {}
}

/// Event forwarded by a [`ChannelSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    Log(String),
    TraceError { trace_id: String, message: String },
}

const DROP_WARN_EVERY: u64 = 1000;

/// Forwards events into a bounded channel without ever blocking.
///
/// When the buffer is full the event is dropped and counted; the consumer
/// side decides how fast it drains.
pub struct ChannelSink {
    tx: mpsc::Sender<SinkEvent>,
    dropped: AtomicU64,
}

impl ChannelSink {
    /// Builds the sink and the receiving end of its buffer.
    #[must_use]
    pub fn new(buffer: usize) -> (Arc<Self>, mpsc::Receiver<SinkEvent>) {
        let (tx, rx) = mpsc::channel(buffer);
        let sink = Arc::new(ChannelSink {
            tx,
            dropped: AtomicU64::new(0),
        });
        (sink, rx)
    }

    /// Number of events dropped on a full buffer so far.
    #[must_use]
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn push(&self, event: SinkEvent) {
        if self.tx.try_send(event).is_err() {
            let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
            if dropped % DROP_WARN_EVERY == 1 {
                warn!("Log buffer full; {dropped} events dropped so far");
            }
        }
    }
}

impl Sink for ChannelSink {
    fn log(&self, value: &str) {
        self.push(SinkEvent::Log(value.to_string()));
    }

    fn error(&self, trace_id: &str, message: &str) {
        self.push(SinkEvent::TraceError {
            trace_id: trace_id.to_string(),
            message: message.to_string(),
        });
    }
}
