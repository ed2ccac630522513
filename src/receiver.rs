//! Sinks for completed spans and the process-wide registry feeding them.
use super::spans::Span;
use lazy_static::lazy_static;
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, warn};

/// Accepts each completed span, called from the thread that stopped it.
///
/// Implementations must tolerate concurrent calls and must not block the
/// reporting thread indefinitely; buffer or hand off instead. Failures
/// stay inside the receiver: a failing exporter records its own trouble,
/// nothing unwinds into the instrumented application.
pub trait SpanReceiver: Send + Sync {
    fn receive(&self, span: Span);
}

lazy_static! {
    static ref RECEIVERS: RwLock<Vec<Arc<dyn SpanReceiver>>> = RwLock::new(Vec::new());
}

/// Register a receiver for every span completed from now on.
pub fn add_receiver(receiver: Arc<dyn SpanReceiver>) {
    RECEIVERS.write().unwrap().push(receiver);
    debug!("span receiver registered");
}

/// Unregister a previously added receiver, matched by identity.
/// Returns whether anything was removed.
pub fn remove_receiver(receiver: &dyn SpanReceiver) -> bool {
    let target = receiver as *const dyn SpanReceiver as *const ();
    let mut receivers = RECEIVERS.write().unwrap();
    let before = receivers.len();
    receivers.retain(|registered| Arc::as_ptr(registered) as *const () != target);
    let removed = receivers.len() < before;
    if removed {
        debug!("span receiver removed");
    } else {
        warn!("remove_receiver called with an unregistered receiver");
    }
    removed
}

/// Fan a finished span out to every registered receiver.
pub(crate) fn report(span: &Span) {
    for receiver in RECEIVERS.read().unwrap().iter() {
        receiver.receive(span.clone());
    }
}

/// Reference receiver buffering everything in memory, for tests and
/// offline analysis.
#[derive(Debug, Default)]
pub struct InMemoryReceiver {
    spans: Mutex<Vec<Span>>,
}

impl InMemoryReceiver {
    pub fn new() -> Self {
        InMemoryReceiver {
            spans: Mutex::new(Vec::new()),
        }
    }

    /// Snapshot of everything received so far, in arrival order.
    /// Receives happening after the copy do not show up in it.
    pub fn spans(&self) -> Vec<Span> {
        self.spans.lock().unwrap().clone()
    }

    /// Drop everything buffered so far.
    pub fn clear(&self) {
        self.spans.lock().unwrap().clear();
    }
}

impl SpanReceiver for InMemoryReceiver {
    fn receive(&self, span: Span) {
        self.spans.lock().unwrap().push(span);
    }
}
