//! Typed progress events pushed from the scan pipeline to whatever is
//! rendering it. The sink serializes emission, so consumers never need
//! to be thread-safe, and holds no reference back into scanner state.

use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// Scan begins; total item count across all targets.
    Start { total_items: usize },
    BeginTarget { name: String, items: usize },
    /// One item finished, whether served from cache or scanned.
    ItemScanned { path: String, cached: bool },
    /// A batch of findings landed for one item.
    Findings { path: String, count: usize },
    CompleteTarget { name: String, findings: usize },
    Finish { findings: usize, elapsed_ms: u64 },
}

pub struct ProgressSink {
    tx: Mutex<Option<Sender<ProgressEvent>>>,
}

impl ProgressSink {
    /// A sink that drops every event.
    pub fn disabled() -> Self {
        Self {
            tx: Mutex::new(None),
        }
    }

    /// A connected sink plus the receiving end for the consumer.
    pub fn channel() -> (Self, Receiver<ProgressEvent>) {
        let (tx, rx) = channel();
        (
            Self {
                tx: Mutex::new(Some(tx)),
            },
            rx,
        )
    }

    pub fn emit(&self, event: ProgressEvent) {
        let guard = self.tx.lock().expect("progress sink poisoned");
        if let Some(tx) = guard.as_ref() {
            // A disconnected consumer is not the scanner's problem.
            let _ = tx.send(event);
        }
    }
}
