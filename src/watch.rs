//! Filesystem watcher that triggers re-scans, with a short debounce so
//! editor save bursts collapse into one scan.

use notify::{Config, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::Path;
use std::sync::mpsc::{channel, Receiver};
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_DEBOUNCE_MS: u64 = 300;

pub struct FileWatcher {
    watcher: RecommendedWatcher,
    receiver: Receiver<Result<notify::Event, notify::Error>>,
    debounce: Duration,
}

impl FileWatcher {
    pub fn new() -> Result<Self, notify::Error> {
        Self::with_debounce(Duration::from_millis(DEFAULT_DEBOUNCE_MS))
    }

    pub fn with_debounce(debounce: Duration) -> Result<Self, notify::Error> {
        let (tx, rx) = channel();
        let watcher = RecommendedWatcher::new(
            move |res| {
                let _ = tx.send(res);
            },
            Config::default(),
        )?;

        Ok(Self {
            watcher,
            receiver: rx,
            debounce,
        })
    }

    pub fn watch(&mut self, path: &Path) -> Result<(), notify::Error> {
        self.watcher.watch(path, RecursiveMode::Recursive)
    }

    /// Block until a meaningful change lands, then drain the debounce
    /// window. Returns false when the watch channel closed.
    pub fn wait_for_change(&self) -> bool {
        loop {
            match self.receiver.recv() {
                Ok(Ok(event)) if is_relevant(&event.kind) => break,
                Ok(Ok(_)) => continue,
                Ok(Err(e)) => {
                    warn!(error = %e, "File watch error");
                    continue;
                }
                Err(_) => return false,
            }
        }

        // Swallow the burst that follows the first event.
        while self.receiver.recv_timeout(self.debounce).is_ok() {}
        true
    }
}

fn is_relevant(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}
