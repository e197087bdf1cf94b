//! Renders scan progress events as a terminal progress bar.

use crate::progress::ProgressEvent;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::mpsc::Receiver;

/// Minimum item count before a bar is worth drawing.
const MIN_ITEMS_FOR_PROGRESS: usize = 10;

/// Consume events until the sender hangs up or `Finish` arrives. Run on
/// its own thread; the scanner never blocks on rendering.
pub fn render(rx: Receiver<ProgressEvent>, is_tty: bool) {
    let mut bar: Option<ProgressBar> = None;

    while let Ok(event) = rx.recv() {
        match event {
            ProgressEvent::Start { total_items } => {
                if is_tty && total_items >= MIN_ITEMS_FOR_PROGRESS {
                    bar = Some(create_bar(total_items));
                }
            }
            ProgressEvent::ItemScanned { .. } => {
                if let Some(bar) = &bar {
                    bar.inc(1);
                }
            }
            ProgressEvent::BeginTarget { name, .. } => {
                if let Some(bar) = &bar {
                    bar.set_message(name);
                }
            }
            ProgressEvent::Findings { .. } | ProgressEvent::CompleteTarget { .. } => {}
            ProgressEvent::Finish { .. } => {
                if let Some(bar) = bar.take() {
                    bar.finish_and_clear();
                }
                break;
            }
        }
    }
}

fn create_bar(total: usize) -> ProgressBar {
    let bar = ProgressBar::new(total as u64);
    bar.set_style(
        ProgressStyle::with_template(
            "Scanning {bar:40} {pos:>4}/{len:4} {msg} [{elapsed_precise}]",
        )
        .expect("progress template")
        .progress_chars("=> "),
    );
    bar
}
