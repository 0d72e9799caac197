//! Progress relay: the monotonicity boundary between the engine's raw
//! progress reports and the caller.
//!
//! The underlying progress source (engine log parsing) is not guaranteed
//! monotonic between polls. The relay suppresses any percent that does not
//! strictly exceed the last forwarded one, so downstream consumers can rely
//! on a strictly increasing sequence. A relay is constructed fresh for every
//! job; its `last_percent` starts at -1 so a first report of 0 passes.

use crate::domain::jobs::JobEvent;
use crate::ports::engine::ProgressSink;
use std::sync::atomic::{AtomicI32, Ordering};
use tokio::sync::mpsc::UnboundedSender;

pub struct ProgressRelay {
    events: UnboundedSender<JobEvent>,
    last_percent: AtomicI32,
}

impl ProgressRelay {
    pub fn new(events: UnboundedSender<JobEvent>) -> Self {
        Self {
            events,
            last_percent: AtomicI32::new(-1),
        }
    }
}

impl ProgressSink for ProgressRelay {
    fn status(&self, message: &str) {
        // Pass-through, no deduplication. A closed receiver just means the
        // caller stopped listening; the job itself is unaffected.
        let _ = self.events.send(JobEvent::Status(message.to_string()));
    }

    fn progress(&self, percent: u8) {
        let percent = percent.min(100) as i32;
        let previous = self.last_percent.fetch_max(percent, Ordering::SeqCst);
        if percent > previous {
            let _ = self.events.send(JobEvent::Progress(percent as u8));
        }
    }
}
