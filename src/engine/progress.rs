//! Progress reporting.

use std::fmt;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressStatus {
    Queued,
    Moved,
    Skipped,
    Error,
    Undone,
}

impl fmt::Display for ProgressStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProgressStatus::Queued => "queued",
            ProgressStatus::Moved => "moved",
            ProgressStatus::Skipped => "skipped",
            ProgressStatus::Error => "error",
            ProgressStatus::Undone => "undone",
        };
        f.write_str(s)
    }
}

/// One progress notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    /// 0..=100, never decreasing within one operation.
    pub percent: u8,
    pub file_name: String,
    pub status: ProgressStatus,
    pub processed: usize,
    pub total: usize,
    /// Error text, skip reason or journal warning.
    pub detail: Option<String>,
}

/// Receiver of progress events. Called from worker threads.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, event: &ProgressEvent);
}

impl<F> ProgressSink for F
where
    F: Fn(&ProgressEvent) + Send + Sync,
{
    fn on_progress(&self, event: &ProgressEvent) {
        self(event)
    }
}

/// Sink that drops every event.
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_progress(&self, _event: &ProgressEvent) {}
}

pub(crate) fn percent(processed: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((processed.min(total) as u128 * 100) / total as u128) as u8
}

/// Counts processed items and emits events in count order.
pub(crate) struct ProgressTracker<'s> {
    total: usize,
    processed: Mutex<usize>,
    sink: &'s dyn ProgressSink,
}

impl<'s> ProgressTracker<'s> {
    pub(crate) fn new(total: usize, sink: &'s dyn ProgressSink) -> Self {
        Self {
            total,
            processed: Mutex::new(0),
            sink,
        }
    }

    /// Count one item and notify the sink. The sink runs under the counter
    /// lock so observers see percentages in non-decreasing order.
    pub(crate) fn record(&self, file_name: String, status: ProgressStatus, detail: Option<String>) {
        let mut processed = self.processed.lock().unwrap_or_else(|p| p.into_inner());
        *processed += 1;
        let event = ProgressEvent {
            percent: percent(*processed, self.total),
            file_name,
            status,
            processed: *processed,
            total: self.total,
            detail,
        };
        self.sink.on_progress(&event);
    }
}

pub(crate) fn display_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_is_bounded() {
        assert_eq!(percent(0, 0), 100);
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(3, 3), 100);
        assert_eq!(percent(5, 3), 100);
    }

    #[test]
    fn tracker_counts_in_order() {
        let seen = Mutex::new(Vec::new());
        {
            let sink = |e: &ProgressEvent| seen.lock().unwrap().push((e.processed, e.percent));
            let tracker = ProgressTracker::new(4, &sink);
            for _ in 0..4 {
                tracker.record("f".into(), ProgressStatus::Moved, None);
            }
        }
        assert_eq!(
            seen.into_inner().unwrap(),
            vec![(1, 25), (2, 50), (3, 75), (4, 100)]
        );
    }
}
