//! UI sink.
//!
//! Warnings and statistics the renderer wants a user to see. The pipeline
//! runs identically with [`NullUi`]; [`RecordingUi`] keeps everything for
//! headless runs and tests.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::instancing::CounterSnapshot;
use crate::pipeline::FrameReport;

/// Receives user-facing diagnostics.
pub trait UiSink: Send {
    /// A recoverable condition worth showing.
    fn warning(&self, message: &str);
    /// Compaction dropped instances. `dropped_total` is cumulative.
    fn overflow(&self, dropped_total: u64, counters: &CounterSnapshot);
    /// A frame finished.
    fn frame_stats(&self, report: &FrameReport);
}

/// Discards everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullUi;

impl UiSink for NullUi {
    fn warning(&self, _message: &str) {}
    fn overflow(&self, _dropped_total: u64, _counters: &CounterSnapshot) {}
    fn frame_stats(&self, _report: &FrameReport) {}
}

#[derive(Default)]
struct UiLog {
    warnings: Vec<String>,
    dropped_total: u64,
    last_overflow: Option<CounterSnapshot>,
    last_report: Option<FrameReport>,
    frames: u64,
}

/// Records every message. Clones share the same log.
#[derive(Clone, Default)]
pub struct RecordingUi {
    log: Arc<Mutex<UiLog>>,
}

impl RecordingUi {
    /// Empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every warning so far.
    #[must_use]
    pub fn warnings(&self) -> Vec<String> {
        self.log.lock().warnings.clone()
    }

    /// Cumulative dropped instances last reported.
    #[must_use]
    pub fn dropped_total(&self) -> u64 {
        self.log.lock().dropped_total
    }

    /// Counters of the latest overflow.
    #[must_use]
    pub fn last_overflow(&self) -> Option<CounterSnapshot> {
        self.log.lock().last_overflow
    }

    /// Latest frame report.
    #[must_use]
    pub fn last_report(&self) -> Option<FrameReport> {
        self.log.lock().last_report.clone()
    }

    /// Frames reported.
    #[must_use]
    pub fn frames(&self) -> u64 {
        self.log.lock().frames
    }
}

impl UiSink for RecordingUi {
    fn warning(&self, message: &str) {
        self.log.lock().warnings.push(message.to_string());
    }

    fn overflow(&self, dropped_total: u64, counters: &CounterSnapshot) {
        let mut log = self.log.lock();
        log.dropped_total = dropped_total;
        log.last_overflow = Some(*counters);
    }

    fn frame_stats(&self, report: &FrameReport) {
        let mut log = self.log.lock();
        log.frames += 1;
        log.last_report = Some(report.clone());
    }
}
