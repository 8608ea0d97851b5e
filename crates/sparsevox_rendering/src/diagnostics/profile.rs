//! Profiling sink.
//!
//! The pipeline brackets every stage with `begin`/`end`. Sinks must not
//! change behavior; the default [`NullProfiler`] does nothing.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Receives named stage scopes.
pub trait ProfileSink: Send {
    /// A stage started.
    fn begin(&self, name: &'static str);
    /// The most recent stage with this name ended.
    fn end(&self, name: &'static str);
}

/// Discards every scope.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullProfiler;

impl ProfileSink for NullProfiler {
    fn begin(&self, _name: &'static str) {}
    fn end(&self, _name: &'static str) {}
}

/// Calls `end` when dropped.
pub struct ProfileScope<'a> {
    sink: &'a dyn ProfileSink,
    name: &'static str,
}

impl<'a> ProfileScope<'a> {
    /// Begins `name` on `sink`.
    #[must_use]
    pub fn new(sink: &'a dyn ProfileSink, name: &'static str) -> Self {
        sink.begin(name);
        Self { sink, name }
    }
}

impl Drop for ProfileScope<'_> {
    fn drop(&mut self) {
        self.sink.end(self.name);
    }
}

/// Accumulated time of one scope name.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScopeTiming {
    /// Completed scopes.
    pub calls: u64,
    /// Total CPU time.
    pub total: Duration,
    /// Longest single scope.
    pub max: Duration,
}

impl ScopeTiming {
    /// Mean duration, zero before the first call.
    #[must_use]
    pub fn mean(&self) -> Duration {
        if self.calls == 0 {
            return Duration::ZERO;
        }
        self.total / u32::try_from(self.calls).unwrap_or(u32::MAX)
    }
}

#[derive(Default)]
struct ProfileState {
    open: Vec<(&'static str, Instant)>,
    timings: HashMap<&'static str, ScopeTiming>,
}

/// Measures CPU time per scope and emits `trace` events.
///
/// Clones share the same timings.
#[derive(Clone, Default)]
pub struct TracingProfiler {
    state: Arc<Mutex<ProfileState>>,
}

impl TracingProfiler {
    /// Empty profiler.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Timing of one scope name.
    #[must_use]
    pub fn timing(&self, name: &str) -> Option<ScopeTiming> {
        self.state.lock().timings.get(name).copied()
    }

    /// Every scope, sorted by name.
    #[must_use]
    pub fn timings(&self) -> Vec<(&'static str, ScopeTiming)> {
        let mut all: Vec<_> = self
            .state
            .lock()
            .timings
            .iter()
            .map(|(&name, &timing)| (name, timing))
            .collect();
        all.sort_by_key(|&(name, _)| name);
        all
    }

    /// Logs every scope at `info`.
    pub fn log_summary(&self) {
        for (name, timing) in self.timings() {
            tracing::info!(
                scope = name,
                calls = timing.calls,
                mean_us = timing.mean().as_micros() as u64,
                max_us = timing.max.as_micros() as u64,
                "profile"
            );
        }
    }
}

impl ProfileSink for TracingProfiler {
    fn begin(&self, name: &'static str) {
        self.state.lock().open.push((name, Instant::now()));
    }

    fn end(&self, name: &'static str) {
        let mut state = self.state.lock();
        let Some(position) = state.open.iter().rposition(|&(open, _)| open == name) else {
            tracing::debug!(scope = name, "profile end without begin");
            return;
        };
        let (_, started) = state.open.remove(position);
        let elapsed = started.elapsed();
        let timing = state.timings.entry(name).or_default();
        timing.calls += 1;
        timing.total += elapsed;
        timing.max = timing.max.max(elapsed);
        tracing::trace!(scope = name, us = elapsed.as_micros() as u64, "scope");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_guard_records_timing() {
        let profiler = TracingProfiler::new();
        {
            let _outer = ProfileScope::new(&profiler, "frame");
            let _inner = ProfileScope::new(&profiler, "compact");
        }
        assert_eq!(profiler.timing("frame").map(|t| t.calls), Some(1));
        assert_eq!(profiler.timing("compact").map(|t| t.calls), Some(1));
        let names: Vec<_> = profiler.timings().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["compact", "frame"]);
    }

    #[test]
    fn test_unmatched_end_is_ignored() {
        let profiler = TracingProfiler::new();
        profiler.end("nothing");
        assert!(profiler.timing("nothing").is_none());
    }

    #[test]
    fn test_clones_share_state() {
        let profiler = TracingProfiler::new();
        let handle = profiler.clone();
        drop(ProfileScope::new(&handle, "voxelize"));
        assert!(profiler.timing("voxelize").is_some());
    }
}
