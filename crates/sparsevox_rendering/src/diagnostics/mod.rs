//! Profiling and UI sinks. Both are optional collaborators: the pipeline
//! behaves the same with the null implementations.

pub mod profile;
pub mod ui;

pub use profile::{NullProfiler, ProfileScope, ProfileSink, ScopeTiming, TracingProfiler};
pub use ui::{NullUi, RecordingUi, UiSink};
