//! Per-frame results.

use std::time::Duration;

use crate::backend::DrawCall;
use crate::instancing::CounterSnapshot;

/// What one call to [`super::VoxelPipeline::render_frame`] did.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameReport {
    /// Frame number, starting at 0.
    pub frame: u64,
    /// The volume was rebuilt this frame.
    pub revoxelized: bool,
    /// The draw that was issued.
    pub draw: DrawCall,
    /// Newest counters that became available this frame. With indirect
    /// count delivery they may belong to an earlier frame (see `frame`).
    pub counters: Option<CounterSnapshot>,
    /// Instances dropped for lack of capacity since the pipeline started,
    /// summed over every compacted frame whose counters have arrived.
    pub dropped_total: u64,
    /// CPU time spent in `render_frame`.
    pub cpu_time: Duration,
}

impl FrameReport {
    /// Instances drawn, if known on the CPU.
    #[must_use]
    pub fn drawn_instances(&self) -> Option<u32> {
        match self.draw {
            DrawCall::Voxels {
                instances: crate::backend::InstanceSource::Counted(n),
                ..
            } => Some(n),
            _ => None,
        }
    }
}
