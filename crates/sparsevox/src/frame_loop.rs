//! # SPARSEVOX Frame Loop
//!
//! Drives a [`VoxelPipeline`] without a window:
//! ```text
//! Frame N:
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │ 1. SCRIPT                                                           │
//! │    └─ Queue the control events scheduled for frame N                │
//! │                                                                     │
//! │ 2. RENDER (pipeline)                                                │
//! │    ├─ Apply queued events (frame boundary)                          │
//! │    ├─ Revoxelize if the scene changed                               │
//! │    └─ Compact + draw voxels, or depth pre-pass + shade              │
//! │                                                                     │
//! │ 3. ANIMATE                                                          │
//! │    └─ Orbit the camera (never dirties the volume)                   │
//! │                                                                     │
//! │ 4. END FRAME                                                        │
//! │    └─ Record timing, warn on frames over budget                     │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

use std::time::Duration;

use sparsevox_rendering::{FrameReport, LookAtCamera, Scene, VoxelBackend, VoxelPipeline};
use sparsevox_shared::ControlEvent;

use crate::error::AppResult;

/// Target frame time for 60 FPS.
pub const TARGET_FRAME_TIME: Duration = Duration::from_micros(16_666);

/// Maximum allowed frame time before warning.
pub const MAX_FRAME_TIME: Duration = Duration::from_millis(33);

/// Configuration for the frame loop.
#[derive(Clone, Debug)]
pub struct FrameLoopConfig {
    /// Frames to render.
    pub frames: u64,
    /// Camera orbit per frame, radians.
    pub orbit_per_frame: f32,
    /// Warn about frames over [`MAX_FRAME_TIME`].
    pub enable_timing_logs: bool,
    /// Control events to queue before the given frame.
    pub script: Vec<(u64, ControlEvent)>,
}

impl Default for FrameLoopConfig {
    fn default() -> Self {
        Self {
            frames: 120,
            orbit_per_frame: 0.02,
            enable_timing_logs: true,
            script: Vec::new(),
        }
    }
}

impl FrameLoopConfig {
    /// A script that shows off both views: scene, voxels at every listed
    /// mip, wireframe, then scene again with a raised sample level.
    #[must_use]
    pub fn showcase(frames: u64, mips: u32) -> Self {
        let step = (frames / u64::from(mips + 3)).max(1);
        let mut script = vec![(step, ControlEvent::SetShowVoxels(true))];
        let mut at = step;
        for mip in 1..mips {
            at += step;
            script.push((at, ControlEvent::SetDebugMipLevel(mip)));
        }
        at += step;
        script.push((at, ControlEvent::SetWireframe(true)));
        at += step;
        script.push((at, ControlEvent::SetShowVoxels(false)));
        script.push((at, ControlEvent::SetMipInterpolation(1.0)));
        Self {
            frames,
            script,
            ..Self::default()
        }
    }
}

/// Timing and outcome of one frame.
#[derive(Clone, Copy, Debug, Default)]
pub struct FrameStats {
    /// Frame number.
    pub frame: u64,
    /// Total frame time in microseconds.
    pub total_us: u64,
    /// The volume was rebuilt.
    pub revoxelized: bool,
    /// Instances drawn, when known on the CPU.
    pub instances: Option<u32>,
    /// Cumulative dropped instances.
    pub dropped_total: u64,
}

impl From<&FrameReport> for FrameStats {
    fn from(report: &FrameReport) -> Self {
        Self {
            frame: report.frame,
            total_us: u64::try_from(report.cpu_time.as_micros()).unwrap_or(u64::MAX),
            revoxelized: report.revoxelized,
            instances: report.drawn_instances(),
            dropped_total: report.dropped_total,
        }
    }
}

/// Runs a pipeline over a scene for a fixed number of frames.
pub struct FrameLoop<B: VoxelBackend> {
    pipeline: VoxelPipeline<B>,
    scene: Scene,
    camera: LookAtCamera,
    config: FrameLoopConfig,
    frame_count: u64,
    stats_accumulator: FrameStatsAccumulator,
}

impl<B: VoxelBackend> FrameLoop<B> {
    /// Creates a new frame loop.
    #[must_use]
    pub fn new(pipeline: VoxelPipeline<B>, scene: Scene, camera: LookAtCamera, config: FrameLoopConfig) -> Self {
        Self {
            pipeline,
            scene,
            camera,
            config,
            frame_count: 0,
            stats_accumulator: FrameStatsAccumulator::new(),
        }
    }

    /// Renders one frame.
    ///
    /// # Errors
    ///
    /// Returns the pipeline's error; the loop can continue afterwards.
    pub fn step(&mut self) -> AppResult<FrameReport> {
        let frame = self.frame_count;
        let sender = self.pipeline.controls();
        for &(_, event) in self.config.script.iter().filter(|(at, _)| *at == frame) {
            if !sender.send(event) {
                tracing::warn!(?event, "control queue full, event dropped");
            }
        }

        let report = self.pipeline.render_frame(&self.scene, &self.camera)?;
        self.camera.orbit(self.config.orbit_per_frame);
        self.end_frame(FrameStats::from(&report));
        Ok(report)
    }

    /// Renders every configured frame.
    ///
    /// # Errors
    ///
    /// Stops at the first frame that fails.
    pub fn run(&mut self) -> AppResult<&FrameStatsAccumulator> {
        while self.frame_count < self.config.frames {
            self.step()?;
        }
        Ok(&self.stats_accumulator)
    }

    fn end_frame(&mut self, stats: FrameStats) {
        self.frame_count += 1;
        self.stats_accumulator.record(stats);

        if self.config.enable_timing_logs && stats.total_us > MAX_FRAME_TIME.as_micros() as u64 {
            tracing::warn!(
                frame = stats.frame,
                ms = stats.total_us as f64 / 1000.0,
                target_ms = TARGET_FRAME_TIME.as_micros() as f64 / 1000.0,
                revoxelized = stats.revoxelized,
                "frame exceeded budget"
            );
        }
    }

    /// Returns the current frame count.
    #[inline]
    #[must_use]
    pub const fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Returns the accumulated statistics.
    #[must_use]
    pub const fn stats(&self) -> &FrameStatsAccumulator {
        &self.stats_accumulator
    }

    /// The pipeline being driven.
    #[must_use]
    pub const fn pipeline(&self) -> &VoxelPipeline<B> {
        &self.pipeline
    }

    /// The scene, for edits between frames.
    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }
}

/// Accumulator for frame statistics.
#[derive(Clone, Debug)]
pub struct FrameStatsAccumulator {
    /// Total frames recorded.
    pub frames_recorded: u64,
    /// Sum of total frame times.
    pub total_us_sum: u64,
    /// Min frame time.
    pub min_frame_us: u64,
    /// Max frame time.
    pub max_frame_us: u64,
    /// Frames that exceeded budget.
    pub frames_over_budget: u64,
    /// Frames that rebuilt the volume.
    pub revoxelizations: u64,
    /// Largest instance count drawn.
    pub max_instances: u32,
    /// Cumulative dropped instances as of the last frame.
    pub dropped_total: u64,
}

impl FrameStatsAccumulator {
    /// Creates a new accumulator.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            frames_recorded: 0,
            total_us_sum: 0,
            min_frame_us: u64::MAX,
            max_frame_us: 0,
            frames_over_budget: 0,
            revoxelizations: 0,
            max_instances: 0,
            dropped_total: 0,
        }
    }

    /// Records a frame's statistics.
    pub fn record(&mut self, stats: FrameStats) {
        self.frames_recorded += 1;
        self.total_us_sum += stats.total_us;
        self.min_frame_us = self.min_frame_us.min(stats.total_us);
        self.max_frame_us = self.max_frame_us.max(stats.total_us);
        if stats.total_us > TARGET_FRAME_TIME.as_micros() as u64 {
            self.frames_over_budget += 1;
        }
        if stats.revoxelized {
            self.revoxelizations += 1;
        }
        if let Some(instances) = stats.instances {
            self.max_instances = self.max_instances.max(instances);
        }
        self.dropped_total = stats.dropped_total;
    }

    /// Returns average frame time in milliseconds.
    #[must_use]
    pub fn avg_frame_ms(&self) -> f64 {
        if self.frames_recorded == 0 {
            return 0.0;
        }
        (self.total_us_sum as f64 / self.frames_recorded as f64) / 1000.0
    }

    /// Returns average FPS.
    #[must_use]
    pub fn avg_fps(&self) -> f64 {
        let avg_ms = self.avg_frame_ms();
        if avg_ms <= 0.0 {
            return 0.0;
        }
        1000.0 / avg_ms
    }

    /// Returns the fraction of frames over budget.
    #[must_use]
    pub fn over_budget_ratio(&self) -> f64 {
        if self.frames_recorded == 0 {
            return 0.0;
        }
        self.frames_over_budget as f64 / self.frames_recorded as f64
    }

    /// Logs a summary of the statistics.
    pub fn log_summary(&self) {
        tracing::info!(
            frames = self.frames_recorded,
            avg_ms = self.avg_frame_ms(),
            fps = self.avg_fps(),
            min_ms = self.min_frame_us as f64 / 1000.0,
            max_ms = self.max_frame_us as f64 / 1000.0,
            over_budget = self.frames_over_budget,
            revoxelizations = self.revoxelizations,
            max_instances = self.max_instances,
            dropped_total = self.dropped_total,
            "frame statistics"
        );
    }
}

impl Default for FrameStatsAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use sparsevox_rendering::{DrawCall, SoftwareBackend, VoxelGrid};
    use sparsevox_shared::VoxelSettings;

    fn software_loop(config: FrameLoopConfig) -> FrameLoop<SoftwareBackend> {
        let backend = SoftwareBackend::new(VoxelGrid::new(32, 0.5, 6), 1 << 16);
        let pipeline = VoxelPipeline::new(backend, VoxelSettings::default());
        let scene = crate::demo_scene::demo_scene(16.0).unwrap();
        let camera = LookAtCamera::new(Vec3::new(10.0, 8.0, 10.0), Vec3::ZERO, 16.0 / 9.0);
        FrameLoop::new(pipeline, scene, camera, config)
    }

    #[test]
    fn test_runs_configured_frames() {
        let mut frame_loop = software_loop(FrameLoopConfig {
            frames: 5,
            ..FrameLoopConfig::default()
        });
        let stats = frame_loop.run().unwrap();
        assert_eq!(stats.frames_recorded, 5);
        assert_eq!(stats.revoxelizations, 1);
        assert_eq!(frame_loop.frame_count(), 5);
    }

    #[test]
    fn test_script_applies_on_its_frame() {
        let mut frame_loop = software_loop(FrameLoopConfig {
            frames: 4,
            script: vec![(2, ControlEvent::SetShowVoxels(true))],
            ..FrameLoopConfig::default()
        });
        let draws: Vec<DrawCall> = (0..4).map(|_| frame_loop.step().unwrap().draw).collect();
        assert!(matches!(draws[1], DrawCall::Scene { .. }));
        assert!(matches!(draws[2], DrawCall::Voxels { .. }));
        assert!(frame_loop.stats().max_instances > 0);
    }

    #[test]
    fn test_scene_edit_revoxelizes() {
        let mut frame_loop = software_loop(FrameLoopConfig::default());
        frame_loop.step().unwrap();
        frame_loop
            .scene_mut()
            .update_transform(0, 0, glam::Mat4::from_translation(Vec3::Y))
            .unwrap();
        assert!(frame_loop.step().unwrap().revoxelized);
    }

    #[test]
    fn test_showcase_script_is_ordered() {
        let config = FrameLoopConfig::showcase(60, 3);
        assert!(config.script.windows(2).all(|w| w[0].0 <= w[1].0));
        assert!(config.script.iter().all(|(at, _)| *at < 60));
    }

    #[test]
    fn test_stats_accumulator() {
        let mut acc = FrameStatsAccumulator::new();
        for i in 0..100 {
            acc.record(FrameStats {
                frame: i,
                total_us: 10_000 + (i * 100),
                revoxelized: i == 0,
                instances: Some(i as u32),
                dropped_total: 0,
            });
        }
        assert_eq!(acc.frames_recorded, 100);
        assert_eq!(acc.revoxelizations, 1);
        assert_eq!(acc.max_instances, 99);
        assert!(acc.avg_fps() > 50.0);
        assert!(acc.avg_fps() < 100.0);
    }
}
