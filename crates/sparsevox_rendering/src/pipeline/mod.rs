//! # Voxel Pipeline
//!
//! Sequences the stages once per frame:
//!
//! ```text
//!  1. apply queued control events        (frame boundary only)
//!  2. snapshot the camera                (one per frame)
//!  3. mirror scene changes to the backend
//!  4. if the volume is stale:  clear -> voxelize -> mipmaps
//!  5. show_voxels ? compact -> draw_voxels : draw_scene
//!  6. submit, collect counters, report
//! ```
//!
//! The volume is stale when a control event invalidated it or when the
//! scene's content revision differs from the one last voxelized.

pub mod report;

pub use report::FrameReport;

use std::time::Instant;

use sparsevox_shared::{ControlEvent, ControlQueue, ControlSender, SettingsEffect, VoxelSettings};

use crate::backend::{VolumeReady, VoxelBackend};
use crate::camera::CameraSource;
use crate::diagnostics::{NullProfiler, NullUi, ProfileScope, ProfileSink, UiSink};
use crate::error::RenderResult;
use crate::instancing::CounterSnapshot;
use crate::scene::Scene;

/// Owns a backend and the state that decides which stages run.
pub struct VoxelPipeline<B: VoxelBackend> {
    backend: B,
    settings: VoxelSettings,
    controls: ControlQueue,
    profiler: Box<dyn ProfileSink>,
    ui: Box<dyn UiSink>,
    /// Taken while a frame runs. `None` before the first voxelization.
    ready: Option<VolumeReady>,
    regenerate_voxel_data: bool,
    voxelized_revision: Option<u64>,
    frame: u64,
    dropped_total: u64,
    last_counters: Option<CounterSnapshot>,
}

impl<B: VoxelBackend> VoxelPipeline<B> {
    /// Pipeline over `backend`, starting from `settings`.
    ///
    /// The backend's grid is authoritative for the voxel size: a differing
    /// `settings.voxel_size` is replaced so later size events compare
    /// against the volume actually allocated.
    #[must_use]
    pub fn new(backend: B, mut settings: VoxelSettings) -> Self {
        let grid_size = backend.grid().voxel_size();
        if (settings.voxel_size - grid_size).abs() > f32::EPSILON {
            tracing::warn!(
                requested = settings.voxel_size,
                grid = grid_size,
                "voxel size follows the allocated grid"
            );
            settings.voxel_size = grid_size;
        }
        Self {
            backend,
            settings,
            controls: ControlQueue::default(),
            profiler: Box::new(NullProfiler),
            ui: Box::new(NullUi),
            ready: None,
            regenerate_voxel_data: true,
            voxelized_revision: None,
            frame: 0,
            dropped_total: 0,
            last_counters: None,
        }
    }

    /// Replaces the profiling sink.
    #[must_use]
    pub fn with_profiler(mut self, profiler: impl ProfileSink + 'static) -> Self {
        self.profiler = Box::new(profiler);
        self
    }

    /// Replaces the UI sink.
    #[must_use]
    pub fn with_ui(mut self, ui: impl UiSink + 'static) -> Self {
        self.ui = Box::new(ui);
        self
    }

    /// Handle for queuing control events from any thread.
    #[must_use]
    pub fn controls(&self) -> ControlSender {
        self.controls.sender()
    }

    /// Current settings.
    #[must_use]
    pub const fn settings(&self) -> &VoxelSettings {
        &self.settings
    }

    /// The backend.
    #[must_use]
    pub const fn backend(&self) -> &B {
        &self.backend
    }

    /// The backend, mutably.
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Frames rendered so far.
    #[must_use]
    pub const fn frame(&self) -> u64 {
        self.frame
    }

    /// Latest counters seen.
    #[must_use]
    pub const fn last_counters(&self) -> Option<CounterSnapshot> {
        self.last_counters
    }

    /// True if the next frame will rebuild the volume.
    #[must_use]
    pub fn needs_voxelization(&self, scene: &Scene) -> bool {
        self.regenerate_voxel_data
            || self.ready.is_none()
            || self.voxelized_revision != Some(scene.content_revision())
    }

    /// Queues a rebuild of the volume on the next frame.
    pub fn request_regeneration(&mut self) {
        self.regenerate_voxel_data = true;
    }

    /// Renders one frame.
    ///
    /// # Errors
    ///
    /// Returns backend failures (resource creation, buffer mapping). Capacity
    /// overflow and invalid control events are reported through the UI
    /// sink instead.
    pub fn render_frame(&mut self, scene: &Scene, camera: &dyn CameraSource) -> RenderResult<FrameReport> {
        self.profiler.begin("frame");
        let result = self.run_stages(scene, camera);
        self.profiler.end("frame");
        let report = result?;
        self.ui.frame_stats(&report);
        self.frame += 1;
        Ok(report)
    }

    fn run_stages(&mut self, scene: &Scene, camera: &dyn CameraSource) -> RenderResult<FrameReport> {
        let started = Instant::now();
        let frame = self.frame;

        self.apply_controls()?;
        let camera = camera.snapshot();
        self.backend.sync_scene(scene)?;

        let revoxelized = self.needs_voxelization(scene);
        let ready = match self.ready.take() {
            Some(ready) if !revoxelized => ready,
            _ => self.revoxelize(scene),
        };

        let mut counters = None;
        let draw = if self.settings.show_voxels {
            let mip = self.clamped_debug_mip();
            let compacted = {
                let _scope = ProfileScope::new(self.profiler.as_ref(), "compact");
                self.backend.compact(&ready, &camera, mip, frame)
            };
            let compacted = match compacted {
                Ok(compacted) => compacted,
                Err(error) => {
                    self.ready = Some(ready);
                    return Err(error);
                }
            };
            counters = compacted.counters();
            let _scope = ProfileScope::new(self.profiler.as_ref(), "draw_voxels");
            let draw = self.backend.draw_voxels(compacted, &camera, self.settings.wireframe);
            self.ready = Some(ready);
            draw?
        } else {
            let _scope = ProfileScope::new(self.profiler.as_ref(), "draw_scene");
            let draw = self.backend.draw_scene(&ready, scene, &camera, &self.settings);
            self.ready = Some(ready);
            draw?
        };

        let late = {
            let _scope = ProfileScope::new(self.profiler.as_ref(), "submit");
            self.backend.finish_frame(frame)?
        };
        let latest = late.last().copied().or(counters);
        for snapshot in counters.into_iter().chain(late) {
            self.record_counters(snapshot);
        }

        Ok(FrameReport {
            frame,
            revoxelized,
            draw,
            counters: latest,
            dropped_total: self.dropped_total,
            cpu_time: started.elapsed(),
        })
    }

    fn clamped_debug_mip(&self) -> u32 {
        let requested = self.settings.debug_mip_level;
        let mip = requested.min(self.backend.grid().max_mip());
        if mip != requested {
            let message = format!("debug mip {requested} does not exist, showing mip {mip}");
            tracing::warn!("{message}");
            self.ui.warning(&message);
        }
        mip
    }

    fn apply_controls(&mut self) -> RenderResult<()> {
        for event in self.controls.drain() {
            match self.settings.apply(event) {
                Ok(SettingsEffect::InvalidatesVolume) => {
                    self.regenerate_voxel_data = true;
                    if let ControlEvent::SetVoxelSize(size) = event {
                        let grid = self.backend.grid().with_voxel_size(size);
                        self.backend.resize_volume(grid)?;
                    }
                    tracing::debug!(?event, "volume invalidated");
                }
                Ok(SettingsEffect::Presentation | SettingsEffect::Unchanged) => {}
                Err(error) => {
                    let message = format!("ignored {event:?}: {error}");
                    tracing::warn!("{message}");
                    self.ui.warning(&message);
                }
            }
        }
        Ok(())
    }

    fn revoxelize(&mut self, scene: &Scene) -> VolumeReady {
        if scene.is_empty() {
            self.ui.warning("scene has no geometry; the volume is empty");
        }

        let written = {
            let _scope = ProfileScope::new(self.profiler.as_ref(), "voxelize");
            let cleared = self.backend.clear_volume();
            self.backend.voxelize(cleared, scene)
        };
        let ready = {
            let _scope = ProfileScope::new(self.profiler.as_ref(), "mipmaps");
            self.backend.generate_mipmaps(written)
        };
        self.regenerate_voxel_data = false;
        self.voxelized_revision = Some(scene.content_revision());
        tracing::debug!(
            backend = self.backend.name(),
            revision = scene.content_revision(),
            "volume regenerated"
        );
        ready
    }

    fn record_counters(&mut self, counters: CounterSnapshot) {
        self.last_counters = Some(counters);
        if counters.dropped == 0 {
            return;
        }
        self.dropped_total += u64::from(counters.dropped);
        let message = format!(
            "instance buffer full: {} of {} visible voxels dropped (capacity {})",
            counters.dropped, counters.count, counters.capacity
        );
        tracing::warn!(frame = counters.frame, dropped_total = self.dropped_total, "{message}");
        self.ui.warning(&message);
        self.ui.overflow(self.dropped_total, &counters);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{DrawCall, InstanceSource, SoftwareBackend};
    use crate::camera::LookAtCamera;
    use crate::diagnostics::RecordingUi;
    use crate::mesh::{primitives, Material, MeshGroup};
    use crate::volume::VoxelGrid;
    use glam::{Mat4, Vec3};

    fn cube_scene() -> Scene {
        let (vertices, indices) = primitives::unit_cube();
        let mut group = MeshGroup::new("cube");
        group
            .push_submesh(&vertices, &indices, Mat4::IDENTITY, Material::default())
            .unwrap();
        let mut scene = Scene::default();
        scene.add_group(group).unwrap();
        scene
    }

    fn pipeline(capacity: u32) -> (VoxelPipeline<SoftwareBackend>, RecordingUi) {
        let ui = RecordingUi::new();
        let backend = SoftwareBackend::new(VoxelGrid::new(8, 1.0, 4), capacity);
        let settings = VoxelSettings {
            show_voxels: true,
            ..VoxelSettings::default()
        };
        (VoxelPipeline::new(backend, settings).with_ui(ui.clone()), ui)
    }

    fn camera() -> LookAtCamera {
        LookAtCamera::new(Vec3::new(3.0, 2.5, 4.0), Vec3::ZERO, 1.0)
    }

    #[test]
    fn test_voxelizes_once_for_static_scene() {
        let (mut pipeline, _) = pipeline(64);
        let scene = cube_scene();
        let first = pipeline.render_frame(&scene, &camera()).unwrap();
        let second = pipeline.render_frame(&scene, &camera()).unwrap();
        let third = pipeline.render_frame(&scene, &camera()).unwrap();

        assert!(first.revoxelized);
        assert!(!second.revoxelized && !third.revoxelized);
        assert_eq!(pipeline.backend().stage_counts().voxelizations, 1);
        assert_eq!(pipeline.backend().stage_counts().compactions, 3);
        assert_eq!(third.frame, 2);
    }

    #[test]
    fn test_transform_change_revoxelizes() {
        let (mut pipeline, _) = pipeline(64);
        let mut scene = cube_scene();
        pipeline.render_frame(&scene, &camera()).unwrap();

        scene
            .update_transform(0, 0, Mat4::from_translation(Vec3::new(1.0, 0.0, 0.0)))
            .unwrap();
        assert!(pipeline.needs_voxelization(&scene));
        let report = pipeline.render_frame(&scene, &camera()).unwrap();
        assert!(report.revoxelized);
        assert_eq!(pipeline.backend().stage_counts().voxelizations, 2);
    }

    #[test]
    fn test_light_move_keeps_volume() {
        let (mut pipeline, _) = pipeline(64);
        let mut scene = cube_scene();
        pipeline.render_frame(&scene, &camera()).unwrap();
        scene.set_light_position(Vec3::new(-4.0, 6.0, 1.0));
        assert!(!pipeline.render_frame(&scene, &camera()).unwrap().revoxelized);
    }

    #[test]
    fn test_unit_cube_draws_eight_instances() {
        let (mut pipeline, ui) = pipeline(64);
        let report = pipeline.render_frame(&cube_scene(), &camera()).unwrap();
        assert_eq!(report.drawn_instances(), Some(8));
        assert_eq!(report.dropped_total, 0);
        assert!(ui.warnings().is_empty());
        assert_eq!(ui.frames(), 1);
    }

    #[test]
    fn test_overflow_reported_not_fatal() {
        let (mut pipeline, ui) = pipeline(5);
        let scene = cube_scene();
        let report = pipeline.render_frame(&scene, &camera()).unwrap();
        assert_eq!(report.drawn_instances(), Some(5));
        assert_eq!(report.dropped_total, 3);

        pipeline.render_frame(&scene, &camera()).unwrap();
        assert_eq!(ui.dropped_total(), 6);
        assert_eq!(ui.last_overflow().map(|c| c.dropped), Some(3));
        assert!(ui.warnings().iter().any(|w| w.contains("instance buffer full")));
    }

    /// Software stages with counters held back and released in batches,
    /// the way mapped readbacks complete over later frames.
    struct BatchedCounters {
        inner: SoftwareBackend,
        held: Vec<CounterSnapshot>,
        release_every: u64,
    }

    impl VoxelBackend for BatchedCounters {
        fn name(&self) -> &'static str {
            "batched"
        }

        fn grid(&self) -> &VoxelGrid {
            self.inner.grid()
        }

        fn resize_volume(&mut self, grid: VoxelGrid) -> RenderResult<()> {
            self.inner.resize_volume(grid)
        }

        fn sync_scene(&mut self, scene: &Scene) -> RenderResult<()> {
            self.inner.sync_scene(scene)
        }

        fn clear_volume(&mut self) -> crate::backend::VolumeCleared {
            self.inner.clear_volume()
        }

        fn voxelize(
            &mut self,
            cleared: crate::backend::VolumeCleared,
            scene: &Scene,
        ) -> crate::backend::VolumeWritten {
            self.inner.voxelize(cleared, scene)
        }

        fn generate_mipmaps(&mut self, written: crate::backend::VolumeWritten) -> VolumeReady {
            self.inner.generate_mipmaps(written)
        }

        fn compact(
            &mut self,
            ready: &VolumeReady,
            camera: &crate::camera::CameraSnapshot,
            mip: u32,
            frame: u64,
        ) -> RenderResult<crate::backend::Compacted> {
            let compacted = self.inner.compact(ready, camera, mip, frame)?;
            self.held.extend(compacted.counters());
            Ok(crate::backend::Compacted::new(mip, None))
        }

        fn draw_voxels(
            &mut self,
            compacted: crate::backend::Compacted,
            camera: &crate::camera::CameraSnapshot,
            wireframe: bool,
        ) -> RenderResult<DrawCall> {
            self.inner.draw_voxels(compacted, camera, wireframe)
        }

        fn draw_scene(
            &mut self,
            ready: &VolumeReady,
            scene: &Scene,
            camera: &crate::camera::CameraSnapshot,
            settings: &VoxelSettings,
        ) -> RenderResult<DrawCall> {
            self.inner.draw_scene(ready, scene, camera, settings)
        }

        fn finish_frame(&mut self, frame: u64) -> RenderResult<Vec<CounterSnapshot>> {
            if (frame + 1) % self.release_every == 0 {
                Ok(std::mem::take(&mut self.held))
            } else {
                Ok(Vec::new())
            }
        }
    }

    #[test]
    fn test_late_counter_batches_all_counted() {
        let ui = RecordingUi::new();
        let backend = BatchedCounters {
            inner: SoftwareBackend::new(VoxelGrid::new(8, 1.0, 4), 5),
            held: Vec::new(),
            release_every: 3,
        };
        let settings = VoxelSettings {
            show_voxels: true,
            ..VoxelSettings::default()
        };
        let mut pipeline = VoxelPipeline::new(backend, settings).with_ui(ui.clone());
        let scene = cube_scene();

        let first = pipeline.render_frame(&scene, &camera()).unwrap();
        let second = pipeline.render_frame(&scene, &camera()).unwrap();
        assert_eq!((first.counters, second.counters), (None, None));
        assert_eq!(second.dropped_total, 0);

        let third = pipeline.render_frame(&scene, &camera()).unwrap();
        assert_eq!(third.counters.map(|c| c.frame), Some(2));
        assert_eq!(third.dropped_total, 9);
        assert_eq!(ui.dropped_total(), 9);
        assert_eq!(pipeline.last_counters().map(|c| c.frame), Some(2));

        for _ in 0..3 {
            pipeline.render_frame(&scene, &camera()).unwrap();
        }
        assert_eq!(ui.dropped_total(), 18);
        assert_eq!(ui.warnings().len(), 6);
    }

    #[test]
    fn test_controls_apply_at_frame_boundary() {
        let (mut pipeline, _) = pipeline(64);
        let scene = cube_scene();
        pipeline.render_frame(&scene, &camera()).unwrap();

        let controls = pipeline.controls();
        assert!(controls.send(ControlEvent::SetShowVoxels(false)));
        assert!(controls.send(ControlEvent::SetMipInterpolation(1.5)));
        assert!(pipeline.settings().show_voxels);

        let report = pipeline.render_frame(&scene, &camera()).unwrap();
        assert!(!report.revoxelized);
        assert!(matches!(
            report.draw,
            DrawCall::Scene { submeshes: 1, mip_interpolation, .. } if (mip_interpolation - 1.5).abs() < 1e-6
        ));
    }

    #[test]
    fn test_voxel_size_change_resizes_grid() {
        let (mut pipeline, _) = pipeline(64);
        let scene = cube_scene();
        pipeline.render_frame(&scene, &camera()).unwrap();

        pipeline.controls().send(ControlEvent::SetVoxelSize(0.5));
        let report = pipeline.render_frame(&scene, &camera()).unwrap();
        assert!(report.revoxelized);
        assert!((pipeline.backend().grid().voxel_size() - 0.5).abs() < f32::EPSILON);
        assert!(report.drawn_instances().is_some_and(|n| n > 8));
    }

    #[test]
    fn test_settings_follow_grid_voxel_size() {
        let backend = SoftwareBackend::new(VoxelGrid::new(16, 0.5, 4), 1024);
        let mut pipeline = VoxelPipeline::new(backend, VoxelSettings::default());
        assert!((pipeline.settings().voxel_size - 0.5).abs() < f32::EPSILON);

        let scene = cube_scene();
        pipeline.render_frame(&scene, &camera()).unwrap();
        pipeline.controls().send(ControlEvent::SetVoxelSize(1.0));
        let report = pipeline.render_frame(&scene, &camera()).unwrap();

        assert!(report.revoxelized);
        assert!((pipeline.backend().grid().voxel_size() - 1.0).abs() < f32::EPSILON);
        assert!((pipeline.settings().voxel_size - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_invalid_event_warns_and_keeps_settings() {
        let (mut pipeline, ui) = pipeline(64);
        pipeline.controls().send(ControlEvent::SetVoxelSize(f32::NAN));
        pipeline.render_frame(&cube_scene(), &camera()).unwrap();
        assert!((pipeline.settings().voxel_size - VoxelSettings::default().voxel_size).abs() < f32::EPSILON);
        assert_eq!(ui.warnings().len(), 1);
    }

    #[test]
    fn test_debug_mip_clamped() {
        let (mut pipeline, ui) = pipeline(64);
        pipeline.controls().send(ControlEvent::SetDebugMipLevel(9));
        let report = pipeline.render_frame(&cube_scene(), &camera()).unwrap();
        assert!(matches!(report.draw, DrawCall::Voxels { mip: 3, .. }));
        assert!(ui.warnings()[0].contains("debug mip 9"));
    }

    #[test]
    fn test_empty_scene_warns() {
        let (mut pipeline, ui) = pipeline(64);
        let report = pipeline.render_frame(&Scene::default(), &camera()).unwrap();
        assert!(matches!(
            report.draw,
            DrawCall::Voxels { instances: InstanceSource::Counted(0), .. }
        ));
        assert!(ui.warnings()[0].contains("no geometry"));
    }
}
