//! CPU backend.
//!
//! Runs every stage on the calling thread with rayon for the data-parallel
//! parts. Deterministic, so tests use it to check pipeline behavior
//! without a GPU.

use sparsevox_shared::{EngineConfig, VoxelSettings};

use super::stage::{Compacted, VolumeCleared, VolumeReady, VolumeWritten};
use super::{DrawCall, InstanceSource, VoxelBackend};
use crate::camera::CameraSnapshot;
use crate::compaction;
use crate::error::RenderResult;
use crate::instancing::{CounterSnapshot, InstanceList};
use crate::scene::Scene;
use crate::voxelizer;
use crate::volume::{CpuVolume, VoxelGrid};

/// Stage counters, for tests that check gating.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StageCounts {
    /// `clear_volume` calls.
    pub clears: u64,
    /// `voxelize` calls.
    pub voxelizations: u64,
    /// `compact` calls.
    pub compactions: u64,
    /// Draws of either kind.
    pub draws: u64,
}

/// The pipeline on the CPU.
pub struct SoftwareBackend {
    volume: CpuVolume,
    instances: InstanceList,
    counts: StageCounts,
}

impl SoftwareBackend {
    /// Backend for `grid` with room for `capacity` instances.
    #[must_use]
    pub fn new(grid: VoxelGrid, capacity: u32) -> Self {
        Self {
            volume: CpuVolume::new(grid),
            instances: InstanceList::new(capacity),
            counts: StageCounts::default(),
        }
    }

    /// Backend sized by a startup config.
    #[must_use]
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(VoxelGrid::from_config(config), config.instance_capacity)
    }

    /// The volume, as of the last completed stage.
    #[must_use]
    pub const fn volume(&self) -> &CpuVolume {
        &self.volume
    }

    /// Instances written by the last compaction.
    #[must_use]
    pub const fn instances(&self) -> &InstanceList {
        &self.instances
    }

    /// How often each stage ran.
    #[must_use]
    pub const fn stage_counts(&self) -> StageCounts {
        self.counts
    }
}

impl VoxelBackend for SoftwareBackend {
    fn name(&self) -> &'static str {
        "software"
    }

    fn grid(&self) -> &VoxelGrid {
        self.volume.grid()
    }

    fn resize_volume(&mut self, grid: VoxelGrid) -> RenderResult<()> {
        self.volume.set_grid(grid);
        Ok(())
    }

    fn sync_scene(&mut self, _scene: &Scene) -> RenderResult<()> {
        // reads the scene directly
        Ok(())
    }

    fn clear_volume(&mut self) -> VolumeCleared {
        self.volume.clear();
        self.counts.clears += 1;
        VolumeCleared::new()
    }

    fn voxelize(&mut self, _cleared: VolumeCleared, scene: &Scene) -> VolumeWritten {
        let triangles = voxelizer::software::voxelize(&self.volume, scene.groups());
        self.counts.voxelizations += 1;
        tracing::debug!(triangles, "software voxelization");
        VolumeWritten::new()
    }

    fn generate_mipmaps(&mut self, _written: VolumeWritten) -> VolumeReady {
        self.volume.generate_mipmaps();
        VolumeReady::new()
    }

    fn compact(
        &mut self,
        _ready: &VolumeReady,
        camera: &CameraSnapshot,
        mip: u32,
        frame: u64,
    ) -> RenderResult<Compacted> {
        let counters = compaction::software::compact(&self.volume, &camera.frustum, mip, &mut self.instances, frame);
        self.counts.compactions += 1;
        Ok(Compacted::new(mip, Some(counters)))
    }

    fn draw_voxels(
        &mut self,
        compacted: Compacted,
        _camera: &CameraSnapshot,
        wireframe: bool,
    ) -> RenderResult<DrawCall> {
        self.counts.draws += 1;
        let stored = compacted.counters().map_or(0, |c| c.stored());
        Ok(DrawCall::Voxels {
            instances: InstanceSource::Counted(stored),
            mip: compacted.mip(),
            voxel_size: self.volume.grid().voxel_size_at_mip(compacted.mip()),
            wireframe,
        })
    }

    fn draw_scene(
        &mut self,
        _ready: &VolumeReady,
        scene: &Scene,
        _camera: &CameraSnapshot,
        settings: &VoxelSettings,
    ) -> RenderResult<DrawCall> {
        self.counts.draws += 1;
        Ok(DrawCall::Scene {
            submeshes: scene.submesh_count(),
            mip_interpolation: settings.mip_interpolation,
            show_texture: settings.show_texture,
        })
    }

    fn finish_frame(&mut self, _frame: u64) -> RenderResult<Vec<CounterSnapshot>> {
        // counters were already returned by `compact`
        Ok(Vec::new())
    }
}
