//! # Stage Backends
//!
//! A [`VoxelBackend`] runs the five pipeline stages. [`GpuBackend`] records
//! them into one wgpu command encoder per frame; [`SoftwareBackend`] runs
//! them on the CPU with the same results.

pub mod gpu;
pub mod software;
pub mod stage;

pub use gpu::GpuBackend;
pub use software::{SoftwareBackend, StageCounts};
pub use stage::{Compacted, VolumeCleared, VolumeReady, VolumeWritten};

use sparsevox_shared::VoxelSettings;

use crate::camera::CameraSnapshot;
use crate::error::RenderResult;
use crate::instancing::CounterSnapshot;
use crate::scene::Scene;
use crate::volume::VoxelGrid;

/// Where a voxel draw's instance count came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InstanceSource {
    /// Known on the CPU when the draw was issued.
    Counted(u32),
    /// Read by the GPU from indirect args.
    Indirect,
}

/// Summary of the one draw a frame issued.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DrawCall {
    /// Instanced voxel cubes.
    Voxels {
        /// Instance count source.
        instances: InstanceSource,
        /// Compacted mip.
        mip: u32,
        /// Cube edge length.
        voxel_size: f32,
        /// Edges only.
        wireframe: bool,
    },
    /// Depth pre-pass + shaded scene.
    Scene {
        /// Submeshes drawn.
        submeshes: usize,
        /// Volume sample level.
        mip_interpolation: f32,
        /// Raw volume output.
        show_texture: bool,
    },
}

/// The pipeline stages over some volume store.
pub trait VoxelBackend {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Grid of the current volume.
    fn grid(&self) -> &VoxelGrid;

    /// Adopts a new grid (voxel size change). The volume content is
    /// undefined afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if the volume must be reallocated and that fails.
    fn resize_volume(&mut self, grid: VoxelGrid) -> RenderResult<()>;

    /// Mirrors scene changes into backend resources.
    ///
    /// # Errors
    ///
    /// Returns an error if a GPU upload fails.
    fn sync_scene(&mut self, scene: &Scene) -> RenderResult<()>;

    /// Writes the empty sentinel to every cell.
    fn clear_volume(&mut self) -> VolumeCleared;

    /// Rasterizes every mesh group into the base level.
    fn voxelize(&mut self, cleared: VolumeCleared, scene: &Scene) -> VolumeWritten;

    /// Rebuilds the mip chain from the base level.
    fn generate_mipmaps(&mut self, written: VolumeWritten) -> VolumeReady;

    /// Resets the counters and appends every visible voxel of `mip`.
    ///
    /// # Errors
    ///
    /// Returns an error if a blocking counter readback fails.
    fn compact(
        &mut self,
        ready: &VolumeReady,
        camera: &CameraSnapshot,
        mip: u32,
        frame: u64,
    ) -> RenderResult<Compacted>;

    /// Draws the compacted instances as cubes.
    ///
    /// # Errors
    ///
    /// Returns an error if the render target is unavailable.
    fn draw_voxels(
        &mut self,
        compacted: Compacted,
        camera: &CameraSnapshot,
        wireframe: bool,
    ) -> RenderResult<DrawCall>;

    /// Draws the scene with the depth pre-pass and volume-sampled shading.
    ///
    /// # Errors
    ///
    /// Returns an error if the render target is unavailable.
    fn draw_scene(
        &mut self,
        ready: &VolumeReady,
        scene: &Scene,
        camera: &CameraSnapshot,
        settings: &VoxelSettings,
    ) -> RenderResult<DrawCall>;

    /// Submits the frame. Returns every counter snapshot that became
    /// available, oldest first. They may belong to earlier frames; each
    /// compacted frame's counters are returned exactly once.
    ///
    /// # Errors
    ///
    /// Returns an error if a counter readback failed.
    fn finish_frame(&mut self, frame: u64) -> RenderResult<Vec<CounterSnapshot>>;
}
