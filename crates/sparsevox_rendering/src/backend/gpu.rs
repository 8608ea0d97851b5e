//! wgpu backend.
//!
//! Every stage records into one command encoder; the encoder is submitted
//! once per frame in [`VoxelBackend::finish_frame`], or early when the
//! mapped count readback needs the counters before the draw. Pass
//! boundaries inside the encoder are the barriers between stages.
//!
//! In the indirect count mode every frame's counters are copied into a
//! ring of readback buffers and mapped without blocking. A frame only
//! waits when every slot is still mapping.

use std::collections::VecDeque;

use sparsevox_shared::{CountReadback, EngineConfig, VoxelSettings};

use super::stage::{Compacted, VolumeCleared, VolumeReady, VolumeWritten};
use super::{DrawCall, InstanceSource, VoxelBackend};
use crate::camera::CameraSnapshot;
use crate::compaction::Compactor;
use crate::error::RenderResult;
use crate::gpu::readback::PendingReadback;
use crate::gpu::{GpuContext, MappedView};
use crate::instancing::{CounterSnapshot, InstanceBuffer, READBACK_SLOTS};
use crate::mesh::GpuMeshGroup;
use crate::present::{DirectRenderer, InstanceCount, RenderTarget, SceneDraw, VoxelDraw, VoxelVisualizer};
use crate::scene::Scene;
use crate::voxelizer::Voxelizer;
use crate::volume::{VolumeStore, VoxelGrid};

/// The pipeline on a wgpu device.
pub struct GpuBackend {
    ctx: GpuContext,
    store: VolumeStore,
    voxelizer: Voxelizer,
    compactor: Compactor,
    instances: InstanceBuffer,
    visualizer: VoxelVisualizer,
    direct: DirectRenderer,
    target: RenderTarget,
    groups: Vec<GpuMeshGroup>,
    synced_revision: Option<u64>,
    readback: CountReadback,
    encoder: Option<wgpu::CommandEncoder>,
    /// In-flight maps of readback slots, oldest first.
    pending: VecDeque<PendingReadback>,
    /// Frame and slot whose counters were copied this frame, mapped after submit.
    copied: Option<(u64, usize)>,
    /// Counters collected early because the ring was full.
    collected: Vec<CounterSnapshot>,
}

impl GpuBackend {
    /// Allocates every stage's resources on `ctx`.
    ///
    /// # Errors
    ///
    /// Returns the first resource creation failure. Nothing is retried.
    pub fn new(ctx: GpuContext, config: &EngineConfig) -> RenderResult<Self> {
        config.validate()?;
        let grid = VoxelGrid::from_config(config);
        let store = VolumeStore::allocate(&ctx, &grid)?;
        let voxelizer = Voxelizer::new(&ctx, &grid)?;
        let compactor = Compactor::new(&ctx)?;
        let instances = InstanceBuffer::allocate(&ctx, config.instance_capacity)?;
        let visualizer = VoxelVisualizer::new(&ctx)?;
        let direct = DirectRenderer::new(&ctx)?;
        let target = RenderTarget::new(&ctx, config.render_width, config.render_height)?;
        tracing::info!(
            adapter = %ctx.adapter_info().name,
            strategy = ?direct.strategy(),
            wireframe = visualizer.supports_wireframe(),
            readback = ?config.count_readback,
            "GPU backend ready"
        );
        Ok(Self {
            ctx,
            store,
            voxelizer,
            compactor,
            instances,
            visualizer,
            direct,
            target,
            groups: Vec::new(),
            synced_revision: None,
            readback: config.count_readback,
            encoder: None,
            pending: VecDeque::with_capacity(READBACK_SLOTS),
            copied: None,
            collected: Vec::new(),
        })
    }

    /// The device.
    #[must_use]
    pub const fn context(&self) -> &GpuContext {
        &self.ctx
    }

    /// The offscreen target frames are drawn into.
    #[must_use]
    pub const fn target(&self) -> &RenderTarget {
        &self.target
    }

    /// Counter readbacks still mapping.
    #[must_use]
    pub fn pending_readbacks(&self) -> usize {
        self.pending.len()
    }

    /// Copies one mip of the volume back to the CPU. Blocks.
    ///
    /// # Errors
    ///
    /// Returns [`crate::RenderError::BufferMap`] if mapping fails.
    pub fn read_volume_level(&mut self, mip: u32) -> RenderResult<Vec<u32>> {
        self.submit();
        self.store.read_level(&self.ctx, mip)
    }

    fn take_encoder(&mut self) -> wgpu::CommandEncoder {
        self.encoder.take().unwrap_or_else(|| {
            self.ctx
                .device()
                .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("Frame") })
        })
    }

    fn submit(&mut self) {
        if let Some(encoder) = self.encoder.take() {
            self.ctx.queue().submit(Some(encoder.finish()));
        }
    }

    fn read_counters_blocking(&self, frame: u64) -> RenderResult<CounterSnapshot> {
        let mapped = MappedView::map_blocking(self.ctx.device(), self.instances.readback(0), "counter readback")?;
        Ok(self.instances.decode_counters(mapped.words(), frame))
    }

    /// A readback slot nothing is mapping. With every slot busy, waits for
    /// the oldest map and keeps its counters for `finish_frame`.
    fn free_slot(&mut self) -> RenderResult<usize> {
        if let Some(slot) = (0..READBACK_SLOTS).find(|&slot| self.pending.iter().all(|p| p.slot != slot)) {
            return Ok(slot);
        }
        let Some(oldest) = self.pending.pop_front() else {
            return Ok(0);
        };
        let words = oldest.wait(self.ctx.device(), self.instances.readback(oldest.slot))?;
        tracing::debug!(frame = oldest.frame, "counter readback ring full");
        self.collected.push(self.instances.decode_counters(&words, oldest.frame));
        Ok(oldest.slot)
    }
}

impl VoxelBackend for GpuBackend {
    fn name(&self) -> &'static str {
        "gpu"
    }

    fn grid(&self) -> &VoxelGrid {
        self.store.grid()
    }

    fn resize_volume(&mut self, grid: VoxelGrid) -> RenderResult<()> {
        if self.store.is_compatible(&grid) {
            self.store.set_voxel_size(grid.voxel_size());
        } else {
            self.submit();
            self.store = VolumeStore::allocate(&self.ctx, &grid)?;
        }
        Ok(())
    }

    fn sync_scene(&mut self, scene: &Scene) -> RenderResult<()> {
        let revision = scene.content_revision();
        if self.synced_revision == Some(revision) {
            return Ok(());
        }
        if self.groups.len() == scene.groups().len() {
            for (gpu, group) in self.groups.iter_mut().zip(scene.groups()) {
                gpu.sync(&self.ctx, group)?;
            }
        } else {
            self.groups = scene
                .groups()
                .iter()
                .map(|group| GpuMeshGroup::upload(&self.ctx, group))
                .collect::<RenderResult<_>>()?;
        }
        self.synced_revision = Some(revision);
        Ok(())
    }

    fn clear_volume(&mut self) -> VolumeCleared {
        let mut encoder = self.take_encoder();
        self.store.encode_clear(&mut encoder);
        self.encoder = Some(encoder);
        VolumeCleared::new()
    }

    fn voxelize(&mut self, _cleared: VolumeCleared, _scene: &Scene) -> VolumeWritten {
        let mut encoder = self.take_encoder();
        self.voxelizer
            .encode(&self.ctx, &mut encoder, &self.store, &self.groups);
        self.encoder = Some(encoder);
        VolumeWritten::new()
    }

    fn generate_mipmaps(&mut self, _written: VolumeWritten) -> VolumeReady {
        let mut encoder = self.take_encoder();
        self.store.encode_generate_mipmaps(&mut encoder);
        self.encoder = Some(encoder);
        VolumeReady::new()
    }

    fn compact(
        &mut self,
        _ready: &VolumeReady,
        camera: &CameraSnapshot,
        mip: u32,
        frame: u64,
    ) -> RenderResult<Compacted> {
        let mapped = self.readback == CountReadback::Mapped;
        let slot = if mapped { 0 } else { self.free_slot()? };
        let mut encoder = self.take_encoder();
        self.compactor.encode(
            &self.ctx,
            &mut encoder,
            &self.store,
            &self.instances,
            &camera.frustum,
            mip,
            Some(self.instances.readback(slot)),
        );
        self.encoder = Some(encoder);

        if mapped {
            self.submit();
            let counters = self.read_counters_blocking(frame)?;
            return Ok(Compacted::new(mip, Some(counters)));
        }
        self.copied = Some((frame, slot));
        Ok(Compacted::new(mip, None))
    }

    fn draw_voxels(
        &mut self,
        compacted: Compacted,
        camera: &CameraSnapshot,
        wireframe: bool,
    ) -> RenderResult<DrawCall> {
        let (count, instances) = match compacted.counters() {
            Some(counters) => (
                InstanceCount::Known(counters.stored()),
                InstanceSource::Counted(counters.stored()),
            ),
            None => (InstanceCount::Indirect, InstanceSource::Indirect),
        };
        let grid = *self.store.grid();
        let mut encoder = self.take_encoder();
        self.visualizer.encode(
            &self.ctx,
            &mut encoder,
            &self.target,
            &self.instances,
            &VoxelDraw {
                camera,
                grid: &grid,
                mip: compacted.mip(),
                count,
                wireframe,
            },
        );
        self.encoder = Some(encoder);
        Ok(DrawCall::Voxels {
            instances,
            mip: compacted.mip(),
            voxel_size: grid.voxel_size_at_mip(compacted.mip()),
            wireframe: wireframe && self.visualizer.supports_wireframe(),
        })
    }

    fn draw_scene(
        &mut self,
        _ready: &VolumeReady,
        scene: &Scene,
        camera: &CameraSnapshot,
        settings: &VoxelSettings,
    ) -> RenderResult<DrawCall> {
        let mut encoder = self.take_encoder();
        self.direct.encode(
            &self.ctx,
            &mut encoder,
            &self.target,
            &self.store,
            &self.groups,
            &SceneDraw {
                camera,
                light_position: scene.light_position(),
                mip_interpolation: settings.mip_interpolation,
                show_texture: settings.show_texture,
            },
        );
        self.encoder = Some(encoder);
        Ok(DrawCall::Scene {
            submeshes: self.groups.iter().map(GpuMeshGroup::len).sum(),
            mip_interpolation: settings.mip_interpolation,
            show_texture: settings.show_texture,
        })
    }

    fn finish_frame(&mut self, _frame: u64) -> RenderResult<Vec<CounterSnapshot>> {
        self.submit();

        let mut ready = std::mem::take(&mut self.collected);
        while let Some(pending) = self.pending.front() {
            let Some(result) = pending.try_finish(self.ctx.device(), self.instances.readback(pending.slot)) else {
                break;
            };
            let frame = pending.frame;
            self.pending.pop_front();
            ready.push(self.instances.decode_counters(&result?, frame));
        }
        if let Some((frame, slot)) = self.copied.take() {
            let readback = self.instances.readback(slot);
            self.pending.push_back(PendingReadback::start(readback, frame, slot));
        }
        Ok(ready)
    }
}

impl Drop for GpuBackend {
    fn drop(&mut self) {
        self.submit();
        self.ctx.wait_idle();
    }
}
