//! GPU volume store.
//!
//! ```text
//!  occupancy: array<atomic<u32>>  (N³ packed RGBA8, 0 = empty)
//!        │  clear pass           writes 0 to every cell
//!        │  voxelize pass        atomicMax from fragments
//!        ▼
//!  resolve pass ──> volume mip 0 (Rgba8Unorm, 3D)
//!                        │ mip pass (one per level)
//!                        ▼
//!                   mip 1 .. mip L-1
//! ```
//!
//! Each arrow is a separate pass in the same command encoder; wgpu inserts
//! the memory barriers between passes.

use bytemuck::{Pod, Zeroable};

use sparsevox_shared::constants::workgroup_count;

use super::grid::VoxelGrid;
use crate::error::RenderResult;
use crate::gpu::{self, shaders, GpuContext, MappedView};

/// Texel format of the volume texture.
pub const VOLUME_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

// Fields are only read by the shader.
#[allow(dead_code)]
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, Pod, Zeroable)]
struct VolumeParams {
    dims: u32,
    _pad: [u32; 3],
}

/// The voxel texture, its mip chain and the atomic occupancy grid.
pub struct VolumeStore {
    grid: VoxelGrid,
    texture: wgpu::Texture,
    sampled_view: wgpu::TextureView,
    occupancy: wgpu::Buffer,
    // referenced by the clear and resolve bind groups
    _params: wgpu::Buffer,
    clear_pipeline: wgpu::ComputePipeline,
    clear_bind_group: wgpu::BindGroup,
    resolve_pipeline: wgpu::ComputePipeline,
    resolve_bind_group: wgpu::BindGroup,
    mip_pipeline: wgpu::ComputePipeline,
    /// `mip_bind_groups[i]` writes level `i + 1`.
    mip_bind_groups: Vec<wgpu::BindGroup>,
}

impl VolumeStore {
    /// Creates the backing texture, occupancy buffer and the passes that
    /// clear and downsample them.
    ///
    /// # Errors
    ///
    /// Returns [`crate::RenderError::ExceedsDeviceLimit`] if the grid is too
    /// large for the device, or [`crate::RenderError::ResourceCreation`] if
    /// the driver rejects an allocation.
    pub fn allocate(ctx: &GpuContext, grid: &VoxelGrid) -> RenderResult<Self> {
        let dims = grid.dims();
        let limits = ctx.limits();
        let occupancy_bytes = grid.cell_count(0) as u64 * 4;
        GpuContext::check_limit(
            "voxel volume edge",
            u64::from(dims),
            u64::from(limits.max_texture_dimension_3d),
        )?;
        GpuContext::check_limit(
            "occupancy binding",
            occupancy_bytes,
            u64::from(limits.max_storage_buffer_binding_size),
        )?;
        GpuContext::check_limit("occupancy buffer", occupancy_bytes, limits.max_buffer_size)?;

        let store = ctx.create_scoped("voxel volume", |device| {
            Self::build(device, ctx.queue(), grid, occupancy_bytes)
        })?;
        tracing::info!(
            dims,
            mips = grid.mip_levels(),
            occupancy_mb = occupancy_bytes >> 20,
            "volume store allocated"
        );
        Ok(store)
    }

    fn build(device: &wgpu::Device, queue: &wgpu::Queue, grid: &VoxelGrid, occupancy_bytes: u64) -> Self {
        let dims = grid.dims();
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Voxel Volume"),
            size: wgpu::Extent3d {
                width: dims,
                height: dims,
                depth_or_array_layers: dims,
            },
            mip_level_count: grid.mip_levels(),
            sample_count: 1,
            dimension: wgpu::TextureDimension::D3,
            format: VOLUME_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::STORAGE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let sampled_view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("Voxel Volume (all mips)"),
            dimension: Some(wgpu::TextureViewDimension::D3),
            ..Default::default()
        });
        let level_views: Vec<wgpu::TextureView> = (0..grid.mip_levels())
            .map(|mip| {
                texture.create_view(&wgpu::TextureViewDescriptor {
                    label: Some("Voxel Volume Level"),
                    dimension: Some(wgpu::TextureViewDimension::D3),
                    base_mip_level: mip,
                    mip_level_count: Some(1),
                    ..Default::default()
                })
            })
            .collect();

        let occupancy = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Voxel Occupancy"),
            size: occupancy_bytes,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let params = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Volume Params"),
            size: std::mem::size_of::<VolumeParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        queue.write_buffer(
            &params,
            0,
            bytemuck::bytes_of(&VolumeParams {
                dims,
                ..VolumeParams::default()
            }),
        );

        // Clear: params + occupancy
        let clear_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Volume Clear Layout"),
            entries: &[
                gpu::uniform_entry(0, wgpu::ShaderStages::COMPUTE),
                gpu::storage_entry(1, wgpu::ShaderStages::COMPUTE, false),
            ],
        });
        let clear_pipeline = gpu::compute_pipeline(device, "Volume Clear", shaders::CLEAR_VOLUME, &clear_layout);
        let clear_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Volume Clear"),
            layout: &clear_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: params.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: occupancy.as_entire_binding(),
                },
            ],
        });

        // Resolve: params + occupancy -> mip 0
        let resolve_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Volume Resolve Layout"),
            entries: &[
                gpu::uniform_entry(0, wgpu::ShaderStages::COMPUTE),
                gpu::storage_entry(1, wgpu::ShaderStages::COMPUTE, true),
                gpu::volume_storage_entry(2, VOLUME_FORMAT),
            ],
        });
        let resolve_pipeline =
            gpu::compute_pipeline(device, "Volume Resolve", shaders::RESOLVE_VOLUME, &resolve_layout);
        let resolve_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Volume Resolve"),
            layout: &resolve_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: params.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: occupancy.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&level_views[0]),
                },
            ],
        });

        // Mips: level L-1 (sampled) -> level L (storage)
        let mip_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Volume Mip Layout"),
            entries: &[
                gpu::volume_texture_entry(0, wgpu::ShaderStages::COMPUTE),
                gpu::volume_storage_entry(1, VOLUME_FORMAT),
            ],
        });
        let mip_pipeline = gpu::compute_pipeline(device, "Volume Mip", shaders::MIPMAP, &mip_layout);
        let mip_bind_groups = level_views
            .windows(2)
            .map(|pair| {
                device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("Volume Mip"),
                    layout: &mip_layout,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: wgpu::BindingResource::TextureView(&pair[0]),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: wgpu::BindingResource::TextureView(&pair[1]),
                        },
                    ],
                })
            })
            .collect();

        Self {
            grid: *grid,
            texture,
            sampled_view,
            occupancy,
            _params: params,
            clear_pipeline,
            clear_bind_group,
            resolve_pipeline,
            resolve_bind_group,
            mip_pipeline,
            mip_bind_groups,
        }
    }

    /// Grid this store was allocated for.
    #[must_use]
    pub const fn grid(&self) -> &VoxelGrid {
        &self.grid
    }

    /// True if `grid` can reuse this allocation (only the voxel size differs).
    #[must_use]
    pub fn is_compatible(&self, grid: &VoxelGrid) -> bool {
        grid.dims() == self.grid.dims() && grid.mip_levels() == self.grid.mip_levels()
    }

    /// Adopts a new voxel size. Texel layout is unchanged.
    pub fn set_voxel_size(&mut self, voxel_size: f32) {
        self.grid = self.grid.with_voxel_size(voxel_size);
    }

    /// Atomic occupancy grid written by the voxelizer.
    #[must_use]
    pub const fn occupancy(&self) -> &wgpu::Buffer {
        &self.occupancy
    }

    /// View over every mip, for sampling and compaction.
    #[must_use]
    pub const fn sampled_view(&self) -> &wgpu::TextureView {
        &self.sampled_view
    }

    /// Encodes the clear pass.
    pub fn encode_clear(&self, encoder: &mut wgpu::CommandEncoder) {
        let groups = workgroup_count(self.grid.dims());
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("Volume Clear"),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.clear_pipeline);
        pass.set_bind_group(0, &self.clear_bind_group, &[]);
        pass.dispatch_workgroups(groups, groups, groups);
    }

    /// Encodes the resolve pass and one pass per coarser mip level.
    pub fn encode_generate_mipmaps(&self, encoder: &mut wgpu::CommandEncoder) {
        {
            let groups = workgroup_count(self.grid.dims());
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Volume Resolve"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.resolve_pipeline);
            pass.set_bind_group(0, &self.resolve_bind_group, &[]);
            pass.dispatch_workgroups(groups, groups, groups);
        }
        for (index, bind_group) in self.mip_bind_groups.iter().enumerate() {
            let groups = workgroup_count(self.grid.dims_at_mip(index as u32 + 1));
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Volume Mip"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.mip_pipeline);
            pass.set_bind_group(0, bind_group, &[]);
            pass.dispatch_workgroups(groups, groups, groups);
        }
    }

    /// Copies one mip level back to the CPU as packed RGBA8 texels
    /// (x fastest). Blocks until the GPU is idle.
    ///
    /// # Errors
    ///
    /// Returns [`crate::RenderError::BufferMap`] if mapping fails.
    pub fn read_level(&self, ctx: &GpuContext, mip: u32) -> RenderResult<Vec<u32>> {
        let dims = self.grid.dims_at_mip(mip);
        let row_bytes = dims * 4;
        let padded_row = row_bytes.div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT)
            * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let staging = ctx.device().create_buffer(&wgpu::BufferDescriptor {
            label: Some("Volume Readback"),
            size: u64::from(padded_row) * u64::from(dims) * u64::from(dims),
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = ctx.device().create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Volume Readback"),
        });
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &self.texture,
                mip_level: mip,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &staging,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_row),
                    rows_per_image: Some(dims),
                },
            },
            wgpu::Extent3d {
                width: dims,
                height: dims,
                depth_or_array_layers: dims,
            },
        );
        ctx.queue().submit(Some(encoder.finish()));

        let mapped = MappedView::map_blocking(ctx.device(), &staging, "volume readback")?;
        let words_per_row = (padded_row / 4) as usize;
        let texels = mapped
            .words()
            .chunks(words_per_row)
            .flat_map(|row| row[..dims as usize].iter().copied())
            .collect();
        Ok(texels)
    }
}
