//! GPU voxelization pass.
//!
//! One render pass per voxelization, no depth, no blending, no culling.
//! The color attachment is an `N×N` throwaway target with writes masked
//! off; the only output is the fragment stage's `atomicMax` into the
//! occupancy buffer.

use bytemuck::{Pod, Zeroable};

use crate::error::RenderResult;
use crate::gpu::{self, shaders, GpuContext};
use crate::mesh::GpuMeshGroup;
use crate::volume::{VolumeStore, VoxelGrid};

const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R8Unorm;

// Fields are only read by the shader.
#[allow(dead_code)]
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct VoxelizeParams {
    voxel_space: [[f32; 4]; 4],
    dims: u32,
    _pad: [u32; 3],
}

/// Rasterizes mesh groups into the volume store.
pub struct Voxelizer {
    pipeline: wgpu::RenderPipeline,
    layout: wgpu::BindGroupLayout,
    params: wgpu::Buffer,
    target: wgpu::TextureView,
    target_dims: u32,
}

impl Voxelizer {
    /// Builds the pipeline and the throwaway attachment for `grid`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::RenderError::ResourceCreation`] if the pipeline or
    /// attachment is rejected.
    pub fn new(ctx: &GpuContext, grid: &VoxelGrid) -> RenderResult<Self> {
        ctx.create_scoped("voxelization pipeline", |device| {
            let visible = wgpu::ShaderStages::VERTEX;
            let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Voxelize Layout"),
                entries: &[
                    gpu::uniform_entry(0, wgpu::ShaderStages::VERTEX_FRAGMENT),
                    gpu::storage_entry(1, visible, true),
                    gpu::storage_entry(2, visible, true),
                    gpu::storage_entry(3, visible, true),
                    gpu::storage_entry(4, visible, true),
                    gpu::storage_entry(5, visible, true),
                    gpu::storage_entry(6, wgpu::ShaderStages::FRAGMENT, false),
                ],
            });
            let module = shaders::module(device, "Voxelize", shaders::VOXELIZE);
            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Voxelize"),
                bind_group_layouts: &[&layout],
                push_constant_ranges: &[],
            });
            let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("Voxelize"),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &module,
                    entry_point: "vs_main",
                    buffers: &[],
                },
                fragment: Some(wgpu::FragmentState {
                    module: &module,
                    entry_point: "fs_main",
                    targets: &[Some(wgpu::ColorTargetState {
                        format: TARGET_FORMAT,
                        blend: None,
                        write_mask: wgpu::ColorWrites::empty(),
                    })],
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    cull_mode: None,
                    ..Default::default()
                },
                depth_stencil: None,
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
            });
            let params = device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("Voxelize Params"),
                size: std::mem::size_of::<VoxelizeParams>() as u64,
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            });
            Self {
                pipeline,
                layout,
                params,
                target: Self::create_target(device, grid.dims()),
                target_dims: grid.dims(),
            }
        })
    }

    fn create_target(device: &wgpu::Device, dims: u32) -> wgpu::TextureView {
        device
            .create_texture(&wgpu::TextureDescriptor {
                label: Some("Voxelize Target"),
                size: wgpu::Extent3d {
                    width: dims,
                    height: dims,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: TARGET_FORMAT,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                view_formats: &[],
            })
            .create_view(&wgpu::TextureViewDescriptor::default())
    }

    /// Encodes the voxelization of every group into `store`.
    ///
    /// The store must have been cleared earlier in the same encoder.
    pub fn encode(
        &mut self,
        ctx: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        store: &VolumeStore,
        groups: &[GpuMeshGroup],
    ) {
        let grid = store.grid();
        if grid.dims() != self.target_dims {
            self.target = Self::create_target(ctx.device(), grid.dims());
            self.target_dims = grid.dims();
        }
        ctx.queue().write_buffer(
            &self.params,
            0,
            bytemuck::bytes_of(&VoxelizeParams {
                voxel_space: grid.voxel_space_transform().to_cols_array_2d(),
                dims: grid.dims(),
                _pad: [0; 3],
            }),
        );

        // Bind groups outlive the pass that borrows them.
        let bind_groups: Vec<wgpu::BindGroup> = groups
            .iter()
            .map(|group| {
                let buffers = [
                    &self.params,
                    group.vertices(),
                    group.indices(),
                    group.transforms(),
                    group.draw_commands(),
                    group.materials(),
                    store.occupancy(),
                ];
                let entries: Vec<wgpu::BindGroupEntry> = buffers
                    .iter()
                    .enumerate()
                    .map(|(binding, buffer)| wgpu::BindGroupEntry {
                        binding: binding as u32,
                        resource: buffer.as_entire_binding(),
                    })
                    .collect();
                ctx.device().create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("Voxelize"),
                    layout: &self.layout,
                    entries: &entries,
                })
            })
            .collect();

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Voxelize"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &self.target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Discard,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_pipeline(&self.pipeline);
        for (group, bind_group) in groups.iter().zip(&bind_groups) {
            pass.set_bind_group(0, bind_group, &[]);
            // Non-indexed: each vertex invocation pulls its own triangle.
            for command in group.commands() {
                let submesh = command.first_instance;
                pass.draw(0..command.index_count, submesh..submesh + 1);
            }
        }
    }
}
