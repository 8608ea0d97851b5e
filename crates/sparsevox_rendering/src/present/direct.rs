//! Direct render stage.
//!
//! ```text
//!  pass 1  depth pre-pass   vs_depth, no fragment, depth write, Less
//!  pass 2  shading          vs_main + fs_main, depth Equal, no write
//! ```
//!
//! Shading samples the volume at the mip interpolation level for the
//! ambient term, or outputs the sample directly when `show_texture` is on.

use bytemuck::{Pod, Zeroable};

use super::target::{RenderTarget, CLEAR_COLOR, COLOR_FORMAT, DEPTH_FORMAT};
use crate::camera::CameraSnapshot;
use crate::error::RenderResult;
use crate::gpu::{self, shaders, GpuContext};
use crate::mesh::{DrawStrategy, GpuMeshGroup, Vertex};
use crate::volume::VolumeStore;

// Fields are only read by the shader.
#[allow(dead_code)]
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct SceneParams {
    view_proj: [[f32; 4]; 4],
    camera_pos: [f32; 4],
    light_pos: [f32; 4],
    volume_half_extent: f32,
    mip_interpolation: f32,
    show_texture: u32,
    _pad: u32,
}

/// Per-frame inputs of the direct render.
#[derive(Clone, Copy, Debug)]
pub struct SceneDraw<'a> {
    /// Frame camera.
    pub camera: &'a CameraSnapshot,
    /// Light position in world space.
    pub light_position: glam::Vec3,
    /// Volume sample level.
    pub mip_interpolation: f32,
    /// Output the raw volume sample.
    pub show_texture: bool,
}

/// Depth pre-pass plus depth-equal shading of mesh groups.
pub struct DirectRenderer {
    depth_pipeline: wgpu::RenderPipeline,
    shade_pipeline: wgpu::RenderPipeline,
    layout: wgpu::BindGroupLayout,
    params: wgpu::Buffer,
    sampler: wgpu::Sampler,
    strategy: DrawStrategy,
}

impl DirectRenderer {
    /// Builds both pipelines.
    ///
    /// # Errors
    ///
    /// Returns [`crate::RenderError::ResourceCreation`] if a pipeline is
    /// rejected.
    pub fn new(ctx: &GpuContext) -> RenderResult<Self> {
        let strategy = DrawStrategy::for_context(ctx);
        ctx.create_scoped("direct render pipelines", |device| {
            let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Direct Layout"),
                entries: &[
                    gpu::uniform_entry(0, wgpu::ShaderStages::VERTEX_FRAGMENT),
                    gpu::storage_entry(1, wgpu::ShaderStages::VERTEX, true),
                    gpu::storage_entry(2, wgpu::ShaderStages::FRAGMENT, true),
                    gpu::volume_texture_entry(3, wgpu::ShaderStages::FRAGMENT),
                    gpu::sampler_entry(4, wgpu::ShaderStages::FRAGMENT),
                ],
            });
            let module = shaders::module(device, "Direct", shaders::DIRECT);
            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Direct"),
                bind_group_layouts: &[&layout],
                push_constant_ranges: &[],
            });
            let primitive = wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: Some(wgpu::Face::Back),
                ..Default::default()
            };
            let depth = |write: bool, compare: wgpu::CompareFunction| wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: write,
                depth_compare: compare,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            };

            let depth_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("Depth Pre-pass"),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &module,
                    entry_point: "vs_depth",
                    buffers: &[Vertex::desc()],
                },
                fragment: None,
                primitive,
                depth_stencil: Some(depth(true, wgpu::CompareFunction::Less)),
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
            });
            let shade_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some("Direct Shade"),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &module,
                    entry_point: "vs_main",
                    buffers: &[Vertex::desc()],
                },
                fragment: Some(wgpu::FragmentState {
                    module: &module,
                    entry_point: "fs_main",
                    targets: &[Some(COLOR_FORMAT.into())],
                }),
                primitive,
                depth_stencil: Some(depth(false, wgpu::CompareFunction::Equal)),
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
            });

            Self {
                depth_pipeline,
                shade_pipeline,
                layout,
                params: device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some("Scene Params"),
                    size: std::mem::size_of::<SceneParams>() as u64,
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                }),
                sampler: device.create_sampler(&wgpu::SamplerDescriptor {
                    label: Some("Volume Sampler"),
                    address_mode_u: wgpu::AddressMode::ClampToEdge,
                    address_mode_v: wgpu::AddressMode::ClampToEdge,
                    address_mode_w: wgpu::AddressMode::ClampToEdge,
                    mag_filter: wgpu::FilterMode::Linear,
                    min_filter: wgpu::FilterMode::Linear,
                    mipmap_filter: wgpu::FilterMode::Linear,
                    ..Default::default()
                }),
                strategy,
            }
        })
    }

    /// Submission strategy picked for this device.
    #[must_use]
    pub const fn strategy(&self) -> DrawStrategy {
        self.strategy
    }

    /// Encodes the depth pre-pass and the shading pass for every group.
    pub fn encode(
        &self,
        ctx: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        target: &RenderTarget,
        store: &VolumeStore,
        groups: &[GpuMeshGroup],
        draw: &SceneDraw<'_>,
    ) {
        ctx.queue().write_buffer(
            &self.params,
            0,
            bytemuck::bytes_of(&SceneParams {
                view_proj: draw.camera.view_projection.to_cols_array_2d(),
                camera_pos: draw.camera.position.extend(1.0).to_array(),
                light_pos: draw.light_position.extend(1.0).to_array(),
                volume_half_extent: store.grid().half_extent(),
                mip_interpolation: draw.mip_interpolation,
                show_texture: u32::from(draw.show_texture),
                _pad: 0,
            }),
        );
        let bind_groups: Vec<wgpu::BindGroup> = groups
            .iter()
            .map(|group| {
                ctx.device().create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("Direct"),
                    layout: &self.layout,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: self.params.as_entire_binding(),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: group.transforms().as_entire_binding(),
                        },
                        wgpu::BindGroupEntry {
                            binding: 2,
                            resource: group.materials().as_entire_binding(),
                        },
                        wgpu::BindGroupEntry {
                            binding: 3,
                            resource: wgpu::BindingResource::TextureView(store.sampled_view()),
                        },
                        wgpu::BindGroupEntry {
                            binding: 4,
                            resource: wgpu::BindingResource::Sampler(&self.sampler),
                        },
                    ],
                })
            })
            .collect();

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Depth Pre-pass"),
                color_attachments: &[],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: target.depth_view(),
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&self.depth_pipeline);
            for (group, bind_group) in groups.iter().zip(&bind_groups) {
                pass.set_bind_group(0, bind_group, &[]);
                group.draw(&mut pass, self.strategy);
            }
        }

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Direct Shade"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target.color_view(),
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(CLEAR_COLOR),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: target.depth_view(),
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_pipeline(&self.shade_pipeline);
        for (group, bind_group) in groups.iter().zip(&bind_groups) {
            pass.set_bind_group(0, bind_group, &[]);
            group.draw(&mut pass, self.strategy);
        }
    }
}
