//! Visualization stage: every compacted voxel as one instance of a cube.

use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use super::target::{RenderTarget, CLEAR_COLOR, COLOR_FORMAT, DEPTH_FORMAT};
use crate::camera::CameraSnapshot;
use crate::error::RenderResult;
use crate::gpu::{self, shaders, GpuContext};
use crate::instancing::InstanceBuffer;
use crate::mesh::primitives::{unit_cube, CUBE_INDEX_COUNT};
use crate::mesh::Vertex;
use crate::volume::VoxelGrid;

// Fields are only read by the shader.
#[allow(dead_code)]
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct CubeParams {
    view_proj: [[f32; 4]; 4],
    dims: u32,
    mip: u32,
    voxel_size: f32,
    _pad: u32,
}

/// Where the cube draw takes its instance count from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InstanceCount {
    /// `draw_indexed_indirect` with the args written by compaction.
    Indirect,
    /// `draw_indexed` with a count already read back on the CPU.
    Known(u32),
}

/// Per-frame inputs of the cube draw.
#[derive(Clone, Copy, Debug)]
pub struct VoxelDraw<'a> {
    /// Frame camera.
    pub camera: &'a CameraSnapshot,
    /// Grid the instances were compacted from.
    pub grid: &'a VoxelGrid,
    /// Compacted mip.
    pub mip: u32,
    /// Instance count source.
    pub count: InstanceCount,
    /// Draw edges only.
    pub wireframe: bool,
}

/// Instanced cube renderer.
pub struct VoxelVisualizer {
    fill: wgpu::RenderPipeline,
    /// `None` without `POLYGON_MODE_LINE`.
    wireframe: Option<wgpu::RenderPipeline>,
    layout: wgpu::BindGroupLayout,
    params: wgpu::Buffer,
    cube_vertices: wgpu::Buffer,
    cube_indices: wgpu::Buffer,
}

impl VoxelVisualizer {
    /// Builds the cube mesh and pipelines.
    ///
    /// # Errors
    ///
    /// Returns [`crate::RenderError::ResourceCreation`] if a pipeline is
    /// rejected.
    pub fn new(ctx: &GpuContext) -> RenderResult<Self> {
        let line_mode = ctx.supports(wgpu::Features::POLYGON_MODE_LINE);
        ctx.create_scoped("voxel visualization", |device| {
            let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Voxel Cubes Layout"),
                entries: &[
                    gpu::uniform_entry(0, wgpu::ShaderStages::VERTEX),
                    gpu::storage_entry(1, wgpu::ShaderStages::VERTEX, true),
                ],
            });
            let module = shaders::module(device, "Voxel Cubes", shaders::VOXEL_CUBES);
            let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Voxel Cubes"),
                bind_group_layouts: &[&layout],
                push_constant_ranges: &[],
            });
            let pipeline = |label: &str, polygon_mode: wgpu::PolygonMode| {
                device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                    label: Some(label),
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
                    primitive: wgpu::PrimitiveState {
                        topology: wgpu::PrimitiveTopology::TriangleList,
                        front_face: wgpu::FrontFace::Ccw,
                        cull_mode: Some(wgpu::Face::Back),
                        polygon_mode,
                        ..Default::default()
                    },
                    depth_stencil: Some(wgpu::DepthStencilState {
                        format: DEPTH_FORMAT,
                        depth_write_enabled: true,
                        depth_compare: wgpu::CompareFunction::Less,
                        stencil: wgpu::StencilState::default(),
                        bias: wgpu::DepthBiasState::default(),
                    }),
                    multisample: wgpu::MultisampleState::default(),
                    multiview: None,
                })
            };

            let (vertices, indices) = unit_cube();
            Self {
                fill: pipeline("Voxel Cubes", wgpu::PolygonMode::Fill),
                wireframe: line_mode.then(|| pipeline("Voxel Cubes (wire)", wgpu::PolygonMode::Line)),
                params: device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some("Voxel Cubes Params"),
                    size: std::mem::size_of::<CubeParams>() as u64,
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                }),
                cube_vertices: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Cube Vertices"),
                    contents: bytemuck::cast_slice(&vertices),
                    usage: wgpu::BufferUsages::VERTEX,
                }),
                cube_indices: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some("Cube Indices"),
                    contents: bytemuck::cast_slice(&indices),
                    usage: wgpu::BufferUsages::INDEX,
                }),
                layout,
            }
        })
    }

    /// True if wireframe drawing is available.
    #[must_use]
    pub const fn supports_wireframe(&self) -> bool {
        self.wireframe.is_some()
    }

    /// Encodes the single instanced cube draw into `target`.
    pub fn encode(
        &self,
        ctx: &GpuContext,
        encoder: &mut wgpu::CommandEncoder,
        target: &RenderTarget,
        instances: &InstanceBuffer,
        draw: &VoxelDraw<'_>,
    ) {
        ctx.queue().write_buffer(
            &self.params,
            0,
            bytemuck::bytes_of(&CubeParams {
                view_proj: draw.camera.view_projection.to_cols_array_2d(),
                dims: draw.grid.dims_at_mip(draw.mip),
                mip: draw.mip,
                voxel_size: draw.grid.voxel_size_at_mip(draw.mip),
                _pad: 0,
            }),
        );
        let bind_group = ctx.device().create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Voxel Cubes"),
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.params.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: instances.instances().as_entire_binding(),
                },
            ],
        });
        let pipeline = match (&self.wireframe, draw.wireframe) {
            (Some(wire), true) => wire,
            _ => &self.fill,
        };

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Voxel Cubes"),
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
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_pipeline(pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.set_vertex_buffer(0, self.cube_vertices.slice(..));
        pass.set_index_buffer(self.cube_indices.slice(..), wgpu::IndexFormat::Uint32);
        match draw.count {
            InstanceCount::Indirect => pass.draw_indexed_indirect(instances.args(), 0),
            InstanceCount::Known(count) => {
                let count = count.min(instances.capacity());
                if count > 0 {
                    pass.draw_indexed(0..CUBE_INDEX_COUNT, 0, 0..count);
                }
            }
        }
    }
}
