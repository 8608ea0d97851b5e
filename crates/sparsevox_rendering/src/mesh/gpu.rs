//! GPU-resident copy of a [`MeshGroup`].

use std::borrow::Cow;

use wgpu::util::DeviceExt;

use super::group::MeshGroup;
use super::vertex::DrawIndexedIndirectArgs;
use crate::error::RenderResult;
use crate::gpu::GpuContext;

// Storage bindings must not be empty; one mat4 is the largest element.
const MIN_BUFFER_SIZE: usize = 64;

/// How a group's submeshes are submitted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DrawStrategy {
    /// One `multi_draw_indexed_indirect` for every submesh.
    MultiDrawIndirect,
    /// One `draw_indexed_indirect` per submesh.
    Indirect,
    /// One `draw_indexed` per submesh with `first_instance = i`.
    Direct,
}

impl DrawStrategy {
    /// Best strategy the device supports.
    #[must_use]
    pub fn for_context(ctx: &GpuContext) -> Self {
        if ctx.supports(wgpu::Features::MULTI_DRAW_INDIRECT | wgpu::Features::INDIRECT_FIRST_INSTANCE) {
            Self::MultiDrawIndirect
        } else if ctx.supports(wgpu::Features::INDIRECT_FIRST_INSTANCE) {
            Self::Indirect
        } else {
            Self::Direct
        }
    }
}

/// Vertex, index, per-submesh and draw-command buffers for one group.
pub struct GpuMeshGroup {
    vertices: wgpu::Buffer,
    indices: wgpu::Buffer,
    transforms: wgpu::Buffer,
    materials: wgpu::Buffer,
    draw_commands: wgpu::Buffer,
    commands: Vec<DrawIndexedIndirectArgs>,
    vertex_count: usize,
    revision: u64,
}

impl GpuMeshGroup {
    /// Uploads every array of `group`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::RenderError::MeshGroupMismatch`] or
    /// [`crate::RenderError::InvalidSubmesh`] for an inconsistent group and
    /// [`crate::RenderError::ResourceCreation`] if an allocation fails.
    pub fn upload(ctx: &GpuContext, group: &MeshGroup) -> RenderResult<Self> {
        group.validate()?;
        let uploaded = ctx.create_scoped("mesh group buffers", |device| {
            let buffer = |label: &str, contents: &[u8], usage: wgpu::BufferUsages| {
                let contents: Cow<'_, [u8]> = if contents.len() < MIN_BUFFER_SIZE {
                    let mut padded = contents.to_vec();
                    padded.resize(MIN_BUFFER_SIZE, 0);
                    padded.into()
                } else {
                    contents.into()
                };
                device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(label),
                    contents: &contents,
                    usage,
                })
            };
            let storage = wgpu::BufferUsages::STORAGE;
            Self {
                vertices: buffer(
                    "Mesh Vertices",
                    bytemuck::cast_slice(group.vertices()),
                    wgpu::BufferUsages::VERTEX | storage,
                ),
                indices: buffer(
                    "Mesh Indices",
                    bytemuck::cast_slice(group.indices()),
                    wgpu::BufferUsages::INDEX | storage,
                ),
                transforms: buffer(
                    "Mesh Transforms",
                    bytemuck::cast_slice(group.transforms()),
                    storage | wgpu::BufferUsages::COPY_DST,
                ),
                materials: buffer(
                    "Mesh Materials",
                    bytemuck::cast_slice(group.materials()),
                    storage | wgpu::BufferUsages::COPY_DST,
                ),
                draw_commands: buffer(
                    "Mesh Draw Commands",
                    bytemuck::cast_slice(group.draw_commands()),
                    wgpu::BufferUsages::INDIRECT | storage,
                ),
                commands: group.draw_commands().to_vec(),
                vertex_count: group.vertices().len(),
                revision: group.revision(),
            }
        })?;
        tracing::debug!(group = group.name(), submeshes = group.len(), "mesh group uploaded");
        Ok(uploaded)
    }

    /// Brings the GPU copy up to date with `group`.
    ///
    /// Transform and material edits are written in place; anything that
    /// changed the buffer layout triggers a full re-upload.
    ///
    /// # Errors
    ///
    /// See [`GpuMeshGroup::upload`].
    pub fn sync(&mut self, ctx: &GpuContext, group: &MeshGroup) -> RenderResult<()> {
        if group.revision() == self.revision {
            return Ok(());
        }
        if group.draw_commands() != self.commands.as_slice() || group.vertices().len() != self.vertex_count {
            *self = Self::upload(ctx, group)?;
            return Ok(());
        }
        ctx.queue()
            .write_buffer(&self.transforms, 0, bytemuck::cast_slice(group.transforms()));
        ctx.queue()
            .write_buffer(&self.materials, 0, bytemuck::cast_slice(group.materials()));
        self.revision = group.revision();
        Ok(())
    }

    /// Number of submeshes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// True if the group has no submeshes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Per-submesh draw commands as uploaded.
    #[must_use]
    pub fn commands(&self) -> &[DrawIndexedIndirectArgs] {
        &self.commands
    }

    /// Vertex buffer (also bound as `array<f32>` by the voxelizer).
    #[must_use]
    pub const fn vertices(&self) -> &wgpu::Buffer {
        &self.vertices
    }

    /// Index buffer.
    #[must_use]
    pub const fn indices(&self) -> &wgpu::Buffer {
        &self.indices
    }

    /// `array<mat4x4<f32>>`, one per submesh.
    #[must_use]
    pub const fn transforms(&self) -> &wgpu::Buffer {
        &self.transforms
    }

    /// `array<Material>`, one per submesh.
    #[must_use]
    pub const fn materials(&self) -> &wgpu::Buffer {
        &self.materials
    }

    /// `array<DrawCommand>`, one per submesh.
    #[must_use]
    pub const fn draw_commands(&self) -> &wgpu::Buffer {
        &self.draw_commands
    }

    /// Binds the vertex and index buffers and draws every submesh.
    ///
    /// The caller sets the pipeline and bind groups; shaders find the
    /// submesh through `instance_index`.
    pub fn draw<'a>(&'a self, pass: &mut wgpu::RenderPass<'a>, strategy: DrawStrategy) {
        if self.commands.is_empty() {
            return;
        }
        pass.set_vertex_buffer(0, self.vertices.slice(..));
        pass.set_index_buffer(self.indices.slice(..), wgpu::IndexFormat::Uint32);
        match strategy {
            DrawStrategy::MultiDrawIndirect => {
                pass.multi_draw_indexed_indirect(&self.draw_commands, 0, self.commands.len() as u32);
            }
            DrawStrategy::Indirect => {
                for i in 0..self.commands.len() as u64 {
                    pass.draw_indexed_indirect(&self.draw_commands, i * DrawIndexedIndirectArgs::SIZE);
                }
            }
            DrawStrategy::Direct => {
                for command in &self.commands {
                    let first = command.first_index;
                    let instance = command.first_instance;
                    pass.draw_indexed(
                        first..first + command.index_count,
                        command.base_vertex,
                        instance..instance + command.instance_count,
                    );
                }
            }
        }
    }
}
