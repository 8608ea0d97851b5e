//! Vertex, material and draw-command layouts shared with WGSL.

use bytemuck::{Pod, Zeroable};

// =============================================================================
// VERTEX FORMAT
// =============================================================================

/// Mesh vertex. The voxelizer reads these as a flat `array<f32>`, 8 floats
/// per vertex, so the layout must stay tightly packed.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    /// Object-space position
    pub position: [f32; 3],
    /// Object-space normal
    pub normal: [f32; 3],
    /// Texture coordinates
    pub uv: [f32; 2],
}

impl Vertex {
    /// Floats per vertex.
    pub const FLOATS: usize = 8;

    /// Vertex buffer layout for WGPU
    pub const ATTRIBS: [wgpu::VertexAttribute; 3] = wgpu::vertex_attr_array![
        0 => Float32x3,  // position
        1 => Float32x3,  // normal
        2 => Float32x2,  // uv
    ];

    /// Creates a vertex.
    #[must_use]
    pub const fn new(position: [f32; 3], normal: [f32; 3], uv: [f32; 2]) -> Self {
        Self {
            position,
            normal,
            uv,
        }
    }

    /// Vertex buffer layout descriptor
    #[must_use]
    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Self>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBS,
        }
    }
}

// =============================================================================
// MATERIAL
// =============================================================================

/// Per-submesh surface parameters. Matches `struct Material` in WGSL.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct Material {
    /// Base color, linear RGBA. RGB is also the voxel color.
    pub albedo: [f32; 4],
    /// Emitted radiance (RGB), w unused
    pub emissive: [f32; 4],
    /// 0 = dielectric, 1 = metal
    pub metallic: f32,
    /// 0 = mirror, 1 = fully rough
    pub roughness: f32,
    /// Ambient occlusion factor
    pub ao: f32,
    /// Opacity multiplier
    pub transparency: f32,
}

impl Material {
    /// Grey dielectric.
    pub const DEFAULT: Self = Self {
        albedo: [1.0, 1.0, 1.0, 1.0],
        emissive: [0.0; 4],
        metallic: 0.1,
        roughness: 0.5,
        ao: 1.0,
        transparency: 1.0,
    };

    /// Default material with a different base color.
    #[must_use]
    pub const fn with_albedo(albedo: [f32; 4]) -> Self {
        Self {
            albedo,
            ..Self::DEFAULT
        }
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::DEFAULT
    }
}

// =============================================================================
// INDIRECT COMMANDS
// =============================================================================

/// `DrawIndexedIndirect` arguments, also the per-submesh draw command.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct DrawIndexedIndirectArgs {
    /// Indices to draw.
    pub index_count: u32,
    /// Number of instances to draw.
    pub instance_count: u32,
    /// First index.
    pub first_index: u32,
    /// Added to each index.
    pub base_vertex: i32,
    /// First instance. Submeshes use their own index here so shaders can
    /// look up per-submesh data by `instance_index`.
    pub first_instance: u32,
}

impl DrawIndexedIndirectArgs {
    /// Size in bytes.
    pub const SIZE: u64 = std::mem::size_of::<Self>() as u64;
}
