//! WGSL sources, embedded at build time.

/// Occupancy clear pass.
pub const CLEAR_VOLUME: &str = include_str!("../../shaders/clear_volume.wgsl");
/// Occupancy to RGBA8 resolve pass.
pub const RESOLVE_VOLUME: &str = include_str!("../../shaders/resolve_volume.wgsl");
/// One mip level downsample.
pub const MIPMAP: &str = include_str!("../../shaders/mipmap.wgsl");
/// Dominant-axis voxelization.
pub const VOXELIZE: &str = include_str!("../../shaders/voxelize.wgsl");
/// Frustum-culled compaction.
pub const COMPACT: &str = include_str!("../../shaders/compact.wgsl");
/// Counter to indirect args.
pub const FINALIZE_DRAW: &str = include_str!("../../shaders/finalize_draw.wgsl");
/// Instanced voxel cubes.
pub const VOXEL_CUBES: &str = include_str!("../../shaders/voxel_cubes.wgsl");
/// Depth pre-pass and direct shading.
pub const DIRECT: &str = include_str!("../../shaders/direct.wgsl");

/// Compiles a WGSL module.
#[must_use]
pub fn module(device: &wgpu::Device, label: &str, source: &str) -> wgpu::ShaderModule {
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compute_shaders_use_shared_workgroup_size() {
        for source in [CLEAR_VOLUME, RESOLVE_VOLUME, MIPMAP, COMPACT] {
            assert!(source.contains("@workgroup_size(8, 8, 8)"));
        }
    }

    #[test]
    fn test_finalize_matches_cube_index_count() {
        let expected = format!("CUBE_INDEX_COUNT: u32 = {}u", crate::mesh::primitives::CUBE_INDEX_COUNT);
        assert!(FINALIZE_DRAW.contains(&expected));
    }
}
