//! # Engine Constants
//!
//! Defaults baked into the binary. Every value here can be overridden by
//! `EngineConfig` except the workgroup size, which the WGSL shaders hardcode.

// =============================================================================
// VOLUME
// =============================================================================

/// Default side length of the voxel grid (cells per axis).
pub const DEFAULT_VOXEL_DIMS: u32 = 128;

/// Smallest accepted grid side length.
pub const MIN_VOXEL_DIMS: u32 = 8;

/// Largest accepted grid side length.
pub const MAX_VOXEL_DIMS: u32 = 1024;

/// Default number of mip levels in the volume chain.
pub const DEFAULT_MIP_LEVELS: u32 = 6;

/// Fewest mip levels a config may request, unless the grid is too small
/// to hold that many.
pub const MIN_MIP_LEVELS: u32 = 6;

/// Default world-space edge length of one voxel.
pub const DEFAULT_VOXEL_SIZE: f32 = 1.0;

/// Smallest voxel size the settings accept.
pub const MIN_VOXEL_SIZE: f32 = 1.0e-3;

// =============================================================================
// COMPACTION
// =============================================================================

/// Default capacity of the compacted voxel instance buffer.
pub const DEFAULT_INSTANCE_CAPACITY: u32 = 1_000_000;

/// Compute workgroup edge. Dispatches are `WORKGROUP_SIZE`^3 invocations.
pub const WORKGROUP_SIZE: u32 = 8;

// =============================================================================
// PRESENTATION
// =============================================================================

/// Default offscreen target width.
pub const DEFAULT_RENDER_WIDTH: u32 = 1280;

/// Default offscreen target height.
pub const DEFAULT_RENDER_HEIGHT: u32 = 720;

/// Capacity of the control event channel.
pub const CONTROL_QUEUE_CAPACITY: usize = 256;

/// Number of workgroups needed to cover `extent` cells along one axis.
#[must_use]
pub const fn workgroup_count(extent: u32) -> u32 {
    (extent + WORKGROUP_SIZE - 1) / WORKGROUP_SIZE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workgroup_count_rounds_up() {
        assert_eq!(workgroup_count(1), 1);
        assert_eq!(workgroup_count(8), 1);
        assert_eq!(workgroup_count(9), 2);
        assert_eq!(workgroup_count(512), 64);
    }
}
