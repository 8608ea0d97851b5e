//! Voxel grid geometry.
//!
//! ```text
//!   world x:  -N·s/2                0                 +N·s/2
//!             |-----|-----|-----|-----|-----|-----|-----|-----|
//!   cell x:      0     1     2     3     4     5     6     7      (N = 8)
//! ```
//!
//! Cell `x` starts at `(x - N/2)·s` and ends one voxel later. Mip level `L`
//! halves the cell count per axis and doubles the voxel size, so every
//! level covers the same world extent.

use glam::{Mat4, UVec3, Vec3};

use sparsevox_shared::{Aabb, EngineConfig};

/// Dimensions and scale of the voxel volume.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VoxelGrid {
    dims: u32,
    voxel_size: f32,
    mip_levels: u32,
}

impl VoxelGrid {
    /// Creates a grid with `dims` cells per axis.
    ///
    /// `mip_levels` is clamped to the levels the grid can actually have.
    #[must_use]
    pub fn new(dims: u32, voxel_size: f32, mip_levels: u32) -> Self {
        let dims = dims.max(1);
        let full_chain = dims.ilog2() + 1;
        Self {
            dims,
            voxel_size,
            mip_levels: mip_levels.clamp(1, full_chain),
        }
    }

    /// Grid described by a startup config.
    #[must_use]
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            config.voxel_dims,
            config.settings.voxel_size,
            config.effective_mip_levels(),
        )
    }

    /// Same grid with a different voxel size.
    #[must_use]
    pub const fn with_voxel_size(mut self, voxel_size: f32) -> Self {
        self.voxel_size = voxel_size;
        self
    }

    /// Cells per axis at mip 0.
    #[must_use]
    pub const fn dims(&self) -> u32 {
        self.dims
    }

    /// Voxel edge length at mip 0.
    #[must_use]
    pub const fn voxel_size(&self) -> f32 {
        self.voxel_size
    }

    /// Number of mip levels.
    #[must_use]
    pub const fn mip_levels(&self) -> u32 {
        self.mip_levels
    }

    /// Highest valid mip index.
    #[must_use]
    pub const fn max_mip(&self) -> u32 {
        self.mip_levels - 1
    }

    /// Cells per axis at `mip`.
    #[must_use]
    pub const fn dims_at_mip(&self, mip: u32) -> u32 {
        let d = self.dims >> mip;
        if d == 0 {
            1
        } else {
            d
        }
    }

    /// Voxel edge length at `mip`.
    #[must_use]
    pub fn voxel_size_at_mip(&self, mip: u32) -> f32 {
        self.voxel_size * (self.dims / self.dims_at_mip(mip)) as f32
    }

    /// Number of cells at `mip`.
    #[must_use]
    pub fn cell_count(&self, mip: u32) -> usize {
        let d = self.dims_at_mip(mip) as usize;
        d * d * d
    }

    /// Half of the world-space edge of the volume.
    #[must_use]
    pub fn half_extent(&self) -> f32 {
        self.dims as f32 * self.voxel_size * 0.5
    }

    /// World-space bounds of the whole volume.
    #[must_use]
    pub fn bounds(&self) -> Aabb {
        Aabb::from_center_half_extents(Vec3::ZERO, Vec3::splat(self.half_extent()))
    }

    /// Orthographic voxel-space transform.
    ///
    /// Maps `[-N·s/2, N·s/2]^3` onto `[-1, 1]^3` without flipping any axis.
    #[must_use]
    pub fn voxel_space_transform(&self) -> Mat4 {
        Mat4::from_scale(Vec3::splat(1.0 / self.half_extent()))
    }

    /// Continuous grid coordinate of a world point at `mip`.
    #[must_use]
    pub fn world_to_grid(&self, point: Vec3, mip: u32) -> Vec3 {
        let dims = self.dims_at_mip(mip) as f32;
        point / self.voxel_size_at_mip(mip) + Vec3::splat(dims * 0.5)
    }

    /// Cell containing a world point at mip 0, `None` outside the grid.
    #[must_use]
    pub fn world_to_voxel(&self, point: Vec3) -> Option<UVec3> {
        self.world_to_voxel_at_mip(point, 0)
    }

    /// Cell containing a world point at `mip`, `None` outside the grid.
    #[must_use]
    pub fn world_to_voxel_at_mip(&self, point: Vec3, mip: u32) -> Option<UVec3> {
        self.grid_to_voxel(self.world_to_grid(point, mip), mip)
    }

    /// Cell containing a continuous grid coordinate.
    #[must_use]
    pub fn grid_to_voxel(&self, grid: Vec3, mip: u32) -> Option<UVec3> {
        let dims = self.dims_at_mip(mip) as f32;
        let inside = grid.cmpge(Vec3::ZERO).all() && grid.cmplt(Vec3::splat(dims)).all();
        inside.then(|| grid.floor().as_uvec3())
    }

    /// World position of a cell's minimum corner: `(c - N/2)·s`.
    #[must_use]
    pub fn voxel_origin(&self, cell: UVec3, mip: u32) -> Vec3 {
        let dims = self.dims_at_mip(mip) as f32;
        (cell.as_vec3() - Vec3::splat(dims * 0.5)) * self.voxel_size_at_mip(mip)
    }

    /// World position of a cell's center.
    #[must_use]
    pub fn voxel_center(&self, cell: UVec3, mip: u32) -> Vec3 {
        self.voxel_origin(cell, mip) + Vec3::splat(self.voxel_size_at_mip(mip) * 0.5)
    }

    /// World-space box of a cell.
    #[must_use]
    pub fn voxel_aabb(&self, cell: UVec3, mip: u32) -> Aabb {
        let origin = self.voxel_origin(cell, mip);
        Aabb::new(
            origin.to_array(),
            (origin + Vec3::splat(self.voxel_size_at_mip(mip))).to_array(),
        )
    }

    /// Row-major linear index (x fastest) of a cell.
    #[must_use]
    pub fn linear_index(&self, cell: UVec3, mip: u32) -> usize {
        let d = self.dims_at_mip(mip) as usize;
        cell.x as usize + cell.y as usize * d + cell.z as usize * d * d
    }

    /// Inverse of [`VoxelGrid::linear_index`].
    #[must_use]
    pub fn cell_at(&self, index: usize, mip: u32) -> UVec3 {
        let d = self.dims_at_mip(mip) as usize;
        UVec3::new((index % d) as u32, ((index / d) % d) as u32, (index / (d * d)) as u32)
    }
}
