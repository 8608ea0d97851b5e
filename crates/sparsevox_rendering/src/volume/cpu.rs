//! CPU mirror of the volume store.
//!
//! The base level is a grid of `AtomicU32` so rasterizer threads can write
//! with `fetch_max` in any order, the same combine the GPU fragment stage
//! uses. Mips are plain texel vectors produced by [`CpuVolume::generate_mipmaps`].

use std::sync::atomic::{AtomicU32, Ordering};

use glam::UVec3;
use rayon::prelude::*;

use super::grid::VoxelGrid;
use super::texel::{self, EMPTY_TEXEL};

/// Volume store held in system memory.
pub struct CpuVolume {
    grid: VoxelGrid,
    occupancy: Vec<AtomicU32>,
    levels: Vec<Vec<u32>>,
}

impl CpuVolume {
    /// Allocates an empty volume for `grid`.
    #[must_use]
    pub fn new(grid: VoxelGrid) -> Self {
        let occupancy = (0..grid.cell_count(0)).map(|_| AtomicU32::new(EMPTY_TEXEL)).collect();
        let levels = (0..grid.mip_levels())
            .map(|mip| vec![EMPTY_TEXEL; grid.cell_count(mip)])
            .collect();
        Self {
            grid,
            occupancy,
            levels,
        }
    }

    /// Grid this volume was allocated for.
    #[must_use]
    pub const fn grid(&self) -> &VoxelGrid {
        &self.grid
    }

    /// Adopts a new grid, reallocating only if the cell layout changed.
    pub fn set_grid(&mut self, grid: VoxelGrid) {
        if grid.dims() == self.grid.dims() && grid.mip_levels() == self.grid.mip_levels() {
            self.grid = grid;
        } else {
            *self = Self::new(grid);
        }
    }

    /// Writes the empty sentinel to every cell of every level.
    pub fn clear(&mut self) {
        self.occupancy
            .par_iter()
            .for_each(|cell| cell.store(EMPTY_TEXEL, Ordering::Relaxed));
        for level in &mut self.levels {
            level.fill(EMPTY_TEXEL);
        }
    }

    /// Unordered write into the base level. Out-of-grid cells are ignored.
    pub fn write(&self, cell: UVec3, value: u32) {
        let dims = self.grid.dims();
        if cell.cmpge(UVec3::splat(dims)).any() {
            return;
        }
        let index = self.grid.linear_index(cell, 0);
        self.occupancy[index].fetch_max(value, Ordering::Relaxed);
    }

    /// Resolves the base level and rebuilds every coarser level.
    pub fn generate_mipmaps(&mut self) {
        let base: Vec<u32> = self
            .occupancy
            .par_iter()
            .map(|cell| cell.load(Ordering::Relaxed))
            .collect();
        self.levels[0] = base;

        for mip in 1..self.grid.mip_levels() {
            let grid = self.grid;
            let parent_dims = grid.dims_at_mip(mip);
            let child_dims = grid.dims_at_mip(mip - 1);
            let children = &self.levels[mip as usize - 1];
            let level: Vec<u32> = (0..grid.cell_count(mip))
                .into_par_iter()
                .map(|index| {
                    let parent = grid.cell_at(index, mip);
                    let block: [u32; 8] = std::array::from_fn(|corner| {
                        let offset = UVec3::new(
                            (corner & 1) as u32,
                            ((corner >> 1) & 1) as u32,
                            ((corner >> 2) & 1) as u32,
                        );
                        let child = (parent * 2 + offset).min(UVec3::splat(child_dims - 1));
                        children[grid.linear_index(child, mip - 1)]
                    });
                    texel::downsample(&block)
                })
                .collect();
            debug_assert_eq!(level.len(), (parent_dims as usize).pow(3));
            self.levels[mip as usize] = level;
        }
    }

    /// Texel at `cell` on `mip`, as of the last mip generation.
    #[must_use]
    pub fn texel(&self, cell: UVec3, mip: u32) -> u32 {
        self.levels[mip as usize][self.grid.linear_index(cell, mip)]
    }

    /// Every texel of a level, x fastest.
    #[must_use]
    pub fn level(&self, mip: u32) -> &[u32] {
        &self.levels[mip as usize]
    }

    /// Number of occupied cells on `mip`.
    #[must_use]
    pub fn occupied_count(&self, mip: u32) -> usize {
        self.level(mip).par_iter().filter(|&&t| texel::is_occupied(t)).count()
    }

    /// Occupied cells of `mip`, in linear index order.
    #[must_use]
    pub fn occupied_cells(&self, mip: u32) -> Vec<UVec3> {
        self.level(mip)
            .iter()
            .enumerate()
            .filter(|&(_, &t)| texel::is_occupied(t))
            .map(|(index, _)| self.grid.cell_at(index, mip))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::texel::occupied_texel;

    #[test]
    fn test_clear_empties_everything() {
        let mut volume = CpuVolume::new(VoxelGrid::new(8, 1.0, 4));
        volume.write(UVec3::new(1, 2, 3), occupied_texel([1.0; 4]));
        volume.generate_mipmaps();
        assert_eq!(volume.occupied_count(0), 1);

        volume.clear();
        volume.generate_mipmaps();
        for mip in 0..4 {
            assert_eq!(volume.occupied_count(mip), 0);
        }
    }

    #[test]
    fn test_writes_combine_with_max() {
        let mut volume = CpuVolume::new(VoxelGrid::new(8, 1.0, 1));
        let dark = occupied_texel([0.1, 0.1, 0.1, 1.0]);
        let bright = occupied_texel([0.9, 0.9, 0.9, 1.0]);
        volume.write(UVec3::ONE, bright);
        volume.write(UVec3::ONE, dark);
        volume.generate_mipmaps();
        assert_eq!(volume.texel(UVec3::ONE, 0), bright);
    }

    #[test]
    fn test_out_of_grid_write_ignored() {
        let mut volume = CpuVolume::new(VoxelGrid::new(8, 1.0, 1));
        volume.write(UVec3::new(8, 0, 0), occupied_texel([1.0; 4]));
        volume.generate_mipmaps();
        assert_eq!(volume.occupied_count(0), 0);
    }

    #[test]
    fn test_single_voxel_propagates_to_every_mip() {
        let mut volume = CpuVolume::new(VoxelGrid::new(16, 1.0, 5));
        volume.write(UVec3::new(9, 3, 14), occupied_texel([0.5; 4]));
        volume.generate_mipmaps();
        assert_eq!(volume.occupied_cells(1), vec![UVec3::new(4, 1, 7)]);
        assert_eq!(volume.occupied_cells(2), vec![UVec3::new(2, 0, 3)]);
        assert_eq!(volume.occupied_count(4), 1);
    }

    #[test]
    fn test_set_grid_keeps_storage_for_size_change() {
        let mut volume = CpuVolume::new(VoxelGrid::new(8, 1.0, 2));
        volume.write(UVec3::ZERO, occupied_texel([1.0; 4]));
        volume.set_grid(VoxelGrid::new(8, 0.5, 2));
        volume.generate_mipmaps();
        assert_eq!(volume.occupied_count(0), 1);
        assert_eq!(volume.grid().voxel_size(), 0.5);

        volume.set_grid(VoxelGrid::new(16, 0.5, 2));
        assert_eq!(volume.level(0).len(), 16 * 16 * 16);
    }
}
