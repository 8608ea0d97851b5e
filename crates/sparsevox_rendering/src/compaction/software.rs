//! CPU compaction with the GPU pass's semantics.

use rayon::prelude::*;

use crate::culling::Frustum;
use crate::instancing::{CounterSnapshot, InstanceList, VoxelInstance};
use crate::volume::{texel, CpuVolume};
use glam::Vec3;

/// Resets `list` and appends every occupied, potentially visible cell of
/// `mip` in linear index order.
///
/// Returns the counters: `count` is the number of survivors, `dropped`
/// those past the list's capacity.
pub fn compact(
    volume: &CpuVolume,
    frustum: &Frustum,
    mip: u32,
    list: &mut InstanceList,
    frame: u64,
) -> CounterSnapshot {
    let grid = *volume.grid();
    let half = Vec3::splat(grid.voxel_size_at_mip(mip) * 0.5);

    let survivors: Vec<VoxelInstance> = volume
        .level(mip)
        .par_iter()
        .enumerate()
        .filter(|&(_, &t)| texel::is_occupied(t))
        .filter_map(|(index, &t)| {
            let cell = grid.cell_at(index, mip);
            frustum
                .test_box(grid.voxel_center(cell, mip), half)
                .then(|| VoxelInstance::new(cell, t))
        })
        .collect();

    list.reset();
    list.extend(survivors);
    list.snapshot(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{CameraSource, LookAtCamera};
    use crate::volume::VoxelGrid;
    use glam::UVec3;

    fn filled(grid: VoxelGrid, cells: &[UVec3]) -> CpuVolume {
        let mut volume = CpuVolume::new(grid);
        for &cell in cells {
            volume.write(cell, texel::occupied_texel([1.0; 4]));
        }
        volume.generate_mipmaps();
        volume
    }

    fn wide_open() -> Frustum {
        LookAtCamera::new(Vec3::new(0.0, 0.0, 40.0), Vec3::ZERO, 1.0)
            .snapshot()
            .frustum
    }

    #[test]
    fn test_counts_every_visible_voxel() {
        let cells = [UVec3::ZERO, UVec3::new(3, 4, 5), UVec3::splat(7)];
        let volume = filled(VoxelGrid::new(8, 1.0, 2), &cells);
        let mut list = InstanceList::new(100);
        let snapshot = compact(&volume, &wide_open(), 0, &mut list, 1);
        assert_eq!(snapshot.count, 3);
        assert_eq!(snapshot.dropped, 0);
        let found: Vec<UVec3> = list.instances().iter().map(VoxelInstance::cell).collect();
        assert_eq!(found, cells);
    }

    #[test]
    fn test_overflow_is_counted_not_written() {
        let cells: Vec<UVec3> = (0..8).map(|x| UVec3::new(x, 0, 0)).collect();
        let volume = filled(VoxelGrid::new(8, 1.0, 1), &cells);
        let mut list = InstanceList::new(5);
        let snapshot = compact(&volume, &wide_open(), 0, &mut list, 1);
        assert_eq!(snapshot.count, 8);
        assert_eq!(snapshot.dropped, 3);
        assert_eq!(snapshot.stored(), 5);
        assert_eq!(list.instances().len(), 5);
    }

    #[test]
    fn test_culls_voxels_behind_camera() {
        let volume = filled(VoxelGrid::new(8, 1.0, 1), &[UVec3::new(4, 4, 0), UVec3::new(4, 4, 7)]);
        // at z = 2 looking down -z; cell z = 7 is centered at 3.5
        let camera = LookAtCamera::new(Vec3::new(0.5, 0.5, 2.0), Vec3::new(0.5, 0.5, -10.0), 1.0);
        let mut list = InstanceList::new(10);
        let snapshot = compact(&volume, &camera.snapshot().frustum, 0, &mut list, 1);
        assert_eq!(snapshot.count, 1);
        assert_eq!(list.instances()[0].cell(), UVec3::new(4, 4, 0));
    }

    #[test]
    fn test_coarse_mip_uses_coarse_cells() {
        let volume = filled(VoxelGrid::new(8, 1.0, 4), &[UVec3::new(1, 2, 3), UVec3::new(0, 3, 2)]);
        let mut list = InstanceList::new(10);
        let snapshot = compact(&volume, &wide_open(), 1, &mut list, 1);
        assert_eq!(snapshot.count, 1);
        assert_eq!(list.instances()[0].cell(), UVec3::new(0, 1, 1));
    }
}
