//! CPU voxelization with the GPU pass's semantics.
//!
//! Each triangle is projected along its dominant axis and every cell whose
//! projected center lies inside or on an edge of the triangle receives the
//! submesh color at the interpolated depth. Triangles are processed in
//! parallel; writes combine with atomic max, so the result does not depend
//! on scheduling.

use glam::{UVec3, Vec2, Vec3};
use rayon::prelude::*;

use crate::mesh::MeshGroup;
use crate::volume::{texel, CpuVolume};

// Barycentric tolerance, absorbs rounding on shared edges.
const EDGE_EPSILON: f32 = 1.0e-5;

/// A world-space triangle with its packed voxel color.
#[derive(Clone, Copy, Debug)]
struct ColoredTriangle {
    corners: [Vec3; 3],
    color: u32,
}

/// Voxelizes every group into `volume`'s base level.
///
/// The volume should be cleared first. Returns the number of triangles
/// that produced at least one write.
pub fn voxelize(volume: &CpuVolume, groups: &[MeshGroup]) -> usize {
    let triangles: Vec<ColoredTriangle> = groups
        .iter()
        .flat_map(|group| {
            (0..group.len()).flat_map(move |submesh| {
                let color = texel::occupied_texel(group.materials()[submesh].albedo);
                group
                    .world_triangles(submesh)
                    .map(move |corners| ColoredTriangle { corners, color })
            })
        })
        .collect();

    triangles
        .par_iter()
        .filter(|triangle| rasterize(volume, triangle) > 0)
        .count()
}

/// Returns the number of cell writes.
fn rasterize(volume: &CpuVolume, triangle: &ColoredTriangle) -> usize {
    let grid = volume.grid();
    let dims = grid.dims();
    let [a, b, c] = triangle.corners.map(|p| grid.world_to_grid(p, 0));

    let normal = (b - a).cross(c - a).abs();
    if normal.max_element() <= f32::EPSILON {
        return 0;
    }
    // (u, v) spans the projection plane, w is depth.
    let (u, v, w) = if normal.x >= normal.y && normal.x >= normal.z {
        (1, 2, 0)
    } else if normal.y >= normal.z {
        (2, 0, 1)
    } else {
        (0, 1, 2)
    };
    let project = |p: Vec3| Vec2::new(p[u], p[v]);
    let (pa, pb, pc) = (project(a), project(b), project(c));
    let area = edge(pa, pb, pc);
    if area.abs() <= f32::EPSILON {
        return 0;
    }

    let min = pa.min(pb).min(pc);
    let max = pa.max(pb).max(pc);
    let last = dims as f32 - 1.0;
    // cells whose centers (i + 0.5) fall in [min, max]
    let lo = (min - Vec2::splat(0.5)).ceil().max(Vec2::ZERO);
    let hi = (max - Vec2::splat(0.5)).floor().min(Vec2::splat(last));
    if lo.x > hi.x || lo.y > hi.y {
        return 0;
    }

    let mut writes = 0;
    for j in lo.y as u32..=hi.y as u32 {
        for i in lo.x as u32..=hi.x as u32 {
            let p = Vec2::new(i as f32 + 0.5, j as f32 + 0.5);
            // barycentric weights, signed like `area`
            let w0 = edge(pb, pc, p) / area;
            let w1 = edge(pc, pa, p) / area;
            let w2 = edge(pa, pb, p) / area;
            if w0 < -EDGE_EPSILON || w1 < -EDGE_EPSILON || w2 < -EDGE_EPSILON {
                continue;
            }
            let depth = w0 * a[w] + w1 * b[w] + w2 * c[w];
            if depth < 0.0 || depth >= dims as f32 {
                continue;
            }
            let mut cell = UVec3::ZERO;
            cell[u] = i;
            cell[v] = j;
            cell[w] = depth as u32;
            volume.write(cell, triangle.color);
            writes += 1;
        }
    }
    writes
}

/// Twice the signed area of `(a, b, p)`.
fn edge(a: Vec2, b: Vec2, p: Vec2) -> f32 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::primitives::unit_cube;
    use crate::mesh::{Material, MeshGroup};
    use crate::volume::VoxelGrid;
    use glam::Mat4;

    fn cube_group(transform: Mat4) -> MeshGroup {
        let (vertices, indices) = unit_cube();
        let mut group = MeshGroup::new("cube");
        group
            .push_submesh(&vertices, &indices, transform, Material::with_albedo([1.0, 0.5, 0.0, 1.0]))
            .unwrap();
        group
    }

    #[test]
    fn test_unit_cube_fills_cells_around_origin() {
        let mut volume = CpuVolume::new(VoxelGrid::new(8, 1.0, 1));
        voxelize(&volume, &[cube_group(Mat4::IDENTITY)]);
        volume.generate_mipmaps();

        let mut expected = Vec::new();
        for z in 3..=4 {
            for y in 3..=4 {
                for x in 3..=4 {
                    expected.push(UVec3::new(x, y, z));
                }
            }
        }
        assert_eq!(volume.occupied_cells(0), expected);
        let color = texel::unpack_rgba8(volume.texel(UVec3::splat(3), 0));
        assert!((color[1] - 0.5).abs() < 0.01);
    }

    #[test]
    fn test_degenerate_triangle_writes_nothing() {
        let volume = CpuVolume::new(VoxelGrid::new(8, 1.0, 1));
        let flat = ColoredTriangle {
            corners: [Vec3::ZERO, Vec3::X, Vec3::X * 2.0],
            color: texel::occupied_texel([1.0; 4]),
        };
        assert_eq!(rasterize(&volume, &flat), 0);
    }

    #[test]
    fn test_geometry_outside_grid_is_ignored() {
        let mut volume = CpuVolume::new(VoxelGrid::new(8, 1.0, 1));
        voxelize(&volume, &[cube_group(Mat4::from_translation(Vec3::splat(50.0)))]);
        volume.generate_mipmaps();
        assert_eq!(volume.occupied_count(0), 0);
    }

    #[test]
    fn test_large_triangle_covers_its_plane() {
        let mut volume = CpuVolume::new(VoxelGrid::new(8, 1.0, 1));
        let color = texel::occupied_texel([1.0; 4]);
        // z = 0.25 plane, covering the full x/y extent in two triangles
        let quad = [
            [Vec3::new(-4.0, -4.0, 0.25), Vec3::new(4.0, -4.0, 0.25), Vec3::new(4.0, 4.0, 0.25)],
            [Vec3::new(-4.0, -4.0, 0.25), Vec3::new(4.0, 4.0, 0.25), Vec3::new(-4.0, 4.0, 0.25)],
        ];
        for corners in quad {
            rasterize(&volume, &ColoredTriangle { corners, color });
        }
        volume.generate_mipmaps();
        assert_eq!(volume.occupied_count(0), 64);
        assert!(volume.occupied_cells(0).iter().all(|c| c.z == 4));
    }
}
