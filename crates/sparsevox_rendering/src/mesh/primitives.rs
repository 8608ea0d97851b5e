//! Procedural meshes.

use glam::Vec3;

use super::vertex::Vertex;

/// Indices in [`unit_cube`].
pub const CUBE_INDEX_COUNT: u32 = 36;

/// Vertices in [`unit_cube`] (4 per face so normals stay flat).
pub const CUBE_VERTEX_COUNT: u32 = 24;

const FACE_NORMALS: [Vec3; 6] = [Vec3::X, Vec3::NEG_X, Vec3::Y, Vec3::NEG_Y, Vec3::Z, Vec3::NEG_Z];

/// Axis-aligned cube centered on the origin with side 1 (`±0.5`).
///
/// Faces wind counter-clockwise seen from outside.
#[must_use]
pub fn unit_cube() -> (Vec<Vertex>, Vec<u32>) {
    let mut vertices = Vec::with_capacity(CUBE_VERTEX_COUNT as usize);
    let mut indices = Vec::with_capacity(CUBE_INDEX_COUNT as usize);

    for normal in FACE_NORMALS {
        let up = if normal.y.abs() > 0.5 { Vec3::Z } else { Vec3::Y };
        // u x up == normal
        let u = up.cross(normal);
        let base = vertices.len() as u32;
        let center = normal * 0.5;
        for (du, dv) in [(-0.5, -0.5), (0.5, -0.5), (0.5, 0.5), (-0.5, 0.5)] {
            let position = center + u * du + up * dv;
            vertices.push(Vertex::new(
                position.to_array(),
                normal.to_array(),
                [du + 0.5, 0.5 - dv],
            ));
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    (vertices, indices)
}

/// Horizontal square in the `y = 0` plane facing `+Y`.
#[must_use]
pub fn plane(half_size: f32) -> (Vec<Vertex>, Vec<u32>) {
    let h = half_size;
    let vertices = vec![
        Vertex::new([-h, 0.0, h], [0.0, 1.0, 0.0], [0.0, 1.0]),
        Vertex::new([h, 0.0, h], [0.0, 1.0, 0.0], [1.0, 1.0]),
        Vertex::new([h, 0.0, -h], [0.0, 1.0, 0.0], [1.0, 0.0]),
        Vertex::new([-h, 0.0, -h], [0.0, 1.0, 0.0], [0.0, 0.0]),
    ];
    (vertices, vec![0, 1, 2, 0, 2, 3])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face_normal(vertices: &[Vertex], tri: &[u32]) -> Vec3 {
        let p = |i: u32| Vec3::from(vertices[i as usize].position);
        (p(tri[1]) - p(tri[0])).cross(p(tri[2]) - p(tri[0])).normalize()
    }

    #[test]
    fn test_cube_counts_and_extent() {
        let (vertices, indices) = unit_cube();
        assert_eq!(vertices.len(), CUBE_VERTEX_COUNT as usize);
        assert_eq!(indices.len(), CUBE_INDEX_COUNT as usize);
        for v in &vertices {
            for c in v.position {
                assert!((c.abs() - 0.5).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_cube_winds_outward() {
        let (vertices, indices) = unit_cube();
        for tri in indices.chunks(3) {
            let n = face_normal(&vertices, tri);
            let stored = Vec3::from(vertices[tri[0] as usize].normal);
            assert!(n.abs_diff_eq(stored, 1e-5), "{n} vs {stored}");
        }
    }

    #[test]
    fn test_plane_faces_up() {
        let (vertices, indices) = plane(2.0);
        assert!(face_normal(&vertices, &indices[..3]).abs_diff_eq(Vec3::Y, 1e-6));
        assert!(face_normal(&vertices, &indices[3..]).abs_diff_eq(Vec3::Y, 1e-6));
    }
}
