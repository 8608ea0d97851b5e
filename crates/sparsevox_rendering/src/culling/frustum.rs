//! View frustum planes.
//!
//! Planes are extracted from the view-projection matrix (Gribb/Hartmann)
//! for wgpu's `[0, 1]` clip depth, normalized, and point inward: a point is
//! inside when its signed distance to every plane is `>= 0`.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3, Vec4};

use sparsevox_shared::Aabb;

/// A plane `n·p + d = 0`, stored as `(n.x, n.y, n.z, d)`.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Pod, Zeroable)]
pub struct Plane {
    /// Normal X component.
    pub a: f32,
    /// Normal Y component.
    pub b: f32,
    /// Normal Z component.
    pub c: f32,
    /// Distance term.
    pub d: f32,
}

impl Plane {
    /// Creates a new plane.
    #[must_use]
    pub const fn new(a: f32, b: f32, c: f32, d: f32) -> Self {
        Self { a, b, c, d }
    }

    fn from_vec4(v: Vec4) -> Self {
        Self::new(v.x, v.y, v.z, v.w)
    }

    /// Normalizes the plane.
    #[must_use]
    pub fn normalized(self) -> Self {
        let len = self.normal().length();
        if len > 0.0 {
            Self {
                a: self.a / len,
                b: self.b / len,
                c: self.c / len,
                d: self.d / len,
            }
        } else {
            self
        }
    }

    /// Plane normal.
    #[inline]
    #[must_use]
    pub fn normal(&self) -> Vec3 {
        Vec3::new(self.a, self.b, self.c)
    }

    /// Signed distance from a point to the plane.
    #[inline]
    #[must_use]
    pub fn distance_to_point(&self, point: Vec3) -> f32 {
        self.normal().dot(point) + self.d
    }

    /// Converts to array format.
    #[must_use]
    pub const fn as_array(&self) -> [f32; 4] {
        [self.a, self.b, self.c, self.d]
    }
}

/// View frustum for culling.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Frustum {
    /// Left, right, bottom, top, near, far planes.
    pub planes: [Plane; 6],
}

impl Frustum {
    /// Left plane index.
    pub const LEFT: usize = 0;
    /// Right plane index.
    pub const RIGHT: usize = 1;
    /// Bottom plane index.
    pub const BOTTOM: usize = 2;
    /// Top plane index.
    pub const TOP: usize = 3;
    /// Near plane index.
    pub const NEAR: usize = 4;
    /// Far plane index.
    pub const FAR: usize = 5;

    /// Extracts frustum planes from a view-projection matrix.
    #[must_use]
    pub fn from_view_projection(m: &Mat4) -> Self {
        let (r0, r1, r2, r3) = (m.row(0), m.row(1), m.row(2), m.row(3));
        let mut planes = [Plane::default(); 6];
        planes[Self::LEFT] = Plane::from_vec4(r3 + r0).normalized();
        planes[Self::RIGHT] = Plane::from_vec4(r3 - r0).normalized();
        planes[Self::BOTTOM] = Plane::from_vec4(r3 + r1).normalized();
        planes[Self::TOP] = Plane::from_vec4(r3 - r1).normalized();
        // z_ndc >= 0
        planes[Self::NEAR] = Plane::from_vec4(r2).normalized();
        planes[Self::FAR] = Plane::from_vec4(r3 - r2).normalized();
        Self { planes }
    }

    /// Converts planes to array format for GPU upload.
    #[must_use]
    pub fn as_arrays(&self) -> [[f32; 4]; 6] {
        self.planes.map(|p| p.as_array())
    }

    /// True unless the box lies entirely behind one plane.
    ///
    /// Conservative: boxes near a frustum corner may pass without actually
    /// intersecting the frustum, but no visible box is rejected.
    #[must_use]
    pub fn test_aabb(&self, aabb: &Aabb) -> bool {
        self.test_box(aabb.center(), aabb.half_extents())
    }

    /// Same test as [`Frustum::test_aabb`] from center and half extents.
    /// This is the exact expression the compaction shader evaluates.
    #[must_use]
    pub fn test_box(&self, center: Vec3, half: Vec3) -> bool {
        self.planes.iter().all(|plane| {
            let r = half.dot(plane.normal().abs());
            plane.distance_to_point(center) >= -r
        })
    }

    /// True if the sphere is not entirely behind one plane.
    #[must_use]
    pub fn test_sphere(&self, center: Vec3, radius: f32) -> bool {
        self.planes
            .iter()
            .all(|plane| plane.distance_to_point(center) >= -radius)
    }

    /// True if the point is inside or on every plane.
    #[must_use]
    pub fn contains_point(&self, point: Vec3) -> bool {
        self.test_sphere(point, 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera() -> Frustum {
        let view = Mat4::look_at_rh(Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO, Vec3::Y);
        let proj = Mat4::perspective_rh(60f32.to_radians(), 1.0, 0.5, 100.0);
        Frustum::from_view_projection(&(proj * view))
    }

    #[test]
    fn test_plane_normalization() {
        let plane = Plane::new(3.0, 4.0, 0.0, 10.0).normalized();
        // 3-4-5 triangle, so length is 5
        assert!((plane.a - 0.6).abs() < 0.001);
        assert!((plane.b - 0.8).abs() < 0.001);
        assert!((plane.d - 2.0).abs() < 0.001);
    }

    #[test]
    fn test_near_and_far() {
        let frustum = camera();
        assert!(frustum.contains_point(Vec3::ZERO));
        // behind the near plane
        assert!(!frustum.contains_point(Vec3::new(0.0, 0.0, 9.8)));
        // past the far plane
        assert!(!frustum.contains_point(Vec3::new(0.0, 0.0, -95.0)));
        let near = frustum.planes[Frustum::NEAR];
        assert!((near.distance_to_point(Vec3::new(0.0, 0.0, 9.5))).abs() < 1e-4);
    }

    #[test]
    fn test_aabb_straddling_plane_is_kept() {
        let frustum = camera();
        // tan(30deg) * 10 ~= 5.77 at the origin's depth
        let edge = Aabb::from_center_half_extents(Vec3::new(6.0, 0.0, 0.0), Vec3::splat(0.5));
        assert!(frustum.test_aabb(&edge));
        let outside = Aabb::from_center_half_extents(Vec3::new(20.0, 0.0, 0.0), Vec3::splat(0.5));
        assert!(!frustum.test_aabb(&outside));
    }

    #[test]
    fn test_behind_camera_culled() {
        let frustum = camera();
        assert!(!frustum.test_sphere(Vec3::new(0.0, 0.0, 20.0), 1.0));
        assert!(frustum.test_sphere(Vec3::new(0.0, 0.0, -20.0), 1.0));
    }
}
