//! Camera snapshots.
//!
//! The pipeline takes exactly one [`CameraSnapshot`] per frame; compaction
//! culls against its frustum and the draw uses its view-projection, so the
//! two can never disagree.

use glam::{Mat4, Vec3};

use crate::culling::Frustum;

/// Default vertical field of view in degrees.
pub const DEFAULT_FOV_DEGREES: f32 = 60.0;
/// Default near plane distance.
pub const DEFAULT_NEAR: f32 = 0.5;
/// Default far plane distance.
pub const DEFAULT_FAR: f32 = 1000.0;

/// Immutable camera state for one frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraSnapshot {
    /// World to view.
    pub view: Mat4,
    /// View to clip (`[0, 1]` depth).
    pub projection: Mat4,
    /// `projection * view`.
    pub view_projection: Mat4,
    /// Eye position in world space.
    pub position: Vec3,
    /// Planes of `view_projection`.
    pub frustum: Frustum,
}

impl CameraSnapshot {
    /// Builds a snapshot and derives the combined matrix and frustum.
    #[must_use]
    pub fn new(view: Mat4, projection: Mat4) -> Self {
        let view_projection = projection * view;
        Self {
            view,
            projection,
            view_projection,
            position: view.inverse().w_axis.truncate(),
            frustum: Frustum::from_view_projection(&view_projection),
        }
    }
}

/// Anything that can produce a camera for the current frame.
pub trait CameraSource {
    /// Camera state for this frame.
    fn snapshot(&self) -> CameraSnapshot;
}

impl CameraSource for CameraSnapshot {
    fn snapshot(&self) -> CameraSnapshot {
        *self
    }
}

/// Perspective camera looking at a target point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LookAtCamera {
    /// Eye position.
    pub position: Vec3,
    /// Point looked at.
    pub target: Vec3,
    /// Up direction.
    pub up: Vec3,
    /// Vertical field of view in degrees.
    pub fov_degrees: f32,
    /// Width / height.
    pub aspect: f32,
    /// Near plane distance.
    pub near: f32,
    /// Far plane distance.
    pub far: f32,
}

impl LookAtCamera {
    /// Camera with the default lens.
    #[must_use]
    pub const fn new(position: Vec3, target: Vec3, aspect: f32) -> Self {
        Self {
            position,
            target,
            up: Vec3::Y,
            fov_degrees: DEFAULT_FOV_DEGREES,
            aspect,
            near: DEFAULT_NEAR,
            far: DEFAULT_FAR,
        }
    }

    /// Moves the eye around the target about the world Y axis.
    pub fn orbit(&mut self, radians: f32) {
        let offset = self.position - self.target;
        self.position = self.target + glam::Quat::from_rotation_y(radians) * offset;
    }

    /// World to view matrix.
    #[must_use]
    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    /// View to clip matrix.
    #[must_use]
    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_degrees.to_radians(), self.aspect, self.near, self.far)
    }
}

impl CameraSource for LookAtCamera {
    fn snapshot(&self) -> CameraSnapshot {
        CameraSnapshot::new(self.view(), self.projection())
    }
}
