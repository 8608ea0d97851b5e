//! Scene context: the mesh groups to voxelize and draw, and the light.
//!
//! Every content mutation bumps a revision. The pipeline compares
//! [`Scene::content_revision`] with the revision it last voxelized to decide
//! whether the volume is stale, so there is no dirty flag to forget.

use glam::{Mat4, Vec3};

use sparsevox_shared::Aabb;

use crate::error::{RenderError, RenderResult};
use crate::mesh::{Material, MeshGroup};

/// Mesh groups plus the scene light.
#[derive(Clone, Debug)]
pub struct Scene {
    groups: Vec<MeshGroup>,
    light_position: Vec3,
    /// Bumped on add/remove so the content revision stays monotonic.
    structural_revision: u64,
}

impl Scene {
    /// Empty scene with the light at `light_position`.
    #[must_use]
    pub const fn new(light_position: Vec3) -> Self {
        Self {
            groups: Vec::new(),
            light_position,
            structural_revision: 0,
        }
    }

    /// Adds a group, returning its index.
    ///
    /// # Errors
    ///
    /// Returns the group's validation error.
    pub fn add_group(&mut self, group: MeshGroup) -> RenderResult<usize> {
        group.validate()?;
        self.groups.push(group);
        self.structural_revision += 1;
        Ok(self.groups.len() - 1)
    }

    /// Removes and returns a group. Later indices shift down by one.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::UnknownMeshGroup`] for a bad index.
    pub fn remove_group(&mut self, index: usize) -> RenderResult<MeshGroup> {
        if index >= self.groups.len() {
            return Err(self.unknown(index));
        }
        let group = self.groups.remove(index);
        self.structural_revision += group.revision() + 1;
        Ok(group)
    }

    /// Drops every group.
    pub fn clear(&mut self) {
        while !self.groups.is_empty() {
            let last = self.groups.len() - 1;
            if self.remove_group(last).is_err() {
                break;
            }
        }
    }

    /// All groups.
    #[must_use]
    pub fn groups(&self) -> &[MeshGroup] {
        &self.groups
    }

    /// Total submeshes over every group.
    #[must_use]
    pub fn submesh_count(&self) -> usize {
        self.groups.iter().map(MeshGroup::len).sum()
    }

    /// True if there is nothing to voxelize.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.submesh_count() == 0
    }

    /// Monotonic revision of everything that affects the volume.
    #[must_use]
    pub fn content_revision(&self) -> u64 {
        self.structural_revision + self.groups.iter().map(MeshGroup::revision).sum::<u64>()
    }

    /// Sets a submesh's world transform.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::UnknownMeshGroup`] or
    /// [`RenderError::InvalidSubmesh`].
    pub fn update_transform(&mut self, group: usize, submesh: usize, transform: Mat4) -> RenderResult<()> {
        self.group_mut(group)?.update_transform(submesh, transform)
    }

    /// Sets a submesh's material.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::UnknownMeshGroup`] or
    /// [`RenderError::InvalidSubmesh`].
    pub fn update_material(&mut self, group: usize, submesh: usize, material: Material) -> RenderResult<()> {
        self.group_mut(group)?.update_material(submesh, material)
    }

    /// Light position in world space.
    #[must_use]
    pub const fn light_position(&self) -> Vec3 {
        self.light_position
    }

    /// Moves the light. Shading only; the volume stays valid.
    pub fn set_light_position(&mut self, position: Vec3) {
        self.light_position = position;
    }

    /// World bounds of every group.
    #[must_use]
    pub fn bounds(&self) -> Aabb {
        self.groups
            .iter()
            .map(MeshGroup::world_bounds)
            .fold(Aabb::EMPTY, |acc, b| acc.union(&b))
    }

    fn group_mut(&mut self, index: usize) -> RenderResult<&mut MeshGroup> {
        let len = self.groups.len();
        self.groups
            .get_mut(index)
            .ok_or(RenderError::UnknownMeshGroup { index, len })
    }

    fn unknown(&self, index: usize) -> RenderError {
        RenderError::UnknownMeshGroup {
            index,
            len: self.groups.len(),
        }
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new(Vec3::new(0.0, 10.0, 0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::primitives::unit_cube;

    fn cube_group() -> MeshGroup {
        let (vertices, indices) = unit_cube();
        let mut group = MeshGroup::new("cube");
        group
            .push_submesh(&vertices, &indices, Mat4::IDENTITY, Material::DEFAULT)
            .unwrap();
        group
    }

    #[test]
    fn test_every_content_change_moves_revision() {
        let mut scene = Scene::default();
        let mut last = scene.content_revision();
        let mut advanced = |scene: &Scene| {
            let now = scene.content_revision();
            let moved = now > last;
            last = now;
            moved
        };

        scene.add_group(cube_group()).unwrap();
        assert!(advanced(&scene));
        scene.update_transform(0, 0, Mat4::from_translation(Vec3::X)).unwrap();
        assert!(advanced(&scene));
        scene.update_material(0, 0, Material::with_albedo([0.0, 1.0, 0.0, 1.0])).unwrap();
        assert!(advanced(&scene));
        scene.remove_group(0).unwrap();
        assert!(advanced(&scene));
        scene.set_light_position(Vec3::ONE);
        assert!(!advanced(&scene));
    }

    #[test]
    fn test_unknown_group() {
        let mut scene = Scene::default();
        let err = scene.update_transform(2, 0, Mat4::IDENTITY).unwrap_err();
        assert!(matches!(err, RenderError::UnknownMeshGroup { index: 2, len: 0 }));
        assert!(scene.remove_group(0).is_err());
    }

    #[test]
    fn test_clear_empties_scene() {
        let mut scene = Scene::default();
        scene.add_group(cube_group()).unwrap();
        scene.add_group(cube_group()).unwrap();
        assert_eq!(scene.submesh_count(), 2);
        let before = scene.content_revision();
        scene.clear();
        assert!(scene.is_empty());
        assert!(scene.content_revision() > before);
    }
}
