//! # Mesh Group
//!
//! A batch of submeshes sharing one vertex and one index buffer. Submesh
//! `i` owns `draw_commands[i]`, `transforms[i]`, `materials[i]` and
//! `aabbs[i]`; the four arrays always have the same length.
//!
//! ```text
//!  SceneNode (T0)
//!   ├── primitive A         -> submesh 0, world = T0
//!   └── SceneNode (T1)
//!        └── primitive B    -> submesh 1, world = T0 · T1
//! ```

use glam::{Mat4, Vec3};

use sparsevox_shared::{Aabb, Transform};

use super::vertex::{DrawIndexedIndirectArgs, Material, Vertex};
use crate::error::{RenderError, RenderResult};

/// Indexed geometry with one material.
#[derive(Clone, Debug, Default)]
pub struct Primitive {
    /// Vertex data.
    pub vertices: Vec<Vertex>,
    /// Triangle list indices into `vertices`.
    pub indices: Vec<u32>,
    /// Surface material.
    pub material: Material,
}

impl Primitive {
    /// Creates a primitive.
    #[must_use]
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>, material: Material) -> Self {
        Self {
            vertices,
            indices,
            material,
        }
    }
}

/// Node of a scene hierarchy.
#[derive(Clone, Debug, Default)]
pub struct SceneNode {
    /// Node name, for logs.
    pub name: String,
    /// Transform relative to the parent.
    pub transform: Transform,
    /// Geometry attached to this node.
    pub primitives: Vec<Primitive>,
    /// Child nodes.
    pub children: Vec<SceneNode>,
}

impl SceneNode {
    /// Empty node.
    #[must_use]
    pub fn new(name: impl Into<String>, transform: Transform) -> Self {
        Self {
            name: name.into(),
            transform,
            primitives: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Adds a primitive.
    #[must_use]
    pub fn with_primitive(mut self, primitive: Primitive) -> Self {
        self.primitives.push(primitive);
        self
    }

    /// Adds a child node.
    #[must_use]
    pub fn with_child(mut self, child: Self) -> Self {
        self.children.push(child);
        self
    }
}

/// A batch of submeshes drawn with one bind and one (multi-)indirect call.
#[derive(Clone, Debug)]
pub struct MeshGroup {
    name: String,
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
    draw_commands: Vec<DrawIndexedIndirectArgs>,
    transforms: Vec<Mat4>,
    materials: Vec<Material>,
    /// Object-space bounds.
    aabbs: Vec<Aabb>,
    revision: u64,
}

impl MeshGroup {
    /// Empty group.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            vertices: Vec::new(),
            indices: Vec::new(),
            draw_commands: Vec::new(),
            transforms: Vec::new(),
            materials: Vec::new(),
            aabbs: Vec::new(),
            revision: 0,
        }
    }

    /// Assembles a group from raw arrays and validates it.
    ///
    /// # Errors
    ///
    /// See [`MeshGroup::validate`].
    pub fn from_parts(
        name: impl Into<String>,
        vertices: Vec<Vertex>,
        indices: Vec<u32>,
        draw_commands: Vec<DrawIndexedIndirectArgs>,
        transforms: Vec<Mat4>,
        materials: Vec<Material>,
        aabbs: Vec<Aabb>,
    ) -> RenderResult<Self> {
        let group = Self {
            name: name.into(),
            vertices,
            indices,
            draw_commands,
            transforms,
            materials,
            aabbs,
            revision: 0,
        };
        group.validate()?;
        Ok(group)
    }

    /// Flattens a scene hierarchy into one group, depth first.
    ///
    /// Each node's world transform is its parent's world transform times
    /// its own translation · rotation · scale.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::InvalidSubmesh`] if a primitive indexes past
    /// its own vertices.
    pub fn from_scene_graph(name: impl Into<String>, roots: &[SceneNode]) -> RenderResult<Self> {
        fn visit(group: &mut MeshGroup, node: &SceneNode, parent: Mat4) -> RenderResult<()> {
            let world = parent * node.transform.to_matrix();
            for primitive in &node.primitives {
                group.push_submesh(&primitive.vertices, &primitive.indices, world, primitive.material)?;
            }
            for child in &node.children {
                visit(group, child, world)?;
            }
            Ok(())
        }

        let mut group = Self::new(name);
        for root in roots {
            visit(&mut group, root, Mat4::IDENTITY)?;
        }
        tracing::debug!(
            group = %group.name,
            submeshes = group.len(),
            triangles = group.indices.len() / 3,
            "mesh group built from scene graph"
        );
        Ok(group)
    }

    /// Appends a submesh, returning its index.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::InvalidSubmesh`] if the index count is not a
    /// multiple of three or an index is out of range.
    pub fn push_submesh(
        &mut self,
        vertices: &[Vertex],
        indices: &[u32],
        transform: Mat4,
        material: Material,
    ) -> RenderResult<usize> {
        let index = self.len();
        if indices.len() % 3 != 0 {
            return Err(RenderError::InvalidSubmesh {
                index,
                reason: format!("{} indices is not a triangle list", indices.len()),
            });
        }
        if let Some(&bad) = indices.iter().find(|&&i| i as usize >= vertices.len()) {
            return Err(RenderError::InvalidSubmesh {
                index,
                reason: format!("index {bad} exceeds {} vertices", vertices.len()),
            });
        }

        self.draw_commands.push(DrawIndexedIndirectArgs {
            index_count: indices.len() as u32,
            instance_count: 1,
            first_index: self.indices.len() as u32,
            base_vertex: self.vertices.len() as i32,
            first_instance: index as u32,
        });
        self.aabbs
            .push(Aabb::from_points(vertices.iter().map(|v| Vec3::from(v.position))));
        self.transforms.push(transform);
        self.materials.push(material);
        self.vertices.extend_from_slice(vertices);
        self.indices.extend_from_slice(indices);
        self.revision += 1;
        Ok(index)
    }

    /// Checks the per-submesh arrays and every draw command range.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::MeshGroupMismatch`] if the arrays disagree in
    /// length, or [`RenderError::InvalidSubmesh`] for a draw command that
    /// reads outside the shared buffers.
    pub fn validate(&self) -> RenderResult<()> {
        let n = self.draw_commands.len();
        if self.transforms.len() != n || self.materials.len() != n || self.aabbs.len() != n {
            return Err(RenderError::MeshGroupMismatch {
                draw_commands: n,
                transforms: self.transforms.len(),
                materials: self.materials.len(),
                aabbs: self.aabbs.len(),
            });
        }
        for (index, command) in self.draw_commands.iter().enumerate() {
            let end = command.first_index as usize + command.index_count as usize;
            if end > self.indices.len() {
                return Err(RenderError::InvalidSubmesh {
                    index,
                    reason: format!("indices {end} past buffer of {}", self.indices.len()),
                });
            }
            if command.base_vertex < 0 || command.first_instance as usize != index {
                return Err(RenderError::InvalidSubmesh {
                    index,
                    reason: format!(
                        "base_vertex {} / first_instance {} invalid",
                        command.base_vertex, command.first_instance
                    ),
                });
            }
        }
        Ok(())
    }

    /// Replaces the world transform of one submesh.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::InvalidSubmesh`] for an unknown index.
    pub fn update_transform(&mut self, submesh: usize, transform: Mat4) -> RenderResult<()> {
        let slot = self.transforms.get_mut(submesh).ok_or_else(|| Self::unknown(submesh))?;
        *slot = transform;
        self.revision += 1;
        Ok(())
    }

    /// Replaces the material of one submesh.
    ///
    /// Voxels carry albedo, so this also dirties the volume.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::InvalidSubmesh`] for an unknown index.
    pub fn update_material(&mut self, submesh: usize, material: Material) -> RenderResult<()> {
        let slot = self.materials.get_mut(submesh).ok_or_else(|| Self::unknown(submesh))?;
        *slot = material;
        self.revision += 1;
        Ok(())
    }

    fn unknown(submesh: usize) -> RenderError {
        RenderError::InvalidSubmesh {
            index: submesh,
            reason: "no such submesh".to_string(),
        }
    }

    /// Group name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of submeshes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.draw_commands.len()
    }

    /// True if the group has no submeshes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.draw_commands.is_empty()
    }

    /// Bumped by every mutation.
    #[must_use]
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    /// Shared vertex buffer contents.
    #[must_use]
    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    /// Shared index buffer contents.
    #[must_use]
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    /// Per-submesh draw commands.
    #[must_use]
    pub fn draw_commands(&self) -> &[DrawIndexedIndirectArgs] {
        &self.draw_commands
    }

    /// Per-submesh world transforms.
    #[must_use]
    pub fn transforms(&self) -> &[Mat4] {
        &self.transforms
    }

    /// Per-submesh materials.
    #[must_use]
    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    /// Per-submesh object-space bounds.
    #[must_use]
    pub fn aabbs(&self) -> &[Aabb] {
        &self.aabbs
    }

    /// World-space bounds of one submesh.
    #[must_use]
    pub fn world_aabb(&self, submesh: usize) -> Option<Aabb> {
        Some(self.aabbs.get(submesh)?.transformed(self.transforms.get(submesh)?))
    }

    /// World-space bounds of the whole group.
    #[must_use]
    pub fn world_bounds(&self) -> Aabb {
        (0..self.len())
            .filter_map(|i| self.world_aabb(i))
            .fold(Aabb::EMPTY, |acc, b| acc.union(&b))
    }

    /// World-space triangles of one submesh.
    pub fn world_triangles(&self, submesh: usize) -> impl Iterator<Item = [Vec3; 3]> + '_ {
        let command = self.draw_commands.get(submesh).copied().unwrap_or_default();
        let transform = self.transforms.get(submesh).copied().unwrap_or(Mat4::IDENTITY);
        let start = command.first_index as usize;
        let end = (start + command.index_count as usize).min(self.indices.len());
        let base = command.base_vertex as usize;
        self.indices[start.min(end)..end].chunks_exact(3).filter_map(move |tri| {
            let corner = |k: usize| {
                self.vertices
                    .get(base + tri[k] as usize)
                    .map(|v| transform.transform_point3(Vec3::from(v.position)))
            };
            Some([corner(0)?, corner(1)?, corner(2)?])
        })
    }
}
