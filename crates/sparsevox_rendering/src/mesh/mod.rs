//! # Mesh Groups
//!
//! Scene geometry batched per group: shared vertex/index buffers plus
//! per-submesh transforms, materials, bounds and draw commands.

pub mod gpu;
pub mod group;
pub mod primitives;
pub mod vertex;

pub use gpu::{DrawStrategy, GpuMeshGroup};
pub use group::{MeshGroup, Primitive, SceneNode};
pub use vertex::{DrawIndexedIndirectArgs, Material, Vertex};
