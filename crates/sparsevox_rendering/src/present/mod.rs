//! # Presentation
//!
//! The two per-frame output paths, exactly one of which runs each frame:
//! instanced voxel cubes ([`VoxelVisualizer`]) or the shaded scene
//! ([`DirectRenderer`]).

pub mod direct;
pub mod target;
pub mod voxels;

pub use direct::{DirectRenderer, SceneDraw};
pub use target::RenderTarget;
pub use voxels::{InstanceCount, VoxelDraw, VoxelVisualizer};
