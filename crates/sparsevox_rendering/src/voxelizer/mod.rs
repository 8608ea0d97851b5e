//! # Voxelization Stage
//!
//! Dominant-axis rasterization of mesh groups into the volume store, on
//! the GPU ([`Voxelizer`]) or on the CPU ([`software::voxelize`]).

pub mod gpu;
pub mod software;

pub use gpu::Voxelizer;
