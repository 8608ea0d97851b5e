//! # Volume Store
//!
//! The voxel grid in its three forms: the geometry ([`VoxelGrid`]), the GPU
//! texture with its mip chain ([`VolumeStore`]) and the CPU mirror used by
//! the software backend and tests ([`CpuVolume`]).

pub mod cpu;
pub mod grid;
pub mod store;
pub mod texel;

pub use cpu::CpuVolume;
pub use grid::VoxelGrid;
pub use store::{VolumeStore, VOLUME_FORMAT};
