//! # Compaction Stage
//!
//! Scans one mip of the volume and appends every occupied cell that
//! survives the frustum test to a capacity-bounded instance list.

pub mod gpu;
pub mod software;

pub use gpu::Compactor;
