//! # Voxel Instances
//!
//! Output of the compaction stage: a capacity-bounded list of
//! [`VoxelInstance`]s plus the append counters.

pub mod buffer;
pub mod instance_data;

pub use buffer::{InstanceBuffer, InstanceList, READBACK_SLOTS};
pub use instance_data::{CounterSnapshot, Counters, VoxelInstance};
