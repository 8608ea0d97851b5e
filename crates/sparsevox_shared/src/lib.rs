//! # SPARSEVOX Shared
//!
//! Types used by the renderer, the headless frame loop and tests alike.
//!
//! ## CRITICAL RULE
//!
//! This crate must NEVER depend on `wgpu` or any other GPU crate.
//! If you need graphics types, put them in `sparsevox_rendering`.

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod constants;
pub mod events;
pub mod math;
pub mod settings;

pub use config::{ConfigError, ConfigResult, CountReadback, EngineConfig, GpuPowerPreference};
pub use constants::{
    DEFAULT_INSTANCE_CAPACITY, DEFAULT_MIP_LEVELS, DEFAULT_VOXEL_DIMS, DEFAULT_VOXEL_SIZE, MIN_MIP_LEVELS,
    WORKGROUP_SIZE,
};
pub use events::{ControlEvent, ControlQueue, ControlSender};
pub use math::{Aabb, Transform};
pub use settings::{SettingsEffect, VoxelSettings};
