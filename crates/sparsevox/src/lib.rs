//! # SPARSEVOX
//!
//! Headless driver for the voxel pipeline.
//!
//! ## Modules
//!
//! - `demo_scene`: Built-in scene graph for runs without assets
//! - `error`: Application error type
//! - `frame_loop`: Frame orchestration, scripted controls and timing

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod demo_scene;
pub mod error;
pub mod frame_loop;

// Re-export the library crates
pub use sparsevox_rendering as rendering;
pub use sparsevox_shared as shared;

pub use error::{AppError, AppResult};
pub use frame_loop::{FrameLoop, FrameLoopConfig, FrameStats, FrameStatsAccumulator};
