//! # SPARSEVOX Rendering
//!
//! Sparse voxelization of triangle scenes and two ways of looking at the
//! result:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      FRAME PIPELINE                          │
//! ├──────────────────────────────────────────────────────────────┤
//! │  Mesh Groups → Voxelize (atomicMax) → Volume + Mip Chain     │
//! │                      (only when the scene changed)           │
//! │       ↓                                     ↓                │
//! │  Compact (frustum, counter) → Instanced Cubes                │
//! │                       or                                     │
//! │  Depth Pre-Pass → Depth-Equal Shading (volume sampled)       │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## MANDATE
//!
//! - Voxelization runs once per scene change, never per frame
//! - Compaction is bounded by the instance capacity; overflow is counted, never written
//! - Stages cannot run out of order (typestate tokens in [`backend`])
//! - The software backend produces the same volume and counts as the GPU

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod backend;
pub mod camera;
pub mod compaction;
pub mod culling;
pub mod diagnostics;
pub mod error;
pub mod gpu;
pub mod instancing;
pub mod mesh;
pub mod pipeline;
pub mod present;
pub mod scene;
pub mod volume;
pub mod voxelizer;

pub use backend::{DrawCall, GpuBackend, InstanceSource, SoftwareBackend, VoxelBackend};
pub use camera::{CameraSnapshot, CameraSource, LookAtCamera};
pub use culling::{Frustum, Plane};
pub use diagnostics::{NullProfiler, NullUi, ProfileSink, RecordingUi, TracingProfiler, UiSink};
pub use error::{RenderError, RenderResult};
pub use gpu::GpuContext;
pub use instancing::{CounterSnapshot, VoxelInstance};
pub use mesh::{Material, MeshGroup, Primitive, SceneNode, Vertex};
pub use pipeline::{FrameReport, VoxelPipeline};
pub use scene::Scene;
pub use volume::{CpuVolume, VoxelGrid};
