//! # Rendering Error Types
//!
//! Resource creation failures are fatal for the subsystem that hit them and
//! are always returned to the caller. Capacity overflow is NOT an error:
//! it is reported through the UI sink and the frame report.

use thiserror::Error;

use sparsevox_shared::ConfigError;

/// Errors that can occur while building or running the voxel pipeline.
#[derive(Error, Debug)]
pub enum RenderError {
    /// No adapter matched the request.
    #[error("no compatible GPU adapter found")]
    AdapterUnavailable,

    /// The adapter lacks a capability the pipeline cannot work without.
    #[error("adapter {adapter} cannot run the voxel pipeline: {reason}")]
    UnsupportedAdapter {
        /// Adapter name.
        adapter: String,
        /// Missing capability.
        reason: String,
    },

    /// The adapter refused to create a device.
    #[error("failed to create GPU device: {0}")]
    DeviceRequest(#[from] wgpu::RequestDeviceError),

    /// The driver rejected a texture, buffer or pipeline.
    #[error("failed to create {what}: {reason}")]
    ResourceCreation {
        /// Resource being created.
        what: &'static str,
        /// Driver or validation message.
        reason: String,
    },

    /// A resource would not fit the device limits.
    #[error("{what} needs {requested}, device limit is {limit}")]
    ExceedsDeviceLimit {
        /// Resource being sized.
        what: &'static str,
        /// Requested amount.
        requested: u64,
        /// Device limit.
        limit: u64,
    },

    /// Mapping a readback buffer failed.
    #[error("failed to map {what}: {reason}")]
    BufferMap {
        /// Buffer being mapped.
        what: &'static str,
        /// Reason reported by the device.
        reason: String,
    },

    /// Per-submesh arrays of a mesh group disagree in length.
    #[error(
        "mesh group arrays disagree: {draw_commands} draw commands, {transforms} transforms, \
         {materials} materials, {aabbs} aabbs"
    )]
    MeshGroupMismatch {
        /// Draw command count.
        draw_commands: usize,
        /// Transform count.
        transforms: usize,
        /// Material count.
        materials: usize,
        /// AABB count.
        aabbs: usize,
    },

    /// A mesh group index is out of bounds.
    #[error("no mesh group {index} in scene of {len}")]
    UnknownMeshGroup {
        /// Requested group.
        index: usize,
        /// Groups in the scene.
        len: usize,
    },

    /// A submesh index or range is out of bounds.
    #[error("invalid submesh {index}: {reason}")]
    InvalidSubmesh {
        /// Submesh index.
        index: usize,
        /// What is wrong.
        reason: String,
    },

    /// Configuration rejected.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result type for rendering operations.
pub type RenderResult<T> = Result<T, RenderError>;
