//! Visibility testing shared by the CPU compaction path and the frustum
//! planes uploaded to the compaction shader.

pub mod frustum;

pub use frustum::{Frustum, Plane};
