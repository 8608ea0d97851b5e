//! Stage tokens.
//!
//! ```text
//!  clear_volume() ─> VolumeCleared ─> voxelize() ─> VolumeWritten
//!        ─> generate_mipmaps() ─> VolumeReady ─(&)─> compact() ─> Compacted ─> draw_voxels()
//!                                     └─────(&)─> draw_scene()
//! ```
//!
//! Only backends in this crate can create tokens, so a stage cannot run
//! before the stage that produces its input.

use crate::instancing::CounterSnapshot;

/// The volume holds the empty sentinel everywhere.
#[derive(Debug)]
#[must_use = "a cleared volume must be voxelized"]
pub struct VolumeCleared {
    _private: (),
}

impl VolumeCleared {
    pub(crate) const fn new() -> Self {
        Self { _private: () }
    }
}

/// The base level holds this frame's voxelization; mips are stale.
#[derive(Debug)]
#[must_use = "a written volume needs its mip chain"]
pub struct VolumeWritten {
    _private: (),
}

impl VolumeWritten {
    pub(crate) const fn new() -> Self {
        Self { _private: () }
    }
}

/// Every level of the volume is consistent and may be read.
#[derive(Debug)]
pub struct VolumeReady {
    _private: (),
}

impl VolumeReady {
    pub(crate) const fn new() -> Self {
        Self { _private: () }
    }
}

/// The instance list and counters for one camera are written.
#[derive(Debug)]
#[must_use = "compacted instances are meant to be drawn"]
pub struct Compacted {
    mip: u32,
    counters: Option<CounterSnapshot>,
}

impl Compacted {
    pub(crate) const fn new(mip: u32, counters: Option<CounterSnapshot>) -> Self {
        Self { mip, counters }
    }

    /// Mip level that was compacted.
    #[must_use]
    pub const fn mip(&self) -> u32 {
        self.mip
    }

    /// Counters, when the backend knows them without waiting.
    #[must_use]
    pub const fn counters(&self) -> Option<CounterSnapshot> {
        self.counters
    }
}
