//! Instance and counter layouts written by compaction.

use bytemuck::{Pod, Zeroable};
use glam::UVec3;

/// One compacted voxel. Matches `struct VoxelInstance` in WGSL.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct VoxelInstance {
    /// Cell coordinate at the compacted mip.
    pub coord: [u32; 3],
    /// Packed RGBA8 color (see [`crate::volume::texel`]).
    pub packed_color: u32,
}

impl VoxelInstance {
    /// Size in bytes (16).
    pub const SIZE: u64 = std::mem::size_of::<Self>() as u64;

    /// Creates an instance.
    #[must_use]
    pub const fn new(coord: UVec3, packed_color: u32) -> Self {
        Self {
            coord: [coord.x, coord.y, coord.z],
            packed_color,
        }
    }

    /// Cell coordinate.
    #[must_use]
    pub const fn cell(&self) -> UVec3 {
        UVec3::new(self.coord[0], self.coord[1], self.coord[2])
    }
}

/// Append counters. Matches `struct Counters` in WGSL.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct Counters {
    /// Append attempts, may exceed capacity.
    pub count: u32,
    /// Appends rejected by the capacity check.
    pub dropped: u32,
}

impl Counters {
    /// Size in bytes.
    pub const SIZE: u64 = std::mem::size_of::<Self>() as u64;
}

/// Counter values of one compaction, as seen by the CPU.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    /// Frame that produced the counts.
    pub frame: u64,
    /// Voxels that passed the occupancy and frustum tests.
    pub count: u32,
    /// Voxels that passed but did not fit.
    pub dropped: u32,
    /// Instance buffer capacity at the time.
    pub capacity: u32,
}

impl CounterSnapshot {
    /// Instances actually written: `min(count, capacity)`.
    #[must_use]
    pub const fn stored(&self) -> u32 {
        if self.count < self.capacity {
            self.count
        } else {
            self.capacity
        }
    }

    /// True if any survivor was dropped.
    #[must_use]
    pub const fn overflowed(&self) -> bool {
        self.count > self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layouts() {
        assert_eq!(VoxelInstance::SIZE, 16);
        assert_eq!(Counters::SIZE, 8);
    }

    #[test]
    fn test_stored_is_clamped() {
        let under = CounterSnapshot {
            frame: 1,
            count: 5,
            dropped: 0,
            capacity: 10,
        };
        assert_eq!(under.stored(), 5);
        assert!(!under.overflowed());

        let over = CounterSnapshot {
            count: 15,
            dropped: 5,
            ..under
        };
        assert_eq!(over.stored(), 10);
        assert!(over.overflowed());
    }
}
