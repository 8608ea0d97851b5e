//! Capacity-bounded instance storage.
//!
//! Both forms share one rule: an append at or past capacity is counted and
//! dropped, never written.

use super::instance_data::{CounterSnapshot, Counters, VoxelInstance};
use crate::error::RenderResult;
use crate::gpu::GpuContext;
use crate::mesh::DrawIndexedIndirectArgs;

/// CPU instance list used by the software backend.
#[derive(Debug, Clone)]
pub struct InstanceList {
    instances: Vec<VoxelInstance>,
    capacity: u32,
    counters: Counters,
}

impl InstanceList {
    /// Empty list holding at most `capacity` instances.
    #[must_use]
    pub fn new(capacity: u32) -> Self {
        Self {
            // grows on demand; capacity is a limit, not a reservation
            instances: Vec::new(),
            capacity,
            counters: Counters::default(),
        }
    }

    /// Resets the counters and forgets every instance.
    pub fn reset(&mut self) {
        self.instances.clear();
        self.counters = Counters::default();
    }

    /// Appends an instance.
    ///
    /// Returns false if the list is full; the attempt is still counted.
    #[inline]
    pub fn push(&mut self, instance: VoxelInstance) -> bool {
        self.counters.count = self.counters.count.saturating_add(1);
        if self.instances.len() >= self.capacity as usize {
            self.counters.dropped = self.counters.dropped.saturating_add(1);
            return false;
        }
        self.instances.push(instance);
        true
    }

    /// Appends every instance, returning how many were stored.
    pub fn extend(&mut self, instances: impl IntoIterator<Item = VoxelInstance>) -> usize {
        instances.into_iter().filter(|&i| self.push(i)).count()
    }

    /// Stored instances in append order.
    #[must_use]
    pub fn instances(&self) -> &[VoxelInstance] {
        &self.instances
    }

    /// Maximum stored instances.
    #[must_use]
    pub const fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Counter values tagged with `frame`.
    #[must_use]
    pub const fn snapshot(&self, frame: u64) -> CounterSnapshot {
        CounterSnapshot {
            frame,
            count: self.counters.count,
            dropped: self.counters.dropped,
            capacity: self.capacity,
        }
    }
}

/// Counter readback buffers in the ring. Frames whose counters are still
/// mapping occupy a slot each.
pub const READBACK_SLOTS: usize = 3;

/// GPU instance buffer, append counters and the cube draw's indirect args.
pub struct InstanceBuffer {
    instances: wgpu::Buffer,
    counters: wgpu::Buffer,
    args: wgpu::Buffer,
    readbacks: Vec<wgpu::Buffer>,
    capacity: u32,
}

impl InstanceBuffer {
    /// Allocates room for `capacity` instances.
    ///
    /// # Errors
    ///
    /// Returns [`crate::RenderError::ExceedsDeviceLimit`] if the buffer
    /// would exceed the storage binding limit, or
    /// [`crate::RenderError::ResourceCreation`] if allocation fails.
    pub fn allocate(ctx: &GpuContext, capacity: u32) -> RenderResult<Self> {
        let bytes = u64::from(capacity.max(1)) * VoxelInstance::SIZE;
        let limits = ctx.limits();
        GpuContext::check_limit(
            "instance buffer binding",
            bytes,
            u64::from(limits.max_storage_buffer_binding_size),
        )?;
        GpuContext::check_limit("instance buffer", bytes, limits.max_buffer_size)?;

        let buffer = ctx.create_scoped("instance buffer", |device| {
            let create = |label: &str, size: u64, usage: wgpu::BufferUsages| {
                device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some(label),
                    size,
                    usage,
                    mapped_at_creation: false,
                })
            };
            Self {
                instances: create("Voxel Instances", bytes, wgpu::BufferUsages::STORAGE),
                counters: create(
                    "Voxel Counters",
                    Counters::SIZE,
                    wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC | wgpu::BufferUsages::COPY_DST,
                ),
                args: create(
                    "Voxel Draw Args",
                    DrawIndexedIndirectArgs::SIZE,
                    wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::INDIRECT,
                ),
                readbacks: (0..READBACK_SLOTS)
                    .map(|_| {
                        create(
                            "Voxel Counter Readback",
                            Counters::SIZE,
                            wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                        )
                    })
                    .collect(),
                capacity,
            }
        })?;
        tracing::info!(capacity, mb = bytes >> 20, "instance buffer allocated");
        Ok(buffer)
    }

    /// `array<VoxelInstance>`.
    #[must_use]
    pub const fn instances(&self) -> &wgpu::Buffer {
        &self.instances
    }

    /// `Counters`, zeroed at the start of each compaction.
    #[must_use]
    pub const fn counters(&self) -> &wgpu::Buffer {
        &self.counters
    }

    /// Indirect args for the cube draw.
    #[must_use]
    pub const fn args(&self) -> &wgpu::Buffer {
        &self.args
    }

    /// Mappable copy of the counters in ring slot `slot`. Slots wrap
    /// around [`READBACK_SLOTS`].
    #[must_use]
    pub fn readback(&self, slot: usize) -> &wgpu::Buffer {
        &self.readbacks[slot % self.readbacks.len()]
    }

    /// Maximum stored instances.
    #[must_use]
    pub const fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Decodes a counter readback.
    #[must_use]
    pub fn decode_counters(&self, words: &[u32], frame: u64) -> CounterSnapshot {
        CounterSnapshot {
            frame,
            count: words.first().copied().unwrap_or(0),
            dropped: words.get(1).copied().unwrap_or(0),
            capacity: self.capacity,
        }
    }
}
