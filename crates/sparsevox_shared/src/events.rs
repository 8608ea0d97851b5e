//! # Control Events
//!
//! Controls exposed to a UI (or a headless test harness) are expressed as
//! events instead of direct mutation of renderer state. Producers may live
//! on any thread; the frame loop drains the queue once per frame, before
//! any stage runs, so a frame always sees one consistent set of settings.
//!
//! ```text
//! UI thread ──send()──┐
//! test harness ───────┼──> [bounded channel] ──drain()──> frame boundary
//! script ─────────────┘
//! ```

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use serde::{Deserialize, Serialize};

use crate::constants::CONTROL_QUEUE_CAPACITY;

/// A single change to the tunable voxel settings.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum ControlEvent {
    /// Set the world-space voxel edge length. Invalidates the volume.
    SetVoxelSize(f32),
    /// Select the mip level scanned by compaction and drawn as cubes.
    SetDebugMipLevel(u32),
    /// Set the level-of-detail used when the direct pass samples the volume.
    SetMipInterpolation(f32),
    /// Draw voxels as cubes instead of the shaded scene.
    SetShowVoxels(bool),
    /// Output the raw volume sample in the direct pass.
    SetShowTexture(bool),
    /// Draw voxel cubes as wireframe where the adapter allows it.
    SetWireframe(bool),
    /// Force the next frame to rebuild the volume.
    RegenerateVoxels,
}

/// Bounded multi-producer queue of control events.
pub struct ControlQueue {
    sender: Sender<ControlEvent>,
    receiver: Receiver<ControlEvent>,
}

impl ControlQueue {
    /// Creates a queue holding at most `capacity` pending events.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, receiver) = bounded(capacity);
        Self { sender, receiver }
    }

    /// Creates a sender handle (clone for multiple producers).
    #[must_use]
    pub fn sender(&self) -> ControlSender {
        ControlSender {
            sender: self.sender.clone(),
        }
    }

    /// Takes every pending event, oldest first.
    pub fn drain(&self) -> Vec<ControlEvent> {
        self.receiver.try_iter().collect()
    }

    /// Returns the number of pending events.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.receiver.len()
    }
}

impl Default for ControlQueue {
    fn default() -> Self {
        Self::new(CONTROL_QUEUE_CAPACITY)
    }
}

/// Handle for submitting control events.
#[derive(Clone)]
pub struct ControlSender {
    sender: Sender<ControlEvent>,
}

impl ControlSender {
    /// Queues an event without blocking.
    ///
    /// Returns `false` if the queue is full or the frame loop is gone; the
    /// event is dropped in that case.
    pub fn send(&self, event: ControlEvent) -> bool {
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(dropped)) => {
                tracing::warn!(?dropped, "control queue full, event dropped");
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_preserves_order() {
        let queue = ControlQueue::new(8);
        let sender = queue.sender();
        assert!(sender.send(ControlEvent::SetVoxelSize(2.0)));
        assert!(sender.send(ControlEvent::SetShowVoxels(true)));
        assert_eq!(queue.pending_count(), 2);

        let events = queue.drain();
        assert_eq!(
            events,
            vec![ControlEvent::SetVoxelSize(2.0), ControlEvent::SetShowVoxels(true)]
        );
        assert_eq!(queue.pending_count(), 0);
    }

    #[test]
    fn test_full_queue_drops() {
        let queue = ControlQueue::new(1);
        let sender = queue.sender();
        assert!(sender.send(ControlEvent::RegenerateVoxels));
        assert!(!sender.send(ControlEvent::RegenerateVoxels));
    }

    #[test]
    fn test_send_from_other_thread() {
        let queue = ControlQueue::default();
        let sender = queue.sender();
        std::thread::spawn(move || sender.send(ControlEvent::SetWireframe(true)))
            .join()
            .unwrap();
        assert_eq!(queue.drain(), vec![ControlEvent::SetWireframe(true)]);
    }
}
