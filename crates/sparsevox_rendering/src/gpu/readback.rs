//! Scoped CPU access to GPU buffers.
//!
//! A [`MappedView`] is the only way the crate maps a buffer. Dropping it
//! unmaps the buffer, so every exit path (including `?`) leaves the buffer
//! ready for the next copy.

use crate::error::{RenderError, RenderResult};

/// A read-mapped buffer. Unmapped on drop.
pub struct MappedView<'a> {
    buffer: &'a wgpu::Buffer,
    view: Option<wgpu::BufferView<'a>>,
}

impl<'a> MappedView<'a> {
    /// Maps the whole buffer for reading, blocking until the GPU is done
    /// with every submitted write to it.
    ///
    /// This stalls the control thread; the frame loop only uses it for the
    /// mapped count readback mode and for diagnostics.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::BufferMap`] if the device reports a failure.
    pub fn map_blocking(
        device: &wgpu::Device,
        buffer: &'a wgpu::Buffer,
        what: &'static str,
    ) -> RenderResult<Self> {
        let slice = buffer.slice(..);
        let (tx, rx) = crossbeam_channel::bounded(1);
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        let _ = device.poll(wgpu::Maintain::Wait);

        match rx.recv() {
            Ok(Ok(())) => Ok(Self {
                buffer,
                view: Some(slice.get_mapped_range()),
            }),
            Ok(Err(error)) => Err(RenderError::BufferMap {
                what,
                reason: error.to_string(),
            }),
            Err(_) => Err(RenderError::BufferMap {
                what,
                reason: "map callback dropped".to_string(),
            }),
        }
    }

    /// Mapped bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        self.view.as_deref().unwrap_or(&[])
    }

    /// Mapped contents as `u32` words.
    #[must_use]
    pub fn words(&self) -> &[u32] {
        bytemuck::cast_slice(self.bytes())
    }
}

impl Drop for MappedView<'_> {
    fn drop(&mut self) {
        // The view must be released before unmapping.
        self.view = None;
        self.buffer.unmap();
    }
}

/// Non-blocking map of a readback buffer that completes over later frames.
pub struct PendingReadback {
    receiver: crossbeam_channel::Receiver<Result<(), wgpu::BufferAsyncError>>,
    /// Frame whose data the buffer holds.
    pub frame: u64,
    /// Ring slot of the buffer being mapped.
    pub slot: usize,
}

impl PendingReadback {
    /// Starts mapping `buffer`. The caller must not write the buffer until
    /// [`PendingReadback::try_finish`] has returned `Some`.
    #[must_use]
    pub fn start(buffer: &wgpu::Buffer, frame: u64, slot: usize) -> Self {
        let (tx, receiver) = crossbeam_channel::bounded(1);
        buffer.slice(..).map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        Self { receiver, frame, slot }
    }

    /// Blocks until the map completes and returns the contents.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::BufferMap`] if mapping failed or never
    /// completed.
    pub fn wait(&self, device: &wgpu::Device, buffer: &wgpu::Buffer) -> RenderResult<Vec<u32>> {
        let _ = device.poll(wgpu::Maintain::Wait);
        self.try_finish(device, buffer).unwrap_or_else(|| {
            Err(RenderError::BufferMap {
                what: "counter readback",
                reason: "map still pending after device wait".to_string(),
            })
        })
    }

    /// Polls the device once without blocking.
    ///
    /// Returns `None` while the map is in flight, `Some(Ok(words))` with a
    /// copy of the contents once mapped (the buffer is unmapped again), or
    /// `Some(Err(_))` if mapping failed.
    pub fn try_finish(
        &self,
        device: &wgpu::Device,
        buffer: &wgpu::Buffer,
    ) -> Option<RenderResult<Vec<u32>>> {
        let _ = device.poll(wgpu::Maintain::Poll);
        match self.receiver.try_recv() {
            Ok(Ok(())) => {
                let words = {
                    let view = buffer.slice(..).get_mapped_range();
                    bytemuck::cast_slice::<u8, u32>(&view).to_vec()
                };
                buffer.unmap();
                Some(Ok(words))
            }
            Ok(Err(error)) => Some(Err(RenderError::BufferMap {
                what: "counter readback",
                reason: error.to_string(),
            })),
            Err(crossbeam_channel::TryRecvError::Empty) => None,
            Err(crossbeam_channel::TryRecvError::Disconnected) => Some(Err(RenderError::BufferMap {
                what: "counter readback",
                reason: "map callback dropped".to_string(),
            })),
        }
    }
}
