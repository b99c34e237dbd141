//! Fixed-capacity buffer pool for one hardware port

use std::sync::Mutex;

use bytes::BytesMut;
use tracing::error;

/// A unit of transfer between pipeline stages.
///
/// Ownership is expressed by moves: at any instant a buffer lives in its
/// pool, inside a hardware stage, in the completion FIFO, or in the
/// application's hands - never in two places at once. Payload bytes are
/// only touched by the current owner, so no lock guards them.
#[derive(Debug)]
pub struct Buffer {
    slot: usize,
    size: usize,
    data: BytesMut,
}

impl Buffer {
    fn new(slot: usize, size: usize) -> Self {
        Self {
            slot,
            size,
            data: BytesMut::with_capacity(size),
        }
    }

    /// Slot index within the owning pool.
    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Payload size the pool allocated for this buffer.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Valid payload bytes.
    pub fn payload(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Replace the payload. Called by the side that currently owns the
    /// buffer (the hardware stage filling it). Bytes beyond the fixed
    /// allocation size are dropped.
    pub fn fill(&mut self, bytes: &[u8]) {
        let len = bytes.len().min(self.size);
        self.data.clear();
        self.data.extend_from_slice(&bytes[..len]);
    }

    /// Drop the payload without releasing the buffer.
    pub fn clear(&mut self) {
        self.data.clear();
    }
}

/// Pre-allocated buffers for one port. Capacity is fixed at creation and
/// the pool never grows: an empty pool is backpressure, not an error.
pub struct BufferPool {
    slots: Mutex<Vec<Buffer>>,
    capacity: usize,
    buffer_size: usize,
}

impl BufferPool {
    pub fn new(count: usize, size: usize) -> Self {
        let slots = (0..count).map(|slot| Buffer::new(slot, size)).collect();
        Self {
            slots: Mutex::new(slots),
            capacity: count,
            buffer_size: size,
        }
    }

    /// Non-blocking acquire. `None` means every buffer is currently held
    /// elsewhere; callers retry once one is released.
    pub fn try_acquire(&self) -> Option<Buffer> {
        self.slots.lock().unwrap().pop()
    }

    /// Return a buffer, cleared, ready for reacquisition.
    pub fn release(&self, mut buffer: Buffer) {
        buffer.clear();
        self.slots.lock().unwrap().push(buffer);
    }

    /// Recover every pooled buffer at teardown, before the pool is dropped.
    ///
    /// Buffers still held by hardware at this point are an ordering
    /// violation in the stop sequence; teardown is best-effort so this is
    /// reported rather than escalated.
    pub fn drain(&self) -> Vec<Buffer> {
        let mut slots = self.slots.lock().unwrap();
        let drained = std::mem::take(&mut *slots);
        if drained.len() != self.capacity {
            error!(
                recovered = drained.len(),
                capacity = self.capacity,
                "pool drained with buffers still outstanding"
            );
        }
        drained
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Buffers currently sitting in the pool.
    pub fn available(&self) -> usize {
        self.slots.lock().unwrap().len()
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }
}
