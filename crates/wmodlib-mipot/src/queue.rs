//! Bounded FIFO of indications seen while waiting for a reply.

use std::collections::VecDeque;

use tracing::warn;

use crate::frame::DecodedFrame;

/// Default number of indications held before new ones are dropped.
pub const DEFAULT_QUEUE_CAPACITY: usize = 32;

/// A fixed-capacity indication queue.
///
/// Enqueueing never blocks and never evicts: when the queue is full the
/// incoming frame is dropped.
#[derive(Debug, Clone)]
pub struct IndicationQueue {
    frames: VecDeque<DecodedFrame>,
    capacity: usize,
}

impl IndicationQueue {
    /// Create an empty queue holding at most `capacity` frames.
    pub fn new(capacity: usize) -> Self {
        IndicationQueue {
            frames: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append `frame` unless the queue is full.
    ///
    /// Returns `false` if the frame was dropped.
    pub fn try_enqueue(&mut self, frame: DecodedFrame) -> bool {
        if self.frames.len() >= self.capacity {
            warn!(
                "indication queue full ({} entries), dropping indication 0x{:02X}",
                self.capacity, frame.code
            );
            return false;
        }
        self.frames.push_back(frame);
        true
    }

    /// Remove and return the oldest frame.
    pub fn try_dequeue(&mut self) -> Option<DecodedFrame> {
        self.frames.pop_front()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for IndicationQueue {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}
