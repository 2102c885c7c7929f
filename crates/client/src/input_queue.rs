//! FIFO buffer for input typed while no socket is live.
//!
//! Bounded: when the buffer is full the oldest chunk is dropped, so a long
//! outage costs the user their earliest keystrokes, never reordering.

use std::collections::VecDeque;

pub struct InputQueue {
    chunks: VecDeque<Vec<u8>>,
    capacity: usize,
    dropped: u64,
}

impl InputQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            chunks: VecDeque::new(),
            capacity: capacity.max(1),
            dropped: 0,
        }
    }

    /// Enqueue a chunk, evicting the oldest one when at capacity.
    pub fn push(&mut self, bytes: Vec<u8>) {
        if self.chunks.len() == self.capacity {
            self.chunks.pop_front();
            self.dropped += 1;
            tracing::warn!(
                dropped_total = self.dropped,
                capacity = self.capacity,
                "input queue full, dropping oldest chunk"
            );
        }
        self.chunks.push_back(bytes);
    }

    /// Remove and return every buffered chunk in insertion order.
    pub fn drain(&mut self) -> Vec<Vec<u8>> {
        self.chunks.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Chunks evicted over the queue's lifetime.
    pub const fn dropped(&self) -> u64 {
        self.dropped
    }
}
