//! Bounded receive buffer.
//!
//! A single contiguous byte region with a live-length cursor: bytes
//! `[0, len())` are the unconsumed tail of the wire stream. Consuming a
//! frame shifts the remaining tail down to index 0.

use heapless::Vec;

pub struct RxBuffer<const N: usize> {
    buf: Vec<u8, N>,
}

impl<const N: usize> RxBuffer<N> {
    pub const fn new() -> Self {
        RxBuffer { buf: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn capacity(&self) -> usize {
        N
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Append as many bytes as fit. Returns the number actually appended;
    /// if `bytes` would overflow the capacity, only the prefix that fits
    /// is appended and the caller is expected to treat the remainder as
    /// dropped input (§4.A overflow policy).
    pub fn append(&mut self, bytes: &[u8]) -> usize {
        let room = N - self.buf.len();
        let take = room.min(bytes.len());
        // extend_from_slice cannot fail here: `take` was computed to fit.
        let _ = self.buf.extend_from_slice(&bytes[..take]);
        take
    }

    /// Drop `count` bytes from the front, shifting the remaining tail to
    /// index 0. `count` is clamped to the current length.
    pub fn drop_front(&mut self, count: usize) {
        let len = self.buf.len();
        if count >= len {
            self.buf.clear();
            return;
        }
        for i in 0..(len - count) {
            self.buf[i] = self.buf[i + count];
        }
        self.buf.truncate(len - count);
    }
}

impl<const N: usize> Default for RxBuffer<N> {
    fn default() -> Self {
        Self::new()
    }
}
