//! Fixed-capacity pool of recyclable PCM blocks.
//!
//! Blocks are pre-allocated at configuration time and recycled through
//! acquire/release, so the steady-state streaming path never allocates.
//! The pool is bounded: when it runs dry the producer must shorten its
//! batch instead of allocating more memory.
//!
//! Changing the block size discards the whole pool and refills it at the
//! new size. Buffers still in flight from the old configuration drain
//! back eventually and are recognised by their stale byte size and
//! dropped instead of re-inserted.

use crate::block::PcmBlock;

/// Bounded collection of reusable [`PcmBlock`] buffers of one size.
#[derive(Debug)]
pub struct BlockPool {
    /// Frames per pooled block under the current configuration.
    block_frames: usize,
    /// Total buffers this configuration owns.
    capacity: usize,
    /// Buffers ready to hand out.
    free: Vec<PcmBlock>,
    /// Buffers currently on loan.
    outstanding: usize,
}

impl BlockPool {
    /// Create a pool of `capacity` pre-allocated blocks of `block_frames`.
    pub fn new(block_frames: usize, capacity: usize) -> Self {
        let mut pool = Self {
            block_frames,
            capacity,
            free: Vec::with_capacity(capacity),
            outstanding: 0,
        };
        pool.refill();
        pool
    }

    /// Size a pool to cover roughly half a second of playback.
    ///
    /// `min_capacity` puts a floor under the count so short blocks still
    /// get enough slack to absorb scheduling jitter.
    pub fn for_stream(block_frames: usize, sample_rate: u32, min_capacity: usize) -> Self {
        let capacity = Self::stream_capacity(block_frames, sample_rate, min_capacity);
        Self::new(block_frames, capacity)
    }

    /// The capacity [`for_stream`](Self::for_stream) would choose.
    ///
    /// Exposed so callers sizing the transfer queues can match the pool
    /// without constructing one.
    pub fn stream_capacity(block_frames: usize, sample_rate: u32, min_capacity: usize) -> usize {
        let half_second = (sample_rate as usize) / 2;
        half_second.div_ceil(block_frames.max(1)).max(min_capacity)
    }

    /// Frames per pooled block.
    pub fn block_frames(&self) -> usize {
        self.block_frames
    }

    /// Total buffers under the current configuration.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Buffers ready to hand out.
    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    /// Buffers currently on loan.
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    /// Expected payload size of a pooled buffer, in bytes.
    fn expected_bytes(&self) -> usize {
        self.block_frames * 2 * 4
    }

    /// Take a buffer, or `None` if the pool is exhausted.
    pub fn acquire(&mut self) -> Option<PcmBlock> {
        let block = self.free.pop()?;
        self.outstanding += 1;
        Some(block)
    }

    /// Return a buffer to the pool.
    ///
    /// Buffers whose size does not match the current configuration are
    /// stale survivors of a reconfigure; they are dropped, not inserted.
    pub fn release(&mut self, block: PcmBlock) {
        if block.byte_len() != self.expected_bytes() {
            tracing::debug!(
                got = block.byte_len(),
                expected = self.expected_bytes(),
                "dropping stale pool buffer"
            );
            return;
        }
        debug_assert!(self.outstanding > 0, "release without matching acquire");
        if self.free.len() < self.capacity {
            self.free.push(block);
        }
        self.outstanding = self.outstanding.saturating_sub(1);
    }

    /// Discard the pool and refill at a new block size.
    ///
    /// Outstanding buffers keep their old size and will be dropped when
    /// they come back through [`release`](Self::release).
    pub fn reconfigure(&mut self, block_frames: usize, capacity: usize) {
        if self.outstanding > 0 {
            tracing::debug!(
                outstanding = self.outstanding,
                "reconfiguring pool with buffers still in flight"
            );
        }
        self.block_frames = block_frames;
        self.capacity = capacity;
        self.outstanding = 0;
        self.refill();
    }

    fn refill(&mut self) {
        self.free.clear();
        for _ in 0..self.capacity {
            self.free.push(PcmBlock::silence(self.block_frames));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_release_conserves_buffers() {
        let mut pool = BlockPool::new(16, 3);
        assert_eq!(pool.free_count(), 3);

        let a = pool.acquire().unwrap();
        let b = pool.acquire().unwrap();
        assert_eq!(pool.free_count() + pool.outstanding(), 3);

        pool.release(a);
        pool.release(b);
        assert_eq!(pool.free_count(), 3);
        assert_eq!(pool.outstanding(), 0);
    }

    #[test]
    fn exhausted_pool_returns_none() {
        let mut pool = BlockPool::new(16, 1);
        let block = pool.acquire().unwrap();
        assert!(pool.acquire().is_none());
        pool.release(block);
        assert!(pool.acquire().is_some());
    }

    #[test]
    fn wrong_size_release_is_dropped() {
        let mut pool = BlockPool::new(16, 2);
        let _keep = pool.acquire().unwrap();
        pool.release(PcmBlock::silence(8));
        // The stale buffer must not have been inserted.
        assert_eq!(pool.free_count(), 1);
        assert_eq!(pool.outstanding(), 1);
    }

    #[test]
    fn reconfigure_discards_and_refills() {
        let mut pool = BlockPool::new(16, 2);
        let old = pool.acquire().unwrap();

        pool.reconfigure(32, 3);
        assert_eq!(pool.free_count(), 3);
        assert_eq!(pool.block_frames(), 32);

        // Old-configuration buffer drains back and is discarded.
        pool.release(old);
        assert_eq!(pool.free_count(), 3);
        assert!(pool.free_count() + pool.outstanding() <= pool.capacity());
    }

    #[test]
    fn stream_sizing_has_a_floor() {
        // Huge blocks: half a second fits in one block, floor wins.
        let pool = BlockPool::for_stream(65536, 44100, 3);
        assert_eq!(pool.capacity(), 3);

        // Small blocks: enough for ~0.5 s.
        let pool = BlockPool::for_stream(4410, 44100, 3);
        assert_eq!(pool.capacity(), 5);
    }
}
