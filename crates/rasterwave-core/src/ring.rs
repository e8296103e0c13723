//! Cyclic sample history for feedback reads.
//!
//! Each sound source keeps its last `ring_depth` rendered blocks in a
//! circular store so a synthesis program can read back audio it (or
//! another source) produced in the recent past. That is what makes
//! feedback and delay effects possible without unbounded memory.
//!
//! Addressing is by absolute sample index: block `b` occupies slot
//! `b % ring_depth`, and a read checks that the slot still holds the
//! block it expects. History older than `ring_depth` blocks reads as
//! silence.

/// Circular history of the last `ring_depth` blocks for one source.
#[derive(Debug, Clone)]
pub struct SampleRing {
    /// Samples per block.
    block_frames: usize,
    /// Number of blocks retained.
    ring_depth: usize,
    /// Left channel storage, `block_frames * ring_depth` long.
    left: Vec<f32>,
    /// Right channel storage, `block_frames * ring_depth` long.
    right: Vec<f32>,
    /// Which block index currently occupies each slot.
    slot_block: Vec<Option<u64>>,
}

impl SampleRing {
    /// Create a ring holding `ring_depth` blocks of `block_frames`.
    ///
    /// # Panics
    ///
    /// Panics if either dimension is zero.
    pub fn new(block_frames: usize, ring_depth: usize) -> Self {
        assert!(block_frames > 0, "block_frames must be > 0");
        assert!(ring_depth > 0, "ring_depth must be > 0");
        Self {
            block_frames,
            ring_depth,
            left: vec![0.0; block_frames * ring_depth],
            right: vec![0.0; block_frames * ring_depth],
            slot_block: vec![None; ring_depth],
        }
    }

    /// Samples per block.
    pub fn block_frames(&self) -> usize {
        self.block_frames
    }

    /// Blocks of history retained.
    pub fn ring_depth(&self) -> usize {
        self.ring_depth
    }

    /// Write rendered samples starting at an absolute sample index.
    ///
    /// Samples that would spill past the end of the starting block are
    /// dropped rather than wrapped; a spill means the caller's block
    /// size disagrees with the ring's, which is a configuration problem
    /// and not worth corrupting neighbouring history over. Returns the
    /// number of samples actually stored.
    pub fn write(&mut self, start_sample: u64, left: &[f32], right: &[f32]) -> usize {
        let block_index = start_sample / self.block_frames as u64;
        let local = (start_sample % self.block_frames as u64) as usize;
        let slot = (block_index % self.ring_depth as u64) as usize;
        let base = slot * self.block_frames;

        let n = left.len().min(right.len());
        let writable = n.min(self.block_frames.saturating_sub(local));
        if writable < n {
            tracing::debug!(
                start_sample,
                dropped = n - writable,
                "ring write clipped at block boundary"
            );
        }

        self.left[base + local..base + local + writable].copy_from_slice(&left[..writable]);
        self.right[base + local..base + local + writable].copy_from_slice(&right[..writable]);
        self.slot_block[slot] = Some(block_index);
        writable
    }

    /// Read the stereo pair at an absolute sample index.
    ///
    /// Returns silence for negative indices and for samples whose block
    /// has already been overwritten (older than `ring_depth` blocks).
    pub fn read(&self, sample_index: i64) -> (f32, f32) {
        if sample_index < 0 {
            return (0.0, 0.0);
        }
        let sample = sample_index as u64;
        let block_index = sample / self.block_frames as u64;
        let slot = (block_index % self.ring_depth as u64) as usize;
        if self.slot_block[slot] != Some(block_index) {
            return (0.0, 0.0);
        }
        let offset = slot * self.block_frames + (sample % self.block_frames as u64) as usize;
        (self.left[offset], self.right[offset])
    }

    /// Forget all history, keeping the allocation.
    pub fn clear(&mut self) {
        self.left.fill(0.0);
        self.right.fill(0.0);
        self.slot_block.fill(None);
    }
}

/// Sample rings for a set of sources, keyed by source index.
#[derive(Debug, Default)]
pub struct SampleRingSet {
    rings: Vec<Option<SampleRing>>,
}

impl SampleRingSet {
    /// An empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace the ring for a source index.
    pub fn configure(&mut self, source: usize, block_frames: usize, ring_depth: usize) {
        if self.rings.len() <= source {
            self.rings.resize(source + 1, None);
        }
        self.rings[source] = Some(SampleRing::new(block_frames, ring_depth));
    }

    /// The ring for a source, if configured.
    pub fn get_mut(&mut self, source: usize) -> Option<&mut SampleRing> {
        self.rings.get_mut(source).and_then(Option::as_mut)
    }

    /// Read a stereo pair from a source's history.
    ///
    /// Silence if the source has no ring or the sample is out of range.
    pub fn read(&self, source: usize, sample_index: i64) -> (f32, f32) {
        match self.rings.get(source).and_then(Option::as_ref) {
            Some(ring) => ring.read(sample_index),
            None => (0.0, 0.0),
        }
    }

    /// Clear every configured ring.
    pub fn clear(&mut self) {
        for ring in self.rings.iter_mut().flatten() {
            ring.clear();
        }
    }
}
