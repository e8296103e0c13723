//! Block shapes and the PCM block that crosses the thread boundary.
//!
//! A block is one raster invocation's worth of audio: `width * height`
//! texels, one sample per texel. Block sizes are therefore constrained to
//! square grids; [`BlockShape::for_frames`] rounds arbitrary requests to
//! the nearest valid shape.

/// Rectangular raster grid holding one sample per texel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockShape {
    /// Grid width in texels.
    pub width: u32,
    /// Grid height in texels.
    pub height: u32,
}

impl BlockShape {
    /// Default block: 256 x 256 = 65536 samples (~1.49 s at 44.1 kHz).
    pub const DEFAULT: BlockShape = BlockShape {
        width: 256,
        height: 256,
    };

    /// Samples per block.
    pub fn frames(self) -> usize {
        self.width as usize * self.height as usize
    }

    /// Nearest valid square shape for a requested frame count.
    ///
    /// Returns the shape and whether the request had to be rounded. A
    /// request of zero rounds up to the 1 x 1 grid.
    pub fn for_frames(requested: usize) -> (BlockShape, bool) {
        let side = (requested as f64).sqrt().round().max(1.0) as u32;
        let shape = BlockShape {
            width: side,
            height: side,
        };
        (shape, shape.frames() != requested)
    }
}

impl Default for BlockShape {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// One block of planar stereo PCM, tagged with its position in the
/// stream.
///
/// Ownership of a block moves between the producer and the real-time
/// consumer; the type is deliberately not `Clone` so a transfer is
/// always a move. Storage is allocated once (by the pool) and reused
/// across the block's lifetime.
#[derive(Debug)]
pub struct PcmBlock {
    /// Absolute sample offset of the first frame since stream start.
    pub base_sample: u64,
    /// Valid frames in this block.
    pub frames: usize,
    /// Left channel samples, `frames` long.
    pub left: Vec<f32>,
    /// Right channel samples, `frames` long.
    pub right: Vec<f32>,
}

impl PcmBlock {
    /// A silent block of the given length, starting at sample zero.
    pub fn silence(frames: usize) -> Self {
        Self {
            base_sample: 0,
            frames,
            left: vec![0.0; frames],
            right: vec![0.0; frames],
        }
    }

    /// Payload size in bytes: two float channels.
    pub fn byte_len(&self) -> usize {
        self.left.len() * 4 + self.right.len() * 4
    }

    /// Clear the block and retag it for a new position in the stream.
    pub fn reset_for(&mut self, base_sample: u64) {
        self.base_sample = base_sample;
        self.frames = self.left.len();
        self.left.fill(0.0);
        self.right.fill(0.0);
    }

    /// Accumulate a rendered source into this block with the given gain.
    ///
    /// Inputs longer than the block are truncated.
    pub fn accumulate(&mut self, left: &[f32], right: &[f32], gain: f32) {
        let n = self.frames.min(left.len()).min(right.len());
        for i in 0..n {
            self.left[i] += left[i] * gain;
            self.right[i] += right[i] * gain;
        }
    }

    /// Stereo pair at a frame offset, or silence past the end.
    pub fn frame(&self, index: usize) -> (f32, f32) {
        if index < self.frames {
            (self.left[index], self.right[index])
        } else {
            (0.0, 0.0)
        }
    }
}
