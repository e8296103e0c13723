//! Property-based tests for rasterwave-core.
//!
//! Covers codec round-trip tolerances, ring addressing across arbitrary
//! write sequences, and pool conservation under random acquire/release
//! interleavings.

use proptest::prelude::*;
use rasterwave_core::codec::{pack8, pack16, unpack8, unpack16};
use rasterwave_core::{BlockPool, BlockShape, PcmBlock, PrecisionMode, SampleRing, decode_image, encode_image};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Packed16 reconstructs any sample in [-1, 1] within one LSB of
    /// the 16-bit integer domain.
    #[test]
    fn pack16_round_trip(value in -1.0f32..=1.0f32) {
        let (lo, hi) = pack16(value);
        let decoded = unpack16(lo, hi);
        prop_assert!(
            (decoded - value).abs() <= 1.0 / 65535.0,
            "pack16({value}) decoded to {decoded}"
        );
    }

    /// Packed8 reconstructs any sample in [-1, 1] within one LSB of the
    /// 8-bit integer domain.
    #[test]
    fn pack8_round_trip(value in -1.0f32..=1.0f32) {
        let decoded = unpack8(pack8(value));
        prop_assert!(
            (decoded - value).abs() <= 1.0 / 255.0,
            "pack8({value}) decoded to {decoded}"
        );
    }

    /// Whole-image encode/decode stays within the per-mode tolerance
    /// for every precision mode.
    #[test]
    fn image_round_trip_within_tolerance(
        samples in prop::collection::vec(-1.0f32..=1.0f32, 1..128),
        mode_index in 0usize..4,
    ) {
        let mode = match mode_index {
            0 => PrecisionMode::Float32,
            1 => PrecisionMode::Float16,
            2 => PrecisionMode::Packed16,
            _ => PrecisionMode::Packed8,
        };
        let tolerance = match mode {
            PrecisionMode::Float32 => 0.0,
            PrecisionMode::Float16 => 1.0 / 512.0,
            PrecisionMode::Packed16 => 1.0 / 65535.0,
            PrecisionMode::Packed8 => 1.0 / 255.0,
        };

        let raw = encode_image(&samples, &samples, mode);
        let (left, right) = decode_image(&raw, mode, samples.len());
        for (i, &expected) in samples.iter().enumerate() {
            prop_assert!(
                (left[i] - expected).abs() <= tolerance,
                "{mode} left[{i}]: {expected} decoded to {}",
                left[i]
            );
            prop_assert!((right[i] - expected).abs() <= tolerance);
        }
    }

    /// After writing any run of consecutive blocks, the newest
    /// `ring_depth` blocks read back exactly and older blocks read as
    /// silence.
    #[test]
    fn ring_retains_exactly_ring_depth_blocks(
        block_frames in 1usize..32,
        ring_depth in 1usize..6,
        blocks_written in 1u64..20,
    ) {
        let mut ring = SampleRing::new(block_frames, ring_depth);
        for b in 0..blocks_written {
            let fill = b as f32 + 1.0;
            let data = vec![fill; block_frames];
            ring.write(b * block_frames as u64, &data, &data);
        }

        let oldest_retained = blocks_written.saturating_sub(ring_depth as u64);
        for b in 0..blocks_written {
            let sample = (b * block_frames as u64) as i64;
            let (l, _) = ring.read(sample);
            if b >= oldest_retained {
                prop_assert_eq!(l, b as f32 + 1.0, "block {} should be retained", b);
            } else {
                prop_assert_eq!(l, 0.0, "block {} should have been evicted", b);
            }
        }
    }

    /// free + outstanding never exceeds capacity, whatever order
    /// acquires and releases happen in.
    #[test]
    fn pool_conservation(ops in prop::collection::vec(any::<bool>(), 1..64)) {
        let mut pool = BlockPool::new(8, 4);
        let mut held: Vec<PcmBlock> = Vec::new();

        for acquire in ops {
            if acquire {
                if let Some(block) = pool.acquire() {
                    held.push(block);
                }
            } else if let Some(block) = held.pop() {
                pool.release(block);
            }
            prop_assert!(pool.free_count() + pool.outstanding() <= pool.capacity());
            prop_assert_eq!(pool.outstanding(), held.len());
        }
    }

    /// Any requested frame count rounds to a square within half a side
    /// of the exact square root.
    #[test]
    fn block_shape_rounds_to_nearest_square(requested in 1usize..1_000_000) {
        let (shape, rounded) = BlockShape::for_frames(requested);
        prop_assert_eq!(shape.width, shape.height);
        prop_assert_eq!(rounded, shape.frames() != requested);

        let exact = (requested as f64).sqrt();
        prop_assert!((f64::from(shape.width) - exact).abs() <= 0.5 + f64::EPSILON);
    }
}
