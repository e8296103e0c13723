//! Block-rendering stream producer.
//!
//! The producer reacts to consumer backpressure: each need request is
//! turned into a batch of blocks, each block rendered once per active
//! source, mixed, written into that source's sample ring, and moved
//! across the link. It never pushes beyond what was requested and never
//! allocates block memory outside the pool.

use std::sync::atomic::Ordering;
use std::sync::mpsc;

use rasterwave_core::{BlockPool, BlockShape, PcmBlock, SampleRingSet, decode_image};

use crate::config::EngineConfig;
use crate::diag::Diagnostic;
use crate::link::{NeedRequest, ProducerLink};
use crate::source::{SoundRaster, SoundSource};

/// Mutable stream position, reset on stop/seek.
#[derive(Debug, Default)]
struct StreamState {
    /// Whether the stream is producing.
    active: bool,
    /// Next block to render, counted from the stream (re)start.
    next_block_index: u64,
    /// Absolute sample offset of the stream start (seek position).
    origin_sample: u64,
    /// Blocks transferred since the (re)start.
    rendered_blocks: u64,
}

/// One source plus its failure-reporting latch.
struct SourceSlot {
    source: SoundSource,
    /// A render failure was already reported; cleared on recovery.
    failure_reported: bool,
}

/// The producer half of the pipeline.
pub struct StreamProducer<R> {
    raster: R,
    sources: Vec<SourceSlot>,
    rings: SampleRingSet,
    pool: BlockPool,
    link: ProducerLink,
    shape: BlockShape,
    state: StreamState,
    diagnostics: mpsc::Sender<Diagnostic>,
}

impl<R: SoundRaster> StreamProducer<R> {
    /// Assemble a producer from resolved sources.
    ///
    /// The pool and per-source rings are sized from `config`; the block
    /// shape has already been validated by the engine.
    pub fn new(
        raster: R,
        sources: Vec<SoundSource>,
        shape: BlockShape,
        config: &EngineConfig,
        link: ProducerLink,
        diagnostics: mpsc::Sender<Diagnostic>,
    ) -> Self {
        let frames = shape.frames();
        let mut rings = SampleRingSet::new();
        for index in 0..sources.len() {
            rings.configure(index, frames, config.ring_depth);
        }

        Self {
            raster,
            sources: sources
                .into_iter()
                .map(|source| SourceSlot {
                    source,
                    failure_reported: false,
                })
                .collect(),
            rings,
            pool: BlockPool::for_stream(frames, config.sample_rate, config.pool_min),
            link,
            shape,
            state: StreamState::default(),
            diagnostics,
        }
    }

    /// Whether the stream is currently producing.
    pub fn active(&self) -> bool {
        self.state.active
    }

    /// The transfer pool, for observability.
    pub fn pool(&self) -> &BlockPool {
        &self.pool
    }

    /// The flags and counters shared with the consumer side.
    pub fn shared(&self) -> &crate::link::SharedState {
        &self.link.shared
    }

    /// Read a stereo pair from a source's feedback ring.
    pub fn ring_sample(&self, source: usize, sample_index: i64) -> (f32, f32) {
        self.rings.read(source, sample_index)
    }

    /// Begin (or re-begin) streaming at an absolute sample offset.
    ///
    /// Clears history, zeroes the block counter, and tells the consumer
    /// to discard anything still queued from before the seek.
    pub fn start(&mut self, offset_sample: u64) {
        self.state = StreamState {
            active: true,
            origin_sample: offset_sample,
            ..StreamState::default()
        };
        self.rings.clear();
        self.link.shared.primed.store(false, Ordering::Release);
        self.link.shared.paused.store(false, Ordering::Release);
        self.link.shared.request_reset();
        // Requests issued against the old stream position are stale.
        while self.link.needs.pop().is_ok() {}
        tracing::info!(offset_sample, "stream started");
    }

    /// Stop producing and discard queued audio.
    pub fn stop(&mut self) {
        self.state = StreamState::default();
        self.link.shared.primed.store(false, Ordering::Release);
        self.link.shared.request_reset();
        tracing::info!("stream stopped");
    }

    /// One scheduling turn: recover recycled buffers, then serve any
    /// pending need requests.
    pub fn pump(&mut self) {
        while let Ok(block) = self.link.recycle.pop() {
            self.pool.release(block);
        }
        while let Ok(need) = self.link.needs.pop() {
            if self.state.active {
                self.serve(need);
            }
        }
    }

    /// Render and transfer one batch for a need request.
    fn serve(&mut self, need: NeedRequest) {
        let frames = self.shape.frames();
        let blocks_needed = need.frames_wanted.div_ceil(frames);
        tracing::debug!(
            want_base_sample = need.want_base_sample,
            frames_wanted = need.frames_wanted,
            blocks_needed,
            "serving need request"
        );

        for delivered in 0..blocks_needed {
            let Some(mut block) = self.pool.acquire() else {
                let diag = Diagnostic::PoolExhausted {
                    wanted: blocks_needed,
                    delivered,
                };
                tracing::warn!(%diag, "batch truncated");
                let _ = self.diagnostics.send(diag);
                return;
            };

            block.reset_for(self.state.origin_sample + self.state.next_block_index * frames as u64);
            self.render_into(&mut block);

            match self.link.blocks.push(block) {
                Ok(()) => {
                    if self.state.rendered_blocks == 0 {
                        self.link.shared.primed.store(true, Ordering::Release);
                    }
                    self.state.rendered_blocks += 1;
                    self.state.next_block_index += 1;
                }
                Err(rtrb::PushError::Full(block)) => {
                    // Consumer already holds a full queue; put the
                    // buffer back and wait for the next request.
                    self.pool.release(block);
                    return;
                }
            }
        }
    }

    /// Render every source for one block, mix, and record history.
    fn render_into(&mut self, block: &mut PcmBlock) {
        if self.sources.is_empty() {
            return;
        }
        // Plain average across sources; the loudness characteristic of
        // the mix is part of the contract with existing programs.
        let gain = 1.0 / self.sources.len() as f32;
        let frames = block.frames;

        for (index, slot) in self.sources.iter_mut().enumerate() {
            let rendered = self.raster.render(
                slot.source.program,
                block.base_sample,
                self.shape,
                slot.source.resolution.mode,
                &self.rings,
            );
            match rendered {
                Ok(image) => {
                    let (left, right) = decode_image(&image.data, image.mode, frames);
                    if let Some(ring) = self.rings.get_mut(index) {
                        ring.write(block.base_sample, &left, &right);
                    }
                    block.accumulate(&left, &right, gain);
                    slot.failure_reported = false;
                }
                Err(err) => {
                    if !slot.failure_reported {
                        let diag = Diagnostic::RenderFailed {
                            source: slot.source.name.clone(),
                            reason: err.to_string(),
                        };
                        tracing::warn!(%diag, "source skipped");
                        let _ = self.diagnostics.send(diag);
                        slot.failure_reported = true;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::{ConsumerLink, stream_link};
    use crate::source::{SoftwareRaster, SourceDefinition};
    use rasterwave_core::{Capabilities, PrecisionMode};

    fn test_config() -> EngineConfig {
        EngineConfig {
            sample_rate: 64,
            block_frames: 16,
            ring_depth: 2,
            pool_min: 2,
            low_water_frames: 16,
            target_frames: 32,
            ..EngineConfig::default()
        }
    }

    fn build_producer(
        programs: Vec<Option<f32>>,
    ) -> (
        StreamProducer<SoftwareRaster>,
        ConsumerLink,
        mpsc::Receiver<Diagnostic>,
    ) {
        let config = test_config();
        let mut raster = SoftwareRaster::new(config.sample_rate);
        let sources: Vec<SoundSource> = programs
            .into_iter()
            .enumerate()
            .map(|(i, value)| {
                let program = match value {
                    Some(v) => raster.add_program(Box::new(move |_, _, _| (v, v))),
                    None => raster.add_broken_program(),
                };
                SoundSource::resolve(
                    &SourceDefinition::stereo(format!("src{i}"), program),
                    PrecisionMode::Float32,
                    Capabilities::full(),
                )
            })
            .collect();

        let (producer_link, consumer_link) = stream_link(8, 8);
        let (diag_tx, diag_rx) = mpsc::channel();
        let shape = BlockShape { width: 4, height: 4 };
        let producer = StreamProducer::new(raster, sources, shape, &config, producer_link, diag_tx);
        (producer, consumer_link, diag_rx)
    }

    fn need(frames_wanted: usize) -> NeedRequest {
        NeedRequest {
            want_base_sample: 0,
            frames_wanted,
        }
    }

    #[test]
    fn delivered_blocks_are_contiguous() {
        let (mut producer, mut consumer, _diag) = build_producer(vec![Some(0.5)]);
        producer.start(0);
        consumer.needs.push(need(48)).unwrap();
        producer.pump();

        let mut expected_base = 0u64;
        for _ in 0..3 {
            let block = consumer.blocks.pop().unwrap();
            assert_eq!(block.base_sample, expected_base);
            expected_base += block.frames as u64;
        }
        assert!(consumer.blocks.pop().is_err());
    }

    #[test]
    fn start_offset_tags_first_block() {
        let (mut producer, mut consumer, _diag) = build_producer(vec![Some(0.5)]);
        producer.start(128);
        consumer.needs.push(need(16)).unwrap();
        producer.pump();

        // start() resets the consumer; the reset flag is set.
        assert!(producer.link.shared.reset.load(Ordering::Acquire));
        assert_eq!(consumer.blocks.pop().unwrap().base_sample, 128);
    }

    #[test]
    fn two_sources_mix_to_their_average() {
        let (mut producer, mut consumer, _diag) = build_producer(vec![Some(1.0), Some(0.0)]);
        producer.start(0);
        consumer.needs.push(need(16)).unwrap();
        producer.pump();

        let block = consumer.blocks.pop().unwrap();
        assert_eq!(block.frame(0), (0.5, 0.5));
    }

    #[test]
    fn broken_source_contributes_silence_and_one_diagnostic() {
        let (mut producer, mut consumer, diag) = build_producer(vec![Some(1.0), None]);
        producer.start(0);
        consumer.needs.push(need(32)).unwrap();
        producer.pump();

        // Average over source count, broken source contributes zero.
        let block = consumer.blocks.pop().unwrap();
        assert_eq!(block.frame(0), (0.5, 0.5));

        // Two blocks rendered, one failure report.
        let reports: Vec<_> = diag.try_iter().collect();
        assert_eq!(reports.len(), 1);
        assert!(matches!(
            &reports[0],
            Diagnostic::RenderFailed { source, .. } if source == "src1"
        ));
    }

    #[test]
    fn pool_exhaustion_truncates_batch_with_advisory() {
        let (mut producer, mut consumer, diag) = build_producer(vec![Some(0.25)]);
        producer.start(0);
        // Pool capacity is 2 (64 Hz / 2 covers 2 blocks of 16).
        assert_eq!(producer.pool().capacity(), 2);

        consumer.needs.push(need(5 * 16)).unwrap();
        producer.pump();

        let mut received = 0;
        while consumer.blocks.pop().is_ok() {
            received += 1;
        }
        assert_eq!(received, 2);
        assert!(matches!(
            diag.try_iter().next(),
            Some(Diagnostic::PoolExhausted {
                wanted: 5,
                delivered: 2
            })
        ));
    }

    #[test]
    fn recycled_blocks_replenish_the_pool() {
        let (mut producer, mut consumer, _diag) = build_producer(vec![Some(0.25)]);
        producer.start(0);
        consumer.needs.push(need(32)).unwrap();
        producer.pump();
        assert_eq!(producer.pool().free_count(), 0);

        let block = consumer.blocks.pop().unwrap();
        consumer.recycle.push(block).unwrap();
        producer.pump();
        assert_eq!(producer.pool().free_count(), 1);
    }

    #[test]
    fn idle_producer_ignores_needs() {
        let (mut producer, mut consumer, _diag) = build_producer(vec![Some(0.25)]);
        consumer.needs.push(need(16)).unwrap();
        producer.pump();
        assert!(consumer.blocks.pop().is_err());
    }

    #[test]
    fn feedback_ring_carries_previous_block() {
        let (mut producer, mut consumer, _diag) = build_producer(vec![Some(0.25)]);
        producer.start(0);
        consumer.needs.push(need(32)).unwrap();
        producer.pump();

        // Both blocks wrote 0.25 into the ring at their positions.
        assert_eq!(producer.ring_sample(0, 0), (0.25, 0.25));
        assert_eq!(producer.ring_sample(0, 31), (0.25, 0.25));
        assert_eq!(producer.ring_sample(0, 32), (0.0, 0.0));
        let _ = consumer;
    }
}
