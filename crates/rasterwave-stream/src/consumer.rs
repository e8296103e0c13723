//! Real-time playback consumer.
//!
//! Runs inside the audio output callback. Every quantum it serves
//! interleaved stereo frames from its FIFO of received blocks, returns
//! drained blocks for recycling, and emits pull-based backpressure when
//! the queue falls below the low-water mark.
//!
//! Hard rules for this code path: no blocking, no locks, no allocation.
//! Starvation is answered with silence and an underrun count, never a
//! wait.

use std::collections::VecDeque;
use std::sync::atomic::Ordering;

use rasterwave_core::PcmBlock;

use crate::config::EngineConfig;
use crate::link::{ConsumerLink, NeedRequest};

/// The consumer half of the pipeline.
pub struct PlaybackConsumer {
    link: ConsumerLink,
    /// Received blocks awaiting playback, strictly FIFO.
    fifo: VecDeque<PcmBlock>,
    /// Bound on blocks held locally; the rest stay in the queue.
    fifo_capacity: usize,
    /// Block currently being played.
    current: Option<PcmBlock>,
    /// Frames already played from `current`.
    current_offset: usize,
    /// Frames remaining across `current` and the FIFO.
    queued_frames: usize,
    /// Frames played from real blocks since the last reset.
    playhead: u64,
    /// Threshold below which more audio is requested.
    low_water_frames: usize,
    /// Queue level a need request asks to restore.
    target_frames: usize,
    /// Quanta to wait between need requests.
    cooldown_quanta: usize,
    cooldown_remaining: usize,
    /// A need was emitted and not yet satisfied. Expires with the
    /// cooldown: a producer-side restart drains the needs queue and can
    /// swallow a request, so an unanswered one must not latch forever.
    need_in_flight: bool,
    underruns: u64,
}

impl PlaybackConsumer {
    /// Wrap the consumer end of a stream link.
    pub fn new(link: ConsumerLink, config: &EngineConfig, fifo_capacity: usize) -> Self {
        Self {
            link,
            fifo: VecDeque::with_capacity(fifo_capacity),
            fifo_capacity,
            current: None,
            current_offset: 0,
            queued_frames: 0,
            playhead: 0,
            low_water_frames: config.low_water_frames,
            target_frames: config.target_frames,
            cooldown_quanta: config.cooldown_quanta,
            cooldown_remaining: 0,
            need_in_flight: false,
            underruns: 0,
        }
    }

    /// Frames queued but not yet played.
    pub fn queued_frames(&self) -> usize {
        self.queued_frames
    }

    /// Quanta that ran dry since the last reset.
    pub fn underruns(&self) -> u64 {
        self.underruns
    }

    /// Fill one quantum of interleaved stereo output.
    ///
    /// Produces exactly `out.len() / 2` frames, padding with silence on
    /// starvation. Never blocks.
    pub fn fill(&mut self, out: &mut [f32]) {
        if self.link.shared.reset.swap(false, Ordering::AcqRel) {
            self.apply_reset();
        }

        self.ingest();

        if self.link.shared.paused.load(Ordering::Acquire) {
            out.fill(0.0);
            return;
        }

        let frames = out.len() / 2;
        let audible = self.link.shared.audible();
        let mut frame_index = 0;
        let mut starved = false;

        while frame_index < frames {
            if self.current.is_none() {
                self.current = self.fifo.pop_front();
                self.current_offset = 0;
            }
            let Some(block) = self.current.as_ref() else {
                starved = true;
                break;
            };

            let writable = (frames - frame_index).min(block.frames - self.current_offset);
            for i in 0..writable {
                let (l, r) = block.frame(self.current_offset + i);
                let at = (frame_index + i) * 2;
                if audible {
                    out[at] = l;
                    out[at + 1] = r;
                } else {
                    out[at] = 0.0;
                    out[at + 1] = 0.0;
                }
            }

            self.current_offset += writable;
            frame_index += writable;
            self.playhead += writable as u64;
            self.queued_frames -= writable;

            if self.current_offset >= block.frames {
                self.retire_current();
            }
        }

        if starved {
            out[frame_index * 2..].fill(0.0);
            self.underruns += 1;
            self.link.shared.underruns.fetch_add(1, Ordering::Relaxed);
        }
        self.link
            .shared
            .playhead_frames
            .store(self.playhead, Ordering::Release);

        self.maybe_request_more();
    }

    /// Move freshly transferred blocks into the local FIFO.
    fn ingest(&mut self) {
        while self.fifo.len() + usize::from(self.current.is_some()) < self.fifo_capacity {
            match self.link.blocks.pop() {
                Ok(block) => {
                    self.queued_frames += block.frames;
                    self.fifo.push_back(block);
                }
                Err(_) => break,
            }
        }
        if self.queued_frames >= self.low_water_frames {
            self.need_in_flight = false;
        }
    }

    /// Recycle the exhausted current block.
    fn retire_current(&mut self) {
        if let Some(block) = self.current.take() {
            // A full recycle queue means a reset raced the transfer;
            // the block is dropped and drains out of the pool.
            let _ = self.link.recycle.push(block);
        }
        self.current_offset = 0;
    }

    /// Emit a need request if the queue is low and no request is in
    /// flight or cooling down.
    fn maybe_request_more(&mut self) {
        if self.cooldown_remaining > 0 {
            self.cooldown_remaining -= 1;
            // Still below low water after a full cooldown: the request
            // was lost, re-emitting is allowed.
            if self.cooldown_remaining == 0 {
                self.need_in_flight = false;
            }
            return;
        }
        if self.queued_frames >= self.low_water_frames || self.need_in_flight {
            return;
        }

        let request = NeedRequest {
            want_base_sample: self.playhead + self.queued_frames as u64,
            frames_wanted: self.target_frames - self.queued_frames,
        };
        if self.link.needs.push(request).is_ok() {
            self.need_in_flight = self.cooldown_quanta > 0;
            self.cooldown_remaining = self.cooldown_quanta;
        }
    }

    /// Discard everything queued and zero the playhead, atomically with
    /// respect to quantum boundaries.
    fn apply_reset(&mut self) {
        if let Some(block) = self.current.take() {
            let _ = self.link.recycle.push(block);
        }
        while let Some(block) = self.fifo.pop_front() {
            let _ = self.link.recycle.push(block);
        }
        self.current_offset = 0;
        self.queued_frames = 0;
        self.playhead = 0;
        self.underruns = 0;
        self.need_in_flight = false;
        self.cooldown_remaining = 0;
        self.link.shared.playhead_frames.store(0, Ordering::Release);
        self.link.shared.underruns.store(0, Ordering::Release);
    }
}
