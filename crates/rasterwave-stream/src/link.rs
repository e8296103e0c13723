//! Lock-free link between the producer thread and the real-time
//! consumer.
//!
//! Three SPSC ring buffers carry all traffic across the boundary:
//!
//! - `blocks`: filled [`PcmBlock`]s moving producer -> consumer
//! - `needs`: backpressure requests moving consumer -> producer
//! - `recycle`: drained blocks moving consumer -> producer (back to
//!   the pool)
//!
//! A block is owned by exactly one side at a time; pushing it into a
//! queue is the ownership transfer. Alongside the queues, a small set
//! of atomics carries one-way flags (reset, pause, output gating) and
//! observability counters. The real-time side only ever uses
//! non-blocking push/pop on all of it.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use rasterwave_core::PcmBlock;

/// A consumer request for more audio.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NeedRequest {
    /// Stream-relative sample index the consumer wants next.
    pub want_base_sample: u64,
    /// Frames needed to refill the queue to its target.
    pub frames_wanted: usize,
}

/// Flags and counters shared across the boundary.
///
/// Everything here is a one-way signal: exactly one side writes each
/// field, so relaxed-ish orderings suffice and nothing ever blocks.
#[derive(Debug, Default)]
pub struct SharedState {
    /// Set by the producer side; consumed by the consumer before its
    /// next quantum.
    pub reset: AtomicBool,
    /// Pause playback without draining the queue.
    pub paused: AtomicBool,
    /// Host wants audible output.
    pub output_requested: AtomicBool,
    /// Producer has transferred at least one real block since the last
    /// (re)start; audible output stays muted until then.
    pub primed: AtomicBool,
    /// Frames actually played from delivered blocks since the last
    /// reset.
    pub playhead_frames: AtomicU64,
    /// Quanta that ran dry since the last reset.
    pub underruns: AtomicU64,
}

impl SharedState {
    /// Request a consumer-side reset before the next quantum.
    pub fn request_reset(&self) {
        self.reset.store(true, Ordering::Release);
    }

    /// Whether audible output is currently allowed.
    pub fn audible(&self) -> bool {
        self.output_requested.load(Ordering::Acquire) && self.primed.load(Ordering::Acquire)
    }
}

/// Producer-side endpoints of the link.
pub struct ProducerLink {
    /// Transfer filled blocks to the consumer.
    pub blocks: rtrb::Producer<PcmBlock>,
    /// Receive backpressure requests.
    pub needs: rtrb::Consumer<NeedRequest>,
    /// Receive drained blocks for the pool.
    pub recycle: rtrb::Consumer<PcmBlock>,
    /// Shared flags and counters.
    pub shared: Arc<SharedState>,
}

/// Consumer-side endpoints of the link.
pub struct ConsumerLink {
    /// Receive filled blocks.
    pub blocks: rtrb::Consumer<PcmBlock>,
    /// Emit backpressure requests.
    pub needs: rtrb::Producer<NeedRequest>,
    /// Return drained blocks.
    pub recycle: rtrb::Producer<PcmBlock>,
    /// Shared flags and counters.
    pub shared: Arc<SharedState>,
}

/// Build the SPSC link.
///
/// `block_capacity` bounds blocks in flight toward the consumer;
/// `recycle_capacity` should be at least the pool capacity so a full
/// drain can never wedge the return path.
pub fn stream_link(block_capacity: usize, recycle_capacity: usize) -> (ProducerLink, ConsumerLink) {
    let (block_tx, block_rx) = rtrb::RingBuffer::new(block_capacity);
    let (need_tx, need_rx) = rtrb::RingBuffer::new(8);
    let (recycle_tx, recycle_rx) = rtrb::RingBuffer::new(recycle_capacity);
    let shared = Arc::new(SharedState::default());

    (
        ProducerLink {
            blocks: block_tx,
            needs: need_rx,
            recycle: recycle_rx,
            shared: Arc::clone(&shared),
        },
        ConsumerLink {
            blocks: block_rx,
            needs: need_tx,
            recycle: recycle_tx,
            shared,
        },
    )
}
