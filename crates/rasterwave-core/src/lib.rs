//! Rasterwave core - data structures for block-synthesis audio streaming.
//!
//! This crate holds the single-threaded building blocks of the pipeline.
//! It performs no I/O and spawns no threads; everything here is owned and
//! driven by the streaming layer in `rasterwave-stream`.
//!
//! # Modules
//!
//! - [`precision`] - numeric encoding negotiation against hardware
//!   capability tiers, with fallback reporting
//! - [`codec`] - encode/decode of raw texel readback into stereo floats
//!   for each [`PrecisionMode`]
//! - [`block`] - block shape validation and the move-only [`PcmBlock`]
//!   that crosses the producer/consumer boundary
//! - [`ring`] - cyclic per-source sample history for feedback reads
//! - [`pool`] - fixed-capacity recyclable block pool
//!
//! # Design Principles
//!
//! - **Real-time safe**: buffers are pre-allocated; nothing in the block
//!   transfer path allocates
//! - **Move-only transfer**: a [`PcmBlock`] is owned by exactly one side
//!   at a time; handing one off is a Rust move, never a copy
//! - **Closed encoding set**: [`PrecisionMode`] is matched exhaustively
//!   at every encode/decode site

pub mod block;
pub mod codec;
pub mod pool;
pub mod precision;
pub mod ring;

pub use block::{BlockShape, PcmBlock};
pub use codec::{decode_image, encode_image};
pub use pool::BlockPool;
pub use precision::{Capabilities, PrecisionMode, Resolution};
pub use ring::{SampleRing, SampleRingSet};
