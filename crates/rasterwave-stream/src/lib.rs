//! Rasterwave streaming layer.
//!
//! This crate runs the block-synthesis pipeline: a producer thread that
//! renders fixed-size sample blocks through an opaque raster primitive,
//! and a real-time consumer that serves fixed-size audio quanta to the
//! output device. The two sides coordinate exclusively through lock-free
//! SPSC queues and explicit ownership transfer of pooled PCM blocks.
//!
//! ```text
//! ┌───────────────────┐   need / recycle    ┌──────────────────────┐
//! │  StreamProducer   │◄────────────────────│  PlaybackConsumer    │
//! │ (producer thread, │                     │ (real-time callback, │
//! │  raster + pool +  │────────────────────►│  FIFO + underrun +   │
//! │  sample rings)    │   PcmBlock moves    │  backpressure)       │
//! └───────────────────┘                     └──────────────────────┘
//! ```
//!
//! [`AudioEngine`] owns the producer thread and exposes the control
//! surface: start/stop/pause/resume, the gesture gate for autoplay
//! policy, audio-clock queries, sample-ring feedback reads, and a
//! diagnostics channel of non-fatal advisories.

pub mod config;
pub mod consumer;
pub mod diag;
pub mod engine;
pub mod gate;
pub mod link;
pub mod output;
pub mod producer;
pub mod source;

pub use config::EngineConfig;
pub use consumer::PlaybackConsumer;
pub use diag::Diagnostic;
pub use engine::AudioEngine;
pub use gate::GestureGate;
pub use link::{NeedRequest, SharedState, stream_link};
pub use output::OutputHandle;
pub use producer::StreamProducer;
pub use source::{
    ProgramId, RawImage, RenderError, SoftwareRaster, SoundRaster, SoundSource, SourceDefinition,
};

/// Errors raised by the streaming layer.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No audio output device is available on the system.
    #[error("no audio output device available")]
    NoDevice,

    /// Output stream setup or runtime error.
    #[error("audio output error: {0}")]
    Stream(String),

    /// The producer thread could not be spawned.
    #[error("failed to spawn producer thread: {0}")]
    Spawn(#[from] std::io::Error),

    /// The engine's producer thread is gone.
    #[error("producer thread is not running")]
    ProducerGone,

    /// A control request timed out waiting for the producer thread.
    #[error("control request timed out")]
    ControlTimeout,
}

/// Convenience result type for streaming operations.
pub type Result<T> = std::result::Result<T, Error>;
