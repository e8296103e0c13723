//! Engine facade over the streaming pipeline.
//!
//! [`AudioEngine`] owns the producer thread and the control surface the
//! host talks to: start/stop/pause/resume, output gating, the autoplay
//! gesture gate, audio-clock queries, feedback-ring reads, and the
//! diagnostics channel. The real-time consumer is handed out once via
//! [`AudioEngine::take_consumer`] (or wired straight to a device with
//! [`AudioEngine::attach_output`]) and runs independently of the engine
//! from then on.
//!
//! All control traffic to the producer thread goes over one mpsc
//! channel; the thread interleaves control handling with pump turns so
//! a need request is never starved by a chatty host.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use rasterwave_core::{BlockPool, BlockShape, PrecisionMode, precision};

use crate::config::EngineConfig;
use crate::consumer::PlaybackConsumer;
use crate::diag::Diagnostic;
use crate::gate::GestureGate;
use crate::link::{SharedState, stream_link};
use crate::output::{self, OutputHandle};
use crate::producer::StreamProducer;
use crate::source::{SoundRaster, SoundSource, SourceDefinition};
use crate::{Error, Result};

/// How long a synchronous control round-trip may wait on the producer
/// thread before reporting a timeout.
const CONTROL_TIMEOUT: Duration = Duration::from_millis(250);

/// How long the producer thread sleeps in its control receive before
/// taking an idle pump turn.
const PUMP_INTERVAL: Duration = Duration::from_millis(2);

/// Messages handled by the producer thread.
enum Control {
    /// Begin (or re-begin) streaming at an absolute sample offset.
    Start { offset_sample: u64 },
    /// Stop producing and discard queued audio.
    Stop,
    /// Read a stereo pair from a source's feedback ring.
    RingQuery {
        source: usize,
        sample_index: i64,
        reply: mpsc::Sender<(f32, f32)>,
    },
    /// Tear the thread down.
    Shutdown,
}

/// Handle to a running streaming pipeline.
pub struct AudioEngine {
    control: mpsc::Sender<Control>,
    producer_thread: Option<thread::JoinHandle<()>>,
    shared: Arc<SharedState>,
    gate: GestureGate,
    diagnostics: mpsc::Receiver<Diagnostic>,
    /// Engine-side sender into the same diagnostics channel the
    /// producer reports on.
    advisories: mpsc::Sender<Diagnostic>,
    /// The real-time half, until the host claims it.
    consumer: Option<PlaybackConsumer>,
    sample_rate: u32,
    quantum_frames: usize,
    shape: BlockShape,
    precision_summary: Vec<PrecisionMode>,
    /// Offset of the last accepted start, quantized to a whole sample.
    origin_seconds: f64,
    started: bool,
}

impl AudioEngine {
    /// Build the pipeline and spawn its producer thread.
    ///
    /// Source precision is negotiated here against the raster's
    /// capabilities; each fallback is reported once on the diagnostics
    /// channel. The engine starts idle: nothing is rendered until
    /// [`start`](Self::start).
    pub fn new<R>(raster: R, definitions: &[SourceDefinition], config: &EngineConfig) -> Result<Self>
    where
        R: SoundRaster + Send + 'static,
    {
        let (diag_tx, diag_rx) = mpsc::channel();

        let (shape, rounded) = BlockShape::for_frames(config.block_frames);
        if rounded {
            let diag = Diagnostic::BlockSizeRounded {
                requested: config.block_frames,
                actual: shape.frames(),
            };
            tracing::warn!(%diag, "adjusting block size");
            let _ = diag_tx.send(diag);
        }

        let caps = raster.capabilities();
        let sources: Vec<SoundSource> = definitions
            .iter()
            .map(|def| SoundSource::resolve(def, config.precision, caps))
            .collect();
        for source in &sources {
            if source.resolution.fell_back() {
                let _ = diag_tx.send(Diagnostic::PrecisionFallback {
                    source: source.name.clone(),
                    requested: source.resolution.requested,
                    resolved: source.resolution.mode,
                });
            }
        }
        let precision_summary =
            precision::summary(sources.iter().map(|source| source.resolution.mode));

        // Queue capacities match the pool so a full drain in either
        // direction can never wedge a transfer.
        let capacity =
            BlockPool::stream_capacity(shape.frames(), config.sample_rate, config.pool_min);
        let (producer_link, consumer_link) = stream_link(capacity, capacity);
        let shared = Arc::clone(&producer_link.shared);
        let consumer = PlaybackConsumer::new(consumer_link, config, capacity);

        let producer = StreamProducer::new(
            raster,
            sources,
            shape,
            config,
            producer_link,
            diag_tx.clone(),
        );

        let (control_tx, control_rx) = mpsc::channel();
        let producer_thread = thread::Builder::new()
            .name("rasterwave-producer".into())
            .spawn(move || run_producer(producer, control_rx))?;

        Ok(Self {
            control: control_tx,
            producer_thread: Some(producer_thread),
            shared,
            gate: GestureGate::new(config.require_gesture),
            diagnostics: diag_rx,
            advisories: diag_tx,
            consumer: Some(consumer),
            sample_rate: config.sample_rate,
            quantum_frames: config.quantum_frames,
            shape,
            precision_summary,
            origin_seconds: 0.0,
            started: false,
        })
    }

    /// The negotiated block shape.
    pub fn block_shape(&self) -> BlockShape {
        self.shape
    }

    /// Output sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Distinct resolved precision modes across all sources, in
    /// first-seen order.
    pub fn precision_summary(&self) -> &[PrecisionMode] {
        &self.precision_summary
    }

    /// Claim the real-time consumer for wiring into an output callback.
    ///
    /// Returns `None` after the first call.
    pub fn take_consumer(&mut self) -> Option<PlaybackConsumer> {
        self.consumer.take()
    }

    /// Wire the consumer straight into the default output device.
    ///
    /// On failure a [`Diagnostic::OutputInitFailed`] advisory is also
    /// emitted, since the pipeline itself keeps running without a
    /// device.
    pub fn attach_output(&mut self) -> Result<OutputHandle> {
        let consumer = self
            .take_consumer()
            .ok_or_else(|| Error::Stream("output already attached".into()))?;
        match output::start_output(consumer, self.sample_rate, self.quantum_frames) {
            Ok(handle) => Ok(handle),
            Err(err) => {
                let diag = Diagnostic::OutputInitFailed(err.to_string());
                tracing::warn!(%diag, "running without a device");
                let _ = self.advisories.send(diag);
                Err(err)
            }
        }
    }

    /// Start playback at `offset_seconds` into the stream.
    ///
    /// While the gesture gate is blocked the request is deferred, a
    /// [`Diagnostic::AutoplayBlocked`] advisory is emitted, and the call
    /// still succeeds; the deferred offset is acted on when
    /// [`grant_gesture`](Self::grant_gesture) lands.
    pub fn start(&mut self, offset_seconds: f64) -> Result<()> {
        match self.gate.request_start(offset_seconds) {
            Some(offset) => self.begin(offset),
            None => {
                let diag = Diagnostic::AutoplayBlocked;
                tracing::info!(%diag, offset_seconds, "start deferred");
                let _ = self.advisories.send(diag);
                Ok(())
            }
        }
    }

    /// Record a user gesture, starting any playback deferred by the
    /// autoplay gate.
    pub fn grant_gesture(&mut self) -> Result<()> {
        match self.gate.grant() {
            Some(offset) => self.begin(offset),
            None => Ok(()),
        }
    }

    /// Whether the autoplay gate currently permits starting.
    pub fn gesture_granted(&self) -> bool {
        self.gate.granted()
    }

    fn begin(&mut self, offset_seconds: f64) -> Result<()> {
        let offset_sample = (offset_seconds.max(0.0) * f64::from(self.sample_rate)).round() as u64;
        self.send(Control::Start { offset_sample })?;
        // The clock reports the quantized position, not the raw request.
        self.origin_seconds = offset_sample as f64 / f64::from(self.sample_rate);
        self.started = true;
        Ok(())
    }

    /// Stop playback and discard everything queued.
    pub fn stop(&mut self) -> Result<()> {
        self.send(Control::Stop)?;
        self.started = false;
        Ok(())
    }

    /// Freeze playback in place; queued audio is kept.
    pub fn pause(&self) {
        self.shared.paused.store(true, Ordering::Release);
    }

    /// Resume from a pause.
    pub fn resume(&self) {
        self.shared.paused.store(false, Ordering::Release);
    }

    /// Allow or mute audible output.
    ///
    /// Muted output still consumes blocks, so the stream position keeps
    /// advancing.
    pub fn set_output_enabled(&self, enabled: bool) {
        self.shared.output_requested.store(enabled, Ordering::Release);
    }

    /// Current playback position in seconds, or `None` before the first
    /// start.
    pub fn audio_time(&self) -> Option<f64> {
        self.started.then(|| {
            let played = self.shared.playhead_frames.load(Ordering::Acquire);
            self.origin_seconds + played as f64 / f64::from(self.sample_rate)
        })
    }

    /// Quanta that ran dry since the last (re)start.
    pub fn underruns(&self) -> u64 {
        self.shared.underruns.load(Ordering::Acquire)
    }

    /// Read a stereo pair from a source's feedback ring.
    ///
    /// This is a synchronous round-trip to the producer thread, which
    /// owns the rings; indices older than the retained history come back
    /// as silence.
    pub fn sample_from_ring(&self, source: usize, sample_index: i64) -> Result<(f32, f32)> {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.send(Control::RingQuery {
            source,
            sample_index,
            reply: reply_tx,
        })?;
        match reply_rx.recv_timeout(CONTROL_TIMEOUT) {
            Ok(sample) => Ok(sample),
            Err(mpsc::RecvTimeoutError::Timeout) => Err(Error::ControlTimeout),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(Error::ProducerGone),
        }
    }

    /// Drain all diagnostics reported since the last call.
    pub fn take_diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics.try_iter().collect()
    }

    fn send(&self, message: Control) -> Result<()> {
        self.control.send(message).map_err(|_| Error::ProducerGone)
    }
}

impl Drop for AudioEngine {
    fn drop(&mut self) {
        let _ = self.control.send(Control::Shutdown);
        if let Some(handle) = self.producer_thread.take() {
            let _ = handle.join();
        }
    }
}

/// Producer thread body: interleave control handling with pump turns.
fn run_producer<R: SoundRaster>(
    mut producer: StreamProducer<R>,
    control: mpsc::Receiver<Control>,
) {
    loop {
        match control.recv_timeout(PUMP_INTERVAL) {
            Ok(Control::Start { offset_sample }) => producer.start(offset_sample),
            Ok(Control::Stop) => producer.stop(),
            Ok(Control::RingQuery {
                source,
                sample_index,
                reply,
            }) => {
                let _ = reply.send(producer.ring_sample(source, sample_index));
            }
            Ok(Control::Shutdown) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
            Err(mpsc::RecvTimeoutError::Timeout) => {}
        }
        producer.pump();
    }
    tracing::debug!("producer thread exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SoftwareRaster;
    use rasterwave_core::Capabilities;

    fn test_config() -> EngineConfig {
        EngineConfig {
            sample_rate: 64,
            block_frames: 16,
            ring_depth: 2,
            pool_min: 2,
            quantum_frames: 4,
            low_water_frames: 16,
            target_frames: 32,
            cooldown_quanta: 0,
            ..EngineConfig::default()
        }
    }

    fn constant_source(value: f32) -> (SoftwareRaster, Vec<SourceDefinition>) {
        let mut raster = SoftwareRaster::new(64);
        let program = raster.add_program(Box::new(move |_, _, _| (value, value)));
        (raster, vec![SourceDefinition::stereo("main", program)])
    }

    /// Drive the consumer until audio arrives or the deadline passes.
    fn pump_until_audible(consumer: &mut PlaybackConsumer) -> Vec<f32> {
        let mut out = [0.0f32; 8];
        for _ in 0..500 {
            consumer.fill(&mut out);
            if out.iter().any(|&s| s != 0.0) {
                return out.to_vec();
            }
            thread::sleep(Duration::from_millis(2));
        }
        out.to_vec()
    }

    #[test]
    fn start_produces_audible_output() {
        let (raster, defs) = constant_source(0.25);
        let mut engine = AudioEngine::new(raster, &defs, &test_config()).unwrap();
        let mut consumer = engine.take_consumer().unwrap();

        engine.set_output_enabled(true);
        engine.start(0.0).unwrap();

        let out = pump_until_audible(&mut consumer);
        assert!(out.iter().all(|&s| s == 0.25));
        assert!(engine.audio_time().unwrap() > 0.0);
    }

    #[test]
    fn audio_time_is_none_before_start() {
        let (raster, defs) = constant_source(0.5);
        let engine = AudioEngine::new(raster, &defs, &test_config()).unwrap();
        assert_eq!(engine.audio_time(), None);
    }

    #[test]
    fn gesture_gate_defers_start_until_grant() {
        let (raster, defs) = constant_source(0.5);
        let config = EngineConfig {
            require_gesture: true,
            ..test_config()
        };
        let mut engine = AudioEngine::new(raster, &defs, &config).unwrap();
        let mut consumer = engine.take_consumer().unwrap();
        engine.set_output_enabled(true);

        engine.start(2.0).unwrap();
        assert!(!engine.gesture_granted());
        assert_eq!(engine.audio_time(), None);
        assert!(engine
            .take_diagnostics()
            .contains(&Diagnostic::AutoplayBlocked));

        // Nothing flows while blocked.
        let mut out = [0.0f32; 8];
        consumer.fill(&mut out);
        thread::sleep(Duration::from_millis(10));
        consumer.fill(&mut out);
        assert!(out.iter().all(|&s| s == 0.0));

        engine.grant_gesture().unwrap();
        let out = pump_until_audible(&mut consumer);
        assert!(out.iter().all(|&s| s == 0.5));
        // The deferred offset survived the grant: 2.0 s at 64 Hz.
        assert!(engine.audio_time().unwrap() >= 2.0);
    }

    #[test]
    fn ring_query_round_trips_through_the_producer() {
        let (raster, defs) = constant_source(0.25);
        let mut engine = AudioEngine::new(raster, &defs, &test_config()).unwrap();
        let mut consumer = engine.take_consumer().unwrap();
        engine.set_output_enabled(true);
        engine.start(0.0).unwrap();
        pump_until_audible(&mut consumer);

        assert_eq!(engine.sample_from_ring(0, 0).unwrap(), (0.25, 0.25));
        // Unknown sources read as silence, same as evicted history.
        assert_eq!(engine.sample_from_ring(9, 0).unwrap(), (0.0, 0.0));
    }

    #[test]
    fn non_square_block_request_is_reported() {
        let (raster, defs) = constant_source(0.25);
        let config = EngineConfig {
            block_frames: 20,
            ..test_config()
        };
        let engine = AudioEngine::new(raster, &defs, &config).unwrap();
        assert_eq!(engine.block_shape().frames(), 16);
        assert!(engine.take_diagnostics().contains(&Diagnostic::BlockSizeRounded {
            requested: 20,
            actual: 16,
        }));
    }

    #[test]
    fn precision_fallback_is_reported_once_per_source() {
        let mut raster = SoftwareRaster::with_capabilities(
            64,
            Capabilities {
                float_target: false,
                half_float_target: true,
            },
        );
        let program = raster.add_program(Box::new(|_, _, _| (0.0, 0.0)));
        let defs = vec![SourceDefinition::stereo("main", program)];

        let engine = AudioEngine::new(raster, &defs, &test_config()).unwrap();
        assert_eq!(engine.precision_summary(), &[PrecisionMode::Float16]);
        let diags = engine.take_diagnostics();
        assert_eq!(diags.len(), 1);
        assert!(matches!(
            &diags[0],
            Diagnostic::PrecisionFallback {
                requested: PrecisionMode::Float32,
                resolved: PrecisionMode::Float16,
                ..
            }
        ));
    }

    #[test]
    fn consumer_can_only_be_taken_once() {
        let (raster, defs) = constant_source(0.0);
        let mut engine = AudioEngine::new(raster, &defs, &test_config()).unwrap();
        assert!(engine.take_consumer().is_some());
        assert!(engine.take_consumer().is_none());
    }
}
