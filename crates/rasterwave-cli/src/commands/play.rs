//! Demo playback command.
//!
//! Runs the full pipeline with the software raster standing in for a
//! GPU: a sine program (optionally reading its own ring history for an
//! echo) is rendered block by block and streamed to the default output
//! device until the duration elapses or Ctrl-C arrives.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Context;
use clap::Args;
use rasterwave_core::PrecisionMode;
use rasterwave_stream::{AudioEngine, EngineConfig, SoftwareRaster, SourceDefinition};

#[derive(Args)]
pub struct PlayArgs {
    /// Engine configuration file (TOML); defaults apply otherwise
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Sine frequency in Hz
    #[arg(short, long, default_value = "220.0")]
    frequency: f64,

    /// Playback duration in seconds; runs until Ctrl-C if omitted
    #[arg(short, long)]
    duration: Option<f64>,

    /// Start offset into the stream, in seconds
    #[arg(long, default_value = "0.0")]
    offset: f64,

    /// Feed the source's own output back as a quarter-second echo
    #[arg(long)]
    echo: bool,

    /// Requested render precision
    #[arg(long, value_parser = parse_precision)]
    precision: Option<PrecisionMode>,
}

fn parse_precision(s: &str) -> Result<PrecisionMode, String> {
    match s {
        "float32" => Ok(PrecisionMode::Float32),
        "float16" => Ok(PrecisionMode::Float16),
        "packed16" => Ok(PrecisionMode::Packed16),
        "packed8" => Ok(PrecisionMode::Packed8),
        other => Err(format!(
            "unknown precision '{other}' (expected float32, float16, packed16 or packed8)"
        )),
    }
}

pub fn run(args: PlayArgs) -> anyhow::Result<()> {
    let mut config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            toml::from_str(&text).with_context(|| format!("parsing config {}", path.display()))?
        }
        None => EngineConfig::default(),
    };
    if let Some(precision) = args.precision {
        config.precision = precision;
    }

    let mut raster = SoftwareRaster::new(config.sample_rate);
    let frequency = args.frequency;
    let echo = args.echo;
    let delay_samples = i64::from(config.sample_rate) / 4;
    let program = raster.add_program(Box::new(move |sample, time, rings| {
        let dry = (std::f64::consts::TAU * frequency * time).sin() as f32 * 0.5;
        if echo {
            let (l, r) = rings.read(0, sample as i64 - delay_samples);
            (dry + 0.4 * l, dry + 0.4 * r)
        } else {
            (dry, dry)
        }
    }));
    let definitions = vec![SourceDefinition::stereo("sine", program)];

    let mut engine = AudioEngine::new(raster, &definitions, &config)?;
    tracing::info!(
        frames = engine.block_shape().frames(),
        sample_rate = engine.sample_rate(),
        precision = ?engine.precision_summary(),
        "pipeline ready"
    );

    let _output = engine.attach_output()?;
    engine.set_output_enabled(true);
    engine.start(args.offset)?;

    let running = Arc::new(AtomicBool::new(true));
    let handler_flag = Arc::clone(&running);
    ctrlc::set_handler(move || {
        handler_flag.store(false, Ordering::SeqCst);
    })
    .context("installing Ctrl-C handler")?;

    while running.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(100));
        for diag in engine.take_diagnostics() {
            tracing::warn!(%diag, "pipeline advisory");
        }
        if let (Some(limit), Some(time)) = (args.duration, engine.audio_time()) {
            if time - args.offset >= limit {
                break;
            }
        }
    }

    engine.stop()?;
    tracing::info!(underruns = engine.underruns(), "playback finished");
    Ok(())
}
