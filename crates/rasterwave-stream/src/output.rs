//! Audio device output via cpal.
//!
//! The bridge is intentionally thin: open the default output device at
//! the pipeline's sample rate in stereo, and let the device callback do
//! nothing but [`PlaybackConsumer::fill`]. Everything real-time safe
//! lives in the consumer; this module only owns stream setup and
//! teardown.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use crate::consumer::PlaybackConsumer;
use crate::{Error, Result};

/// A running output stream.
///
/// Dropping the handle stops playback and releases the device.
pub struct OutputHandle {
    _stream: cpal::Stream,
}

/// Map the configured quantum to a cpal buffer size request.
///
/// A zero quantum leaves the choice to the device.
fn requested_buffer_size(quantum_frames: usize) -> cpal::BufferSize {
    if quantum_frames == 0 {
        cpal::BufferSize::Default
    } else {
        cpal::BufferSize::Fixed(quantum_frames as u32)
    }
}

/// Open the default output device and drive `consumer` from its
/// callback.
///
/// `quantum_frames` is requested as the device buffer size; devices
/// that reject it fail stream setup rather than silently resizing.
pub fn start_output(
    mut consumer: PlaybackConsumer,
    sample_rate: u32,
    quantum_frames: usize,
) -> Result<OutputHandle> {
    let host = cpal::default_host();
    let device = host.default_output_device().ok_or(Error::NoDevice)?;

    let config = cpal::StreamConfig {
        channels: 2,
        sample_rate: cpal::SampleRate(sample_rate),
        buffer_size: requested_buffer_size(quantum_frames),
    };
    tracing::info!(
        device = %device.name().unwrap_or_else(|_| "<unnamed>".into()),
        sample_rate,
        quantum_frames,
        "opening output stream"
    );

    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                consumer.fill(data);
            },
            |err| tracing::error!(%err, "output stream error"),
            None,
        )
        .map_err(|e| Error::Stream(e.to_string()))?;
    stream.play().map_err(|e| Error::Stream(e.to_string()))?;

    Ok(OutputHandle { _stream: stream })
}

/// Names of the available output devices on the default host.
pub fn output_devices() -> Result<Vec<String>> {
    let host = cpal::default_host();
    let devices = host
        .output_devices()
        .map_err(|e| Error::Stream(e.to_string()))?;
    Ok(devices
        .map(|device| device.name().unwrap_or_else(|_| "<unnamed>".into()))
        .collect())
}
