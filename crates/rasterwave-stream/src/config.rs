//! Engine configuration.

use rasterwave_core::PrecisionMode;
use serde::{Deserialize, Serialize};

/// Tunable parameters for the streaming engine.
///
/// All fields have defaults suitable for the classic 256 x 256 block at
/// 44.1 kHz; a TOML file with any subset of the fields overrides them.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Output sample rate in Hz.
    pub sample_rate: u32,
    /// Requested frames per block; rounded to the nearest square grid.
    pub block_frames: usize,
    /// Blocks of per-source sample history kept for feedback reads.
    pub ring_depth: usize,
    /// Floor on the number of pooled transfer buffers.
    pub pool_min: usize,
    /// Frames per output callback, requested as the device buffer
    /// size; 0 leaves the device default.
    pub quantum_frames: usize,
    /// Queued-frame threshold below which the consumer requests more.
    pub low_water_frames: usize,
    /// Queued-frame level a need request asks to restore.
    pub target_frames: usize,
    /// Quanta to suppress further need requests after emitting one.
    pub cooldown_quanta: usize,
    /// Default numeric encoding requested for sources without an
    /// override.
    pub precision: PrecisionMode,
    /// Whether platform autoplay policy requires a user gesture before
    /// audio may start.
    pub require_gesture: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let block_frames = 65536;
        Self {
            sample_rate: 44100,
            block_frames,
            ring_depth: 4,
            pool_min: 3,
            quantum_frames: 128,
            low_water_frames: block_frames,
            target_frames: 2 * block_frames,
            cooldown_quanta: 16,
            precision: PrecisionMode::Float32,
            require_gesture: false,
        }
    }
}
