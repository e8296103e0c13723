//! Advisory diagnostics.
//!
//! Everything here is non-fatal: the pipeline degrades to silence and
//! reports what happened rather than propagating an error outward. The
//! engine surfaces these over a plain mpsc channel so a host UI can
//! display them.

use core::fmt;
use rasterwave_core::PrecisionMode;

/// A non-fatal advisory emitted by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// The requested precision is unsupported; a lower tier was used.
    PrecisionFallback {
        /// Source the fallback applies to.
        source: String,
        /// What was asked for.
        requested: PrecisionMode,
        /// What will be used.
        resolved: PrecisionMode,
    },
    /// The transfer pool ran dry mid-batch; the batch was truncated.
    PoolExhausted {
        /// Blocks the consumer asked for.
        wanted: usize,
        /// Blocks actually rendered and transferred.
        delivered: usize,
    },
    /// A source's program could not render; it contributes silence.
    RenderFailed {
        /// Source that failed.
        source: String,
        /// Raster-reported reason.
        reason: String,
    },
    /// The requested block size was not a perfect square and was
    /// rounded.
    BlockSizeRounded {
        /// Frames requested upstream.
        requested: usize,
        /// Frames after rounding to a square grid.
        actual: usize,
    },
    /// Platform autoplay policy blocked the start; waiting for a user
    /// gesture.
    AutoplayBlocked,
    /// The audio output device could not be initialized.
    OutputInitFailed(String),
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::PrecisionFallback {
                source,
                requested,
                resolved,
            } => write!(
                f,
                "source '{source}': requested {requested} precision unavailable, using {resolved}"
            ),
            Diagnostic::PoolExhausted { wanted, delivered } => write!(
                f,
                "transfer pool exhausted: delivered {delivered} of {wanted} blocks; reduce render-ahead"
            ),
            Diagnostic::RenderFailed { source, reason } => {
                write!(f, "source '{source}' failed to render: {reason}")
            }
            Diagnostic::BlockSizeRounded { requested, actual } => write!(
                f,
                "block size {requested} is not a square grid; rounded to {actual}"
            ),
            Diagnostic::AutoplayBlocked => {
                write!(f, "audio start blocked by autoplay policy; waiting for a user gesture")
            }
            Diagnostic::OutputInitFailed(reason) => {
                write!(f, "audio output initialization failed: {reason}")
            }
        }
    }
}
