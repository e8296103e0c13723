//! Numeric precision negotiation for the raster readback path.
//!
//! A synthesis program renders samples into a texture target, and the
//! numeric encoding of that target depends on what the hardware supports.
//! Four encodings are defined, from full float down to 8-bit packed, and
//! [`resolve`] picks the best one the reported capabilities allow.
//!
//! Resolution order:
//!
//! 1. `Packed8` requests are honored unconditionally (every target
//!    supports 8-bit renderable textures).
//! 2. `Float32` requires float render targets.
//! 3. `Float16` (or a `Float32` request without float support) requires
//!    half-float render targets.
//! 4. Otherwise the encoding falls back to `Packed16`, which packs each
//!    16-bit sample into two 8-bit texel channels.

use core::fmt;

/// Numeric encoding used to carry a sample through the raster readback.
///
/// The set is closed: adding an encoding means adding a variant here and
/// letting the compiler point at every encode/decode site.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum PrecisionMode {
    /// Full 32-bit float render target; samples read back verbatim.
    #[default]
    Float32,
    /// 16-bit half-float render target.
    Float16,
    /// Two 16-bit integers packed into the four 8-bit texel channels.
    Packed16,
    /// Two 8-bit integers in the first two texel channels.
    Packed8,
}

impl PrecisionMode {
    /// Bytes of raw texel data per sample (one RGBA texel).
    pub fn bytes_per_texel(self) -> usize {
        match self {
            PrecisionMode::Float32 => 16,
            PrecisionMode::Float16 => 8,
            PrecisionMode::Packed16 | PrecisionMode::Packed8 => 4,
        }
    }
}

impl fmt::Display for PrecisionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PrecisionMode::Float32 => "float32",
            PrecisionMode::Float16 => "float16",
            PrecisionMode::Packed16 => "packed16",
            PrecisionMode::Packed8 => "packed8",
        };
        write!(f, "{name}")
    }
}

/// Render-target capabilities detected on the current context.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// Whether 32-bit float render targets are supported.
    pub float_target: bool,
    /// Whether 16-bit half-float render targets are supported.
    pub half_float_target: bool,
}

impl Capabilities {
    /// Capabilities with every tier available.
    pub fn full() -> Self {
        Self {
            float_target: true,
            half_float_target: true,
        }
    }
}

/// Outcome of negotiating a requested mode against capabilities.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Resolution {
    /// The encoding that will actually be used.
    pub mode: PrecisionMode,
    /// The encoding that was asked for.
    pub requested: PrecisionMode,
}

impl Resolution {
    /// True if the resolved mode differs from the request.
    pub fn fell_back(&self) -> bool {
        self.mode != self.requested
    }

    /// Human-readable advisory for a fallback, or `None` if the request
    /// was honored.
    pub fn advisory(&self) -> Option<String> {
        self.fell_back().then(|| {
            format!(
                "requested {} output precision is not supported by this context; using {}",
                self.requested, self.mode
            )
        })
    }
}

/// Resolve a requested precision against detected capabilities.
///
/// A fallback is logged once at `warn` level with the capability flags
/// that forced it; honoring the request is silent.
pub fn resolve(requested: PrecisionMode, caps: Capabilities) -> Resolution {
    let mode = match requested {
        PrecisionMode::Packed8 => PrecisionMode::Packed8,
        PrecisionMode::Float32 if caps.float_target => PrecisionMode::Float32,
        PrecisionMode::Float16 | PrecisionMode::Float32 if caps.half_float_target => {
            PrecisionMode::Float16
        }
        _ => PrecisionMode::Packed16,
    };

    if mode != requested {
        tracing::warn!(
            requested = %requested,
            resolved = %mode,
            float_target = caps.float_target,
            half_float_target = caps.half_float_target,
            "precision fallback"
        );
    }

    Resolution { mode, requested }
}

/// Distinct resolved modes across a set of sources, in first-seen order.
///
/// This is the aggregate "precision summary" reported upward when sources
/// carry per-source overrides.
pub fn summary(modes: impl IntoIterator<Item = PrecisionMode>) -> Vec<PrecisionMode> {
    let mut seen = Vec::new();
    for mode in modes {
        if !seen.contains(&mode) {
            seen.push(mode);
        }
    }
    seen
}
