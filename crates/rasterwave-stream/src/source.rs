//! Sound sources and the raster primitive seam.
//!
//! The pipeline treats rasterization as an opaque operation: give it a
//! program and a sample range, get back one image of raw texel data.
//! [`SoundRaster`] is that seam; the GPU-backed implementation lives in
//! the host, and [`SoftwareRaster`] is the in-process stand-in used by
//! the CLI demo and the tests.

use rasterwave_core::{
    BlockShape, Capabilities, PrecisionMode, Resolution, SampleRingSet, encode_image, precision,
};

/// Opaque handle to a compiled synthesis program.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ProgramId(pub u64);

/// One raster readback: raw texel bytes plus the encoding they carry.
#[derive(Debug)]
pub struct RawImage {
    /// Encoding of the texel data.
    pub mode: PrecisionMode,
    /// Raw bytes, `frames * mode.bytes_per_texel()` long.
    pub data: Vec<u8>,
}

/// Why a render produced no image.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// The program failed to compile or has no synthesis entry point.
    #[error("program has no valid synthesis entry point")]
    InvalidProgram,

    /// The raster backend failed.
    #[error("raster failure: {0}")]
    Backend(String),
}

/// The opaque rasterization primitive.
///
/// Implementations render a full-screen synthesis program over a
/// `width x height` grid where texel `(x, y)` is linear sample
/// `y * width + x` within the block, with `base_sample` communicating
/// absolute stream time to the program. `feedback` exposes recent
/// sample history for programs that read their own output back.
pub trait SoundRaster {
    /// Render-target capabilities of this backend.
    fn capabilities(&self) -> Capabilities;

    /// Render one block for `program` and read back the raw texels.
    fn render(
        &mut self,
        program: ProgramId,
        base_sample: u64,
        shape: BlockShape,
        mode: PrecisionMode,
        feedback: &SampleRingSet,
    ) -> Result<RawImage, RenderError>;
}

impl<T: SoundRaster + ?Sized> SoundRaster for Box<T> {
    fn capabilities(&self) -> Capabilities {
        (**self).capabilities()
    }

    fn render(
        &mut self,
        program: ProgramId,
        base_sample: u64,
        shape: BlockShape,
        mode: PrecisionMode,
        feedback: &SampleRingSet,
    ) -> Result<RawImage, RenderError> {
        (**self).render(program, base_sample, shape, mode, feedback)
    }
}

/// A sound source definition as delivered by the upstream preprocessor.
#[derive(Debug, Clone)]
pub struct SourceDefinition {
    /// Display name of the source.
    pub name: String,
    /// Program to rasterize.
    pub program: ProgramId,
    /// Per-source precision override, if any.
    pub requested_precision: Option<PrecisionMode>,
    /// Output channel indices this source feeds.
    pub output_channels: Vec<usize>,
}

impl SourceDefinition {
    /// A stereo source with no precision override.
    pub fn stereo(name: impl Into<String>, program: ProgramId) -> Self {
        Self {
            name: name.into(),
            program,
            requested_precision: None,
            output_channels: vec![0, 1],
        }
    }
}

/// A sound source with its precision resolved against the raster's
/// capabilities.
#[derive(Debug, Clone)]
pub struct SoundSource {
    /// Display name.
    pub name: String,
    /// Program to rasterize.
    pub program: ProgramId,
    /// Negotiated precision for this source.
    pub resolution: Resolution,
    /// Output channel indices this source feeds.
    pub output_channels: Vec<usize>,
}

impl SoundSource {
    /// Resolve a definition against capabilities, applying the engine
    /// default when the source carries no override.
    pub fn resolve(def: &SourceDefinition, default: PrecisionMode, caps: Capabilities) -> Self {
        let requested = def.requested_precision.unwrap_or(default);
        Self {
            name: def.name.clone(),
            program: def.program,
            resolution: precision::resolve(requested, caps),
            output_channels: def.output_channels.clone(),
        }
    }
}

/// Per-sample synthesis function used by [`SoftwareRaster`].
///
/// Arguments: absolute sample index, time in seconds, sample history.
pub type SampleFn = Box<dyn FnMut(u64, f64, &SampleRingSet) -> (f32, f32) + Send>;

/// In-process raster that evaluates a closure per sample.
///
/// Stands in for the GPU: it renders the "program" on the CPU and
/// encodes the result through the same texel codec a readback would
/// produce, so the decode path downstream is exercised identically.
pub struct SoftwareRaster {
    sample_rate: u32,
    capabilities: Capabilities,
    programs: Vec<Option<SampleFn>>,
}

impl SoftwareRaster {
    /// A software raster with full precision capabilities.
    pub fn new(sample_rate: u32) -> Self {
        Self::with_capabilities(sample_rate, Capabilities::full())
    }

    /// A software raster reporting the given capability tier, for
    /// exercising fallback paths.
    pub fn with_capabilities(sample_rate: u32, capabilities: Capabilities) -> Self {
        Self {
            sample_rate,
            capabilities,
            programs: Vec::new(),
        }
    }

    /// Register a synthesis function and get its program handle.
    pub fn add_program(&mut self, program: SampleFn) -> ProgramId {
        self.programs.push(Some(program));
        ProgramId(self.programs.len() as u64 - 1)
    }

    /// Register a program that fails to render, for failure-path tests.
    pub fn add_broken_program(&mut self) -> ProgramId {
        self.programs.push(None);
        ProgramId(self.programs.len() as u64 - 1)
    }
}

impl SoundRaster for SoftwareRaster {
    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn render(
        &mut self,
        program: ProgramId,
        base_sample: u64,
        shape: BlockShape,
        mode: PrecisionMode,
        feedback: &SampleRingSet,
    ) -> Result<RawImage, RenderError> {
        let sample_fn = self
            .programs
            .get_mut(program.0 as usize)
            .ok_or(RenderError::InvalidProgram)?
            .as_mut()
            .ok_or(RenderError::InvalidProgram)?;

        let frames = shape.frames();
        let mut left = vec![0.0f32; frames];
        let mut right = vec![0.0f32; frames];
        for i in 0..frames {
            let sample_index = base_sample + i as u64;
            let time = sample_index as f64 / f64::from(self.sample_rate);
            let (l, r) = sample_fn(sample_index, time, feedback);
            left[i] = l;
            right[i] = r;
        }

        Ok(RawImage {
            mode,
            data: encode_image(&left, &right, mode),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rasterwave_core::decode_image;

    #[test]
    fn software_raster_renders_time_indexed_samples() {
        let mut raster = SoftwareRaster::new(4);
        let program = raster.add_program(Box::new(|sample, time, _| {
            (sample as f32, time as f32)
        }));

        let shape = BlockShape { width: 2, height: 2 };
        let image = raster
            .render(program, 4, shape, PrecisionMode::Float32, &SampleRingSet::new())
            .unwrap();
        let (left, right) = decode_image(&image.data, PrecisionMode::Float32, 4);

        // Samples 4..8, clamped to [-1, 1] by the codec.
        assert_eq!(left, vec![1.0; 4]);
        // time = sample / 4 Hz, clamped.
        assert_eq!(right[0], 1.0);
    }

    #[test]
    fn broken_program_reports_invalid() {
        let mut raster = SoftwareRaster::new(44100);
        let broken = raster.add_broken_program();
        let err = raster
            .render(
                broken,
                0,
                BlockShape { width: 2, height: 2 },
                PrecisionMode::Float32,
                &SampleRingSet::new(),
            )
            .unwrap_err();
        assert!(matches!(err, RenderError::InvalidProgram));
    }

    #[test]
    fn source_resolution_applies_override() {
        let mut def = SourceDefinition::stereo("feedback", ProgramId(0));
        def.requested_precision = Some(PrecisionMode::Packed8);
        let source = SoundSource::resolve(&def, PrecisionMode::Float32, Capabilities::default());
        assert_eq!(source.resolution.mode, PrecisionMode::Packed8);

        let plain = SourceDefinition::stereo("main", ProgramId(0));
        let source = SoundSource::resolve(&plain, PrecisionMode::Float32, Capabilities::default());
        // No float targets at all: default request degrades to packed16.
        assert_eq!(source.resolution.mode, PrecisionMode::Packed16);
        assert!(source.resolution.fell_back());
    }
}
