//! Texel encode/decode for each [`PrecisionMode`].
//!
//! The raster primitive reads back one RGBA texel per sample. Depending
//! on the negotiated precision the texel carries the stereo pair either
//! as raw floats (R = left, G = right) or as integers packed into 8-bit
//! channels. [`decode_image`] turns a raw readback into planar stereo
//! floats clamped to [-1, 1]; [`encode_image`] is the inverse, used by
//! the software raster and by tests.
//!
//! Packed layouts match the shader-side packing:
//!
//! - `Packed16`: texel = (left_lo, left_hi, right_lo, right_hi), each
//!   channel value `lo + 256 * hi` spanning [0, 65535]
//! - `Packed8`: texel = (left, right, 0, 255), each spanning [0, 255]

use crate::precision::PrecisionMode;

/// Pack a sample in [-1, 1] into a 16-bit (lo, hi) byte pair.
pub fn pack16(value: f32) -> (u8, u8) {
    let unit = (value.clamp(-1.0, 1.0) + 1.0) * 0.5;
    let quantized = (unit * 65535.0).round() as u16;
    ((quantized & 0xff) as u8, (quantized >> 8) as u8)
}

/// Reconstruct a sample from a 16-bit (lo, hi) byte pair.
pub fn unpack16(lo: u8, hi: u8) -> f32 {
    let quantized = u16::from(lo) | (u16::from(hi) << 8);
    f32::from(quantized) / 65535.0 * 2.0 - 1.0
}

/// Pack a sample in [-1, 1] into a single byte.
pub fn pack8(value: f32) -> u8 {
    let unit = (value.clamp(-1.0, 1.0) + 1.0) * 0.5;
    (unit * 255.0).round() as u8
}

/// Reconstruct a sample from a single byte.
pub fn unpack8(byte: u8) -> f32 {
    f32::from(byte) / 255.0 * 2.0 - 1.0
}

/// Convert IEEE 754 binary16 bits to an f32.
fn half_to_f32(bits: u16) -> f32 {
    let sign = if bits & 0x8000 != 0 { -1.0f32 } else { 1.0 };
    let exp = i32::from((bits >> 10) & 0x1f);
    let frac = f32::from(bits & 0x3ff);
    match exp {
        0 => sign * frac * (-24.0f32).exp2(),
        31 => {
            if frac == 0.0 {
                sign * f32::INFINITY
            } else {
                f32::NAN
            }
        }
        _ => sign * (1.0 + frac / 1024.0) * ((exp - 15) as f32).exp2(),
    }
}

/// Convert an f32 to IEEE 754 binary16 bits, rounding to nearest.
///
/// Out-of-range magnitudes saturate to infinity; inputs here are always
/// clamped audio samples, so only the normal path is exercised in
/// practice.
fn f32_to_half(value: f32) -> u16 {
    let bits = value.to_bits();
    let sign = ((bits >> 16) & 0x8000) as u16;
    let exp = ((bits >> 23) & 0xff) as i32 - 127 + 15;
    let frac = bits & 0x007f_ffff;

    if value.is_nan() {
        return sign | 0x7e00;
    }
    if exp >= 31 {
        return sign | 0x7c00;
    }
    if exp <= 0 {
        if exp < -10 {
            return sign;
        }
        let mantissa = (frac | 0x0080_0000) >> (14 - exp);
        return sign | (mantissa as u16);
    }

    let mut half = u32::from(sign) | ((exp as u32) << 10) | (frac >> 13);
    if frac & 0x1000 != 0 {
        half += 1;
    }
    half as u16
}

/// Decode a raw texel readback into planar stereo floats.
///
/// `raw` must hold exactly `frames * mode.bytes_per_texel()` bytes; any
/// trailing partial texel is ignored. Output samples are clamped to
/// [-1, 1] regardless of what the program rendered.
pub fn decode_image(raw: &[u8], mode: PrecisionMode, frames: usize) -> (Vec<f32>, Vec<f32>) {
    let stride = mode.bytes_per_texel();
    let texels = (raw.len() / stride).min(frames);
    let mut left = vec![0.0f32; frames];
    let mut right = vec![0.0f32; frames];

    for i in 0..texels {
        let texel = &raw[i * stride..(i + 1) * stride];
        let (l, r) = match mode {
            PrecisionMode::Float32 => (
                f32::from_le_bytes([texel[0], texel[1], texel[2], texel[3]]),
                f32::from_le_bytes([texel[4], texel[5], texel[6], texel[7]]),
            ),
            PrecisionMode::Float16 => (
                half_to_f32(u16::from_le_bytes([texel[0], texel[1]])),
                half_to_f32(u16::from_le_bytes([texel[2], texel[3]])),
            ),
            PrecisionMode::Packed16 => (
                unpack16(texel[0], texel[1]),
                unpack16(texel[2], texel[3]),
            ),
            PrecisionMode::Packed8 => (unpack8(texel[0]), unpack8(texel[1])),
        };
        left[i] = if l.is_finite() { l.clamp(-1.0, 1.0) } else { 0.0 };
        right[i] = if r.is_finite() { r.clamp(-1.0, 1.0) } else { 0.0 };
    }

    (left, right)
}

/// Encode planar stereo floats into the raw texel layout for `mode`.
///
/// The inverse of [`decode_image`]; inputs are clamped before encoding.
pub fn encode_image(left: &[f32], right: &[f32], mode: PrecisionMode) -> Vec<u8> {
    let frames = left.len().min(right.len());
    let stride = mode.bytes_per_texel();
    let mut raw = vec![0u8; frames * stride];

    for i in 0..frames {
        let l = left[i].clamp(-1.0, 1.0);
        let r = right[i].clamp(-1.0, 1.0);
        let texel = &mut raw[i * stride..(i + 1) * stride];
        match mode {
            PrecisionMode::Float32 => {
                texel[0..4].copy_from_slice(&l.to_le_bytes());
                texel[4..8].copy_from_slice(&r.to_le_bytes());
            }
            PrecisionMode::Float16 => {
                texel[0..2].copy_from_slice(&f32_to_half(l).to_le_bytes());
                texel[2..4].copy_from_slice(&f32_to_half(r).to_le_bytes());
            }
            PrecisionMode::Packed16 => {
                let (l_lo, l_hi) = pack16(l);
                let (r_lo, r_hi) = pack16(r);
                texel[0] = l_lo;
                texel[1] = l_hi;
                texel[2] = r_lo;
                texel[3] = r_hi;
            }
            PrecisionMode::Packed8 => {
                texel[0] = pack8(l);
                texel[1] = pack8(r);
                texel[3] = 255;
            }
        }
    }

    raw
}
