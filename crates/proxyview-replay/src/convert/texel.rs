//! Per-texel decoding to float RGBA
//!
//! Channels missing from the source format read as 0.0, except alpha which
//! reads as 1.0. Formats stored B, G, R, A are decoded in storage order and
//! then have their first and third channels swapped.

use half::f16;
use proxyview_core::{CompType, FormatType, ResourceFormat};

/// Whether [`decode_texel`] can read `format`
pub fn can_decode(format: &ResourceFormat) -> bool {
    match format.format_type {
        FormatType::Regular => match format.comp_type {
            CompType::Float => matches!(format.comp_byte_width, 2 | 4) && (1..=4).contains(&format.comp_count),
            CompType::Depth => matches!(format.comp_byte_width, 2 | 4) && format.comp_count == 1,
            _ => matches!(format.comp_byte_width, 1 | 2 | 4) && (1..=4).contains(&format.comp_count),
        },
        FormatType::R10G10B10A2
        | FormatType::R11G11B10
        | FormatType::R5G6B5
        | FormatType::R5G5B5A1
        | FormatType::R4G4B4A4
        | FormatType::R9G9B9E5
        | FormatType::A8
        | FormatType::D16S8
        | FormatType::D24S8
        | FormatType::D32S8 => true,
        _ => false,
    }
}

/// Decode one texel starting at `bytes[0]`
///
/// `bytes` must hold at least `format.element_size()` bytes; callers step
/// through memory by `format.texel_stride()`.
pub fn decode_texel(format: &ResourceFormat, bytes: &[u8]) -> Option<[f32; 4]> {
    if bytes.len() < format.element_size() || !can_decode(format) {
        return None;
    }

    let mut out = [0.0, 0.0, 0.0, 1.0];

    match format.format_type {
        FormatType::Regular => {
            let width = format.comp_byte_width as usize;
            for c in 0..format.comp_count as usize {
                let raw = &bytes[c * width..(c + 1) * width];
                out[c] = component(format.comp_type, raw, c == 3);
            }
        }
        FormatType::R10G10B10A2 => {
            let v = u32_at(bytes, 0);
            let channels = [v & 0x3ff, (v >> 10) & 0x3ff, (v >> 20) & 0x3ff, v >> 30];
            let unorm = format.comp_type != CompType::UInt;
            for (c, bits) in channels.into_iter().enumerate() {
                let max = if c == 3 { 3.0 } else { 1023.0 };
                out[c] = if unorm { bits as f32 / max } else { bits as f32 };
            }
        }
        FormatType::R11G11B10 => {
            let v = u32_at(bytes, 0);
            out[0] = small_float(v & 0x7ff, 6);
            out[1] = small_float((v >> 11) & 0x7ff, 6);
            out[2] = small_float(v >> 22, 5);
        }
        FormatType::R9G9B9E5 => {
            let v = u32_at(bytes, 0);
            let scale = 2f32.powi((v >> 27) as i32 - 24);
            out[0] = (v & 0x1ff) as f32 * scale;
            out[1] = ((v >> 9) & 0x1ff) as f32 * scale;
            out[2] = ((v >> 18) & 0x1ff) as f32 * scale;
        }
        FormatType::R5G6B5 => {
            let v = u16_at(bytes, 0) as u32;
            out[0] = (v & 0x1f) as f32 / 31.0;
            out[1] = ((v >> 5) & 0x3f) as f32 / 63.0;
            out[2] = ((v >> 11) & 0x1f) as f32 / 31.0;
        }
        FormatType::R5G5B5A1 => {
            let v = u16_at(bytes, 0) as u32;
            out[0] = (v & 0x1f) as f32 / 31.0;
            out[1] = ((v >> 5) & 0x1f) as f32 / 31.0;
            out[2] = ((v >> 10) & 0x1f) as f32 / 31.0;
            out[3] = (v >> 15) as f32;
        }
        FormatType::R4G4B4A4 => {
            let v = u16_at(bytes, 0) as u32;
            for (c, slot) in out.iter_mut().enumerate() {
                *slot = ((v >> (c * 4)) & 0xf) as f32 / 15.0;
            }
        }
        FormatType::A8 => {
            out[3] = bytes[0] as f32 / 255.0;
        }
        FormatType::D16S8 => {
            out[0] = u16_at(bytes, 0) as f32 / 65535.0;
            out[1] = bytes[2] as f32 / 255.0;
        }
        FormatType::D24S8 => {
            let v = u32_at(bytes, 0);
            out[0] = (v & 0x00ff_ffff) as f32 / 16_777_215.0;
            out[1] = (v >> 24) as f32 / 255.0;
        }
        FormatType::D32S8 => {
            out[0] = f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
            out[1] = bytes[4] as f32 / 255.0;
        }
        _ => return None,
    }

    if format.bgra_order {
        out.swap(0, 2);
    }

    Some(out)
}

fn u16_at(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

fn u32_at(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

/// One component of a regular format
fn component(comp_type: CompType, raw: &[u8], is_alpha: bool) -> f32 {
    match (comp_type, raw.len()) {
        (CompType::Float, 2) => f16::from_bits(u16_at(raw, 0)).to_f32(),
        (CompType::Float | CompType::Depth, 4) => f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]),
        (CompType::Depth, 2) => u16_at(raw, 0) as f32 / 65535.0,

        (CompType::UNorm, 1) => raw[0] as f32 / 255.0,
        (CompType::UNorm, 2) => u16_at(raw, 0) as f32 / 65535.0,
        (CompType::UNorm, 4) => u32_at(raw, 0) as f32 / u32::MAX as f32,
        (CompType::UNormSrgb, 1) if is_alpha => raw[0] as f32 / 255.0,
        (CompType::UNormSrgb, 1) => srgb_to_linear(raw[0] as f32 / 255.0),

        (CompType::SNorm, 1) => (raw[0] as i8 as f32 / 127.0).max(-1.0),
        (CompType::SNorm, 2) => (u16_at(raw, 0) as i16 as f32 / 32767.0).max(-1.0),
        (CompType::SNorm, 4) => (u32_at(raw, 0) as i32 as f32 / i32::MAX as f32).max(-1.0),

        (CompType::SInt | CompType::SScaled, 1) => raw[0] as i8 as f32,
        (CompType::SInt | CompType::SScaled, 2) => u16_at(raw, 0) as i16 as f32,
        (CompType::SInt | CompType::SScaled, 4) => u32_at(raw, 0) as i32 as f32,

        // UInt, UScaled and Typeless read as unsigned integers
        (_, 1) => raw[0] as f32,
        (_, 2) => u16_at(raw, 0) as f32,
        (_, 4) => u32_at(raw, 0) as f32,
        _ => 0.0,
    }
}

/// Unsigned 5-bit exponent float with `mantissa_bits` mantissa (R11G11B10)
fn small_float(bits: u32, mantissa_bits: u32) -> f32 {
    let exponent = bits >> mantissa_bits;
    let mantissa = bits & ((1 << mantissa_bits) - 1);
    let fraction = mantissa as f32 / (1u32 << mantissa_bits) as f32;

    match exponent {
        0 => fraction * 2f32.powi(-14),
        31 if mantissa == 0 => f32::INFINITY,
        31 => f32::NAN,
        e => 2f32.powi(e as i32 - 15) * (1.0 + fraction),
    }
}

fn srgb_to_linear(value: f32) -> f32 {
    if value <= 0.04045 {
        value / 12.92
    } else {
        ((value + 0.055) / 1.055).powf(2.4)
    }
}
