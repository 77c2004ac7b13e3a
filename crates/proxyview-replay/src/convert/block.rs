//! Block-compressed texture decompression
//!
//! Decompresses BC1-BC5 textures using the texpresso library. BC6H, BC7 and
//! the signed BC4/BC5 variants have no CPU path.

use proxyview_core::{CompType, FormatType, ResourceFormat};

use super::{ConvertError, ConvertResult};

/// Whether [`decompress_bc`] can handle `format`
pub fn can_decompress(format: &ResourceFormat) -> bool {
    texpresso_format(format).is_some()
}

fn texpresso_format(format: &ResourceFormat) -> Option<texpresso::Format> {
    if format.comp_type == CompType::SNorm {
        return None;
    }
    match format.format_type {
        FormatType::Bc1 => Some(texpresso::Format::Bc1),
        FormatType::Bc2 => Some(texpresso::Format::Bc2),
        FormatType::Bc3 => Some(texpresso::Format::Bc3),
        FormatType::Bc4 => Some(texpresso::Format::Bc4),
        FormatType::Bc5 => Some(texpresso::Format::Bc5),
        _ => None,
    }
}

/// Decompress one 2D slice of block data into RGBA8
pub fn decompress_bc(
    format: &ResourceFormat,
    data: &[u8],
    width: u32,
    height: u32,
) -> ConvertResult<Vec<u8>> {
    if width == 0 || height == 0 {
        return Err(ConvertError::InvalidDimensions { width, height });
    }

    let Some(bc) = texpresso_format(format) else {
        return Err(ConvertError::NoConversion(*format));
    };

    let expected = format
        .subresource_size(width, height, 1)
        .ok_or(ConvertError::InvalidDimensions { width, height })?;
    if data.len() < expected {
        return Err(ConvertError::SizeMismatch {
            expected,
            actual: data.len(),
        });
    }

    let output_len = super::rgba_len(width, height, 1).ok_or(ConvertError::InvalidDimensions { width, height })?;
    let mut output = super::try_zeroed::<u8>(output_len, "block decompression")?;
    bc.decompress(&data[..expected], width as usize, height as usize, &mut output);

    Ok(output)
}

/// Expand a decompressed RGBA8 slice to float, keeping only the channels the
/// block format stores
pub fn expand_rgba8(format: &ResourceFormat, rgba8: &[u8], out: &mut [f32]) {
    let channels = match format.format_type {
        FormatType::Bc4 => 1,
        FormatType::Bc5 => 2,
        _ => 4,
    };

    for (texel, dst) in rgba8.chunks_exact(4).zip(out.chunks_exact_mut(4)) {
        for c in 0..4 {
            dst[c] = if c < channels {
                texel[c] as f32 / 255.0
            } else if c == 3 {
                1.0
            } else {
                0.0
            };
        }
    }
}
