//! CPU-side conversion of texture data to float RGBA
//!
//! Used when the backend can't represent a decoded format. Every subresource
//! is converted before anything is uploaded; an allocation failure aborts the
//! whole conversion.

pub mod block;
pub mod texel;

pub use block::{can_decompress, decompress_bc};
pub use texel::{can_decode, decode_texel};

use proxyview_core::{Error as ProxyError, ResourceFormat, Subresource, TextureDescription};
use proxyview_parsers::{SubresourceRange, SubresourceSet};
use thiserror::Error;

/// Conversion errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConvertError {
    #[error("No conversion available for {0}")]
    NoConversion(ResourceFormat),

    #[error("Subresource data size mismatch: expected {expected}, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("Invalid dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("Invalid subresource layout: {0}")]
    Layout(String),

    #[error("Allocation for {bytes} bytes failed for {what}")]
    OutOfMemory { bytes: usize, what: &'static str },
}

pub type ConvertResult<T> = Result<T, ConvertError>;

impl From<ConvertError> for ProxyError {
    fn from(err: ConvertError) -> Self {
        match err {
            ConvertError::OutOfMemory { bytes, what } => ProxyError::out_of_memory(bytes, what),
            other => ProxyError::unsupported(other.to_string()),
        }
    }
}

/// Whether any CPU path exists from `format` to float RGBA
pub fn can_convert(format: &ResourceFormat) -> bool {
    can_decode(format) || can_decompress(format)
}

fn try_zeroed<T: Clone + Default>(len: usize, what: &'static str) -> ConvertResult<Vec<T>> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(len)
        .map_err(|_| ConvertError::OutOfMemory {
            bytes: len.saturating_mul(std::mem::size_of::<T>()),
            what,
        })?;
    buffer.resize(len, T::default());
    Ok(buffer)
}

/// Channel count of `width` x `height` x `depth` RGBA texels, or `None` on
/// overflow
fn rgba_len(width: u32, height: u32, depth: u32) -> Option<usize> {
    (width as usize)
        .checked_mul(height as usize)?
        .checked_mul(depth as usize)?
        .checked_mul(4)
}

/// Original bytes of each subresource, kept for exact read-back after a
/// conversion. Indexed `slice * mips + mip`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetainedPixels {
    subresources: Vec<Vec<u8>>,
}

impl RetainedPixels {
    /// Copy every subresource out of a set
    pub fn capture(set: &SubresourceSet) -> ConvertResult<Self> {
        let mut subresources = Vec::new();
        subresources
            .try_reserve_exact(set.len())
            .map_err(|_| ConvertError::OutOfMemory {
                bytes: set.len().saturating_mul(std::mem::size_of::<Vec<u8>>()),
                what: "retained pixel table",
            })?;

        for (_, bytes) in set.iter() {
            let mut copy = Vec::new();
            copy.try_reserve_exact(bytes.len())
                .map_err(|_| ConvertError::OutOfMemory {
                    bytes: bytes.len(),
                    what: "retained pixels",
                })?;
            copy.extend_from_slice(bytes);
            subresources.push(copy);
        }

        Ok(Self { subresources })
    }

    pub fn get(&self, index: usize) -> Option<&[u8]> {
        self.subresources.get(index).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.subresources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subresources.is_empty()
    }
}

/// Decode one subresource of `width` x `height` x `depth` texels to float RGBA
pub fn decode_subresource(
    format: &ResourceFormat,
    (width, height, depth): (u32, u32, u32),
    data: &[u8],
) -> ConvertResult<Vec<f32>> {
    let len = rgba_len(width, height, depth).ok_or(ConvertError::InvalidDimensions { width, height })?;
    let mut out = try_zeroed::<f32>(len, "converted pixels")?;
    decode_into(format, (width, height, depth), data, &mut out)?;
    Ok(out)
}

fn decode_into(
    format: &ResourceFormat,
    (width, height, depth): (u32, u32, u32),
    data: &[u8],
    out: &mut [f32],
) -> ConvertResult<()> {
    if format.is_block_format() {
        let invalid = ConvertError::InvalidDimensions { width, height };
        let slice_bytes = format.subresource_size(width, height, 1).ok_or_else(|| invalid.clone())?;
        let slice_floats = rgba_len(width, height, 1).ok_or(invalid)?;
        for z in 0..depth as usize {
            let start = z * slice_bytes;
            let src = data.get(start..).ok_or(ConvertError::SizeMismatch {
                expected: slice_bytes.saturating_mul(depth as usize),
                actual: data.len(),
            })?;
            let rgba8 = decompress_bc(format, src, width, height)?;
            block::expand_rgba8(format, &rgba8, &mut out[z * slice_floats..(z + 1) * slice_floats]);
        }
        return Ok(());
    }

    if !can_decode(format) {
        return Err(ConvertError::NoConversion(*format));
    }

    let stride = format.texel_stride();
    let element = format.element_size();
    let texels = out.len() / 4;
    let expected = texels.saturating_sub(1) * stride + element;
    if data.len() < expected {
        return Err(ConvertError::SizeMismatch {
            expected,
            actual: data.len(),
        });
    }

    for (t, dst) in out.chunks_exact_mut(4).enumerate() {
        let texel = decode_texel(format, &data[t * stride..]).ok_or(ConvertError::NoConversion(*format))?;
        dst.copy_from_slice(&texel);
    }

    Ok(())
}

/// Convert every subresource of `set` to RGBA32F
///
/// Returns the converted set, laid out contiguously in the same index order.
pub fn convert_to_rgba32f(desc: &TextureDescription, set: &SubresourceSet) -> ConvertResult<SubresourceSet> {
    if !can_convert(&desc.format) {
        return Err(ConvertError::NoConversion(desc.format));
    }

    let mips = set.mips();
    let mut float_ranges = Vec::with_capacity(set.len());
    let mut total = 0usize;
    for index in 0..set.len() {
        let sub = Subresource::from_index(index as u32, mips);
        let (w, h, d) = desc.mip_dimensions(sub.mip);
        let len = rgba_len(w, h, d).ok_or(ConvertError::InvalidDimensions { width: w, height: h })?;
        float_ranges.push((total, len));
        total = total
            .checked_add(len)
            .ok_or_else(|| ConvertError::Layout("converted size overflows".to_string()))?;
    }

    let byte_total = total
        .checked_mul(std::mem::size_of::<f32>())
        .ok_or_else(|| ConvertError::Layout("converted size overflows".to_string()))?;
    let mut floats = try_zeroed::<f32>(total, "converted pixels")?;

    for (index, (sub, bytes)) in set.iter().enumerate() {
        let dims = desc.mip_dimensions(sub.mip);
        let (start, len) = float_ranges[index];
        decode_into(&desc.format, dims, bytes, &mut floats[start..start + len])?;
    }

    tracing::debug!(
        format = %desc.format,
        subresources = set.len(),
        bytes = byte_total,
        "Converted texture to RGBA32F"
    );

    let mut buffer = try_zeroed::<u8>(byte_total, "converted pixel bytes")?;
    buffer.copy_from_slice(bytemuck::cast_slice(&floats));
    drop(floats);

    let ranges = float_ranges
        .into_iter()
        .map(|(start, len)| SubresourceRange::new(start * 4, len * 4))
        .collect();

    SubresourceSet::new(buffer, ranges, mips).map_err(|e| ConvertError::Layout(e.to_string()))
}
