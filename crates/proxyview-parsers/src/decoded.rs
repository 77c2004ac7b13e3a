//! Decoder output
//!
//! Decoders hand over ownership of their pixel buffers through these types;
//! nothing downstream borrows from the decoder.

use proxyview_core::{ResourceFormat, Subresource};

use crate::sniff::ImageContainerKind;
use crate::traits::{DecodeError, DecodeResult};

/// Byte range of one subresource inside a [`SubresourceSet`] buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubresourceRange {
    pub offset: usize,
    pub len: usize,
}

impl SubresourceRange {
    pub fn new(offset: usize, len: usize) -> Self {
        Self { offset, len }
    }

    /// One past the last byte of the range
    pub fn end(&self) -> usize {
        self.offset + self.len
    }
}

/// Subresources sharing one backing buffer, indexed `slice * mips + mip`
///
/// Every range lies inside the buffer. Ranges may overlap only after a
/// layout remap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubresourceSet {
    buffer: Vec<u8>,
    ranges: Vec<SubresourceRange>,
    mips: u32,
}

impl SubresourceSet {
    /// Build a set, checking every range against the buffer
    pub fn new(buffer: Vec<u8>, ranges: Vec<SubresourceRange>, mips: u32) -> DecodeResult<Self> {
        if mips == 0 {
            return Err(DecodeError::InvalidStructure(
                "subresource set needs at least one mip".to_string(),
            ));
        }

        if let Some((index, range)) = ranges
            .iter()
            .enumerate()
            .find(|(_, r)| r.offset.checked_add(r.len).map_or(true, |end| end > buffer.len()))
        {
            return Err(DecodeError::InvalidStructure(format!(
                "subresource {index} [{}, +{}) exceeds buffer of {} bytes",
                range.offset,
                range.len,
                buffer.len()
            )));
        }

        Ok(Self { buffer, ranges, mips })
    }

    /// A single subresource covering the whole buffer
    pub fn single(buffer: Vec<u8>) -> Self {
        let ranges = vec![SubresourceRange::new(0, buffer.len())];
        Self { buffer, ranges, mips: 1 }
    }

    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    pub fn ranges(&self) -> &[SubresourceRange] {
        &self.ranges
    }

    pub fn mips(&self) -> u32 {
        self.mips
    }

    /// Number of subresources
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Bytes of the subresource at a flat index
    pub fn get(&self, index: usize) -> Option<&[u8]> {
        let range = self.ranges.get(index)?;
        self.buffer.get(range.offset..range.end())
    }

    /// Bytes of the subresource at a (mip, slice) coordinate
    pub fn subresource(&self, sub: Subresource) -> Option<&[u8]> {
        if sub.mip >= self.mips {
            return None;
        }
        self.get(sub.index(self.mips))
    }

    /// Sum of all subresource lengths
    pub fn total_len(&self) -> usize {
        self.ranges.iter().map(|r| r.len).sum()
    }

    /// Iterate (coordinate, bytes) pairs in index order
    pub fn iter(&self) -> impl Iterator<Item = (Subresource, &[u8])> + '_ {
        let mips = self.mips;
        self.ranges.iter().enumerate().map(move |(i, r)| {
            (
                Subresource::from_index(i as u32, mips),
                &self.buffer[r.offset..r.end()],
            )
        })
    }

    /// Take the buffer and ranges apart
    pub fn into_parts(self) -> (Vec<u8>, Vec<SubresourceRange>, u32) {
        (self.buffer, self.ranges, self.mips)
    }
}

/// Decoded pixel payload
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedPixels {
    /// Interleaved 8-bit RGBA, one mip and slice
    Rgba8(Vec<u8>),
    /// Interleaved 32-bit float RGBA, one mip and slice
    Rgba32F(Vec<f32>),
    /// Container-provided subresources with full layout
    Subresources(SubresourceSet),
}

impl DecodedPixels {
    /// Payload size in bytes
    pub fn byte_len(&self) -> usize {
        match self {
            DecodedPixels::Rgba8(data) => data.len(),
            DecodedPixels::Rgba32F(data) => data.len() * std::mem::size_of::<f32>(),
            DecodedPixels::Subresources(set) => set.total_len(),
        }
    }

    /// Whether the pixels came with a container layout
    pub fn has_layout(&self) -> bool {
        matches!(self, DecodedPixels::Subresources(_))
    }

    /// Move the payload into a subresource set
    pub fn into_subresource_set(self) -> SubresourceSet {
        match self {
            DecodedPixels::Rgba8(data) => SubresourceSet::single(data),
            DecodedPixels::Rgba32F(data) => SubresourceSet::single(bytemuck::cast_slice(&data).to_vec()),
            DecodedPixels::Subresources(set) => set,
        }
    }
}

/// Layout fields a decoder knows; the description builder fills the rest
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialDescription {
    pub width: u32,
    pub height: u32,
    pub depth: Option<u32>,
    pub array_size: Option<u32>,
    pub mips: Option<u32>,
    pub cubemap: Option<bool>,
    pub format: ResourceFormat,
}

impl PartialDescription {
    /// A flat single-subresource image
    pub fn flat(width: u32, height: u32, format: ResourceFormat) -> Self {
        Self {
            width,
            height,
            depth: None,
            array_size: None,
            mips: None,
            cubemap: None,
            format,
        }
    }
}

/// Everything one decode pass produced
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedImage {
    pub kind: ImageContainerKind,
    pub layout: PartialDescription,
    pub pixels: DecodedPixels,
    /// Size of the source file in bytes
    pub file_size: u64,
}

impl DecodedImage {
    /// Decoded payload size, reported as the uncompressed size
    pub fn uncompressed_size(&self) -> u64 {
        self.pixels.byte_len() as u64
    }
}
