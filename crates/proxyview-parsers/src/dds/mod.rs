//! DDS (DirectDraw Surface) texture decoding
//!
//! DDS files are loaded without conversion: the pixel bytes stay in their
//! stored format and are split into subresources ordered slice-major, each
//! slice holding its full mip chain.
//!
//! Cubemaps count six slices per array element. Volume arrays are rejected,
//! as are legacy cubemaps that don't carry all six faces.

mod format;
mod header;

pub use format::{detect as detect_format, from_dxgi, from_fourcc, from_masks};
pub use header::{caps, caps2, dx10, flags, pf_flags, DdsHeader, Dx10Header, PixelFormat};

use std::io::{Read, Seek, SeekFrom};

use proxyview_core::ResourceFormat;

use crate::decoded::{DecodedImage, DecodedPixels, PartialDescription, SubresourceRange, SubresourceSet};
use crate::sniff::{ImageContainerKind, DDS_MAGIC};
use crate::traits::{try_alloc, DecodeError, DecodeResult, ImageDecoder, LoadOptions, UnsupportedReason};

/// Texture shape described by the DDS headers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DdsLayout {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    /// Array elements times six for cubemaps
    pub slices: u32,
    pub mips: u32,
    pub cubemap: bool,
    pub format: ResourceFormat,
}

impl DdsLayout {
    /// Derive the layout from the parsed headers
    pub fn from_headers(header: &DdsHeader, ext: Option<&Dx10Header>) -> DecodeResult<Self> {
        let format = format::detect(&header.pixel_format, ext).ok_or_else(|| {
            let detail = match ext {
                Some(ext) => format!("DXGI format {}", ext.dxgi_format),
                None if header.pixel_format.flags & pf_flags::FOURCC != 0 => {
                    format!("FourCC '{}'", header.pixel_format.fourcc_string())
                }
                None => format!(
                    "{}-bit masks r={:#x} g={:#x} b={:#x} a={:#x}",
                    header.pixel_format.rgb_bit_count,
                    header.pixel_format.r_bit_mask,
                    header.pixel_format.g_bit_mask,
                    header.pixel_format.b_bit_mask,
                    header.pixel_format.a_bit_mask
                ),
            };
            DecodeError::unsupported(UnsupportedReason::PixelFormat, detail)
        })?;

        let (volume, cubemap, array_size) = match ext {
            Some(ext) => (ext.is_volume(), ext.is_cubemap(), ext.array_size.max(1)),
            None => {
                if header.is_cubemap() && !header.has_all_cube_faces() {
                    return Err(DecodeError::unsupported(
                        UnsupportedReason::PartialCubemap,
                        format!("caps2 {:#x}", header.caps2),
                    ));
                }
                (header.is_volume(), header.is_cubemap(), 1)
            }
        };

        let depth = if volume { header.depth.max(1) } else { 1 };
        let slices = if cubemap { array_size.saturating_mul(6) } else { array_size };

        if depth > 1 && slices > 1 {
            return Err(DecodeError::unsupported(
                UnsupportedReason::VolumeArray,
                format!("depth {depth} with {slices} slices"),
            ));
        }

        if header.width == 0 || header.height == 0 {
            return Err(DecodeError::InvalidDimensions {
                width: header.width,
                height: header.height,
            });
        }

        let mips = header.mipmap_count.max(1);
        let longest = header.width.max(header.height).max(depth);
        let full_chain = u32::BITS - longest.leading_zeros();
        if mips > full_chain {
            return Err(DecodeError::InvalidStructure(format!(
                "{mips} mips exceed the {full_chain}-level chain of a {}x{}x{depth} texture",
                header.width, header.height
            )));
        }

        Ok(DdsLayout {
            width: header.width,
            height: header.height,
            depth,
            slices,
            mips,
            cubemap,
            format,
        })
    }

    /// Byte ranges for every subresource plus the total byte count
    pub fn subresource_ranges(&self) -> DecodeResult<(Vec<SubresourceRange>, usize)> {
        let count = self.slices as usize * self.mips as usize;
        let mut ranges = Vec::new();
        ranges
            .try_reserve_exact(count)
            .map_err(|_| DecodeError::OutOfMemory {
                bytes: count.saturating_mul(std::mem::size_of::<SubresourceRange>()),
                what: "DDS subresource table",
            })?;

        let overflow = || DecodeError::InvalidStructure("DDS data size overflows".to_string());

        let mut offset = 0usize;
        for _slice in 0..self.slices {
            for mip in 0..self.mips {
                let width = (self.width >> mip).max(1);
                let height = (self.height >> mip).max(1);
                let depth = (self.depth >> mip).max(1);
                let len = self.format.subresource_size(width, height, depth).ok_or_else(overflow)?;
                ranges.push(SubresourceRange::new(offset, len));
                offset = offset.checked_add(len).ok_or_else(overflow)?;
            }
        }

        Ok((ranges, offset))
    }
}

/// DDS decoder
pub struct DdsDecoder;

impl DdsDecoder {
    /// Create a new DDS decoder
    pub fn new() -> Self {
        Self
    }

    /// Read the magic and headers, leaving the reader at the pixel data
    pub fn read_headers<R: Read + Seek>(reader: &mut R) -> DecodeResult<(DdsHeader, Option<Dx10Header>)> {
        reader.seek(SeekFrom::Start(0))?;

        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if magic != DDS_MAGIC {
            return Err(DecodeError::InvalidMagic {
                expected: DDS_MAGIC.to_vec(),
                found: magic.to_vec(),
            });
        }

        let header = DdsHeader::parse(reader)?;
        let ext = if header.has_dx10_header() {
            Some(Dx10Header::parse(reader)?)
        } else {
            None
        };

        Ok((header, ext))
    }
}

impl Default for DdsDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageDecoder for DdsDecoder {
    fn kind(&self) -> ImageContainerKind {
        ImageContainerKind::Dds
    }

    fn name(&self) -> &str {
        "DDS Texture Decoder"
    }

    fn decode<R: Read + Seek>(&self, reader: &mut R, _options: &LoadOptions) -> DecodeResult<DecodedImage> {
        let (header, ext) = Self::read_headers(reader)?;
        let layout = DdsLayout::from_headers(&header, ext.as_ref())?;
        let (ranges, total) = layout.subresource_ranges()?;

        let data_start = reader.stream_position()?;
        let file_size = reader.seek(SeekFrom::End(0))?;
        reader.seek(SeekFrom::Start(data_start))?;

        let available = usize::try_from(file_size - data_start).unwrap_or(usize::MAX);
        if available < total {
            return Err(DecodeError::Truncated {
                expected: total,
                available,
            });
        }

        let mut buffer: Vec<u8> = try_alloc(total, "DDS data")?;
        reader.read_exact(&mut buffer)?;

        tracing::debug!(
            width = layout.width,
            height = layout.height,
            depth = layout.depth,
            slices = layout.slices,
            mips = layout.mips,
            cubemap = layout.cubemap,
            format = %layout.format,
            bytes = total,
            "Decoded DDS texture"
        );

        let set = SubresourceSet::new(buffer, ranges, layout.mips)?;

        Ok(DecodedImage {
            kind: ImageContainerKind::Dds,
            layout: PartialDescription {
                width: layout.width,
                height: layout.height,
                depth: Some(layout.depth),
                array_size: Some(layout.slices),
                mips: Some(layout.mips),
                cubemap: Some(layout.cubemap),
                format: layout.format,
            },
            pixels: DecodedPixels::Subresources(set),
            file_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proxyview_core::FormatType;

    fn bc1_header(width: u32, height: u32, mips: u32) -> DdsHeader {
        DdsHeader {
            size: 124,
            flags: flags::CAPS | flags::WIDTH | flags::HEIGHT | flags::PIXEL_FORMAT,
            width,
            height,
            mipmap_count: mips,
            pixel_format: PixelFormat {
                size: 32,
                flags: pf_flags::FOURCC,
                fourcc: *b"DXT1",
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_mip_chain_ranges() {
        let layout = DdsLayout::from_headers(&bc1_header(8, 8, 4), None).unwrap();
        assert_eq!(layout.format.format_type, FormatType::Bc1);

        let (ranges, total) = layout.subresource_ranges().unwrap();
        // 8x8 -> 4 blocks, then 4x4, 2x2 and 1x1 round up to one block each
        let lens: Vec<usize> = ranges.iter().map(|r| r.len).collect();
        assert_eq!(lens, vec![32, 8, 8, 8]);
        assert_eq!(total, 56);
        assert_eq!(ranges[1].offset, 32);
    }

    #[test]
    fn test_mip_count_beyond_chain() {
        assert_eq!(DdsLayout::from_headers(&bc1_header(8, 8, 4), None).unwrap().mips, 4);

        let err = DdsLayout::from_headers(&bc1_header(8, 8, 5), None).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidStructure(_)));

        let err = DdsLayout::from_headers(&bc1_header(1, 1, 40), None).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidStructure(_)));
    }

    #[test]
    fn test_oversized_layout_overflows() {
        let mut header = bc1_header(u32::MAX, u32::MAX, 1);
        header.pixel_format.flags = pf_flags::FOURCC;
        header.pixel_format.fourcc = 116u32.to_le_bytes();
        let layout = DdsLayout::from_headers(&header, None).unwrap();
        assert_eq!(layout.format, ResourceFormat::rgba32_float());

        let err = layout.subresource_ranges().unwrap_err();
        assert!(matches!(err, DecodeError::InvalidStructure(_)));
    }

    #[test]
    fn test_partial_cubemap_rejected() {
        let mut header = bc1_header(4, 4, 1);
        header.caps2 = caps2::CUBEMAP | caps2::CUBEMAP_POSITIVEX;
        let err = DdsLayout::from_headers(&header, None).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::Unsupported { reason: UnsupportedReason::PartialCubemap, .. }
        ));
    }

    #[test]
    fn test_cube_array_slices() {
        let mut header = bc1_header(4, 4, 2);
        header.pixel_format.fourcc = *b"DX10";
        let ext = Dx10Header {
            dxgi_format: 71,
            resource_dimension: dx10::DIMENSION_TEXTURE2D,
            misc_flag: dx10::MISC_TEXTURECUBE,
            array_size: 2,
            misc_flags2: 0,
        };
        let layout = DdsLayout::from_headers(&header, Some(&ext)).unwrap();
        assert!(layout.cubemap);
        assert_eq!(layout.slices, 12);
        assert_eq!(layout.subresource_ranges().unwrap().0.len(), 24);
    }

    #[test]
    fn test_volume_array_rejected() {
        let mut header = bc1_header(4, 4, 1);
        header.depth = 4;
        header.pixel_format.fourcc = *b"DX10";
        let ext = Dx10Header {
            dxgi_format: 28,
            resource_dimension: dx10::DIMENSION_TEXTURE3D,
            misc_flag: 0,
            array_size: 3,
            misc_flags2: 0,
        };
        let err = DdsLayout::from_headers(&header, Some(&ext)).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::Unsupported { reason: UnsupportedReason::VolumeArray, .. }
        ));
    }

    #[test]
    fn test_unknown_fourcc() {
        let mut header = bc1_header(4, 4, 1);
        header.pixel_format.fourcc = *b"UYVY";
        let err = DdsLayout::from_headers(&header, None).unwrap_err();
        assert!(err.to_string().contains("UYVY"));
    }
}
