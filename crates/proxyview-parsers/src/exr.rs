//! OpenEXR decoding
//!
//! Only single-part scanline images are accepted. Every channel is read as
//! 32-bit float and the channels named R, G, B and A are routed into an
//! interleaved RGBA buffer; missing colour channels read as 0.0 and a missing
//! alpha channel reads as 1.0.

use std::io::{Cursor, Read, Seek};

use proxyview_core::ResourceFormat;

use crate::decoded::{DecodedImage, DecodedPixels, PartialDescription};
use crate::sniff::ImageContainerKind;
use crate::traits::{
    read_all, try_alloc, DecodeError, DecodeResult, ImageDecoder, LoadOptions, UnsupportedReason,
};

/// EXR magic number 20000630, little endian
pub const EXR_MAGIC: [u8; 4] = [0x76, 0x2f, 0x31, 0x01];

/// Version field flags
pub mod version_flags {
    pub const TILED: u32 = 0x200;
    pub const LONG_NAMES: u32 = 0x400;
    pub const NON_IMAGE: u32 = 0x800;
    pub const MULTIPART: u32 = 0x1000;
}

/// Parsed magic + version block (first 8 bytes of the file)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExrVersion {
    pub version: u8,
    pub tiled: bool,
    pub long_names: bool,
    pub non_image: bool,
    pub multipart: bool,
}

impl ExrVersion {
    /// Parse the version block from the start of a file
    pub fn parse(header: &[u8]) -> DecodeResult<Self> {
        if header.len() < 8 {
            return Err(DecodeError::Truncated {
                expected: 8,
                available: header.len(),
            });
        }

        if header[0..4] != EXR_MAGIC {
            return Err(DecodeError::InvalidMagic {
                expected: EXR_MAGIC.to_vec(),
                found: header[0..4].to_vec(),
            });
        }

        let field = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
        let version = (field & 0xff) as u8;
        if version != 2 {
            return Err(DecodeError::InvalidStructure(format!(
                "EXR version {version} is not supported"
            )));
        }

        Ok(Self {
            version,
            tiled: field & version_flags::TILED != 0,
            long_names: field & version_flags::LONG_NAMES != 0,
            non_image: field & version_flags::NON_IMAGE != 0,
            multipart: field & version_flags::MULTIPART != 0,
        })
    }

    /// Reject the variants this decoder can't read
    pub fn check_supported(&self) -> DecodeResult<()> {
        if self.multipart {
            return Err(DecodeError::unsupported(
                UnsupportedReason::MultipartExr,
                "Unsupported EXR file detected - multipart EXR.",
            ));
        }
        if self.non_image {
            return Err(DecodeError::unsupported(
                UnsupportedReason::DeepExr,
                "Unsupported EXR file detected - deep image EXR.",
            ));
        }
        if self.tiled {
            return Err(DecodeError::unsupported(
                UnsupportedReason::TiledExr,
                "Unsupported EXR file detected - tiled EXR.",
            ));
        }
        Ok(())
    }
}

/// RGBA slot a channel name routes to
fn channel_slot(name: &str) -> Option<usize> {
    match name.chars().next()? {
        'R' => Some(0),
        'G' => Some(1),
        'B' => Some(2),
        'A' => Some(3),
        _ => None,
    }
}

/// Interleave named channels into RGBA
///
/// `channels` holds (name, samples) pairs; later channels routed to the same
/// slot win.
pub fn remap_channels(
    channels: &[(String, Vec<f32>)],
    pixel_count: usize,
) -> DecodeResult<Vec<f32>> {
    let mut slots: [Option<&[f32]>; 4] = [None; 4];
    for (name, samples) in channels {
        if samples.len() < pixel_count {
            return Err(DecodeError::unsupported(
                UnsupportedReason::SubsampledExr,
                format!(
                    "channel '{name}' has {} samples, expected {pixel_count}",
                    samples.len()
                ),
            ));
        }
        if let Some(slot) = channel_slot(name) {
            slots[slot] = Some(samples.as_slice());
        }
    }

    let mut rgba: Vec<f32> = try_alloc(pixel_count * 4, "EXR data")?;
    for (c, slot) in slots.iter().enumerate() {
        let default = if c < 3 { 0.0 } else { 1.0 };
        match slot {
            Some(samples) => {
                for (i, value) in samples.iter().take(pixel_count).enumerate() {
                    rgba[i * 4 + c] = *value;
                }
            }
            None => {
                for i in 0..pixel_count {
                    rgba[i * 4 + c] = default;
                }
            }
        }
    }

    Ok(rgba)
}

/// Read every channel of the first valid layer as f32
fn read_float_channels(bytes: &[u8]) -> DecodeResult<(u32, u32, Vec<(String, Vec<f32>)>)> {
    use exr::prelude::*;

    let image = read()
        .no_deep_data()
        .largest_resolution_level()
        .all_channels()
        .first_valid_layer()
        .all_attributes()
        .from_buffered(Cursor::new(bytes))
        .map_err(|e| DecodeError::library("exr", e))?;

    let size = image.layer_data.size;
    let width = u32::try_from(size.width()).map_err(|_| DecodeError::InvalidDimensions {
        width: u32::MAX,
        height: 0,
    })?;
    let height = u32::try_from(size.height()).map_err(|_| DecodeError::InvalidDimensions {
        width,
        height: u32::MAX,
    })?;

    let channels = image
        .layer_data
        .channel_data
        .list
        .iter()
        .map(|channel| {
            let samples: Vec<f32> = match &channel.sample_data {
                exr::image::FlatSamples::F16(values) => values.iter().map(|v| v.to_f32()).collect(),
                exr::image::FlatSamples::F32(values) => values.clone(),
                exr::image::FlatSamples::U32(values) => values.iter().map(|&v| v as f32).collect(),
            };
            (channel.name.to_string(), samples)
        })
        .collect();

    Ok((width, height, channels))
}

/// EXR decoder
pub struct ExrDecoder;

impl ExrDecoder {
    /// Create a new EXR decoder
    pub fn new() -> Self {
        Self
    }

    /// Validate version and header without decoding pixels
    pub fn check_header(bytes: &[u8]) -> DecodeResult<ExrVersion> {
        let version = ExrVersion::parse(bytes)?;
        version.check_supported()?;

        exr::meta::MetaData::read_from_buffered(Cursor::new(bytes), false).map_err(|e| {
            DecodeError::library("exr", format!("couldn't parse EXR header: '{e}'"))
        })?;

        Ok(version)
    }
}

impl Default for ExrDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageDecoder for ExrDecoder {
    fn kind(&self) -> ImageContainerKind {
        ImageContainerKind::Exr
    }

    fn name(&self) -> &str {
        "OpenEXR Decoder"
    }

    fn decode<R: Read + Seek>(&self, reader: &mut R, _options: &LoadOptions) -> DecodeResult<DecodedImage> {
        let bytes = read_all(reader, "EXR file")?;
        let file_size = bytes.len() as u64;

        Self::check_header(&bytes)?;

        let (width, height, channels) = read_float_channels(&bytes)?;
        let pixel_count = width as usize * height as usize;
        let rgba = remap_channels(&channels, pixel_count)?;

        tracing::debug!(
            width,
            height,
            channels = channels.len(),
            "Decoded EXR image"
        );

        Ok(DecodedImage {
            kind: ImageContainerKind::Exr,
            layout: PartialDescription::flat(width, height, ResourceFormat::rgba32_float()),
            pixels: DecodedPixels::Rgba32F(rgba),
            file_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn version_block(flags: u32) -> Vec<u8> {
        let mut bytes = EXR_MAGIC.to_vec();
        bytes.extend_from_slice(&(2 | flags).to_le_bytes());
        bytes
    }

    #[test]
    fn test_version_flags() {
        let version = ExrVersion::parse(&version_block(version_flags::TILED | version_flags::LONG_NAMES)).unwrap();
        assert!(version.tiled);
        assert!(version.long_names);
        assert!(!version.multipart);
        assert!(!version.non_image);
    }

    #[test]
    fn test_rejection_order() {
        let all = version_flags::TILED | version_flags::NON_IMAGE | version_flags::MULTIPART;
        let err = ExrVersion::parse(&version_block(all)).unwrap().check_supported().unwrap_err();
        assert!(matches!(
            err,
            DecodeError::Unsupported { reason: UnsupportedReason::MultipartExr, .. }
        ));

        let err = ExrVersion::parse(&version_block(version_flags::NON_IMAGE | version_flags::TILED))
            .unwrap()
            .check_supported()
            .unwrap_err();
        assert!(matches!(
            err,
            DecodeError::Unsupported { reason: UnsupportedReason::DeepExr, .. }
        ));
    }

    #[test]
    fn test_remap_defaults() {
        let channels = vec![
            ("G".to_string(), vec![0.5, 0.25]),
            ("Z".to_string(), vec![9.0, 9.0]),
        ];
        let rgba = remap_channels(&channels, 2).unwrap();
        assert_eq!(rgba, vec![0.0, 0.5, 0.0, 1.0, 0.0, 0.25, 0.0, 1.0]);
    }

    #[test]
    fn test_remap_all_channels() {
        let channels = vec![
            ("A".to_string(), vec![0.5]),
            ("B".to_string(), vec![0.3]),
            ("G".to_string(), vec![0.2]),
            ("R".to_string(), vec![0.1]),
        ];
        let rgba = remap_channels(&channels, 1).unwrap();
        assert_eq!(rgba, vec![0.1, 0.2, 0.3, 0.5]);
    }

    #[test]
    fn test_remap_rejects_short_channel() {
        let channels = vec![("R".to_string(), vec![1.0])];
        assert!(remap_channels(&channels, 4).is_err());
    }

    #[test]
    fn test_bad_magic() {
        assert!(matches!(
            ExrVersion::parse(b"DDS \x02\x00\x00\x00"),
            Err(DecodeError::InvalidMagic { .. })
        ));
    }
}
