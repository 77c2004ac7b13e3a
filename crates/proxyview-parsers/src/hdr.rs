//! Radiance HDR decoding

use std::io::{Cursor, Read, Seek};

use image::{ImageFormat, ImageReader};
use proxyview_core::ResourceFormat;

use crate::decoded::{DecodedImage, DecodedPixels, PartialDescription};
use crate::sniff::ImageContainerKind;
use crate::traits::{read_all, DecodeError, DecodeResult, ImageDecoder, LoadOptions};

/// Radiance RGBE decoder producing float RGBA with alpha 1.0
pub struct HdrDecoder;

impl HdrDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl Default for HdrDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageDecoder for HdrDecoder {
    fn kind(&self) -> ImageContainerKind {
        ImageContainerKind::Hdr
    }

    fn name(&self) -> &str {
        "Radiance HDR Decoder"
    }

    fn decode<R: Read + Seek>(&self, reader: &mut R, _options: &LoadOptions) -> DecodeResult<DecodedImage> {
        let bytes = read_all(reader, "HDR file")?;
        let file_size = bytes.len() as u64;

        let image = ImageReader::with_format(Cursor::new(bytes.as_slice()), ImageFormat::Hdr)
            .decode()
            .map_err(|e| DecodeError::library("image", e))?
            .into_rgba32f();

        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(DecodeError::InvalidDimensions { width, height });
        }

        tracing::debug!(width, height, "Decoded HDR image");

        Ok(DecodedImage {
            kind: ImageContainerKind::Hdr,
            layout: PartialDescription::flat(width, height, ResourceFormat::rgba32_float()),
            pixels: DecodedPixels::Rgba32F(image.into_raw()),
            file_size,
        })
    }
}
