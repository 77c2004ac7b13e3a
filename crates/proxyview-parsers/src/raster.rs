//! Generic raster decoding (PNG, JPEG, BMP, TGA, GIF, PSD...)
//!
//! Dimensions are probed before any pixel data is decoded so oversized
//! images are rejected without allocating for them.

use std::io::{Cursor, Read, Seek};

use image::ImageReader;
use proxyview_core::ResourceFormat;

use crate::decoded::{DecodedImage, DecodedPixels, PartialDescription};
use crate::sniff::ImageContainerKind;
use crate::traits::{read_all, DecodeError, DecodeResult, ImageDecoder, LoadOptions};

/// Probe the format and dimensions of an in-memory raster image
pub fn probe_dimensions(bytes: &[u8]) -> DecodeResult<(image::ImageFormat, u32, u32)> {
    let reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
    let format = reader.format().ok_or(DecodeError::UnrecognizedFormat)?;
    let (width, height) = reader
        .into_dimensions()
        .map_err(|e| DecodeError::library("image", e))?;
    Ok((format, width, height))
}

/// Reject empty images and anything at or beyond `max_dimension`
pub fn check_dimensions(width: u32, height: u32, max_dimension: u32) -> DecodeResult<()> {
    if width == 0 || height == 0 || width >= max_dimension || height >= max_dimension {
        return Err(DecodeError::InvalidDimensions { width, height });
    }
    Ok(())
}

/// Decoder for everything the `image` crate recognises
pub struct RasterDecoder;

impl RasterDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RasterDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ImageDecoder for RasterDecoder {
    fn kind(&self) -> ImageContainerKind {
        ImageContainerKind::Generic
    }

    fn name(&self) -> &str {
        "Raster Decoder"
    }

    fn decode<R: Read + Seek>(&self, reader: &mut R, options: &LoadOptions) -> DecodeResult<DecodedImage> {
        let bytes = read_all(reader, "image file")?;
        let file_size = bytes.len() as u64;

        let (format, width, height) = probe_dimensions(&bytes)?;
        check_dimensions(width, height, options.max_dimension)?;

        let rgba = ImageReader::with_format(Cursor::new(bytes.as_slice()), format)
            .decode()
            .map_err(|e| DecodeError::library("image", e))?
            .into_rgba8();

        tracing::debug!(?format, width, height, "Decoded raster image");

        Ok(DecodedImage {
            kind: ImageContainerKind::Generic,
            layout: PartialDescription::flat(width, height, ResourceFormat::rgba8_srgb()),
            pixels: DecodedPixels::Rgba8(rgba.into_raw()),
            file_size,
        })
    }
}
