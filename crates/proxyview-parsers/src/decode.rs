//! Container dispatch
//!
//! One decode entry point shared by the load pre-check and the refresh path.

use std::io::{Read, Seek, SeekFrom};

use crate::dds::DdsDecoder;
use crate::decoded::DecodedImage;
use crate::exr::ExrDecoder;
use crate::hdr::HdrDecoder;
use crate::raster::RasterDecoder;
use crate::sniff::{classify, ImageContainerKind};
use crate::traits::{DecodeResult, ImageDecoder, LoadOptions};

/// Decode a stream already classified as `kind`
pub fn decode_image<R: Read + Seek>(
    reader: &mut R,
    kind: ImageContainerKind,
    options: &LoadOptions,
) -> DecodeResult<DecodedImage> {
    reader.seek(SeekFrom::Start(0))?;

    match kind {
        ImageContainerKind::Exr => run(&ExrDecoder::new(), reader, options),
        ImageContainerKind::Hdr => run(&HdrDecoder::new(), reader, options),
        ImageContainerKind::Dds => run(&DdsDecoder::new(), reader, options),
        ImageContainerKind::Generic => run(&RasterDecoder::new(), reader, options),
    }
}

/// Classify and decode a stream
pub fn load_image<R: Read + Seek>(reader: &mut R, options: &LoadOptions) -> DecodeResult<DecodedImage> {
    let kind = classify(reader)?;
    decode_image(reader, kind, options)
}

fn run<D: ImageDecoder, R: Read + Seek>(
    decoder: &D,
    reader: &mut R,
    options: &LoadOptions,
) -> DecodeResult<DecodedImage> {
    tracing::trace!(decoder = decoder.name(), "Decoding");
    decoder.decode(reader, options).inspect_err(|e| {
        tracing::debug!(decoder = decoder.name(), kind = %decoder.kind(), error = %e, "Decode failed");
    })
}
