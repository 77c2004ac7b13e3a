//! Container classification from magic bytes
//!
//! The sniffer reads a small probe from the start of the stream and always
//! rewinds to offset 0 before returning, whether or not the read succeeded.

use std::fmt;
use std::io::{Read, Seek, SeekFrom};

use serde::{Deserialize, Serialize};

use crate::exr::{ExrVersion, EXR_MAGIC};
use crate::traits::DecodeResult;

/// DDS file magic number "DDS "
pub const DDS_MAGIC: [u8; 4] = *b"DDS ";

/// Radiance HDR signatures
pub const HDR_MARKERS: [&[u8]; 2] = [b"#?RADIANCE", b"#?RGBE"];

/// Bytes read by [`classify`]
pub const PROBE_LEN: usize = 16;

/// Image container families with distinct decode paths
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageContainerKind {
    Exr,
    Hdr,
    Dds,
    /// Anything else; the raster decoder decides whether it can read it
    Generic,
}

impl fmt::Display for ImageContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ImageContainerKind::Exr => "EXR",
            ImageContainerKind::Hdr => "HDR",
            ImageContainerKind::Dds => "DDS",
            ImageContainerKind::Generic => "Generic",
        };
        f.write_str(name)
    }
}

/// Classify a stream, leaving it positioned at offset 0
pub fn classify<R: Read + Seek>(reader: &mut R) -> DecodeResult<ImageContainerKind> {
    reader.seek(SeekFrom::Start(0))?;

    let mut probe = [0u8; PROBE_LEN];
    let read = read_probe(reader, &mut probe);

    reader.seek(SeekFrom::Start(0))?;
    let read = read?;

    let kind = classify_bytes(&probe[..read]);
    tracing::debug!(kind = %kind, probe_len = read, "Classified image container");
    Ok(kind)
}

/// Classify the first bytes of a file
pub fn classify_bytes(header: &[u8]) -> ImageContainerKind {
    if header.starts_with(&EXR_MAGIC) && ExrVersion::parse(header).is_ok() {
        ImageContainerKind::Exr
    } else if HDR_MARKERS.iter().any(|marker| header.starts_with(marker)) {
        ImageContainerKind::Hdr
    } else if header.starts_with(&DDS_MAGIC) {
        ImageContainerKind::Dds
    } else {
        ImageContainerKind::Generic
    }
}

/// Fill as much of `buf` as the stream allows
fn read_probe<R: Read>(reader: &mut R, buf: &mut [u8]) -> DecodeResult<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}
