// proxyview-parsers/src/traits.rs
//! Core traits defining the decoder interface for all image containers.
//!
//! This module establishes a unified decoding interface that enables:
//! - One decode contract shared by the load pre-check and the refresh path
//! - Consistent error handling across all container formats
//! - Configurable limits and retry behaviour through [`LoadOptions`]

use std::fmt;
use std::io::{Read, Seek};
use std::path::Path;

use proxyview_core::Error as ProxyError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::decoded::DecodedImage;
use crate::sniff::ImageContainerKind;

/// Why a recognised image was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnsupportedReason {
    MultipartExr,
    DeepExr,
    TiledExr,
    SubsampledExr,
    PartialCubemap,
    VolumeArray,
    PixelFormat,
}

impl fmt::Display for UnsupportedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            UnsupportedReason::MultipartExr => "multipart EXR",
            UnsupportedReason::DeepExr => "deep image EXR",
            UnsupportedReason::TiledExr => "tiled EXR",
            UnsupportedReason::SubsampledExr => "subsampled EXR channels",
            UnsupportedReason::PartialCubemap => "cubemap without all six faces",
            UnsupportedReason::VolumeArray => "arrays of volume textures",
            UnsupportedReason::PixelFormat => "pixel format",
        };
        f.write_str(text)
    }
}

/// Errors that can occur during decoding
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid magic bytes: expected {expected:?}, found {found:?}")]
    InvalidMagic { expected: Vec<u8>, found: Vec<u8> },

    #[error("Unsupported {reason}: {detail}")]
    Unsupported { reason: UnsupportedReason, detail: String },

    #[error("Image could not be identified")]
    UnrecognizedFormat,

    #[error("Image dimensions of {width}x{height} are not supported")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("{library} failed: {message}")]
    Library { library: &'static str, message: String },

    #[error("Invalid structure: {0}")]
    InvalidStructure(String),

    #[error("Truncated data: expected {expected} bytes, found {available}")]
    Truncated { expected: usize, available: usize },

    #[error("Allocation for {bytes} bytes failed for {what}")]
    OutOfMemory { bytes: usize, what: &'static str },
}

impl DecodeError {
    /// Create an unsupported-variant error
    pub fn unsupported(reason: UnsupportedReason, detail: impl Into<String>) -> Self {
        DecodeError::Unsupported {
            reason,
            detail: detail.into(),
        }
    }

    /// Capture a decode library's error message
    pub fn library(library: &'static str, err: impl fmt::Display) -> Self {
        DecodeError::Library {
            library,
            message: err.to_string(),
        }
    }
}

impl From<DecodeError> for ProxyError {
    fn from(err: DecodeError) -> Self {
        match err {
            DecodeError::Io(io) => ProxyError::file_io("", io.to_string()),
            DecodeError::OutOfMemory { bytes, what } => ProxyError::out_of_memory(bytes, what),
            other => ProxyError::unsupported(other.to_string()),
        }
    }
}

/// Result type alias for decoding operations
pub type DecodeResult<T> = Result<T, DecodeError>;

/// Allocate a zero-filled buffer, reporting allocation failure as an error
pub fn try_alloc<T: Clone + Default>(len: usize, what: &'static str) -> DecodeResult<Vec<T>> {
    let mut buffer = Vec::new();
    buffer.try_reserve_exact(len).map_err(|_| DecodeError::OutOfMemory {
        bytes: len.saturating_mul(std::mem::size_of::<T>()),
        what,
    })?;
    buffer.resize(len, T::default());
    Ok(buffer)
}

/// Read the whole stream from its start into memory
pub fn read_all<R: Read + Seek>(reader: &mut R, what: &'static str) -> DecodeResult<Vec<u8>> {
    let size = reader.seek(std::io::SeekFrom::End(0))?;
    reader.seek(std::io::SeekFrom::Start(0))?;

    let size = usize::try_from(size).map_err(|_| DecodeError::OutOfMemory {
        bytes: usize::MAX,
        what,
    })?;
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(size)
        .map_err(|_| DecodeError::OutOfMemory { bytes: size, what })?;
    reader.read_to_end(&mut buffer)?;
    Ok(buffer)
}

/// Configuration options for loading images
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadOptions {
    /// Number of attempts made to open the file before giving up
    pub open_attempts: u32,
    /// Delay between open attempts, in milliseconds
    pub open_retry_delay_ms: u64,
    /// Exclusive upper bound on generic raster width and height
    pub max_dimension: u32,
    /// Convert formats the backend can't display to float RGBA on the CPU
    pub convert_unsupported_formats: bool,
    /// Reinterpret block-compressed volumes as 2D arrays when needed
    pub remap_block_volumes: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            open_attempts: 10,
            open_retry_delay_ms: 40,
            max_dimension: 65536,
            convert_unsupported_formats: true,
            remap_block_volumes: true,
        }
    }
}

impl LoadOptions {
    /// Parse options from JSON; absent fields keep their defaults
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Load options from a JSON file
    pub fn from_file(path: &Path) -> Result<Self, ProxyError> {
        let text = std::fs::read_to_string(path).map_err(|e| ProxyError::file_io(path, e.to_string()))?;
        Self::from_json(&text).map_err(|e| {
            ProxyError::invalid_parameter(format!("invalid options in {}: {e}", path.display()))
        })
    }

    /// Delay between open attempts
    pub fn open_retry_delay(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.open_retry_delay_ms)
    }
}

/// Core trait for all image container decoders
///
/// Implementors consume the whole stream and produce pixel data together
/// with whatever layout metadata the container carries.
pub trait ImageDecoder: Send + Sync {
    /// The container this decoder handles
    fn kind(&self) -> ImageContainerKind;

    /// Returns a human-readable name for this decoder
    fn name(&self) -> &str;

    /// Decode the full stream, starting from offset 0
    fn decode<R: Read + Seek>(&self, reader: &mut R, options: &LoadOptions) -> DecodeResult<DecodedImage>;
}
