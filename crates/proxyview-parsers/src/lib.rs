//! proxyview-parsers
//!
//! Container sniffing and decoding for the proxyview image loader.
//!
//! # Supported Containers
//!
//! | Container | Detection | Output |
//! |-----------|-----------|--------|
//! | OpenEXR   | magic + version block | RGBA32F, single subresource |
//! | Radiance HDR | `#?RADIANCE` / `#?RGBE` | RGBA32F, single subresource |
//! | DDS       | `DDS ` magic | stored format, full mip/array layout |
//! | Generic   | anything else the `image` crate reads | RGBA8 sRGB, single subresource |
//!
//! # Example
//!
//! ```rust,ignore
//! use proxyview_parsers::{describe, load_image, LoadOptions};
//!
//! let mut file = std::fs::File::open("lightmap.exr")?;
//! let image = load_image(&mut file, &LoadOptions::default())?;
//! let desc = describe(&image);
//!
//! println!("{}x{} {}", desc.width, desc.height, desc.format);
//! ```

pub mod dds;
pub mod decode;
pub mod decoded;
pub mod describe;
pub mod exr;
pub mod hdr;
pub mod logging;
pub mod raster;
pub mod sniff;
pub mod traits;

pub use traits::{
    read_all, try_alloc, DecodeError, DecodeResult, ImageDecoder, LoadOptions, UnsupportedReason,
};

pub use dds::{DdsDecoder, DdsHeader, DdsLayout, Dx10Header, PixelFormat};
pub use decode::{decode_image, load_image};
pub use decoded::{DecodedImage, DecodedPixels, PartialDescription, SubresourceRange, SubresourceSet};
pub use describe::{describe, describe_layout};
pub use exr::{ExrDecoder, ExrVersion, EXR_MAGIC};
pub use hdr::HdrDecoder;
pub use raster::RasterDecoder;
pub use sniff::{classify, classify_bytes, ImageContainerKind};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
