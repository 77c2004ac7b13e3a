//! DDS header structures

use std::io::Read;

use byteorder::{LittleEndian, ReadBytesExt};

use crate::traits::{DecodeError, DecodeResult};

/// DDS header flags
pub mod flags {
    pub const CAPS: u32 = 0x1;
    pub const HEIGHT: u32 = 0x2;
    pub const WIDTH: u32 = 0x4;
    pub const PITCH: u32 = 0x8;
    pub const PIXEL_FORMAT: u32 = 0x1000;
    pub const MIPMAP_COUNT: u32 = 0x20000;
    pub const LINEAR_SIZE: u32 = 0x80000;
    pub const DEPTH: u32 = 0x800000;
}

/// Caps flags
pub mod caps {
    pub const COMPLEX: u32 = 0x8;
    pub const TEXTURE: u32 = 0x1000;
    pub const MIPMAP: u32 = 0x400000;
}

/// Caps2 flags
pub mod caps2 {
    pub const CUBEMAP: u32 = 0x200;
    pub const CUBEMAP_POSITIVEX: u32 = 0x400;
    pub const CUBEMAP_NEGATIVEX: u32 = 0x800;
    pub const CUBEMAP_POSITIVEY: u32 = 0x1000;
    pub const CUBEMAP_NEGATIVEY: u32 = 0x2000;
    pub const CUBEMAP_POSITIVEZ: u32 = 0x4000;
    pub const CUBEMAP_NEGATIVEZ: u32 = 0x8000;
    pub const CUBEMAP_ALL_FACES: u32 = CUBEMAP_POSITIVEX
        | CUBEMAP_NEGATIVEX
        | CUBEMAP_POSITIVEY
        | CUBEMAP_NEGATIVEY
        | CUBEMAP_POSITIVEZ
        | CUBEMAP_NEGATIVEZ;
    pub const VOLUME: u32 = 0x200000;
}

/// DDS pixel format flags
pub mod pf_flags {
    pub const ALPHAPIXELS: u32 = 0x1;
    pub const ALPHA: u32 = 0x2;
    pub const FOURCC: u32 = 0x4;
    pub const RGB: u32 = 0x40;
    pub const YUV: u32 = 0x200;
    pub const LUMINANCE: u32 = 0x20000;
}

/// DX10 resource dimension and misc flag values
pub mod dx10 {
    pub const DIMENSION_TEXTURE1D: u32 = 2;
    pub const DIMENSION_TEXTURE2D: u32 = 3;
    pub const DIMENSION_TEXTURE3D: u32 = 4;
    pub const MISC_TEXTURECUBE: u32 = 0x4;
}

/// Byte length of [`DdsHeader`] on disk
pub const HEADER_SIZE: u32 = 124;

/// Byte length of [`Dx10Header`] on disk
pub const DX10_HEADER_SIZE: u32 = 20;

/// DDS header (124 bytes)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DdsHeader {
    pub size: u32,
    pub flags: u32,
    pub height: u32,
    pub width: u32,
    pub pitch_or_linear_size: u32,
    pub depth: u32,
    pub mipmap_count: u32,
    pub pixel_format: PixelFormat,
    pub caps: u32,
    pub caps2: u32,
    pub caps3: u32,
    pub caps4: u32,
}

impl DdsHeader {
    /// Parse the header that follows the magic
    pub fn parse<R: Read>(reader: &mut R) -> DecodeResult<Self> {
        let size = reader.read_u32::<LittleEndian>()?;
        if size != HEADER_SIZE {
            return Err(DecodeError::InvalidStructure(format!(
                "Invalid DDS header size: expected {HEADER_SIZE}, got {size}"
            )));
        }

        let flags = reader.read_u32::<LittleEndian>()?;
        let height = reader.read_u32::<LittleEndian>()?;
        let width = reader.read_u32::<LittleEndian>()?;
        let pitch_or_linear_size = reader.read_u32::<LittleEndian>()?;
        let depth = reader.read_u32::<LittleEndian>()?;
        let mipmap_count = reader.read_u32::<LittleEndian>()?;

        // reserved1
        let mut reserved = [0u8; 44];
        reader.read_exact(&mut reserved)?;

        let pixel_format = PixelFormat::parse(reader)?;

        let caps = reader.read_u32::<LittleEndian>()?;
        let caps2 = reader.read_u32::<LittleEndian>()?;
        let caps3 = reader.read_u32::<LittleEndian>()?;
        let caps4 = reader.read_u32::<LittleEndian>()?;
        let _reserved2 = reader.read_u32::<LittleEndian>()?;

        Ok(DdsHeader {
            size,
            flags,
            height,
            width,
            pitch_or_linear_size,
            depth,
            mipmap_count,
            pixel_format,
            caps,
            caps2,
            caps3,
            caps4,
        })
    }

    /// Check if this DDS has a DX10 extended header
    pub fn has_dx10_header(&self) -> bool {
        self.pixel_format.flags & pf_flags::FOURCC != 0 && self.pixel_format.fourcc == *b"DX10"
    }

    /// Check if this is a cubemap
    pub fn is_cubemap(&self) -> bool {
        self.caps2 & caps2::CUBEMAP != 0
    }

    /// Check if all six cube faces are present
    pub fn has_all_cube_faces(&self) -> bool {
        self.caps2 & caps2::CUBEMAP_ALL_FACES == caps2::CUBEMAP_ALL_FACES
    }

    /// Check if this is a volume texture
    pub fn is_volume(&self) -> bool {
        self.caps2 & caps2::VOLUME != 0 || self.flags & flags::DEPTH != 0
    }
}

/// DDS pixel format (32 bytes)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PixelFormat {
    pub size: u32,
    pub flags: u32,
    pub fourcc: [u8; 4],
    pub rgb_bit_count: u32,
    pub r_bit_mask: u32,
    pub g_bit_mask: u32,
    pub b_bit_mask: u32,
    pub a_bit_mask: u32,
}

impl PixelFormat {
    pub fn parse<R: Read>(reader: &mut R) -> DecodeResult<Self> {
        let size = reader.read_u32::<LittleEndian>()?;
        let flags = reader.read_u32::<LittleEndian>()?;
        let mut fourcc = [0u8; 4];
        reader.read_exact(&mut fourcc)?;

        Ok(PixelFormat {
            size,
            flags,
            fourcc,
            rgb_bit_count: reader.read_u32::<LittleEndian>()?,
            r_bit_mask: reader.read_u32::<LittleEndian>()?,
            g_bit_mask: reader.read_u32::<LittleEndian>()?,
            b_bit_mask: reader.read_u32::<LittleEndian>()?,
            a_bit_mask: reader.read_u32::<LittleEndian>()?,
        })
    }

    /// FourCC as text
    pub fn fourcc_string(&self) -> String {
        String::from_utf8_lossy(&self.fourcc).to_string()
    }

    /// FourCC read as a little-endian number, for D3DFMT codes
    pub fn fourcc_value(&self) -> u32 {
        u32::from_le_bytes(self.fourcc)
    }
}

/// DX10 extended header
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dx10Header {
    pub dxgi_format: u32,
    pub resource_dimension: u32,
    pub misc_flag: u32,
    pub array_size: u32,
    pub misc_flags2: u32,
}

impl Dx10Header {
    pub fn parse<R: Read>(reader: &mut R) -> DecodeResult<Self> {
        Ok(Dx10Header {
            dxgi_format: reader.read_u32::<LittleEndian>()?,
            resource_dimension: reader.read_u32::<LittleEndian>()?,
            misc_flag: reader.read_u32::<LittleEndian>()?,
            array_size: reader.read_u32::<LittleEndian>()?,
            misc_flags2: reader.read_u32::<LittleEndian>()?,
        })
    }

    pub fn is_volume(&self) -> bool {
        self.resource_dimension == dx10::DIMENSION_TEXTURE3D
    }

    pub fn is_cubemap(&self) -> bool {
        self.misc_flag & dx10::MISC_TEXTURECUBE != 0
    }
}
