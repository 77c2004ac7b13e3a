//! Pixel format description
//!
//! A [`ResourceFormat`] describes texel storage independently of any graphics
//! API: a [`FormatType`] for the layout family, a [`CompType`] for how the
//! component bits are interpreted, and component count/width for the regular
//! (one value per component) layouts.

use std::fmt;

use serde::{Deserialize, Serialize};

/// How component bits are interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompType {
    Typeless,
    Float,
    UNorm,
    SNorm,
    UInt,
    SInt,
    UScaled,
    SScaled,
    Depth,
    UNormSrgb,
}

/// Layout family of a pixel format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FormatType {
    /// One value per component, `comp_byte_width` bytes each
    Regular,
    Bc1,
    Bc2,
    Bc3,
    Bc4,
    Bc5,
    Bc6,
    Bc7,
    /// 10:10:10:2 packed into 32 bits
    R10G10B10A2,
    /// Unsigned 11:11:10 floats packed into 32 bits
    R11G11B10,
    /// 5:6:5 packed into 16 bits
    R5G6B5,
    /// 5:5:5:1 packed into 16 bits
    R5G5B5A1,
    /// 4:4:4:4 packed into 16 bits
    R4G4B4A4,
    /// Shared-exponent 9:9:9 mantissas with 5-bit exponent
    R9G9B9E5,
    /// Alpha only, 8 bits
    A8,
    /// 16-bit depth with 8-bit stencil
    D16S8,
    /// 24-bit depth with 8-bit stencil
    D24S8,
    /// 32-bit float depth with 8-bit stencil
    D32S8,
}

impl FormatType {
    /// All variants, in declaration order
    pub const ALL: [FormatType; 18] = [
        FormatType::Regular,
        FormatType::Bc1,
        FormatType::Bc2,
        FormatType::Bc3,
        FormatType::Bc4,
        FormatType::Bc5,
        FormatType::Bc6,
        FormatType::Bc7,
        FormatType::R10G10B10A2,
        FormatType::R11G11B10,
        FormatType::R5G6B5,
        FormatType::R5G5B5A1,
        FormatType::R4G4B4A4,
        FormatType::R9G9B9E5,
        FormatType::A8,
        FormatType::D16S8,
        FormatType::D24S8,
        FormatType::D32S8,
    ];
}

/// Full pixel format description
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceFormat {
    pub format_type: FormatType,
    pub comp_type: CompType,
    pub comp_count: u8,
    pub comp_byte_width: u8,
    /// Components are stored B, G, R, A
    pub bgra_order: bool,
}

impl ResourceFormat {
    /// A regular format with `count` components of `width` bytes
    pub const fn regular(comp_type: CompType, comp_count: u8, comp_byte_width: u8) -> Self {
        Self {
            format_type: FormatType::Regular,
            comp_type,
            comp_count,
            comp_byte_width,
            bgra_order: false,
        }
    }

    /// A special (packed, block or depth/stencil) format
    pub const fn special(format_type: FormatType, comp_type: CompType, comp_count: u8) -> Self {
        Self {
            format_type,
            comp_type,
            comp_count,
            comp_byte_width: 0,
            bgra_order: false,
        }
    }

    /// 8-bit sRGB RGBA, the output of the generic raster decoder
    pub const fn rgba8_srgb() -> Self {
        Self::regular(CompType::UNormSrgb, 4, 1)
    }

    /// 32-bit float RGBA, the output of the EXR/HDR decoders and of CPU conversion
    pub const fn rgba32_float() -> Self {
        Self::regular(CompType::Float, 4, 4)
    }

    /// Same format with B and R swapped in storage
    pub const fn with_bgra(mut self) -> Self {
        self.bgra_order = true;
        self
    }

    /// Check if format is block-compressed
    pub fn is_block_format(&self) -> bool {
        matches!(
            self.format_type,
            FormatType::Bc1
                | FormatType::Bc2
                | FormatType::Bc3
                | FormatType::Bc4
                | FormatType::Bc5
                | FormatType::Bc6
                | FormatType::Bc7
        )
    }

    /// Check if format carries depth (and possibly stencil)
    pub fn is_depth_stencil(&self) -> bool {
        self.comp_type == CompType::Depth
            || matches!(
                self.format_type,
                FormatType::D16S8 | FormatType::D24S8 | FormatType::D32S8
            )
    }

    /// Bytes per 4x4 block for block-compressed formats
    pub fn block_size(&self) -> Option<usize> {
        match self.format_type {
            FormatType::Bc1 | FormatType::Bc4 => Some(8),
            FormatType::Bc2
            | FormatType::Bc3
            | FormatType::Bc5
            | FormatType::Bc6
            | FormatType::Bc7 => Some(16),
            _ => None,
        }
    }

    /// Size of one element: a texel, or a block for block formats.
    ///
    /// Combined depth/stencil formats report their packed component size
    /// (3 bytes for D16S8, 5 for D32S8); storage uses [`Self::texel_stride`].
    pub fn element_size(&self) -> usize {
        match self.format_type {
            FormatType::Regular => self.comp_count as usize * self.comp_byte_width as usize,
            FormatType::R10G10B10A2
            | FormatType::R11G11B10
            | FormatType::R9G9B9E5
            | FormatType::D24S8 => 4,
            FormatType::R5G6B5 | FormatType::R5G5B5A1 | FormatType::R4G4B4A4 => 2,
            FormatType::A8 => 1,
            FormatType::D16S8 => 3,
            FormatType::D32S8 => 5,
            _ => self.block_size().unwrap_or(0),
        }
    }

    /// Bytes between consecutive texels in memory
    pub fn texel_stride(&self) -> usize {
        match self.format_type {
            FormatType::D16S8 => 4,
            FormatType::D32S8 => 8,
            _ => self.element_size(),
        }
    }

    /// Byte size of one `width` x `height` x `depth` subresource, or `None`
    /// if it doesn't fit in `usize`
    pub fn subresource_size(&self, width: u32, height: u32, depth: u32) -> Option<usize> {
        let depth = depth.max(1) as usize;
        let (wide, high, unit) = match self.block_size() {
            Some(block) => (width.div_ceil(4).max(1), height.div_ceil(4).max(1), block),
            None => (width.max(1), height.max(1), self.texel_stride()),
        };
        (wide as usize)
            .checked_mul(high as usize)?
            .checked_mul(depth)?
            .checked_mul(unit)
    }

    /// Human-readable name
    pub fn name(&self) -> String {
        let suffix = match self.comp_type {
            CompType::Typeless => "TYPELESS",
            CompType::Float => "FLOAT",
            CompType::UNorm => "UNORM",
            CompType::SNorm => "SNORM",
            CompType::UInt => "UINT",
            CompType::SInt => "SINT",
            CompType::UScaled => "USCALED",
            CompType::SScaled => "SSCALED",
            CompType::Depth => "DEPTH",
            CompType::UNormSrgb => "UNORM_SRGB",
        };

        let body = match self.format_type {
            FormatType::Regular => {
                let order: &[char] = if self.bgra_order {
                    &['B', 'G', 'R', 'A']
                } else {
                    &['R', 'G', 'B', 'A']
                };
                let bits = self.comp_byte_width as usize * 8;
                order
                    .iter()
                    .take(self.comp_count as usize)
                    .map(|c| format!("{c}{bits}"))
                    .collect::<String>()
            }
            FormatType::Bc1 => "BC1".to_string(),
            FormatType::Bc2 => "BC2".to_string(),
            FormatType::Bc3 => "BC3".to_string(),
            FormatType::Bc4 => "BC4".to_string(),
            FormatType::Bc5 => "BC5".to_string(),
            FormatType::Bc6 => "BC6H".to_string(),
            FormatType::Bc7 => "BC7".to_string(),
            FormatType::R10G10B10A2 => "R10G10B10A2".to_string(),
            FormatType::R11G11B10 => "R11G11B10".to_string(),
            FormatType::R5G6B5 if self.bgra_order => "B5G6R5".to_string(),
            FormatType::R5G6B5 => "R5G6B5".to_string(),
            FormatType::R5G5B5A1 if self.bgra_order => "B5G5R5A1".to_string(),
            FormatType::R5G5B5A1 => "R5G5B5A1".to_string(),
            FormatType::R4G4B4A4 if self.bgra_order => "B4G4R4A4".to_string(),
            FormatType::R4G4B4A4 => "R4G4B4A4".to_string(),
            FormatType::R9G9B9E5 => "R9G9B9E5".to_string(),
            FormatType::A8 => "A8".to_string(),
            FormatType::D16S8 => return "D16S8".to_string(),
            FormatType::D24S8 => return "D24S8".to_string(),
            FormatType::D32S8 => return "D32S8".to_string(),
        };

        format!("{body}_{suffix}")
    }
}

impl Default for ResourceFormat {
    fn default() -> Self {
        Self::rgba8_srgb()
    }
}

impl fmt::Display for ResourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_sizes() {
        let bc1 = ResourceFormat::special(FormatType::Bc1, CompType::UNorm, 4);
        let bc7 = ResourceFormat::special(FormatType::Bc7, CompType::UNorm, 4);

        assert!(bc1.is_block_format());
        assert_eq!(bc1.element_size(), 8);
        assert_eq!(bc7.element_size(), 16);
        assert_eq!(bc1.subresource_size(4, 4, 1), Some(8));
        assert_eq!(bc1.subresource_size(5, 5, 1), Some(32));
        assert_eq!(bc1.subresource_size(1, 1, 1), Some(8));
        assert_eq!(bc7.subresource_size(8, 8, 3), Some(4 * 16 * 3));
    }

    #[test]
    fn test_depth_stencil_stride_override() {
        let d16s8 = ResourceFormat::special(FormatType::D16S8, CompType::Depth, 2);
        let d32s8 = ResourceFormat::special(FormatType::D32S8, CompType::Depth, 2);
        let d24s8 = ResourceFormat::special(FormatType::D24S8, CompType::Depth, 2);

        assert_eq!(d16s8.element_size(), 3);
        assert_eq!(d16s8.texel_stride(), 4);
        assert_eq!(d32s8.element_size(), 5);
        assert_eq!(d32s8.texel_stride(), 8);
        assert_eq!(d24s8.texel_stride(), 4);
        assert!(d24s8.is_depth_stencil());
    }

    #[test]
    fn test_names() {
        assert_eq!(ResourceFormat::rgba8_srgb().name(), "R8G8B8A8_UNORM_SRGB");
        assert_eq!(ResourceFormat::rgba32_float().name(), "R32G32B32A32_FLOAT");
        assert_eq!(
            ResourceFormat::regular(CompType::UNorm, 4, 1).with_bgra().name(),
            "B8G8R8A8_UNORM"
        );
        assert_eq!(
            ResourceFormat::special(FormatType::Bc6, CompType::Float, 3).name(),
            "BC6H_FLOAT"
        );
    }

    #[test]
    fn test_regular_sizes() {
        let rgba16f = ResourceFormat::regular(CompType::Float, 4, 2);
        assert_eq!(rgba16f.element_size(), 8);
        assert_eq!(rgba16f.subresource_size(3, 2, 1), Some(48));
        assert!(!rgba16f.is_block_format());
    }

    #[test]
    fn test_subresource_size_overflow() {
        let rgba32f = ResourceFormat::rgba32_float();
        assert_eq!(rgba32f.subresource_size(u32::MAX, u32::MAX, u32::MAX), None);
        let bc1 = ResourceFormat::special(FormatType::Bc1, CompType::UNorm, 4);
        assert_eq!(bc1.subresource_size(u32::MAX, u32::MAX, u32::MAX), None);
    }
}
