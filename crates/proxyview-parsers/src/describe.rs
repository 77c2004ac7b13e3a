//! Texture description builder

use proxyview_core::TextureDescription;

use crate::decoded::{DecodedImage, PartialDescription};

/// Build a full description from a decoder's partial layout
///
/// Fields the decoder left unset default to a single 2D subresource. The
/// byte size is the size of the source file.
pub fn describe(image: &DecodedImage) -> TextureDescription {
    let mut desc = describe_layout(&image.layout);
    desc.byte_size = image.file_size;
    desc
}

/// Fill defaults and derive the texture type for a partial layout
pub fn describe_layout(layout: &PartialDescription) -> TextureDescription {
    let mut desc = TextureDescription {
        width: layout.width,
        height: layout.height,
        depth: layout.depth.unwrap_or(1).max(1),
        array_size: layout.array_size.unwrap_or(1).max(1),
        mips: layout.mips.unwrap_or(1).max(1),
        cubemap: layout.cubemap.unwrap_or(false),
        format: layout.format,
        ms_samples: 1,
        ms_quality: 0,
        ..TextureDescription::default()
    };
    desc.refresh_type();
    desc
}

#[cfg(test)]
mod tests {
    use super::*;
    use proxyview_core::{ResourceFormat, TextureType};

    #[test]
    fn test_flat_defaults() {
        let desc = describe_layout(&PartialDescription::flat(640, 480, ResourceFormat::rgba8_srgb()));
        assert_eq!(desc.depth, 1);
        assert_eq!(desc.array_size, 1);
        assert_eq!(desc.mips, 1);
        assert!(!desc.cubemap);
        assert_eq!(desc.texture_type, TextureType::Texture2D);
        assert_eq!(desc.dimension, 2);
        assert_eq!(desc.ms_samples, 1);
    }

    #[test]
    fn test_single_row_is_1d() {
        let desc = describe_layout(&PartialDescription::flat(256, 1, ResourceFormat::rgba32_float()));
        assert_eq!(desc.texture_type, TextureType::Texture1D);
        assert_eq!(desc.dimension, 1);
    }

    #[test]
    fn test_cube_array() {
        let layout = PartialDescription {
            array_size: Some(12),
            mips: Some(3),
            cubemap: Some(true),
            ..PartialDescription::flat(64, 64, ResourceFormat::rgba8_srgb())
        };
        let desc = describe_layout(&layout);
        assert_eq!(desc.texture_type, TextureType::TextureCubeArray);
        assert_eq!(desc.subresource_count(), 36);
    }

    #[test]
    fn test_volume() {
        let layout = PartialDescription {
            depth: Some(8),
            ..PartialDescription::flat(16, 16, ResourceFormat::rgba8_srgb())
        };
        let desc = describe_layout(&layout);
        assert_eq!(desc.texture_type, TextureType::Texture3D);
        assert_eq!(desc.dimension, 3);
    }
}
