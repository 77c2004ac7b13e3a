//! Integration tests for container sniffing and decoding
//!
//! These tests cover:
//! - Classification of every container family
//! - DDS layout, subresource sizes and rejections
//! - EXR channel remapping and variant rejection
//! - HDR and generic raster decoding through the `image` crate
//! - Description building from decoder output

use std::io::Cursor;

use proptest::prelude::*;
use proxyview_core::{CompType, FormatType, ResourceFormat, Subresource, TextureType};
use proxyview_parsers::dds::{caps2, dx10, flags, pf_flags};
use proxyview_parsers::exr::version_flags;
use proxyview_parsers::{
    classify, decode_image, describe, load_image, DecodeError, DecodedPixels, ImageContainerKind,
    LoadOptions, UnsupportedReason, EXR_MAGIC,
};

/// Extended header fields for [`make_dds`]
#[derive(Clone, Copy)]
struct Dx10 {
    dxgi_format: u32,
    resource_dimension: u32,
    misc_flag: u32,
    array_size: u32,
}

/// Helper to build a DDS file in memory
fn make_dds(
    width: u32,
    height: u32,
    depth: u32,
    mips: u32,
    caps2_bits: u32,
    fourcc: &[u8; 4],
    ext: Option<Dx10>,
    data: &[u8],
) -> Vec<u8> {
    let mut out = Vec::new();
    let mut put = |v: u32| out.extend_from_slice(&v.to_le_bytes());

    let mut header_flags = flags::CAPS | flags::WIDTH | flags::HEIGHT | flags::PIXEL_FORMAT;
    if mips > 1 {
        header_flags |= flags::MIPMAP_COUNT;
    }
    if depth > 1 {
        header_flags |= flags::DEPTH;
    }

    put(u32::from_le_bytes(*b"DDS "));
    put(124);
    put(header_flags);
    put(height);
    put(width);
    put(0);
    put(depth);
    put(mips);
    for _ in 0..11 {
        put(0);
    }
    // pixel format
    put(32);
    put(pf_flags::FOURCC);
    put(u32::from_le_bytes(*fourcc));
    for _ in 0..5 {
        put(0);
    }
    put(0x1000);
    put(caps2_bits);
    put(0);
    put(0);
    put(0);

    if let Some(ext) = ext {
        put(ext.dxgi_format);
        put(ext.resource_dimension);
        put(ext.misc_flag);
        put(ext.array_size);
        put(0);
    }

    out.extend_from_slice(data);
    out
}

/// Helper to build a legacy DDS with an uncompressed bitmask format
fn make_masked_dds(width: u32, height: u32, pf: [u32; 6], data: &[u8]) -> Vec<u8> {
    let mut bytes = make_dds(width, height, 1, 1, 0, b"\0\0\0\0", None, data);
    // pixel format flags live at byte 80, bit count and masks from byte 88
    bytes[80..84].copy_from_slice(&pf[0].to_le_bytes());
    for (i, value) in pf[1..].iter().enumerate() {
        let at = 88 + i * 4;
        bytes[at..at + 4].copy_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Helper to create an EXR version block followed by junk
fn make_exr_stub(extra_flags: u32) -> Vec<u8> {
    let mut bytes = EXR_MAGIC.to_vec();
    bytes.extend_from_slice(&(2 | extra_flags).to_le_bytes());
    bytes.extend_from_slice(&[0u8; 32]);
    bytes
}

fn encode_png(width: u32, height: u32) -> Vec<u8> {
    let image = image::RgbaImage::from_fn(width, height, |x, y| {
        image::Rgba([x as u8, y as u8, 0x40, 0xff])
    });
    let mut bytes = Cursor::new(Vec::new());
    image
        .write_to(&mut bytes, image::ImageFormat::Png)
        .expect("encode png");
    bytes.into_inner()
}

mod sniff_tests {
    use super::*;

    #[test]
    fn test_classify_each_container() {
        let dds = make_dds(4, 4, 1, 1, 0, b"DXT1", None, &[0; 8]);
        assert_eq!(classify(&mut Cursor::new(dds)).unwrap(), ImageContainerKind::Dds);

        let exr = make_exr_stub(0);
        assert_eq!(classify(&mut Cursor::new(exr)).unwrap(), ImageContainerKind::Exr);

        let png = encode_png(2, 2);
        assert_eq!(classify(&mut Cursor::new(png)).unwrap(), ImageContainerKind::Generic);
    }

    #[test]
    fn test_stream_rewound_for_decoder() {
        let mut cursor = Cursor::new(make_dds(4, 4, 1, 1, 0, b"DXT1", None, &[7; 8]));
        let kind = classify(&mut cursor).unwrap();
        assert_eq!(cursor.position(), 0);

        let image = decode_image(&mut cursor, kind, &LoadOptions::default()).unwrap();
        assert_eq!(image.kind, ImageContainerKind::Dds);
    }
}

mod dds_tests {
    use super::*;

    #[test]
    fn test_bc1_mip_chain() {
        let data = vec![0xAB; 32 + 8 + 8];
        let bytes = make_dds(8, 8, 1, 3, 0, b"DXT1", None, &data);
        let image = load_image(&mut Cursor::new(bytes), &LoadOptions::default()).unwrap();

        let DecodedPixels::Subresources(set) = &image.pixels else {
            panic!("DDS should keep its layout");
        };
        assert_eq!(set.len(), 3);
        assert_eq!(set.mips(), 3);
        assert_eq!(set.subresource(Subresource::new(0, 0)).map(<[u8]>::len), Some(32));
        assert_eq!(set.subresource(Subresource::new(2, 0)).map(<[u8]>::len), Some(8));
        assert_eq!(image.uncompressed_size(), 48);

        let desc = describe(&image);
        assert_eq!(desc.mips, 3);
        assert_eq!(desc.format.format_type, FormatType::Bc1);
        assert_eq!(desc.byte_size, image.file_size);
    }

    #[test]
    fn test_uncompressed_size_is_sum_of_subresources() {
        let data = vec![0u8; 64 * 6];
        let bytes = make_dds(4, 4, 1, 1, caps2::CUBEMAP | caps2::CUBEMAP_ALL_FACES, b"DXT5", None, &data);
        let image = load_image(&mut Cursor::new(bytes), &LoadOptions::default()).unwrap();
        // six 4x4 BC3 faces, one 16-byte block each
        assert_eq!(image.uncompressed_size(), 96);

        let desc = describe(&image);
        assert!(desc.cubemap);
        assert_eq!(desc.array_size, 6);
        assert_eq!(desc.texture_type, TextureType::TextureCube);
    }

    #[test]
    fn test_dx10_volume() {
        let ext = Dx10 {
            dxgi_format: 28,
            resource_dimension: dx10::DIMENSION_TEXTURE3D,
            misc_flag: 0,
            array_size: 1,
        };
        let data: Vec<u8> = (0..(2 * 2 * 4 * 4)).map(|i| i as u8).collect();
        let bytes = make_dds(2, 2, 4, 1, caps2::VOLUME, b"DX10", Some(ext), &data);
        let image = load_image(&mut Cursor::new(bytes), &LoadOptions::default()).unwrap();

        let desc = describe(&image);
        assert_eq!(desc.depth, 4);
        assert_eq!(desc.dimension, 3);
        assert_eq!(desc.texture_type, TextureType::Texture3D);
        assert_eq!(desc.format, ResourceFormat::regular(CompType::UNorm, 4, 1));
    }

    #[test]
    fn test_truncated_data() {
        let bytes = make_dds(8, 8, 1, 1, 0, b"DXT1", None, &[0; 16]);
        let err = load_image(&mut Cursor::new(bytes), &LoadOptions::default()).unwrap_err();
        assert!(matches!(err, DecodeError::Truncated { expected: 32, available: 16 }));
    }

    #[test]
    fn test_mip_count_beyond_chain() {
        let bytes = make_dds(1, 1, 1, 40, 0, b"DXT1", None, &[0; 320]);
        let err = load_image(&mut Cursor::new(bytes), &LoadOptions::default()).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidStructure(_)));
    }

    #[test]
    fn test_oversized_dimensions() {
        // D3DFMT_A32B32G32R32F
        let bytes = make_dds(u32::MAX, u32::MAX, 1, 1, 0, &116u32.to_le_bytes(), None, &[0; 16]);
        let err = load_image(&mut Cursor::new(bytes), &LoadOptions::default()).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidStructure(_)));
    }

    #[test]
    fn test_partial_cubemap() {
        let bytes = make_dds(4, 4, 1, 1, caps2::CUBEMAP | caps2::CUBEMAP_POSITIVEZ, b"DXT1", None, &[0; 8]);
        let err = load_image(&mut Cursor::new(bytes), &LoadOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::Unsupported { reason: UnsupportedReason::PartialCubemap, .. }
        ));
    }

    #[test]
    fn test_legacy_bgra_masks() {
        let pf = [pf_flags::RGB | pf_flags::ALPHAPIXELS, 32, 0x00ff_0000, 0x0000_ff00, 0x0000_00ff, 0xff00_0000];
        let bytes = make_masked_dds(2, 1, pf, &[1, 2, 3, 4, 5, 6, 7, 8]);
        let image = load_image(&mut Cursor::new(bytes), &LoadOptions::default()).unwrap();

        let desc = describe(&image);
        assert!(desc.format.bgra_order);
        assert_eq!(desc.format.name(), "B8G8R8A8_UNORM");
        assert_eq!(desc.texture_type, TextureType::Texture1D);
    }

    #[test]
    fn test_unknown_dxgi_format() {
        let ext = Dx10 {
            dxgi_format: 130,
            resource_dimension: dx10::DIMENSION_TEXTURE2D,
            misc_flag: 0,
            array_size: 1,
        };
        let bytes = make_dds(4, 4, 1, 1, 0, b"DX10", Some(ext), &[0; 64]);
        let err = load_image(&mut Cursor::new(bytes), &LoadOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::Unsupported { reason: UnsupportedReason::PixelFormat, .. }
        ));
    }
}

mod exr_tests {
    use super::*;

    #[test]
    fn test_rejected_variants() {
        let cases = [
            (version_flags::MULTIPART, UnsupportedReason::MultipartExr),
            (version_flags::NON_IMAGE, UnsupportedReason::DeepExr),
            (version_flags::TILED, UnsupportedReason::TiledExr),
        ];

        for (flag, expected) in cases {
            let err = load_image(&mut Cursor::new(make_exr_stub(flag)), &LoadOptions::default()).unwrap_err();
            match err {
                DecodeError::Unsupported { reason, .. } => assert_eq!(reason, expected),
                other => panic!("expected {expected:?}, got {other:?}"),
            }
            let code = proxyview_core::Error::from(
                load_image(&mut Cursor::new(make_exr_stub(flag)), &LoadOptions::default()).unwrap_err(),
            )
            .code();
            assert_eq!(code, proxyview_core::ResultCode::ImageUnsupported);
        }
    }

    #[test]
    fn test_bad_header_is_library_error() {
        let err = load_image(&mut Cursor::new(make_exr_stub(0)), &LoadOptions::default()).unwrap_err();
        assert!(matches!(err, DecodeError::Library { library: "exr", .. }));
    }

    #[test]
    fn test_rgba_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gradient.exr");
        exr::prelude::write_rgba_file(&path, 4, 2, |x, y| {
            (x as f32 * 0.25, y as f32, 0.5_f32, 0.75_f32)
        })
        .unwrap();

        let mut file = std::fs::File::open(&path).unwrap();
        let image = load_image(&mut file, &LoadOptions::default()).unwrap();
        assert_eq!(image.kind, ImageContainerKind::Exr);

        let desc = describe(&image);
        assert_eq!((desc.width, desc.height), (4, 2));
        assert_eq!(desc.format, ResourceFormat::rgba32_float());

        let DecodedPixels::Rgba32F(rgba) = &image.pixels else {
            panic!("EXR should decode to float RGBA");
        };
        assert_eq!(rgba.len(), 4 * 2 * 4);
        // pixel (3, 1)
        let texel = &rgba[(4 + 3) * 4..(4 + 3) * 4 + 4];
        assert_eq!(texel, &[0.75, 1.0, 0.5, 0.75]);
    }
}

mod raster_tests {
    use super::*;

    #[test]
    fn test_hdr_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sky.hdr");
        let image = image::Rgb32FImage::from_fn(3, 2, |_, _| image::Rgb([2.0, 1.0, 0.5]));
        image::DynamicImage::ImageRgb32F(image).save(&path).unwrap();

        let mut file = std::fs::File::open(&path).unwrap();
        assert_eq!(classify(&mut file).unwrap(), ImageContainerKind::Hdr);

        let decoded = load_image(&mut file, &LoadOptions::default()).unwrap();
        let desc = describe(&decoded);
        assert_eq!((desc.width, desc.height), (3, 2));
        assert_eq!(desc.format, ResourceFormat::rgba32_float());

        let DecodedPixels::Rgba32F(rgba) = &decoded.pixels else {
            panic!("HDR should decode to float RGBA");
        };
        assert_eq!(rgba[3], 1.0);
        assert!((rgba[0] - 2.0).abs() < 0.05);
    }

    #[test]
    fn test_png_decodes_to_srgb_rgba8() {
        let image = load_image(&mut Cursor::new(encode_png(3, 5)), &LoadOptions::default()).unwrap();
        let desc = describe(&image);
        assert_eq!(desc.format, ResourceFormat::rgba8_srgb());
        assert_eq!(image.pixels.byte_len(), 3 * 5 * 4);

        let DecodedPixels::Rgba8(rgba) = &image.pixels else {
            panic!("raster should decode to RGBA8");
        };
        // pixel (2, 4)
        assert_eq!(&rgba[(4 * 3 + 2) * 4..(4 * 3 + 2) * 4 + 4], &[2, 4, 0x40, 0xff]);
    }

    #[test]
    fn test_dimension_limit_from_options() {
        let options = LoadOptions {
            max_dimension: 8,
            ..LoadOptions::default()
        };
        let err = load_image(&mut Cursor::new(encode_png(8, 2)), &options).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidDimensions { width: 8, height: 2 }));
    }

    #[test]
    fn test_unrecognized() {
        let err = load_image(&mut Cursor::new(b"plain text file".to_vec()), &LoadOptions::default()).unwrap_err();
        assert!(matches!(err, DecodeError::UnrecognizedFormat));
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_raster_dimensions_round_trip(width in 1u32..48, height in 1u32..48) {
        let image = load_image(&mut Cursor::new(encode_png(width, height)), &LoadOptions::default()).unwrap();
        let desc = describe(&image);

        prop_assert_eq!(desc.width, width);
        prop_assert_eq!(desc.height, height);
        prop_assert_eq!(desc.mips, 1);
        prop_assert_eq!(desc.array_size, 1);
        prop_assert!(!desc.cubemap);
    }

    #[test]
    fn prop_dds_sizes_sum(width in 4u32..64, height in 1u32..64, mips in 1u32..4) {
        let format = ResourceFormat::special(FormatType::Bc3, CompType::UNorm, 4);
        let total: usize = (0..mips)
            .map(|m| format.subresource_size((width >> m).max(1), (height >> m).max(1), 1).unwrap())
            .sum();
        let bytes = make_dds(width, height, 1, mips, 0, b"DXT5", None, &vec![0; total]);
        let image = load_image(&mut Cursor::new(bytes), &LoadOptions::default()).unwrap();

        prop_assert_eq!(image.uncompressed_size(), total as u64);
    }
}
