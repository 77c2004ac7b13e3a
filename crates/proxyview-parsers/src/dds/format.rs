//! DDS pixel format detection
//!
//! DX10 files carry a DXGI format number; legacy files describe their pixels
//! through a FourCC code or a set of channel bit masks. Both are mapped onto
//! [`ResourceFormat`].

use proxyview_core::{CompType, FormatType, ResourceFormat};

use super::header::{pf_flags, Dx10Header, PixelFormat};

const fn regular(comp_type: CompType, count: u8, width: u8) -> Option<ResourceFormat> {
    Some(ResourceFormat::regular(comp_type, count, width))
}

const fn special(format_type: FormatType, comp_type: CompType, count: u8) -> Option<ResourceFormat> {
    Some(ResourceFormat::special(format_type, comp_type, count))
}

/// Type of a DXGI "typed" group member, given its offset from the TYPELESS
/// entry. `order` lists the types in DXGI order after TYPELESS.
fn group(base: u32, value: u32, order: &[CompType]) -> CompType {
    match value.checked_sub(base) {
        Some(0) | None => CompType::Typeless,
        Some(offset) => order
            .get(offset as usize - 1)
            .copied()
            .unwrap_or(CompType::Typeless),
    }
}

/// Map a DXGI_FORMAT number to a resource format
pub fn from_dxgi(value: u32) -> Option<ResourceFormat> {
    use CompType::*;

    match value {
        1..=4 => regular(group(1, value, &[Float, UInt, SInt]), 4, 4),
        5..=8 => regular(group(5, value, &[Float, UInt, SInt]), 3, 4),
        9..=14 => regular(group(9, value, &[Float, UNorm, UInt, SNorm, SInt]), 4, 2),
        15..=18 => regular(group(15, value, &[Float, UInt, SInt]), 2, 4),
        19..=22 => special(FormatType::D32S8, Depth, 2),
        23..=25 => special(
            FormatType::R10G10B10A2,
            group(23, value, &[UNorm, UInt]),
            4,
        ),
        26 => special(FormatType::R11G11B10, Float, 3),
        27..=32 => regular(group(27, value, &[UNorm, UNormSrgb, UInt, SNorm, SInt]), 4, 1),
        33..=38 => regular(group(33, value, &[Float, UNorm, UInt, SNorm, SInt]), 2, 2),
        40 => regular(Depth, 1, 4),
        39 | 41..=43 => {
            let comp = match value {
                41 => Float,
                42 => UInt,
                43 => SInt,
                _ => Typeless,
            };
            regular(comp, 1, 4)
        }
        44..=47 => special(FormatType::D24S8, Depth, 2),
        48..=52 => regular(group(48, value, &[UNorm, UInt, SNorm, SInt]), 2, 1),
        55 => regular(Depth, 1, 2),
        53 | 54 | 56..=59 => {
            let comp = match value {
                54 => Float,
                56 => UNorm,
                57 => UInt,
                58 => SNorm,
                59 => SInt,
                _ => Typeless,
            };
            regular(comp, 1, 2)
        }
        60..=64 => regular(group(60, value, &[UNorm, UInt, SNorm, SInt]), 1, 1),
        65 => special(FormatType::A8, UNorm, 1),
        67 => special(FormatType::R9G9B9E5, Float, 3),
        70..=72 => special(FormatType::Bc1, group(70, value, &[UNorm, UNormSrgb]), 4),
        73..=75 => special(FormatType::Bc2, group(73, value, &[UNorm, UNormSrgb]), 4),
        76..=78 => special(FormatType::Bc3, group(76, value, &[UNorm, UNormSrgb]), 4),
        79..=81 => special(FormatType::Bc4, group(79, value, &[UNorm, SNorm]), 1),
        82..=84 => special(FormatType::Bc5, group(82, value, &[UNorm, SNorm]), 2),
        85 => Some(ResourceFormat::special(FormatType::R5G6B5, UNorm, 3).with_bgra()),
        86 => Some(ResourceFormat::special(FormatType::R5G5B5A1, UNorm, 4).with_bgra()),
        // BGRX variants keep four components; the padding byte reads as alpha
        87 | 88 => Some(ResourceFormat::regular(UNorm, 4, 1).with_bgra()),
        90 | 92 => Some(ResourceFormat::regular(Typeless, 4, 1).with_bgra()),
        91 | 93 => Some(ResourceFormat::regular(UNormSrgb, 4, 1).with_bgra()),
        94..=96 => special(FormatType::Bc6, group(94, value, &[Float, Float]), 3),
        97..=99 => special(FormatType::Bc7, group(97, value, &[UNorm, UNormSrgb]), 4),
        115 => Some(ResourceFormat::special(FormatType::R4G4B4A4, UNorm, 4).with_bgra()),
        _ => None,
    }
}

/// Map a FourCC code (text or D3DFMT number) to a resource format
pub fn from_fourcc(pf: &PixelFormat) -> Option<ResourceFormat> {
    use CompType::*;

    match &pf.fourcc {
        b"DXT1" => return special(FormatType::Bc1, UNorm, 4),
        b"DXT2" | b"DXT3" => return special(FormatType::Bc2, UNorm, 4),
        b"DXT4" | b"DXT5" => return special(FormatType::Bc3, UNorm, 4),
        b"ATI1" | b"BC4U" => return special(FormatType::Bc4, UNorm, 1),
        b"BC4S" => return special(FormatType::Bc4, SNorm, 1),
        b"ATI2" | b"BC5U" => return special(FormatType::Bc5, UNorm, 2),
        b"BC5S" => return special(FormatType::Bc5, SNorm, 2),
        _ => {}
    }

    match pf.fourcc_value() {
        // A16B16G16R16
        36 => regular(UNorm, 4, 2),
        // Q16W16V16U16
        110 => regular(SNorm, 4, 2),
        // R16F, G16R16F, A16B16G16R16F
        111 => regular(Float, 1, 2),
        112 => regular(Float, 2, 2),
        113 => regular(Float, 4, 2),
        // R32F, G32R32F, A32B32G32R32F
        114 => regular(Float, 1, 4),
        115 => regular(Float, 2, 4),
        116 => regular(Float, 4, 4),
        _ => None,
    }
}

/// Map channel bit masks to a resource format
pub fn from_masks(pf: &PixelFormat) -> Option<ResourceFormat> {
    use CompType::*;

    if pf.flags & pf_flags::RGB != 0 {
        return match pf.rgb_bit_count {
            32 => match pf.r_bit_mask {
                0x0000_00ff => regular(UNorm, 4, 1),
                0x00ff_0000 => Some(ResourceFormat::regular(UNorm, 4, 1).with_bgra()),
                0x0000_03ff => special(FormatType::R10G10B10A2, UNorm, 4),
                0x0000_ffff => regular(UNorm, 2, 2),
                _ => None,
            },
            16 => match pf.r_bit_mask {
                0xf800 => Some(ResourceFormat::special(FormatType::R5G6B5, UNorm, 3).with_bgra()),
                0x7c00 => Some(ResourceFormat::special(FormatType::R5G5B5A1, UNorm, 4).with_bgra()),
                0x0f00 => Some(ResourceFormat::special(FormatType::R4G4B4A4, UNorm, 4).with_bgra()),
                _ => None,
            },
            _ => None,
        };
    }

    if pf.flags & pf_flags::LUMINANCE != 0 {
        return match (pf.rgb_bit_count, pf.a_bit_mask != 0) {
            (8, false) => regular(UNorm, 1, 1),
            (16, true) => regular(UNorm, 2, 1),
            (16, false) => regular(UNorm, 1, 2),
            _ => None,
        };
    }

    if pf.flags & pf_flags::ALPHA != 0 && pf.rgb_bit_count == 8 {
        return special(FormatType::A8, UNorm, 1);
    }

    None
}

/// Detect the format from the pixel format block and optional DX10 header
pub fn detect(pf: &PixelFormat, dx10: Option<&Dx10Header>) -> Option<ResourceFormat> {
    if let Some(ext) = dx10 {
        return from_dxgi(ext.dxgi_format);
    }

    if pf.flags & pf_flags::FOURCC != 0 {
        from_fourcc(pf)
    } else {
        from_masks(pf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dxgi_common_formats() {
        assert_eq!(from_dxgi(2), Some(ResourceFormat::rgba32_float()));
        assert_eq!(from_dxgi(29), Some(ResourceFormat::rgba8_srgb()));
        assert_eq!(from_dxgi(28).map(|f| f.name()).as_deref(), Some("R8G8B8A8_UNORM"));
        assert_eq!(from_dxgi(87).map(|f| f.name()).as_deref(), Some("B8G8R8A8_UNORM"));
        assert_eq!(from_dxgi(91).map(|f| f.comp_type), Some(CompType::UNormSrgb));
        assert_eq!(from_dxgi(40).map(|f| f.comp_type), Some(CompType::Depth));
        assert_eq!(from_dxgi(55).map(|f| f.comp_byte_width), Some(2));
        assert_eq!(from_dxgi(0), None);
        assert_eq!(from_dxgi(200), None);
    }

    #[test]
    fn test_dxgi_block_formats() {
        let bc1 = from_dxgi(71).unwrap();
        assert_eq!(bc1.format_type, FormatType::Bc1);
        assert_eq!(bc1.comp_type, CompType::UNorm);
        assert_eq!(from_dxgi(72).unwrap().comp_type, CompType::UNormSrgb);
        assert_eq!(from_dxgi(81).unwrap().comp_type, CompType::SNorm);
        assert_eq!(from_dxgi(95).unwrap().format_type, FormatType::Bc6);
        assert_eq!(from_dxgi(98).unwrap().format_type, FormatType::Bc7);
        assert_eq!(from_dxgi(70).unwrap().comp_type, CompType::Typeless);
    }

    #[test]
    fn test_fourcc() {
        let mut pf = PixelFormat {
            flags: pf_flags::FOURCC,
            fourcc: *b"DXT5",
            ..Default::default()
        };
        assert_eq!(detect(&pf, None).unwrap().format_type, FormatType::Bc3);

        pf.fourcc = *b"BC5S";
        assert_eq!(detect(&pf, None).unwrap().comp_type, CompType::SNorm);

        pf.fourcc = 113u32.to_le_bytes();
        assert_eq!(detect(&pf, None), Some(ResourceFormat::regular(CompType::Float, 4, 2)));

        pf.fourcc = *b"YUY2";
        assert_eq!(detect(&pf, None), None);
    }

    #[test]
    fn test_masks() {
        let bgra = PixelFormat {
            flags: pf_flags::RGB | pf_flags::ALPHAPIXELS,
            rgb_bit_count: 32,
            r_bit_mask: 0x00ff_0000,
            g_bit_mask: 0x0000_ff00,
            b_bit_mask: 0x0000_00ff,
            a_bit_mask: 0xff00_0000,
            ..Default::default()
        };
        let format = detect(&bgra, None).unwrap();
        assert!(format.bgra_order);
        assert_eq!(format.comp_count, 4);

        let l8a8 = PixelFormat {
            flags: pf_flags::LUMINANCE | pf_flags::ALPHAPIXELS,
            rgb_bit_count: 16,
            r_bit_mask: 0xff,
            a_bit_mask: 0xff00,
            ..Default::default()
        };
        assert_eq!(detect(&l8a8, None), Some(ResourceFormat::regular(CompType::UNorm, 2, 1)));

        let a8 = PixelFormat {
            flags: pf_flags::ALPHA,
            rgb_bit_count: 8,
            a_bit_mask: 0xff,
            ..Default::default()
        };
        assert_eq!(detect(&a8, None).unwrap().format_type, FormatType::A8);
    }

    #[test]
    fn test_dx10_wins() {
        let pf = PixelFormat {
            flags: pf_flags::FOURCC,
            fourcc: *b"DX10",
            ..Default::default()
        };
        let ext = Dx10Header {
            dxgi_format: 10,
            ..Default::default()
        };
        assert_eq!(detect(&pf, Some(&ext)), Some(ResourceFormat::regular(CompType::Float, 4, 2)));
    }
}
