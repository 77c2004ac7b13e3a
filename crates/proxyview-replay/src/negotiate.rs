//! Proxy texture negotiation
//!
//! Decides how a decoded texture is represented on the backend and performs
//! the layout or pixel transform that choice implies. The fallback order is
//! fixed: native creation, then reinterpreting a block-compressed volume as a
//! 2D array, then converting every texel to float RGBA on the CPU.

use proxyview_core::{Error as ProxyError, ResourceFormat, ResourceId, Result, TextureDescription, TextureType};
use proxyview_parsers::{DecodedPixels, LoadOptions, SubresourceRange, SubresourceSet};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::backend::ProxyTextures;
use crate::convert::{can_convert, convert_to_rgba32f, RetainedPixels};

/// How a texture is represented on the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProxyStrategy {
    /// Created with the decoded description as-is
    Direct,
    /// Block-compressed volume recreated as a 2D array, bytes unchanged
    ArrayRemap,
    /// Every texel converted to RGBA32F before upload
    CpuConvert,
}

impl std::fmt::Display for ProxyStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ProxyStrategy::Direct => "direct",
            ProxyStrategy::ArrayRemap => "array remap",
            ProxyStrategy::CpuConvert => "CPU conversion",
        };
        f.write_str(name)
    }
}

/// Description of a volume reinterpreted as an array of its depth slices
pub fn volume_as_array_desc(desc: &TextureDescription) -> TextureDescription {
    TextureDescription {
        array_size: desc.depth,
        depth: 1,
        texture_type: TextureType::Texture2DArray,
        dimension: 2,
        ..desc.clone()
    }
}

/// Pick the representation for `desc` on `backend`
///
/// Flat decoder output (RGBA8 or RGBA32F) is expected to always be
/// displayable, so a refusal there is a backend failure rather than an
/// unsupported image.
pub fn choose_strategy<B: ProxyTextures + ?Sized>(
    backend: &B,
    desc: &TextureDescription,
    pixels: &DecodedPixels,
    options: &LoadOptions,
) -> Result<ProxyStrategy> {
    if backend.is_texture_supported(desc) {
        return Ok(ProxyStrategy::Direct);
    }

    if options.remap_block_volumes
        && desc.format.is_block_format()
        && desc.texture_type == TextureType::Texture3D
        && backend.is_texture_supported(&volume_as_array_desc(desc))
    {
        debug!(format = %desc.format, depth = desc.depth, "Remapping block-compressed volume to 2D array");
        return Ok(ProxyStrategy::ArrayRemap);
    }

    if !pixels.has_layout() {
        error!(
            format = %desc.format,
            "Standard format {} expected to be supported for local display but can't",
            desc.format
        );
        return Err(ProxyError::api_init(format!(
            "backend can't display {} images",
            desc.format
        )));
    }

    if !options.convert_unsupported_formats || !can_convert(&desc.format) {
        info!(format = %desc.format, "Format not supported locally and no conversion is available");
        return Err(ProxyError::unsupported(format!(
            "format {} is not supported locally and can't be converted",
            desc.format
        )));
    }

    debug!(format = %desc.format, "Converting to RGBA32F for local display");
    Ok(ProxyStrategy::CpuConvert)
}

/// Re-slice each mip of a volume into `depth` equal array layers
///
/// Only offsets and lengths change; the backing buffer is reused, so layer
/// `s` of mip `m` starts `s * (len(m) / depth)` bytes into the original mip.
pub fn remap_volume_to_array(
    desc: &TextureDescription,
    set: SubresourceSet,
) -> Result<(TextureDescription, SubresourceSet)> {
    let array_desc = volume_as_array_desc(desc);
    let layers = array_desc.array_size.max(1);
    let mips = desc.mips.max(1);

    if set.len() != mips as usize {
        return Err(ProxyError::invalid_parameter(format!(
            "volume remap expects {mips} subresources, found {}",
            set.len()
        )));
    }

    let (buffer, old, set_mips) = set.into_parts();
    let mut ranges = Vec::with_capacity(layers as usize * mips as usize);
    for index in 0..layers * mips {
        let mip = (index % mips) as usize;
        let slice = (index / mips) as usize;

        let size = old[mip].len / layers as usize;
        let offset = old[mip].offset + size * slice;
        ranges.push(SubresourceRange::new(offset, size));
    }

    let remapped = SubresourceSet::new(buffer, ranges, set_mips)?;
    Ok((array_desc, remapped))
}

/// Subresources ready to upload, and the description to create them with
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedUpload {
    /// Description the backend texture is created with
    pub desc: TextureDescription,
    pub subresources: SubresourceSet,
    /// Original bytes when the upload was converted
    pub retained: Option<RetainedPixels>,
}

/// Apply the transform `strategy` implies to freshly decoded pixels
pub fn prepare(strategy: ProxyStrategy, desc: &TextureDescription, pixels: DecodedPixels) -> Result<PreparedUpload> {
    let set = pixels.into_subresource_set();

    match strategy {
        ProxyStrategy::Direct => Ok(PreparedUpload {
            desc: desc.clone(),
            subresources: set,
            retained: None,
        }),
        ProxyStrategy::ArrayRemap => {
            let (desc, subresources) = remap_volume_to_array(desc, set)?;
            Ok(PreparedUpload {
                desc,
                subresources,
                retained: None,
            })
        }
        ProxyStrategy::CpuConvert => {
            let retained = RetainedPixels::capture(&set)?;
            let subresources = convert_to_rgba32f(desc, &set)?;
            drop(set);

            let desc = TextureDescription {
                format: ResourceFormat::rgba32_float(),
                ..desc.clone()
            };
            Ok(PreparedUpload {
                desc,
                subresources,
                retained: Some(retained),
            })
        }
    }
}

/// Upload every subresource of `set` in index order
pub fn upload_subresources<B: ProxyTextures + ?Sized>(
    backend: &mut B,
    handle: ResourceId,
    set: &SubresourceSet,
) -> Result<()> {
    for (sub, bytes) in set.iter() {
        backend.set_proxy_texture_data(handle, sub, bytes)?;
    }
    Ok(())
}

/// A texture created on the backend
#[derive(Debug, Clone, PartialEq)]
pub struct Materialized {
    pub handle: ResourceId,
    pub strategy: ProxyStrategy,
    /// Description the backend texture was created with
    pub backend_desc: TextureDescription,
    pub retained: Option<RetainedPixels>,
}

/// Create and fill a backend texture for `desc`
///
/// Nothing is left on the backend on failure: a texture whose upload fails
/// is destroyed before returning.
pub fn materialize<B: ProxyTextures + ?Sized>(
    desc: &TextureDescription,
    pixels: DecodedPixels,
    backend: &mut B,
    options: &LoadOptions,
) -> Result<Materialized> {
    let strategy = choose_strategy(backend, desc, &pixels, options)?;
    let prepared = prepare(strategy, desc, pixels)?;

    let handle = backend.create_proxy_texture(&prepared.desc).map_err(|e| {
        error!(format = %prepared.desc.format, error = %e, "Couldn't create proxy texture");
        match e.code() {
            proxyview_core::ResultCode::ApiInitFailed => e,
            _ => ProxyError::api_init(e.to_string()),
        }
    })?;

    if let Err(e) = upload_subresources(backend, handle, &prepared.subresources) {
        backend.destroy_proxy_texture(handle);
        return Err(e);
    }

    debug!(
        handle = %handle,
        strategy = %strategy,
        subresources = prepared.subresources.len(),
        "Materialized proxy texture"
    );

    Ok(Materialized {
        handle,
        strategy,
        backend_desc: prepared.desc,
        retained: prepared.retained,
    })
}
