//! In-memory reference backend
//!
//! Stores proxy textures as plain byte vectors and answers inspection queries
//! by decoding them on the CPU. The set of formats it accepts is controlled by
//! a [`SupportPolicy`], which is how the fallback chain gets exercised without
//! a GPU.

use std::collections::{HashMap, HashSet};

use proxyview_core::{
    CompType, Error as ProxyError, FormatType, ResourceFormat, ResourceId, Result, Subresource,
    TextureDescription, TextureType,
};
use tracing::{debug, trace};

use crate::backend::{
    ApiProperties, FloatVector, GetTextureDataParams, GraphicsApi, OutputWindows, ProxyTextures,
    RemapTexture, ReplayBackend, TextureDisplay, TextureInspection, WindowingData,
};
use crate::convert::{can_convert, decode_subresource};

/// Number of buckets returned by histogram queries
pub const HISTOGRAM_BUCKETS: usize = 256;

/// Which texture descriptions the backend accepts
#[derive(Debug, Clone)]
pub struct SupportPolicy {
    /// Exact formats the backend refuses
    pub denied_formats: HashSet<ResourceFormat>,
    /// Format families the backend refuses, e.g. every BC7 variant
    pub denied_format_types: HashSet<FormatType>,
    /// Upper-case format names (or name prefixes such as `BC1`) the backend refuses
    pub denied_names: HashSet<String>,
    /// Refuse 3D textures in block-compressed formats
    pub reject_block_volumes: bool,
    /// Fail every creation call even for supported descriptions
    pub refuse_creation: bool,
}

impl Default for SupportPolicy {
    fn default() -> Self {
        Self {
            denied_formats: HashSet::new(),
            denied_format_types: HashSet::new(),
            denied_names: HashSet::new(),
            reject_block_volumes: true,
            refuse_creation: false,
        }
    }
}

impl SupportPolicy {
    pub fn deny_format(mut self, format: ResourceFormat) -> Self {
        self.denied_formats.insert(format);
        self
    }

    pub fn deny_format_type(mut self, format_type: FormatType) -> Self {
        self.denied_format_types.insert(format_type);
        self
    }

    /// Deny formats by name, matching either the full name (`BC1_UNORM`) or
    /// its leading part (`BC1`)
    pub fn deny_named(mut self, name: &str) -> Self {
        self.denied_names.insert(name.trim().to_ascii_uppercase());
        self
    }

    pub fn allow_block_volumes(mut self) -> Self {
        self.reject_block_volumes = false;
        self
    }

    pub fn refusing_creation(mut self) -> Self {
        self.refuse_creation = true;
        self
    }

    /// Whether `desc` can be created under this policy
    pub fn accepts(&self, desc: &TextureDescription) -> bool {
        let format = &desc.format;
        if self.denied_formats.contains(format) || self.denied_format_types.contains(&format.format_type) {
            return false;
        }

        if !self.denied_names.is_empty() {
            let name = format.name();
            let denied = self
                .denied_names
                .iter()
                .any(|n| name == *n || name.starts_with(&format!("{n}_")));
            if denied {
                return false;
            }
        }

        !(self.reject_block_volumes && format.is_block_format() && desc.texture_type == TextureType::Texture3D)
    }
}

/// Counts of backend calls, used to observe reuse versus recreation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackendStats {
    pub created: u32,
    pub destroyed: u32,
    pub uploads: u32,
}

#[derive(Debug)]
struct StoredTexture {
    desc: TextureDescription,
    subresources: Vec<Vec<u8>>,
}

impl StoredTexture {
    fn data(&self, sub: Subresource) -> Option<&[u8]> {
        if sub.mip >= self.desc.mips.max(1) {
            return None;
        }
        self.subresources.get(sub.index(self.desc.mips)).map(Vec::as_slice)
    }

    /// Decode a subresource to float RGBA
    fn decode(&self, sub: Subresource) -> Result<(u32, u32, Vec<f32>)> {
        let data = self
            .data(sub)
            .ok_or_else(|| ProxyError::invalid_parameter(format!("no subresource {sub:?}")))?;
        let (w, h, d) = self.desc.mip_dimensions(sub.mip);
        let texels = decode_subresource(&self.desc.format, (w, h, d), data)?;
        Ok((w, h, texels))
    }
}

#[derive(Debug, Clone)]
struct OutputWindow {
    width: i32,
    height: i32,
    depth: bool,
    clear_colour: FloatVector,
    flips: u32,
}

/// CPU implementation of the backend contract
#[derive(Debug)]
pub struct MemoryBackend {
    policy: SupportPolicy,
    renderer: GraphicsApi,
    textures: HashMap<ResourceId, StoredTexture>,
    shaders: HashMap<ResourceId, String>,
    /// Texture produced by the most recent custom shader pass
    custom_texture: Option<ResourceId>,
    windows: HashMap<u64, OutputWindow>,
    next_window: u64,
    bound_window: Option<u64>,
    stats: BackendStats,
    last_pick: Option<(ResourceId, u32, u32, Subresource)>,
    last_display: Option<TextureDisplay>,
    fatal: Option<ProxyError>,
    shut_down: bool,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new(SupportPolicy::default())
    }
}

impl MemoryBackend {
    pub fn new(policy: SupportPolicy) -> Self {
        Self {
            policy,
            renderer: GraphicsApi::D3D11,
            textures: HashMap::new(),
            shaders: HashMap::new(),
            custom_texture: None,
            windows: HashMap::new(),
            next_window: 1,
            bound_window: None,
            stats: BackendStats::default(),
            last_pick: None,
            last_display: None,
            fatal: None,
            shut_down: false,
        }
    }

    /// Report `api` as the local renderer
    pub fn with_renderer(mut self, api: GraphicsApi) -> Self {
        self.renderer = api;
        self
    }

    pub fn policy(&self) -> &SupportPolicy {
        &self.policy
    }

    pub fn policy_mut(&mut self) -> &mut SupportPolicy {
        &mut self.policy
    }

    pub fn stats(&self) -> BackendStats {
        self.stats
    }

    /// Description a live texture was created with
    pub fn texture(&self, id: ResourceId) -> Option<&TextureDescription> {
        self.textures.get(&id).map(|t| &t.desc)
    }

    /// Bytes last uploaded to a subresource
    pub fn subresource_data(&self, id: ResourceId, sub: Subresource) -> Option<&[u8]> {
        self.textures.get(&id)?.data(sub)
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    /// Most recent (texture, x, y, subresource) passed to `pick_pixel`
    pub fn last_pick(&self) -> Option<(ResourceId, u32, u32, Subresource)> {
        self.last_pick
    }

    pub fn last_display(&self) -> Option<&TextureDisplay> {
        self.last_display.as_ref()
    }

    pub fn window_flips(&self, id: u64) -> Option<u32> {
        self.windows.get(&id).map(|w| w.flips)
    }

    pub fn window_clear_colour(&self, id: u64) -> Option<FloatVector> {
        self.windows.get(&id).map(|w| w.clear_colour)
    }

    /// Mark the backend as having hit an unrecoverable error
    pub fn set_fatal_error(&mut self, err: ProxyError) {
        self.fatal = Some(err);
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    fn stored(&self, id: ResourceId) -> Result<&StoredTexture> {
        self.textures
            .get(&id)
            .ok_or_else(|| ProxyError::invalid_parameter(format!("unknown texture {id}")))
    }
}

impl ProxyTextures for MemoryBackend {
    fn is_texture_supported(&self, desc: &TextureDescription) -> bool {
        self.policy.accepts(desc)
    }

    fn create_proxy_texture(&mut self, desc: &TextureDescription) -> Result<ResourceId> {
        if self.policy.refuse_creation {
            return Err(ProxyError::api_init(format!("texture creation refused for {}", desc.format)));
        }
        if !self.policy.accepts(desc) {
            return Err(ProxyError::api_init(format!(
                "unsupported {:?} texture in {}",
                desc.texture_type, desc.format
            )));
        }

        let id = ResourceId::next();
        let mut stored_desc = desc.clone();
        stored_desc.resource_id = id;
        let subresources = vec![Vec::new(); desc.subresource_count()];

        debug!(
            id = %id,
            format = %desc.format,
            width = desc.width,
            height = desc.height,
            depth = desc.depth,
            array_size = desc.array_size,
            mips = desc.mips,
            "Created proxy texture"
        );

        self.textures.insert(id, StoredTexture { desc: stored_desc, subresources });
        self.stats.created += 1;
        Ok(id)
    }

    fn set_proxy_texture_data(&mut self, id: ResourceId, sub: Subresource, data: &[u8]) -> Result<()> {
        let texture = self
            .textures
            .get_mut(&id)
            .ok_or_else(|| ProxyError::invalid_parameter(format!("upload to unknown texture {id}")))?;

        let mips = texture.desc.mips.max(1);
        if sub.mip >= mips {
            return Err(ProxyError::invalid_parameter(format!(
                "mip {} out of range for {} mips",
                sub.mip, mips
            )));
        }
        let slot = texture
            .subresources
            .get_mut(sub.index(mips))
            .ok_or_else(|| ProxyError::invalid_parameter(format!("slice {} out of range", sub.slice)))?;

        slot.clear();
        slot.extend_from_slice(data);
        self.stats.uploads += 1;
        trace!(id = %id, mip = sub.mip, slice = sub.slice, bytes = data.len(), "Uploaded subresource");
        Ok(())
    }

    fn destroy_proxy_texture(&mut self, id: ResourceId) {
        if self.textures.remove(&id).is_some() {
            self.stats.destroyed += 1;
            debug!(id = %id, "Destroyed proxy texture");
        }
        if self.custom_texture == Some(id) {
            self.custom_texture = None;
        }
    }
}

impl OutputWindows for MemoryBackend {
    fn make_output_window(&mut self, window: WindowingData, depth: bool) -> u64 {
        let (width, height) = match window {
            WindowingData::Headless { width, height } => (width, height),
            WindowingData::Native { .. } => (0, 0),
        };
        let id = self.next_window;
        self.next_window += 1;
        self.windows.insert(
            id,
            OutputWindow {
                width,
                height,
                depth,
                clear_colour: FloatVector::default(),
                flips: 0,
            },
        );
        id
    }

    fn destroy_output_window(&mut self, id: u64) {
        self.windows.remove(&id);
        if self.bound_window == Some(id) {
            self.bound_window = None;
        }
    }

    fn check_resize_output_window(&mut self, _id: u64) -> bool {
        false
    }

    fn get_output_window_dimensions(&self, id: u64) -> (i32, i32) {
        self.windows.get(&id).map_or((0, 0), |w| (w.width, w.height))
    }

    fn bind_output_window(&mut self, id: u64, depth: bool) {
        if let Some(window) = self.windows.get_mut(&id) {
            window.depth = depth;
            self.bound_window = Some(id);
        }
    }

    fn clear_output_window_colour(&mut self, id: u64, colour: FloatVector) {
        if let Some(window) = self.windows.get_mut(&id) {
            window.clear_colour = colour;
        }
    }

    fn flip_output_window(&mut self, id: u64) {
        if let Some(window) = self.windows.get_mut(&id) {
            window.flips += 1;
        }
    }

    fn is_output_window_visible(&self, id: u64) -> bool {
        self.windows.contains_key(&id)
    }

    fn render_texture(&mut self, display: TextureDisplay) -> bool {
        if self.bound_window.is_none() || !self.textures.contains_key(&display.resource_id) {
            return false;
        }
        self.last_display = Some(display);
        true
    }
}

impl TextureInspection for MemoryBackend {
    fn get_texture_data(
        &mut self,
        id: ResourceId,
        sub: Subresource,
        params: &GetTextureDataParams,
    ) -> Result<Vec<u8>> {
        let texture = self.stored(id)?;

        if params.remap == RemapTexture::NoRemap {
            return texture
                .data(sub)
                .map(<[u8]>::to_vec)
                .ok_or_else(|| ProxyError::invalid_parameter(format!("no subresource {sub:?}")));
        }

        if !can_convert(&texture.desc.format) {
            return Err(ProxyError::unsupported(format!(
                "cannot remap {} for read-back",
                texture.desc.format
            )));
        }

        let (_, _, mut texels) = texture.decode(sub)?;
        let range = params.white_point - params.black_point;
        if range != 0.0 && (params.black_point != 0.0 || params.white_point != 1.0) {
            for v in &mut texels {
                *v = (*v - params.black_point) / range;
            }
        }

        Ok(match params.remap {
            RemapTexture::Rgba8 => texels
                .iter()
                .map(|v| (v.clamp(0.0, 1.0) * 255.0).round() as u8)
                .collect(),
            _ => bytemuck::cast_slice(&texels).to_vec(),
        })
    }

    fn pick_pixel(
        &mut self,
        id: ResourceId,
        x: u32,
        y: u32,
        sub: Subresource,
        _type_cast: Option<CompType>,
    ) -> FloatVector {
        self.last_pick = Some((id, x, y, sub));

        let Ok((width, height, texels)) = self.stored(id).and_then(|t| t.decode(sub)) else {
            return FloatVector::default();
        };
        if x >= width || y >= height {
            return FloatVector::default();
        }

        let at = (y as usize * width as usize + x as usize) * 4;
        texels
            .get(at..at + 4)
            .map_or(FloatVector::default(), |t| FloatVector::new(t[0], t[1], t[2], t[3]))
    }

    fn get_min_max(
        &mut self,
        id: ResourceId,
        sub: Subresource,
        _type_cast: Option<CompType>,
    ) -> Option<(FloatVector, FloatVector)> {
        let (_, _, texels) = self.stored(id).and_then(|t| t.decode(sub)).ok()?;

        let mut min = [f32::MAX; 4];
        let mut max = [f32::MIN; 4];
        for texel in texels.chunks_exact(4) {
            for c in 0..4 {
                min[c] = min[c].min(texel[c]);
                max[c] = max[c].max(texel[c]);
            }
        }

        if texels.is_empty() {
            return None;
        }
        Some((FloatVector::from_array(min), FloatVector::from_array(max)))
    }

    fn get_histogram(
        &mut self,
        id: ResourceId,
        sub: Subresource,
        _type_cast: Option<CompType>,
        min: f32,
        max: f32,
        channels: [bool; 4],
    ) -> Option<Vec<u32>> {
        if max <= min {
            return None;
        }
        let (_, _, texels) = self.stored(id).and_then(|t| t.decode(sub)).ok()?;

        let mut buckets = vec![0u32; HISTOGRAM_BUCKETS];
        let scale = HISTOGRAM_BUCKETS as f32 / (max - min);
        for texel in texels.chunks_exact(4) {
            for (value, _) in texel.iter().zip(channels).filter(|(_, on)| *on) {
                if *value < min || *value > max {
                    continue;
                }
                let bucket = (((value - min) * scale) as usize).min(HISTOGRAM_BUCKETS - 1);
                buckets[bucket] += 1;
            }
        }
        Some(buckets)
    }

    fn build_custom_shader(&mut self, source: &str, entry_point: &str) -> Result<ResourceId> {
        if source.trim().is_empty() || entry_point.is_empty() {
            return Err(ProxyError::invalid_parameter("empty shader source or entry point"));
        }
        let id = ResourceId::next();
        self.shaders.insert(id, source.to_string());
        debug!(id = %id, entry_point, "Built custom shader");
        Ok(id)
    }

    fn free_custom_shader(&mut self, id: ResourceId) {
        self.shaders.remove(&id);
    }

    fn apply_custom_shader(
        &mut self,
        shader: ResourceId,
        texture: ResourceId,
        sub: Subresource,
        _type_cast: Option<CompType>,
    ) -> Result<ResourceId> {
        if !self.shaders.contains_key(&shader) {
            return Err(ProxyError::invalid_parameter(format!("unknown shader {shader}")));
        }

        // The shader pass is modelled as a copy of the selected subresource
        let source = self.stored(texture)?;
        let (width, height, _) = source.desc.mip_dimensions(sub.mip);
        let data = source
            .data(sub)
            .map(<[u8]>::to_vec)
            .ok_or_else(|| ProxyError::invalid_parameter(format!("no subresource {sub:?}")))?;

        let id = ResourceId::next();
        let mut desc = TextureDescription {
            resource_id: id,
            width,
            height,
            format: source.desc.format,
            ..TextureDescription::default()
        };
        desc.refresh_type();

        if let Some(previous) = self.custom_texture.take() {
            self.textures.remove(&previous);
        }
        self.textures.insert(id, StoredTexture { desc, subresources: vec![data] });
        self.custom_texture = Some(id);
        Ok(id)
    }
}

impl ReplayBackend for MemoryBackend {
    fn api_properties(&self) -> ApiProperties {
        ApiProperties {
            pipeline_type: self.renderer,
            local_renderer: self.renderer,
            degraded: false,
        }
    }

    fn fatal_error_check(&self) -> Option<ProxyError> {
        self.fatal.clone()
    }

    fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        debug!(textures = self.textures.len(), windows = self.windows.len(), "Shutting down memory backend");
        self.textures.clear();
        self.shaders.clear();
        self.windows.clear();
        self.custom_texture = None;
        self.bound_window = None;
        self.shut_down = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rgba8_desc(width: u32, height: u32) -> TextureDescription {
        let mut desc = TextureDescription {
            width,
            height,
            format: ResourceFormat::regular(CompType::UNorm, 4, 1),
            ..TextureDescription::default()
        };
        desc.refresh_type();
        desc
    }

    #[test]
    fn test_policy_names() {
        let policy = SupportPolicy::default().deny_named("bc1");
        let mut desc = rgba8_desc(4, 4);
        desc.format = ResourceFormat::special(FormatType::Bc1, CompType::UNorm, 4);
        assert!(!policy.accepts(&desc));

        desc.format = ResourceFormat::special(FormatType::Bc3, CompType::UNorm, 4);
        assert!(policy.accepts(&desc));
    }

    #[test]
    fn test_block_volumes_rejected_by_default() {
        let mut desc = rgba8_desc(8, 8);
        desc.depth = 4;
        desc.format = ResourceFormat::special(FormatType::Bc1, CompType::UNorm, 4);
        desc.refresh_type();

        assert!(!SupportPolicy::default().accepts(&desc));
        assert!(SupportPolicy::default().allow_block_volumes().accepts(&desc));
    }

    #[test]
    fn test_create_upload_destroy() {
        let mut backend = MemoryBackend::default();
        let id = backend.create_proxy_texture(&rgba8_desc(2, 1)).unwrap();
        backend
            .set_proxy_texture_data(id, Subresource::default(), &[255, 0, 0, 255, 0, 255, 0, 255])
            .unwrap();

        let pick = backend.pick_pixel(id, 1, 0, Subresource::default(), None);
        assert_eq!(pick, FloatVector::new(0.0, 1.0, 0.0, 1.0));

        let (min, max) = backend.get_min_max(id, Subresource::default(), None).unwrap();
        assert_eq!(min, FloatVector::new(0.0, 0.0, 0.0, 1.0));
        assert_eq!(max, FloatVector::new(1.0, 1.0, 0.0, 1.0));

        backend.destroy_proxy_texture(id);
        backend.destroy_proxy_texture(id);
        assert_eq!(
            backend.stats(),
            BackendStats { created: 1, destroyed: 1, uploads: 1 }
        );
    }

    #[test]
    fn test_upload_out_of_range() {
        let mut backend = MemoryBackend::default();
        let id = backend.create_proxy_texture(&rgba8_desc(2, 2)).unwrap();
        let err = backend
            .set_proxy_texture_data(id, Subresource::new(1, 0), &[0; 4])
            .unwrap_err();
        assert_eq!(err.code(), proxyview_core::ResultCode::InvalidParameter);
    }

    #[test]
    fn test_refuse_creation() {
        let mut backend = MemoryBackend::new(SupportPolicy::default().refusing_creation());
        let err = backend.create_proxy_texture(&rgba8_desc(1, 1)).unwrap_err();
        assert_eq!(err.code(), proxyview_core::ResultCode::ApiInitFailed);
    }

    #[test]
    fn test_remapped_read_back() {
        let mut backend = MemoryBackend::default();
        let id = backend.create_proxy_texture(&rgba8_desc(1, 1)).unwrap();
        backend
            .set_proxy_texture_data(id, Subresource::default(), &[51, 102, 0, 255])
            .unwrap();

        let float = backend
            .get_texture_data(id, Subresource::default(), &GetTextureDataParams::remapped(RemapTexture::Rgba32))
            .unwrap();
        let texel: &[f32] = bytemuck::cast_slice(&float);
        assert_eq!(texel, &[0.2, 0.4, 0.0, 1.0]);

        let bytes = backend
            .get_texture_data(id, Subresource::default(), &GetTextureDataParams::remapped(RemapTexture::Rgba8))
            .unwrap();
        assert_eq!(bytes, vec![51, 102, 0, 255]);
    }

    #[test]
    fn test_histogram_counts_enabled_channels() {
        let mut backend = MemoryBackend::default();
        let id = backend.create_proxy_texture(&rgba8_desc(2, 1)).unwrap();
        backend
            .set_proxy_texture_data(id, Subresource::default(), &[0, 0, 0, 255, 255, 0, 0, 255])
            .unwrap();

        let histogram = backend
            .get_histogram(id, Subresource::default(), None, 0.0, 1.0, [true, false, false, false])
            .unwrap();
        assert_eq!(histogram.len(), HISTOGRAM_BUCKETS);
        assert_eq!(histogram[0], 1);
        assert_eq!(histogram[HISTOGRAM_BUCKETS - 1], 1);
        assert_eq!(histogram.iter().sum::<u32>(), 2);
    }

    #[test]
    fn test_custom_shader_copy_replaces_previous() {
        let mut backend = MemoryBackend::default();
        let id = backend.create_proxy_texture(&rgba8_desc(1, 1)).unwrap();
        backend.set_proxy_texture_data(id, Subresource::default(), &[1, 2, 3, 4]).unwrap();

        let shader = backend.build_custom_shader("float4 main() : SV_Target0", "main").unwrap();
        let first = backend.apply_custom_shader(shader, id, Subresource::default(), None).unwrap();
        let second = backend.apply_custom_shader(shader, id, Subresource::default(), None).unwrap();

        assert!(backend.texture(first).is_none());
        assert_eq!(backend.subresource_data(second, Subresource::default()), Some(&[1u8, 2, 3, 4][..]));
        assert!(backend.build_custom_shader("  ", "main").is_err());
    }

    #[test]
    fn test_render_needs_bound_window() {
        let mut backend = MemoryBackend::default();
        let id = backend.create_proxy_texture(&rgba8_desc(1, 1)).unwrap();
        let display = TextureDisplay { resource_id: id, ..TextureDisplay::default() };

        assert!(!backend.render_texture(display));

        let window = backend.make_output_window(WindowingData::Headless { width: 64, height: 32 }, false);
        backend.bind_output_window(window, false);
        assert!(backend.render_texture(display));
        assert_eq!(backend.get_output_window_dimensions(window), (64, 32));

        backend.flip_output_window(window);
        assert_eq!(backend.window_flips(window), Some(1));
    }

    #[test]
    fn test_shutdown_releases_everything() {
        let mut backend = MemoryBackend::default();
        backend.create_proxy_texture(&rgba8_desc(1, 1)).unwrap();
        backend.shutdown();
        assert!(backend.is_shut_down());
        assert_eq!(backend.live_textures(), 0);
    }
}
