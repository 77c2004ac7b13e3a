//! Image viewer façade
//!
//! Presents a single image file as a one-resource, one-frame capture. Callers
//! address the image through a stable identity; the façade maps it to
//! whatever backend texture currently holds the pixels.

use std::path::Path;

use proxyview_core::{
    CompType, Error as ProxyError, ResourceFormat, ResourceId, Result, Subresource, TextureDescription,
};
use proxyview_parsers::{log_load_error, LoadOptions};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::backend::{
    ApiProperties, FloatVector, GetTextureDataParams, GraphicsApi, RemapTexture, ReplayBackend, TextureDisplay,
    WindowingData,
};
use crate::loader::{ImageLoader, RefreshOutcome};
use crate::negotiate::ProxyStrategy;

/// Maps caller-supplied identities onto backend handles
///
/// The derived identity (the output of a custom shader pass) passes through
/// unchanged. Every other identity, known or not, resolves to the primary
/// handle, so callers holding a stale identity still reach the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandleTable {
    /// Identity handed to callers; never changes
    pub external: ResourceId,
    /// Backend texture holding the image
    pub primary: ResourceId,
    /// Backend texture produced by the last custom shader pass
    pub derived: ResourceId,
}

impl HandleTable {
    pub fn new(external: ResourceId) -> Self {
        Self {
            external,
            primary: ResourceId::NULL,
            derived: ResourceId::NULL,
        }
    }

    pub fn resolve(&self, id: ResourceId) -> ResourceId {
        if !self.derived.is_null() && id == self.derived {
            return id;
        }
        if id != self.external && id != self.primary {
            warn!(requested = %id, primary = %self.primary, "Unknown resource, using the image texture");
        }
        self.primary
    }
}

/// Entry in the resource list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDescription {
    pub resource_id: ResourceId,
    pub name: String,
    pub autogenerated_name: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionDescription {
    pub action_id: u32,
    pub event_id: u32,
    pub name: String,
}

/// The synthetic frame an image file is presented as
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameRecord {
    pub frame_number: u32,
    pub file_offset: u64,
    pub uncompressed_file_size: u64,
    pub compressed_file_size: u64,
    pub actions: Vec<ActionDescription>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputTarget {
    pub resource_id: ResourceId,
    pub view_format: ResourceFormat,
}

/// Pipeline state: the image bound as the only output target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineState {
    pub output_targets: Vec<OutputTarget>,
}

/// Single-image replay façade over a rendering backend
pub struct ImageViewer<B: ReplayBackend> {
    backend: B,
    loader: ImageLoader,
    handles: HandleTable,
    name: String,
    /// Sticky error from the last failed refresh
    error: Option<ProxyError>,
}

impl<B: ReplayBackend> ImageViewer<B> {
    /// Load `path` onto `backend`
    ///
    /// The file is decoded once up front; a file that can't be loaded is
    /// rejected before any backend texture is created.
    pub fn open(path: impl AsRef<Path>, options: LoadOptions, backend: B) -> Result<Self> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(ProxyError::invalid_parameter("empty image path"));
        }

        if let Err(e) = ImageLoader::probe(path, &options) {
            log_load_error!(path, e);
            return Err(e);
        }

        let name = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());

        let mut viewer = Self {
            backend,
            loader: ImageLoader::new(path, options),
            handles: HandleTable::new(ResourceId::next()),
            name,
            error: None,
        };

        viewer.loader.refresh(&mut viewer.backend)?;
        viewer.sync_handles();
        Ok(viewer)
    }

    fn sync_handles(&mut self) {
        if let Some(handle) = self.loader.handle() {
            self.handles.primary = handle;
        }
    }

    /// Re-run the load cycle after the file changed on disk
    ///
    /// A failure is kept for [`Self::fatal_error_check`] and the last good
    /// image stays displayed. A success clears any earlier failure.
    pub fn file_changed(&mut self) -> Option<RefreshOutcome> {
        match self.loader.refresh(&mut self.backend) {
            Ok(outcome) => {
                self.sync_handles();
                self.error = None;
                Some(outcome)
            }
            Err(e) => {
                warn!(file = %self.name, error = %e, "Refresh failed, keeping the previous image");
                self.error = Some(e);
                None
            }
        }
    }

    /// Stable identity of the image resource
    pub fn resource_id(&self) -> ResourceId {
        self.handles.external
    }

    pub fn handles(&self) -> &HandleTable {
        &self.handles
    }

    /// Map a caller identity to the backend texture it addresses
    pub fn resolve(&self, id: ResourceId) -> ResourceId {
        self.handles.resolve(id)
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn loader(&self) -> &ImageLoader {
        &self.loader
    }

    /// How the current image is represented on the backend
    pub fn strategy(&self) -> Option<ProxyStrategy> {
        self.loader.current().map(|c| c.strategy)
    }

    pub fn get_resources(&self) -> Vec<ResourceDescription> {
        vec![ResourceDescription {
            resource_id: self.handles.external,
            name: self.name.clone(),
            autogenerated_name: false,
        }]
    }

    /// Description of the image, addressed by the stable identity
    pub fn get_texture(&self) -> TextureDescription {
        let mut desc = self
            .loader
            .current()
            .map(|c| c.desc.clone())
            .unwrap_or_default();
        desc.resource_id = self.handles.external;
        desc
    }

    pub fn get_textures(&self) -> Vec<TextureDescription> {
        vec![self.get_texture()]
    }

    pub fn frame_record(&self) -> FrameRecord {
        let size = self.loader.current().map_or(0, |c| c.uncompressed_size);
        FrameRecord {
            frame_number: 1,
            file_offset: 0,
            uncompressed_file_size: size,
            compressed_file_size: size,
            actions: vec![ActionDescription {
                action_id: 1,
                event_id: 1,
                name: self.name.clone(),
            }],
        }
    }

    pub fn pipeline_state(&self) -> PipelineState {
        PipelineState {
            output_targets: vec![OutputTarget {
                resource_id: self.handles.external,
                view_format: self.get_texture().format,
            }],
        }
    }

    /// Backend properties, presented as a D3D11-style pipeline
    pub fn api_properties(&self) -> ApiProperties {
        ApiProperties {
            pipeline_type: GraphicsApi::D3D11,
            degraded: false,
            ..self.backend.api_properties()
        }
    }

    fn bottom_up(&self) -> bool {
        self.backend.api_properties().local_renderer.is_bottom_up()
    }

    /// Texel value at (`x`, `y`), with `y` counted from the top row
    pub fn pick_pixel(&mut self, id: ResourceId, x: u32, y: u32, sub: Subresource, type_cast: Option<CompType>) -> FloatVector {
        let texture = self.resolve(id);
        let y = if self.bottom_up() {
            let (_, height, _) = self.get_texture().mip_dimensions(sub.mip);
            height.saturating_sub(1).saturating_sub(y)
        } else {
            y
        };
        self.backend.pick_pixel(texture, x, y, sub, type_cast)
    }

    pub fn get_min_max(
        &mut self,
        id: ResourceId,
        sub: Subresource,
        type_cast: Option<CompType>,
    ) -> Option<(FloatVector, FloatVector)> {
        let texture = self.resolve(id);
        self.backend.get_min_max(texture, sub, type_cast)
    }

    pub fn get_histogram(
        &mut self,
        id: ResourceId,
        sub: Subresource,
        type_cast: Option<CompType>,
        min: f32,
        max: f32,
        channels: [bool; 4],
    ) -> Option<Vec<u32>> {
        let texture = self.resolve(id);
        self.backend.get_histogram(texture, sub, type_cast, min, max, channels)
    }

    pub fn render_texture(&mut self, mut display: TextureDisplay) -> bool {
        display.resource_id = self.resolve(display.resource_id);
        if self.bottom_up() {
            display.flip_y = !display.flip_y;
        }
        self.backend.render_texture(display)
    }

    /// Read back a subresource
    ///
    /// Unremapped reads of a converted image return the original bytes
    /// rather than the converted upload.
    pub fn get_texture_data(&mut self, id: ResourceId, sub: Subresource, params: &GetTextureDataParams) -> Result<Vec<u8>> {
        let texture = self.resolve(id);

        if texture == self.handles.primary && params.remap == RemapTexture::NoRemap {
            if let Some(current) = self.loader.current() {
                let retained = current
                    .retained
                    .as_ref()
                    .and_then(|r| r.get(sub.index(current.desc.mips)));
                if let Some(bytes) = retained {
                    debug!(mip = sub.mip, slice = sub.slice, "Serving retained pixels");
                    return Ok(bytes.to_vec());
                }
            }
        }

        self.backend.get_texture_data(texture, sub, params)
    }

    pub fn build_custom_shader(&mut self, source: &str, entry_point: &str) -> Result<ResourceId> {
        self.backend.build_custom_shader(source, entry_point)
    }

    pub fn free_custom_shader(&mut self, id: ResourceId) {
        self.backend.free_custom_shader(id);
    }

    /// Run a display shader over the image; the result becomes the derived identity
    pub fn apply_custom_shader(
        &mut self,
        shader: ResourceId,
        id: ResourceId,
        sub: Subresource,
        type_cast: Option<CompType>,
    ) -> Result<ResourceId> {
        let texture = self.resolve(id);
        let derived = self.backend.apply_custom_shader(shader, texture, sub, type_cast)?;
        self.handles.derived = derived;
        Ok(derived)
    }

    pub fn make_output_window(&mut self, window: WindowingData, depth: bool) -> u64 {
        self.backend.make_output_window(window, depth)
    }

    pub fn destroy_output_window(&mut self, id: u64) {
        self.backend.destroy_output_window(id);
    }

    pub fn check_resize_output_window(&mut self, id: u64) -> bool {
        self.backend.check_resize_output_window(id)
    }

    pub fn get_output_window_dimensions(&self, id: u64) -> (i32, i32) {
        self.backend.get_output_window_dimensions(id)
    }

    pub fn bind_output_window(&mut self, id: u64, depth: bool) {
        self.backend.bind_output_window(id, depth);
    }

    pub fn clear_output_window_colour(&mut self, id: u64, colour: FloatVector) {
        self.backend.clear_output_window_colour(id, colour);
    }

    pub fn flip_output_window(&mut self, id: u64) {
        self.backend.flip_output_window(id);
    }

    pub fn is_output_window_visible(&self, id: u64) -> bool {
        self.backend.is_output_window_visible(id)
    }

    /// The stored refresh failure, else the backend's own fatal error
    pub fn fatal_error_check(&self) -> Option<ProxyError> {
        self.error.clone().or_else(|| self.backend.fatal_error_check())
    }
}

impl<B: ReplayBackend> Drop for ImageViewer<B> {
    fn drop(&mut self) {
        self.loader.release(&mut self.backend);
        self.backend.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_rules() {
        let external = ResourceId::next();
        let mut table = HandleTable::new(external);
        table.primary = ResourceId::next();
        table.derived = ResourceId::next();

        assert_eq!(table.resolve(external), table.primary);
        assert_eq!(table.resolve(table.primary), table.primary);
        assert_eq!(table.resolve(table.derived), table.derived);
        assert_eq!(table.resolve(ResourceId(u64::MAX)), table.primary);
        assert_eq!(table.resolve(ResourceId::NULL), table.primary);
    }

    #[test]
    fn test_null_derived_is_not_passed_through() {
        let mut table = HandleTable::new(ResourceId::next());
        table.primary = ResourceId::next();
        assert_eq!(table.resolve(ResourceId::NULL), table.primary);
    }
}
