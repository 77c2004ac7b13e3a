//! Rendering backend contract
//!
//! The viewer never talks to a GPU API directly. Everything it needs is split
//! into three capability groups (proxy texture management, output windows and
//! texture inspection) plus a small [`ReplayBackend`] supertrait for
//! backend-wide state.

use proxyview_core::{CompType, Error, ResourceId, Result, Subresource, TextureDescription};
use serde::{Deserialize, Serialize};

/// Graphics API a backend renders with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GraphicsApi {
    D3D11,
    D3D12,
    OpenGL,
    Vulkan,
}

impl GraphicsApi {
    /// Whether texture coordinates start at the bottom row
    pub fn is_bottom_up(&self) -> bool {
        matches!(self, GraphicsApi::OpenGL)
    }
}

/// Properties of the backend and of the pipeline it presents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiProperties {
    /// API whose pipeline state is reported to callers
    pub pipeline_type: GraphicsApi,
    /// API the backend actually renders with
    pub local_renderer: GraphicsApi,
    pub degraded: bool,
}

/// Four floats, as returned by picking and min/max queries
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FloatVector {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl FloatVector {
    pub fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    pub fn from_array(v: [f32; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.x, self.y, self.z, self.w]
    }
}

/// Format a read-back should be converted to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemapTexture {
    #[default]
    NoRemap,
    Rgba8,
    Rgba32,
}

/// Options for [`TextureInspection::get_texture_data`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct GetTextureDataParams {
    pub remap: RemapTexture,
    pub type_cast: Option<CompType>,
    /// Black point and white point applied when remapping
    pub black_point: f32,
    pub white_point: f32,
}

impl GetTextureDataParams {
    /// Remap to `target` over the [0, 1] range
    pub fn remapped(target: RemapTexture) -> Self {
        Self {
            remap: target,
            type_cast: None,
            black_point: 0.0,
            white_point: 1.0,
        }
    }
}

/// Window system handle for an output window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WindowingData {
    /// Offscreen target of a fixed size
    Headless { width: i32, height: i32 },
    /// Native window identified by an opaque handle
    Native { handle: u64 },
}

/// How to draw a texture into the bound output window
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TextureDisplay {
    pub resource_id: ResourceId,
    pub subresource: Subresource,
    pub type_cast: Option<CompType>,
    pub custom_shader_id: ResourceId,
    pub flip_y: bool,
    pub x_offset: f32,
    pub y_offset: f32,
    pub scale: f32,
    pub range_min: f32,
    pub range_max: f32,
    pub channels: [bool; 4],
}

impl Default for TextureDisplay {
    fn default() -> Self {
        Self {
            resource_id: ResourceId::NULL,
            subresource: Subresource::default(),
            type_cast: None,
            custom_shader_id: ResourceId::NULL,
            flip_y: false,
            x_offset: 0.0,
            y_offset: 0.0,
            scale: 1.0,
            range_min: 0.0,
            range_max: 1.0,
            channels: [true; 4],
        }
    }
}

/// Creation and upload of proxy textures
pub trait ProxyTextures {
    /// Whether a texture with this description can be created
    fn is_texture_supported(&self, desc: &TextureDescription) -> bool;

    fn create_proxy_texture(&mut self, desc: &TextureDescription) -> Result<ResourceId>;

    fn set_proxy_texture_data(&mut self, id: ResourceId, sub: Subresource, data: &[u8]) -> Result<()>;

    /// Release a texture; unknown ids are ignored
    fn destroy_proxy_texture(&mut self, id: ResourceId);
}

/// Output window lifecycle and texture display
pub trait OutputWindows {
    fn make_output_window(&mut self, window: WindowingData, depth: bool) -> u64;

    fn destroy_output_window(&mut self, id: u64);

    fn check_resize_output_window(&mut self, id: u64) -> bool;

    fn get_output_window_dimensions(&self, id: u64) -> (i32, i32);

    fn bind_output_window(&mut self, id: u64, depth: bool);

    fn clear_output_window_colour(&mut self, id: u64, colour: FloatVector);

    fn flip_output_window(&mut self, id: u64);

    fn is_output_window_visible(&self, id: u64) -> bool;

    /// Draw a texture into the bound window
    fn render_texture(&mut self, display: TextureDisplay) -> bool;
}

/// Read-back and analysis of texture contents
pub trait TextureInspection {
    fn get_texture_data(
        &mut self,
        id: ResourceId,
        sub: Subresource,
        params: &GetTextureDataParams,
    ) -> Result<Vec<u8>>;

    /// Value of one texel, with `y` counted in the backend's own origin
    fn pick_pixel(
        &mut self,
        id: ResourceId,
        x: u32,
        y: u32,
        sub: Subresource,
        type_cast: Option<CompType>,
    ) -> FloatVector;

    fn get_min_max(
        &mut self,
        id: ResourceId,
        sub: Subresource,
        type_cast: Option<CompType>,
    ) -> Option<(FloatVector, FloatVector)>;

    fn get_histogram(
        &mut self,
        id: ResourceId,
        sub: Subresource,
        type_cast: Option<CompType>,
        min: f32,
        max: f32,
        channels: [bool; 4],
    ) -> Option<Vec<u32>>;

    fn build_custom_shader(&mut self, source: &str, entry_point: &str) -> Result<ResourceId>;

    fn free_custom_shader(&mut self, id: ResourceId);

    /// Run a display shader over a texture, returning the derived texture
    fn apply_custom_shader(
        &mut self,
        shader: ResourceId,
        texture: ResourceId,
        sub: Subresource,
        type_cast: Option<CompType>,
    ) -> Result<ResourceId>;
}

/// A complete backend
pub trait ReplayBackend: ProxyTextures + OutputWindows + TextureInspection {
    fn api_properties(&self) -> ApiProperties;

    /// Unrecoverable backend error, if one occurred
    fn fatal_error_check(&self) -> Option<Error>;

    fn shutdown(&mut self);
}
