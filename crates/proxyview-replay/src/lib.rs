//! proxyview replay
//!
//! Turns a decoded image into a texture on a rendering backend and presents
//! it through a single-resource façade:
//! - Backend contract (`backend`) and an in-memory implementation (`memory`)
//! - CPU conversion of unsupported formats to RGBA32F (`convert`)
//! - Proxy texture negotiation (`negotiate`)
//! - Load/refresh state machine (`loader`)
//! - Image viewer façade (`viewer`)

pub mod backend;
pub mod convert;
pub mod loader;
pub mod memory;
pub mod negotiate;
pub mod viewer;

pub use backend::{
    ApiProperties, FloatVector, GetTextureDataParams, GraphicsApi, OutputWindows, ProxyTextures, RemapTexture,
    ReplayBackend, TextureDisplay, TextureInspection, WindowingData,
};
pub use convert::{can_convert, convert_to_rgba32f, ConvertError, RetainedPixels};
pub use loader::{open_with_retry, retry_with_delay, ImageLoader, LoadState, LoadedTexture, RefreshOutcome};
pub use memory::{BackendStats, MemoryBackend, SupportPolicy};
pub use negotiate::{materialize, remap_volume_to_array, Materialized, PreparedUpload, ProxyStrategy};
pub use viewer::{
    ActionDescription, FrameRecord, HandleTable, ImageViewer, OutputTarget, PipelineState, ResourceDescription,
};
