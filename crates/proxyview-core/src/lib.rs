//! proxyview core library
//!
//! This crate provides the error type, pixel format model and texture
//! description shared by the decoders and the replay façade.

pub mod error;
pub mod format;
pub mod types;

pub use error::{Error, Result, ResultCode, ResultExt};
pub use format::{CompType, FormatType, ResourceFormat};
pub use types::*;

/// Re-export commonly used items
pub mod prelude {
    pub use crate::error::{Error, Result, ResultCode, ResultExt};
    pub use crate::format::{CompType, FormatType, ResourceFormat};
    pub use crate::types::*;
}
