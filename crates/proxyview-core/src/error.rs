//! Unified error handling for proxyview
//!
//! Every failure a load or refresh cycle can produce is folded into one of the
//! [`ResultCode`] categories. The façade stores the last failure as sticky
//! state, so [`Error`] is cheap to clone and carries its detail as text.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Coarse result categories reported to the host application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResultCode {
    Succeeded,
    InvalidParameter,
    ImageUnsupported,
    FileIoFailed,
    ReplayOutOfMemory,
    ApiInitFailed,
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResultCode::Succeeded => "Succeeded",
            ResultCode::InvalidParameter => "InvalidParameter",
            ResultCode::ImageUnsupported => "ImageUnsupported",
            ResultCode::FileIoFailed => "FileIOFailed",
            ResultCode::ReplayOutOfMemory => "ReplayOutOfMemory",
            ResultCode::ApiInitFailed => "APIInitFailed",
        };
        f.write_str(name)
    }
}

/// Unified error type for all proxyview operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    // ==================== Entry Errors ====================

    /// Bad handle or arguments at an entry point
    #[error("Invalid parameter: {message}")]
    InvalidParameter {
        message: String,
    },

    // ==================== Image Errors ====================

    /// Recognised image that cannot be displayed
    #[error("Image unsupported: {message}")]
    ImageUnsupported {
        message: String,
    },

    // ==================== I/O Errors ====================

    /// Open exhausted its retries, or a read/seek failed
    #[error("File I/O failed for {path}: {message}")]
    FileIoFailed {
        path: PathBuf,
        message: String,
    },

    // ==================== Resource Errors ====================

    /// Allocation failed while decoding or converting pixels
    #[error("Out of memory: allocation of {bytes} bytes failed ({what})")]
    ReplayOutOfMemory {
        bytes: usize,
        what: String,
    },

    /// Backend refused to create a texture for a valid description
    #[error("Backend initialisation failed: {message}")]
    ApiInitFailed {
        message: String,
    },

    // ==================== General Errors ====================

    /// Error with layered context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

/// Result type using the unified Error
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an invalid parameter error
    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Error::InvalidParameter {
            message: message.into(),
        }
    }

    /// Create an image unsupported error
    pub fn unsupported(message: impl Into<String>) -> Self {
        Error::ImageUnsupported {
            message: message.into(),
        }
    }

    /// Create a file I/O error
    pub fn file_io(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Error::FileIoFailed {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an out of memory error
    pub fn out_of_memory(bytes: usize, what: impl Into<String>) -> Self {
        Error::ReplayOutOfMemory {
            bytes,
            what: what.into(),
        }
    }

    /// Create a backend initialisation error
    pub fn api_init(message: impl Into<String>) -> Self {
        Error::ApiInitFailed {
            message: message.into(),
        }
    }

    /// Create an error with additional context
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Error::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Result category of this error, looking through any context layers
    pub fn code(&self) -> ResultCode {
        match self {
            Error::InvalidParameter { .. } => ResultCode::InvalidParameter,
            Error::ImageUnsupported { .. } => ResultCode::ImageUnsupported,
            Error::FileIoFailed { .. } => ResultCode::FileIoFailed,
            Error::ReplayOutOfMemory { .. } => ResultCode::ReplayOutOfMemory,
            Error::ApiInitFailed { .. } => ResultCode::ApiInitFailed,
            Error::WithContext { source, .. } => source.code(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::FileIoFailed {
            path: PathBuf::new(),
            message: err.to_string(),
        }
    }
}

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_with_context() {
        let err = Error::file_io("/test.png", "locked");
        let contextualized = err.with_context("while refreshing");

        assert!(contextualized.to_string().contains("while refreshing"));
        assert_eq!(contextualized.code(), ResultCode::FileIoFailed);
    }

    #[test]
    fn test_codes() {
        assert_eq!(Error::unsupported("tiled").code(), ResultCode::ImageUnsupported);
        assert_eq!(Error::out_of_memory(16, "exr").code(), ResultCode::ReplayOutOfMemory);
        assert_eq!(Error::api_init("no texture").code(), ResultCode::ApiInitFailed);
        assert_eq!(Error::invalid_parameter("empty path").code(), ResultCode::InvalidParameter);
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "short read");
        let err: Error = io.into();
        assert_eq!(err.code(), ResultCode::FileIoFailed);
        assert!(err.to_string().contains("short read"));
    }

    #[test]
    fn test_result_context() {
        let result: Result<()> = Err(Error::api_init("refused"));
        let with_context = result.context("creating proxy");

        assert!(with_context.unwrap_err().to_string().contains("creating proxy"));
    }

    #[test]
    fn test_result_code_display() {
        assert_eq!(ResultCode::FileIoFailed.to_string(), "FileIOFailed");
        assert_eq!(ResultCode::ApiInitFailed.to_string(), "APIInitFailed");
    }
}
