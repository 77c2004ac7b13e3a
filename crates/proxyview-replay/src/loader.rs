//! Load/refresh state machine
//!
//! One refresh runs every stage to completion on the calling thread:
//! open (with bounded retry), classify, decode, describe, negotiate and
//! upload. A refresh whose description matches the previous one only
//! re-uploads pixels into the existing backend texture.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;

use proxyview_core::{Error as ProxyError, ResourceId, Result, ResultCode, TextureDescription};
use proxyview_parsers::logging::instrument_load;
use proxyview_parsers::{classify, decode_image, describe, DecodeError, DecodedImage, ImageContainerKind, LoadOptions};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::backend::ProxyTextures;
use crate::convert::RetainedPixels;
use crate::negotiate::{materialize, prepare, upload_subresources, ProxyStrategy};

/// Stage a load cycle is in, or where it stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoadState {
    Idle,
    Opening,
    Classifying,
    Decoding,
    Describing,
    Negotiating,
    Ready,
    Failed(ResultCode),
}

/// What a successful refresh did to the backend texture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefreshOutcome {
    /// First texture for this loader
    Created,
    /// Structure changed; a new texture replaced the old one
    Recreated,
    /// Same structure; pixels uploaded into the existing texture
    Updated,
}

/// Run `op` up to `attempts` times, sleeping `delay` between failures
///
/// `op` receives the 1-based attempt number. The last error is returned once
/// the attempts are exhausted.
pub fn retry_with_delay<T, F>(attempts: u32, delay: Duration, mut op: F) -> Result<T>
where
    F: FnMut(u32) -> Result<T>,
{
    let attempts = attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt) {
            Ok(value) => return Ok(value),
            Err(e) if attempt >= attempts => return Err(e),
            Err(e) => {
                debug!(attempt, attempts, error = %e, "Attempt failed, retrying");
                std::thread::sleep(delay);
                attempt += 1;
            }
        }
    }
}

/// Open a file for reading, retrying while another writer holds it
pub fn open_with_retry(path: &Path, attempts: u32, delay: Duration) -> Result<File> {
    retry_with_delay(attempts, delay, |_| {
        File::open(path).map_err(|e| ProxyError::file_io(path, e.to_string()))
    })
}

fn decode_failure(path: &Path, err: DecodeError) -> ProxyError {
    match err {
        DecodeError::Io(io) => ProxyError::file_io(path, io.to_string()),
        other => other.into(),
    }
}

/// The texture a successful load left on the backend
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedTexture {
    pub handle: ResourceId,
    pub strategy: ProxyStrategy,
    /// Description of the decoded image
    pub desc: TextureDescription,
    /// Description the backend texture was created with
    pub backend_desc: TextureDescription,
    /// Original bytes kept when the upload was converted
    pub retained: Option<RetainedPixels>,
    pub kind: ImageContainerKind,
    pub file_size: u64,
    /// Decoded payload size, the sum of subresource lengths
    pub uncompressed_size: u64,
}

/// Drives load cycles for one image file
#[derive(Debug)]
pub struct ImageLoader {
    path: PathBuf,
    options: LoadOptions,
    state: LoadState,
    current: Option<LoadedTexture>,
}

impl ImageLoader {
    pub fn new(path: impl Into<PathBuf>, options: LoadOptions) -> Self {
        Self {
            path: path.into(),
            options,
            state: LoadState::Idle,
            current: None,
        }
    }

    /// Check that `path` can be opened, classified and decoded
    pub fn probe(path: &Path, options: &LoadOptions) -> Result<DecodedImage> {
        let file = open_with_retry(path, options.open_attempts, options.open_retry_delay())?;
        let mut reader = BufReader::new(file);
        let kind = classify(&mut reader).map_err(|e| decode_failure(path, e))?;
        decode_image(&mut reader, kind, options).map_err(|e| decode_failure(path, e))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn options(&self) -> &LoadOptions {
        &self.options
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    pub fn current(&self) -> Option<&LoadedTexture> {
        self.current.as_ref()
    }

    /// Backend handle of the current texture, if any
    pub fn handle(&self) -> Option<ResourceId> {
        self.current.as_ref().map(|c| c.handle)
    }

    /// Run a full load cycle against `backend`
    ///
    /// On failure the previous texture, if any, stays on the backend and
    /// remains current.
    pub fn refresh<B: ProxyTextures + ?Sized>(&mut self, backend: &mut B) -> Result<RefreshOutcome> {
        let name = self
            .path
            .file_name()
            .map_or_else(|| self.path.display().to_string(), |n| n.to_string_lossy().into_owned());

        instrument_load(&name, || match self.run_stages(backend) {
            Ok(outcome) => {
                self.state = LoadState::Ready;
                info!(outcome = ?outcome, "Image loaded");
                Ok(outcome)
            }
            Err(e) => {
                self.state = LoadState::Failed(e.code());
                warn!(error = %e, code = %e.code(), "Image load failed");
                Err(e)
            }
        })
    }

    fn run_stages<B: ProxyTextures + ?Sized>(&mut self, backend: &mut B) -> Result<RefreshOutcome> {
        let path = self.path.clone();

        self.state = LoadState::Opening;
        let file = open_with_retry(&path, self.options.open_attempts, self.options.open_retry_delay())?;
        let mut reader = BufReader::new(file);

        self.state = LoadState::Classifying;
        let kind = classify(&mut reader).map_err(|e| decode_failure(&path, e))?;

        self.state = LoadState::Decoding;
        let image = decode_image(&mut reader, kind, &self.options).map_err(|e| decode_failure(&path, e))?;
        drop(reader);

        self.state = LoadState::Describing;
        let mut desc = describe(&image);
        let file_size = image.file_size;
        let uncompressed_size = image.uncompressed_size();

        self.state = LoadState::Negotiating;
        if let Some(current) = self.current.as_mut().filter(|c| c.desc.same_structure(&desc)) {
            let prepared = prepare(current.strategy, &desc, image.pixels)?;
            upload_subresources(backend, current.handle, &prepared.subresources)?;

            desc.resource_id = current.handle;
            current.desc = desc;
            current.retained = prepared.retained;
            current.kind = kind;
            current.file_size = file_size;
            current.uncompressed_size = uncompressed_size;
            debug!(handle = %current.handle, "Reused proxy texture");
            return Ok(RefreshOutcome::Updated);
        }

        let created = materialize(&desc, image.pixels, backend, &self.options)?;
        desc.resource_id = created.handle;

        let outcome = match self.current.take() {
            Some(previous) => {
                debug!(old = %previous.handle, new = %created.handle, "Structure changed, replacing proxy texture");
                backend.destroy_proxy_texture(previous.handle);
                RefreshOutcome::Recreated
            }
            None => RefreshOutcome::Created,
        };

        self.current = Some(LoadedTexture {
            handle: created.handle,
            strategy: created.strategy,
            desc,
            backend_desc: created.backend_desc,
            retained: created.retained,
            kind,
            file_size,
            uncompressed_size,
        });
        Ok(outcome)
    }

    /// Destroy the current backend texture
    pub fn release<B: ProxyTextures + ?Sized>(&mut self, backend: &mut B) {
        if let Some(current) = self.current.take() {
            backend.destroy_proxy_texture(current.handle);
        }
        self.state = LoadState::Idle;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_retry_succeeds_before_bound() {
        let calls = Cell::new(0);
        let result = retry_with_delay(5, Duration::ZERO, |attempt| {
            calls.set(attempt);
            if attempt < 3 {
                Err(ProxyError::file_io("x", "locked"))
            } else {
                Ok(attempt)
            }
        });
        assert_eq!(result, Ok(3));
        assert_eq!(calls.get(), 3);
    }

    #[test]
    fn test_retry_exhausted() {
        let mut calls = 0;
        let result: Result<()> = retry_with_delay(4, Duration::ZERO, |_| {
            calls += 1;
            Err(ProxyError::file_io("x", "locked"))
        });
        assert_eq!(result.unwrap_err().code(), ResultCode::FileIoFailed);
        assert_eq!(calls, 4);
    }

    #[test]
    fn test_zero_attempts_still_tries_once() {
        let mut calls = 0;
        let _ = retry_with_delay(0, Duration::ZERO, |_| {
            calls += 1;
            Ok::<_, ProxyError>(())
        });
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_missing_file_is_io_failure() {
        let dir = tempfile::tempdir().unwrap();
        let err = open_with_retry(&dir.path().join("missing.png"), 2, Duration::ZERO).unwrap_err();
        assert_eq!(err.code(), ResultCode::FileIoFailed);
        assert!(err.to_string().contains("missing.png"));
    }
}
