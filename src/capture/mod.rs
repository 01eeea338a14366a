//! Upload Intake
//!
//! Checks the declared file type and decodes the uploaded bytes. Nothing else
//! runs before the extension has been accepted.

use crossbeam_channel::{bounded, RecvTimeoutError};
use image::{DynamicImage, ImageFormat};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::error::{PipelineError, Stage};

/// Accepted upload formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageKind {
    Jpeg,
    Png,
}

impl ImageKind {
    /// Parse a file extension such as `"JPG"` or `".png"`
    pub fn from_extension(extension: &str) -> Result<Self, PipelineError> {
        let normalized = extension.trim().trim_start_matches('.').to_ascii_lowercase();
        match normalized.as_str() {
            "jpg" | "jpeg" => Ok(ImageKind::Jpeg),
            "png" => Ok(ImageKind::Png),
            _ => Err(PipelineError::UnsupportedFileType {
                extension: extension.to_string(),
            }),
        }
    }

    pub fn format(&self) -> ImageFormat {
        match self {
            ImageKind::Jpeg => ImageFormat::Jpeg,
            ImageKind::Png => ImageFormat::Png,
        }
    }
}

/// Decode uploaded bytes as `kind`, giving up after `timeout`.
///
/// Decoding happens on a helper thread; on timeout the thread is left to
/// finish on its own and its result is dropped.
pub fn decode_upload(
    bytes: &[u8],
    kind: ImageKind,
    timeout: Duration,
) -> Result<DynamicImage, PipelineError> {
    let start = Instant::now();
    let data = bytes.to_vec();
    let (tx, rx) = bounded(1);

    std::thread::Builder::new()
        .name("decode-upload".to_string())
        .spawn(move || {
            let _ = tx.send(image::load_from_memory_with_format(&data, kind.format()));
        })
        .map_err(|e| PipelineError::Decode {
            reason: format!("could not start decoder: {}", e),
        })?;

    let image = match rx.recv_timeout(timeout) {
        Ok(Ok(image)) => image,
        Ok(Err(e)) => {
            return Err(PipelineError::Decode {
                reason: e.to_string(),
            })
        }
        Err(RecvTimeoutError::Timeout) => return Err(PipelineError::timeout(Stage::Decode, timeout)),
        Err(RecvTimeoutError::Disconnected) => {
            return Err(PipelineError::Decode {
                reason: "decoder exited without a result".to_string(),
            })
        }
    };

    debug!(
        "Decoded {:?} upload ({} bytes) to {}x{} in {:?}",
        kind,
        bytes.len(),
        image.width(),
        image.height(),
        start.elapsed()
    );
    Ok(image)
}
