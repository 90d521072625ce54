//! Page-to-image rendering pipeline.
//!
//! Orchestrates the full chain: capture a screenshot of the dashboard page,
//! decode it, and resize it to the device resolution. Palette quantization,
//! orientation, and output encoding are separate [`Frame`] operations so
//! callers can compose them per output format.

pub mod capture;
pub mod dither;
pub mod encode;
pub mod frame;

pub use capture::{CaptureError, ChromeCapture, ScreenshotSource};
pub use dither::{Ditherer, Palette, PaletteKind};
pub use encode::{EncodeError, ImageEncoding};
pub use frame::{DecodeError, Frame, Rotation};

use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Pixel dimensions of a capture viewport or resize target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True if either dimension is zero.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl std::fmt::Display for Size {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Invalid geometric or palette parameters
#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error("resize target {0} has a zero dimension")]
    EmptyResizeTarget(Size),

    #[error("palette must contain at least one color")]
    EmptyPalette,

    #[error("palette contains duplicate color {0:?}")]
    DuplicatePaletteColor([u8; 3]),
}

/// Failure of a single pipeline stage
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Process(#[from] ProcessingError),

    #[error(transparent)]
    Encode(#[from] EncodeError),
}

/// Top-level rendering failure, carrying the failing stage as its cause.
///
/// `Display` is the stable aggregate message; the stage error is reachable
/// through `std::error::Error::source()` so callers can report the chain.
#[derive(Error, Debug)]
#[error("failed to render page to image")]
pub struct RenderError {
    #[source]
    pub cause: PipelineError,
}

impl RenderError {
    fn wrap(cause: impl Into<PipelineError>) -> Self {
        Self {
            cause: cause.into(),
        }
    }
}

/// Renders dashboard pages into device-sized frames.
///
/// Each call is independent; the screenshot source is the only external
/// collaborator and is shared read-only. No retries happen here; retry
/// policy belongs to the caller.
pub struct PageRenderer {
    source: Arc<dyn ScreenshotSource>,
    capture_timeout: Duration,
}

impl PageRenderer {
    pub fn new(source: Arc<dyn ScreenshotSource>, capture_timeout: Duration) -> Self {
        Self {
            source,
            capture_timeout,
        }
    }

    /// Render `url` and resize the screenshot to `target`.
    ///
    /// Captures at the target size; use [`render_page_at`](Self::render_page_at)
    /// when the browser viewport should differ from the device resolution.
    pub async fn render_page(&self, url: &Url, target: Size) -> Result<Frame, RenderError> {
        self.render_page_at(url, target, target).await
    }

    /// Render `url` at `viewport`, then resize to `target`.
    pub async fn render_page_at(
        &self,
        url: &Url,
        viewport: Size,
        target: Size,
    ) -> Result<Frame, RenderError> {
        if viewport != target {
            tracing::warn!(
                "capture viewport {} differs from resize target {}, output will be rescaled",
                viewport,
                target
            );
        }

        tracing::info!("Rendering {} at {} -> {}", url, viewport, target);

        let screenshot = self
            .capture(url, viewport)
            .await
            .map_err(RenderError::wrap)?;

        tracing::debug!("Captured {} bytes, decoding", screenshot.len());

        let frame = Frame::decode(&screenshot).map_err(RenderError::wrap)?;
        frame.resize(target).map_err(RenderError::wrap)
    }

    /// Drive the blocking screenshot source off the async runtime.
    ///
    /// The timeout bounds the total wait; an abandoned worker is still
    /// bounded by the source's own navigation timeout, so no browser
    /// process outlives a cancelled render indefinitely.
    async fn capture(&self, url: &Url, viewport: Size) -> Result<Vec<u8>, CaptureError> {
        let source = Arc::clone(&self.source);
        let url = url.clone();
        let worker = tokio::task::spawn_blocking(move || source.screenshot(&url, viewport));

        match tokio::time::timeout(self.capture_timeout, worker).await {
            Ok(Ok(result)) => result,
            Ok(Err(join)) => Err(CaptureError::Screenshot(format!(
                "capture worker failed: {join}"
            ))),
            Err(_) => Err(CaptureError::Timeout(self.capture_timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_formats_as_width_x_height() {
        assert_eq!(Size::new(800, 480).to_string(), "800x480");
    }

    #[test]
    fn size_with_zero_dimension_is_empty() {
        assert!(Size::new(0, 480).is_empty());
        assert!(Size::new(800, 0).is_empty());
        assert!(!Size::new(800, 480).is_empty());
    }

    #[test]
    fn render_error_exposes_stage_as_source() {
        use std::error::Error;

        let err = RenderError::wrap(CaptureError::Navigation("connection reset".into()));
        assert_eq!(err.to_string(), "failed to render page to image");

        let cause = err.source().expect("stage error should be chained");
        assert!(cause.to_string().contains("connection reset"));
    }
}
