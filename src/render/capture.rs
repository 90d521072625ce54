//! Screenshot capture over a headless browser.
//!
//! The capture seam is a small trait so the rendering service can be driven
//! by a fake source in tests; the production implementation launches a
//! headless Chrome per capture and kills it when the handle drops.

use super::Size;
use headless_chrome::protocol::cdp::Page;
use headless_chrome::{Browser, LaunchOptions};
use std::ffi::OsStr;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Browser/navigation failure, normalized with the underlying cause message
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("failed to launch browser: {0}")]
    Launch(String),

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("failed to take a screenshot: {0}")]
    Screenshot(String),

    #[error("screenshot capture timed out after {0:?}")]
    Timeout(Duration),
}

/// Produces raw encoded screenshot bytes of a rendered page.
///
/// Blocking: implementations drive out-of-process I/O and are run through
/// `spawn_blocking` by the rendering service. The `Url` type guarantees the
/// destination is absolute. No partial results on failure.
pub trait ScreenshotSource: Send + Sync {
    fn screenshot(&self, url: &Url, viewport: Size) -> Result<Vec<u8>, CaptureError>;
}

/// Headless-Chrome screenshot source.
///
/// Each capture owns its browser process: launched at the requested window
/// size, dropped (and thereby killed) when the capture returns. The tab
/// default timeout bounds navigation even when the calling task has already
/// given up waiting.
pub struct ChromeCapture {
    nav_timeout: Duration,
    settle: Duration,
}

impl ChromeCapture {
    pub fn new(nav_timeout: Duration) -> Self {
        Self {
            nav_timeout,
            settle: Duration::from_millis(500),
        }
    }

    /// Delay between navigation completing and the screenshot, giving the
    /// page's scripts time to paint.
    pub fn with_settle_delay(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }
}

impl ScreenshotSource for ChromeCapture {
    fn screenshot(&self, url: &Url, viewport: Size) -> Result<Vec<u8>, CaptureError> {
        tracing::info!("Launching headless browser at {}", viewport);

        let options = LaunchOptions::default_builder()
            .headless(true)
            .window_size(Some((viewport.width, viewport.height)))
            .idle_browser_timeout(self.nav_timeout)
            .args(vec![
                OsStr::new("--disable-gpu"),
                OsStr::new("--hide-scrollbars"),
            ])
            .build()
            .map_err(|e| CaptureError::Launch(format!("invalid launch options: {e}")))?;

        let browser = Browser::new(options).map_err(|e| CaptureError::Launch(e.to_string()))?;
        let tab = browser
            .new_tab()
            .map_err(|e| CaptureError::Launch(e.to_string()))?;
        tab.set_default_timeout(self.nav_timeout);

        tracing::debug!("Navigating to {}", url);
        tab.navigate_to(url.as_str())
            .map_err(|e| CaptureError::Navigation(e.to_string()))?;
        tab.wait_until_navigated()
            .map_err(|e| CaptureError::Navigation(e.to_string()))?;

        std::thread::sleep(self.settle);

        let png = tab
            .capture_screenshot(Page::CaptureScreenshotFormatOption::Png, None, None, true)
            .map_err(|e| CaptureError::Screenshot(e.to_string()))?;

        tracing::debug!("Captured screenshot: {} bytes", png.len());
        Ok(png)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_errors_carry_the_cause_message() {
        let err = CaptureError::Navigation("connection reset".into());
        assert_eq!(err.to_string(), "navigation failed: connection reset");

        let err = CaptureError::Timeout(Duration::from_secs(30));
        assert!(err.to_string().contains("30s"));
    }
}
