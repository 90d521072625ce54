//! End-to-end pipeline tests driven by a fake screenshot source.

use epaper_dashboard_renderer::render::{
    CaptureError, Ditherer, ImageEncoding, PageRenderer, Palette, Rotation, ScreenshotSource, Size,
};
use image::{Rgb, RgbImage};
use std::error::Error;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Screenshot source returning a canned response.
struct FakeSource {
    response: Result<Vec<u8>, String>,
}

impl FakeSource {
    fn returning(bytes: Vec<u8>) -> Arc<Self> {
        Arc::new(Self {
            response: Ok(bytes),
        })
    }

    fn failing(message: &str) -> Arc<Self> {
        Arc::new(Self {
            response: Err(message.to_string()),
        })
    }
}

impl ScreenshotSource for FakeSource {
    fn screenshot(&self, _url: &Url, _viewport: Size) -> Result<Vec<u8>, CaptureError> {
        match &self.response {
            Ok(bytes) => Ok(bytes.clone()),
            Err(message) => Err(CaptureError::Navigation(message.clone())),
        }
    }
}

fn renderer(source: Arc<FakeSource>) -> PageRenderer {
    PageRenderer::new(source, Duration::from_secs(5))
}

fn dashboard_url() -> Url {
    Url::parse("http://dashboard.local/board/1").unwrap()
}

fn png_of(img: &RgbImage) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png).unwrap();
    out.into_inner()
}

#[tokio::test]
async fn capture_failure_surfaces_with_nested_cause() {
    let renderer = renderer(FakeSource::failing("connection reset"));

    let err = renderer
        .render_page(&dashboard_url(), Size::new(800, 480))
        .await
        .expect_err("capture failure must fail the render");

    assert_eq!(err.to_string(), "failed to render page to image");

    let cause = err.source().expect("cause must be chained");
    assert!(
        cause.to_string().contains("connection reset"),
        "unexpected cause: {cause}"
    );
}

#[tokio::test]
async fn empty_screenshot_fails_at_decode() {
    let renderer = renderer(FakeSource::returning(Vec::new()));

    let err = renderer
        .render_page(&dashboard_url(), Size::new(800, 480))
        .await
        .expect_err("empty bytes must fail the render");

    assert_eq!(err.to_string(), "failed to render page to image");
    let cause = err.source().expect("cause must be chained");
    assert!(
        cause.to_string().contains("screenshot was empty"),
        "unexpected cause: {cause}"
    );
}

#[tokio::test]
async fn successful_render_matches_target_dimensions() {
    // Browser rendered at a different scale than the device resolution.
    let screenshot = png_of(&RgbImage::from_pixel(1000, 600, Rgb([80, 160, 240])));
    let renderer = renderer(FakeSource::returning(screenshot));

    let frame = renderer
        .render_page(&dashboard_url(), Size::new(800, 480))
        .await
        .unwrap();

    assert_eq!(frame.width(), 800);
    assert_eq!(frame.height(), 480);
}

#[tokio::test]
async fn same_size_capture_resize_is_dimensional_noop() {
    let screenshot = png_of(&RgbImage::from_pixel(800, 480, Rgb([128, 128, 128])));
    let renderer = renderer(FakeSource::returning(screenshot));

    let frame = renderer
        .render_page(&dashboard_url(), Size::new(800, 480))
        .await
        .unwrap();

    assert_eq!(frame.size(), Size::new(800, 480));
}

#[tokio::test]
async fn full_pipeline_produces_palette_constrained_device_bytes() {
    let screenshot = png_of(&RgbImage::from_pixel(800, 480, Rgb([128, 128, 128])));
    let renderer = renderer(FakeSource::returning(screenshot));

    let palette = Palette::black_white();
    let frame = renderer
        .render_page(&dashboard_url(), Size::new(800, 480))
        .await
        .unwrap()
        .quantize(&palette, Ditherer::Atkinson)
        .orient(Rotation::Rotate90, false, false);

    // Quantized output never leaves the palette.
    for p in frame.as_rgb8().pixels() {
        assert!(palette.contains(p), "pixel {p:?} not in palette");
    }

    // Mid-gray dithers to a mix of black and white, not a saturated field.
    let white = frame.as_rgb8().pixels().filter(|p| p[0] == 255).count();
    let total = (frame.width() * frame.height()) as usize;
    assert!(white > total / 5, "dither collapsed to black");
    assert!(white < total * 4 / 5, "dither collapsed to white");

    // Rotated 800x480 packs into (480*800)/8 pixel groups, 2 planes each.
    let bytes = frame.encode(ImageEncoding::Binary).unwrap();
    assert_eq!(frame.size(), Size::new(480, 800));
    assert_eq!(bytes.len(), 480 * 800 / 8 * 2);
}

#[tokio::test]
async fn renders_are_independent_across_concurrent_calls() {
    let screenshot = png_of(&RgbImage::from_pixel(400, 240, Rgb([200, 40, 40])));
    let renderer = Arc::new(renderer(FakeSource::returning(screenshot)));

    let mut handles = Vec::new();
    for _ in 0..4 {
        let renderer = Arc::clone(&renderer);
        handles.push(tokio::spawn(async move {
            renderer
                .render_page(&dashboard_url(), Size::new(200, 120))
                .await
        }));
    }

    for handle in handles {
        let frame = handle.await.unwrap().unwrap();
        assert_eq!(frame.size(), Size::new(200, 120));
    }
}
