//! HTTP route handlers for the render API.

use crate::config::Config;
use crate::render::{Frame, ImageEncoding, PageRenderer, RenderError, Rotation, Size};
use axum::{
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Json, Response},
};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Shared HTTP client for the dashboard health probe
///
/// A single pooled client instead of one per request.
static HTTP_CLIENT: Lazy<reqwest::Client> = Lazy::new(|| {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .expect("Failed to create HTTP client")
});

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<RwLock<Config>>,
    pub renderer: Arc<PageRenderer>,
}

/// Query parameters for the render endpoints
#[derive(Debug, Deserialize)]
pub struct RenderQuery {
    /// Target width; defaults to the configured display width
    pub width: Option<u32>,
    /// Target height; defaults to the configured display height
    pub height: Option<u32>,
    /// Output format for the converted/original endpoints
    pub format: Option<String>,
}

/// Health report for the renderer and its dashboard
#[derive(Debug, Serialize)]
pub struct Health {
    pub renderer_available: bool,
    pub dashboard_available: bool,
}

type Failure = (StatusCode, String);

/// GET /render/binary - quantized, oriented, packed device format
pub async fn render_binary(
    State(state): State<AppState>,
    Query(query): Query<RenderQuery>,
) -> Result<Response, Failure> {
    let (frame, config) = render_frame(&state, &query).await?;

    let frame = frame
        .quantize(&config.palette.palette(), config.ditherer)
        .orient(
            Rotation::from(config.rotation),
            config.mirror_h,
            config.mirror_v,
        );

    encode_response(&frame, ImageEncoding::Binary)
}

/// GET /render/converted - quantized, encoded with the requested codec
pub async fn render_converted(
    State(state): State<AppState>,
    Query(query): Query<RenderQuery>,
) -> Result<Response, Failure> {
    let encoding = requested_encoding(&query)?;
    let (frame, config) = render_frame(&state, &query).await?;

    let frame = frame.quantize(&config.palette.palette(), config.ditherer);
    encode_response(&frame, encoding)
}

/// GET /render/original - unquantized screenshot, encoded as requested
pub async fn render_original(
    State(state): State<AppState>,
    Query(query): Query<RenderQuery>,
) -> Result<Response, Failure> {
    let encoding = requested_encoding(&query)?;
    let (frame, _) = render_frame(&state, &query).await?;

    encode_response(&frame, encoding)
}

/// GET /health - renderer and dashboard availability
pub async fn health(State(state): State<AppState>) -> Json<Health> {
    let config = state.config.read().await;

    let dashboard_available = match config.dashboard_url() {
        Ok(url) if config.has_dashboard_url() => probe_dashboard(url).await,
        _ => false,
    };

    // The renderer itself is in-process; reaching this handler proves it.
    Json(Health {
        renderer_available: true,
        dashboard_available,
    })
}

/// Run the capture/decode/resize pipeline for a request.
async fn render_frame(state: &AppState, query: &RenderQuery) -> Result<(Frame, Config), Failure> {
    let config = state.config.read().await.clone();

    if !config.has_dashboard_url() {
        return Err((
            StatusCode::BAD_REQUEST,
            "no dashboard URL configured".to_string(),
        ));
    }
    let url = config
        .dashboard_url()
        .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?;

    let target = Size::new(
        query.width.unwrap_or(config.display_width),
        query.height.unwrap_or(config.display_height),
    );
    if target.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("render target {target} must have positive dimensions"),
        ));
    }

    let viewport = config.viewport_for(target);
    let frame = state
        .renderer
        .render_page_at(&url, viewport, target)
        .await
        .map_err(render_failure)?;

    Ok((frame, config))
}

fn requested_encoding(query: &RenderQuery) -> Result<ImageEncoding, Failure> {
    let name = query.format.as_deref().ok_or((
        StatusCode::BAD_REQUEST,
        "missing 'format' query parameter".to_string(),
    ))?;

    ImageEncoding::from_name(name).ok_or((
        StatusCode::BAD_REQUEST,
        format!("format is not supported: {name}"),
    ))
}

fn encode_response(frame: &Frame, encoding: ImageEncoding) -> Result<Response, Failure> {
    let bytes = frame
        .encode(encoding)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, error_chain(&e)))?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, encoding.content_type())],
        bytes,
    )
        .into_response())
}

fn render_failure(err: RenderError) -> Failure {
    tracing::error!("Render failed: {}", error_chain(&err));
    (StatusCode::BAD_REQUEST, error_chain(&err))
}

/// Join an error with its causes into a single diagnostic line.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

async fn probe_dashboard(url: url::Url) -> bool {
    match HTTP_CLIENT.get(url.clone()).send().await {
        Ok(response) => {
            tracing::debug!("Dashboard probe: {} -> {}", url, response.status());
            response.status().is_success()
        }
        Err(e) => {
            tracing::warn!("Dashboard probe failed for {}: {}", url, e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::CaptureError;

    #[test]
    fn error_chain_includes_nested_causes() {
        let err = RenderError {
            cause: CaptureError::Navigation("connection reset".into()).into(),
        };
        let chain = error_chain(&err);
        assert!(chain.starts_with("failed to render page to image"));
        assert!(chain.contains("connection reset"));
    }

    #[test]
    fn health_serializes_both_flags() {
        let health = Health {
            renderer_available: true,
            dashboard_available: false,
        };
        let json = serde_json::to_string(&health).unwrap();
        assert!(json.contains("\"renderer_available\":true"));
        assert!(json.contains("\"dashboard_available\":false"));
    }
}
