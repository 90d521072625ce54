//! Dashboard renderer for e-paper displays
//!
//! A Rust-based server that:
//! - Captures a dashboard web page with a headless browser
//! - Resizes, reorients, and dithers it to an e-paper palette
//! - Serves the result over HTTP in device-binary or standard image formats
//! - Runs as a systemd service with graceful shutdown

use clap::Parser;
use epaper_dashboard_renderer::config::Config;
use epaper_dashboard_renderer::render::{ChromeCapture, ImageEncoding, PageRenderer, Rotation};
use epaper_dashboard_renderer::web::WebServer;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "epaper-renderer")]
#[command(about = "Dashboard renderer for e-paper displays")]
#[command(version)]
struct Args {
    /// Configuration file path
    #[arg(short, long, default_value = "/opt/epaper-renderer/config.json")]
    config: String,

    /// Web server port (overrides config, default: 8888)
    #[arg(long = "http-port")]
    http_port: Option<u16>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Render one quantized frame to the given PNG file and exit
    #[arg(long, value_name = "PATH")]
    once: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    init_logging(args.verbose);

    tracing::info!("Starting dashboard renderer");

    // Load configuration
    let config = Config::load(&args.config).unwrap_or_else(|e| {
        tracing::warn!("Failed to load config from {}: {}", args.config, e);
        tracing::info!("Using default configuration");
        Config::default()
    });

    // Wire the capture backend into the rendering service
    let capture = ChromeCapture::new(config.capture_timeout());
    let renderer = PageRenderer::new(Arc::new(capture), config.capture_timeout());

    // Handle one-shot render
    if let Some(path) = args.once {
        render_once(&config, &renderer, &path).await?;
        return Ok(());
    }

    // Setup shutdown signal handling
    let (shutdown_tx, _) = broadcast::channel::<()>(1);

    // Create web server
    let port = args.http_port.unwrap_or(config.web_port);
    let web_server = WebServer::new(config, renderer);

    // Spawn web server task
    let web_shutdown = shutdown_tx.subscribe();
    let web_handle = tokio::spawn(async move {
        if let Err(e) = web_server.run_with_shutdown(port, web_shutdown).await {
            tracing::error!("Web server error: {}", e);
        }
    });

    // Wait for shutdown signal
    wait_for_shutdown().await;
    tracing::info!("Shutdown signal received");

    // Send shutdown to all tasks
    let _ = shutdown_tx.send(());

    // Wait for the server to drain with timeout
    tokio::select! {
        _ = web_handle => {},
        _ = tokio::time::sleep(std::time::Duration::from_secs(5)) => {
            tracing::warn!("Web server shutdown timeout");
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Render the configured dashboard once and write a quantized PNG
async fn render_once(config: &Config, renderer: &PageRenderer, path: &str) -> anyhow::Result<()> {
    let url = config.dashboard_url()?;
    let target = config.display_size();
    let viewport = config.viewport_for(target);

    tracing::info!("Rendering {} once to {}", url, path);

    let frame = renderer.render_page_at(&url, viewport, target).await?;
    let frame = frame
        .quantize(&config.palette.palette(), config.ditherer)
        .orient(
            Rotation::from(config.rotation),
            config.mirror_h,
            config.mirror_v,
        );

    let bytes = frame.encode(ImageEncoding::Png)?;
    std::fs::write(path, bytes)?;

    tracing::info!("Wrote {}", path);
    Ok(())
}

/// Initialize tracing/logging
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("epaper_dashboard_renderer={level}").into());

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}

/// Wait for shutdown signals (SIGTERM, SIGINT)
async fn wait_for_shutdown() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate()).expect("Failed to setup SIGTERM handler");
    let mut sigint = signal(SignalKind::interrupt()).expect("Failed to setup SIGINT handler");

    tokio::select! {
        _ = sigterm.recv() => {
            tracing::info!("Received SIGTERM");
        }
        _ = sigint.recv() => {
            tracing::info!("Received SIGINT");
        }
    }
}
