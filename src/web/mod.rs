//! Web server module for the render API.
//!
//! Provides an HTTP server using Axum that exposes the page-to-image
//! pipeline and a health probe.

pub mod routes;

use crate::config::Config;
use crate::render::PageRenderer;
use axum::{Router, routing::get};
use routes::AppState;
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::RwLock;

/// Web server errors
#[derive(Error, Debug)]
pub enum WebError {
    #[error("Failed to bind to address: {0}")]
    BindError(#[from] std::io::Error),

    #[error("Server error: {0}")]
    ServerError(String),
}

/// Web server wiring the render pipeline to HTTP
pub struct WebServer {
    config: Arc<RwLock<Config>>,
    renderer: Arc<PageRenderer>,
}

impl WebServer {
    /// Create a new web server
    pub fn new(config: Config, renderer: PageRenderer) -> Self {
        Self {
            config: Arc::new(RwLock::new(config)),
            renderer: Arc::new(renderer),
        }
    }

    /// Get shared config reference
    pub fn config(&self) -> Arc<RwLock<Config>> {
        Arc::clone(&self.config)
    }

    /// Build the router with all routes
    fn build_router(&self) -> Router {
        let state = AppState {
            config: Arc::clone(&self.config),
            renderer: Arc::clone(&self.renderer),
        };

        Router::new()
            .route("/render/binary", get(routes::render_binary))
            .route("/render/converted", get(routes::render_converted))
            .route("/render/original", get(routes::render_original))
            .route("/health", get(routes::health))
            .with_state(state)
    }

    /// Run the web server
    pub async fn run(&self, port: u16) -> Result<(), WebError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let listener = TcpListener::bind(addr).await?;

        tracing::info!("Web server listening on http://{}", addr);

        axum::serve(listener, self.build_router())
            .await
            .map_err(|e| WebError::ServerError(e.to_string()))
    }

    /// Run the web server with graceful shutdown
    pub async fn run_with_shutdown(
        &self,
        port: u16,
        shutdown: tokio::sync::broadcast::Receiver<()>,
    ) -> Result<(), WebError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let listener = TcpListener::bind(addr).await?;

        tracing::info!("Web server listening on http://{}", addr);

        let mut shutdown = shutdown;
        axum::serve(listener, self.build_router())
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Web server shutting down gracefully");
            })
            .await
            .map_err(|e| WebError::ServerError(e.to_string()))
    }
}
