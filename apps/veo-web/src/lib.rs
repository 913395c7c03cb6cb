//! Web form front end for the 16:9 canvas fitter.
//!
//! A single route: `GET /` renders the upload form, `POST /` converts the
//! upload and streams the PNG back as an attachment, or re-renders the form
//! with a message when anything about the submission is wrong.

pub mod handlers;
pub mod page;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use veo_core::TelemetrySink;

pub use handlers::{process_submission, Outcome, Submission};

pub const DEFAULT_BIND: &str = "0.0.0.0:8000";
pub const DEFAULT_MAX_WIDTH: i64 = 8192;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct WebConfig {
    pub bind: String,
    /// Widest canvas the server agrees to allocate.
    pub max_width: i64,
    pub max_upload_bytes: usize,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            max_width: DEFAULT_MAX_WIDTH,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    config: Arc<WebConfig>,
    telemetry: Option<Arc<dyn TelemetrySink>>,
}

impl AppState {
    pub fn new(config: WebConfig, telemetry: Option<Box<dyn TelemetrySink>>) -> Self {
        Self {
            config: Arc::new(config),
            telemetry: telemetry.map(Arc::from),
        }
    }

    pub fn config(&self) -> &WebConfig {
        &self.config
    }

    pub fn telemetry(&self) -> Option<Arc<dyn TelemetrySink>> {
        self.telemetry.clone()
    }
}

pub fn create_router(state: AppState) -> Router {
    let body_limit = state.config().max_upload_bytes;
    Router::new()
        .route("/", get(handlers::index).post(handlers::convert))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `config.bind` and serve until Ctrl+C.
pub async fn start_server(config: WebConfig) -> Result<()> {
    let listener = TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("binding {}", config.bind))?;
    let state = AppState::new(config, veo_telemetry::sink_from_env());
    serve(listener, state).await
}

pub async fn serve(listener: TcpListener, state: AppState) -> Result<()> {
    tracing::info!("Veo converter listening on http://{}", listener.local_addr()?);
    axum::serve(listener, create_router(state).into_make_service())
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("failed to listen for shutdown signal: {e}");
                std::future::pending::<()>().await;
            }
            tracing::info!("Shutting down...");
        })
        .await?;
    Ok(())
}
