//! HTTP/JSON transport for the orchestrator.
//!
//! Two RPC-style endpoints map one-to-one onto [`Orchestrator::run_with`]:
//! text-only and text+image generation. A dropped connection drops the
//! handler future, which aborts the in-flight backend call.

use crate::config::{Config, StructuredOutputMode};
use crate::orchestrator::Orchestrator;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

mod errors;
mod handlers;
pub mod wire;

pub use errors::ApiError;
pub use wire::RequestDefaults;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Orchestrator,
    pub defaults: RequestDefaults,
    pub request_timeout: Option<Duration>,
    pub structured_output_mode: StructuredOutputMode,
    /// Inline images travel base64-encoded in the body, so this also bounds media size.
    pub max_body_bytes: usize,
    /// Cancelled when the process gives up waiting for in-flight calls.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator, config: &Config, shutdown: CancellationToken) -> Self {
        Self {
            orchestrator,
            defaults: RequestDefaults {
                model: config.default_model.clone(),
                temperature: config.default_temperature,
            },
            request_timeout: config.request_timeout,
            structured_output_mode: config.structured_output_mode,
            max_body_bytes: config.max_body_bytes,
            shutdown,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.max_body_bytes;
    Router::new()
        .route("/healthz", get(handlers::healthz))
        .route("/v1/generate/text", post(handlers::generate_text))
        .route("/v1/generate/image", post(handlers::generate_image))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}
