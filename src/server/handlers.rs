use super::errors::ApiError;
use super::wire::{GenerationResponse, ImageGenerationRequest, OkResponse, TextGenerationRequest};
use super::AppState;
use crate::models::GenerationRequest;
use crate::orchestrator::CallOptions;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

pub(super) async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(OkResponse { ok: true }))
}

pub(super) async fn generate_text(
    State(state): State<AppState>,
    payload: Result<Json<TextGenerationRequest>, JsonRejection>,
) -> Result<Json<GenerationResponse>, ApiError> {
    let Json(payload) = payload?;
    let request = payload.into_generation_request(&state.defaults)?;
    run(&state, request).await
}

pub(super) async fn generate_image(
    State(state): State<AppState>,
    payload: Result<Json<ImageGenerationRequest>, JsonRejection>,
) -> Result<Json<GenerationResponse>, ApiError> {
    let Json(payload) = payload?;
    let request = payload.into_generation_request(&state.defaults)?;
    run(&state, request).await
}

async fn run(
    state: &AppState,
    request: GenerationRequest,
) -> Result<Json<GenerationResponse>, ApiError> {
    let mut options = CallOptions::default().with_cancellation(state.shutdown.child_token());
    if let Some(deadline) = state.request_timeout {
        options = options.with_deadline(deadline);
    }

    let result = state.orchestrator.run_with(&request, options).await?;
    Ok(Json(GenerationResponse::from_result(
        result,
        state.structured_output_mode,
    )))
}
