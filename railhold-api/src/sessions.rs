use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use railhold_booking::RunController;
use railhold_core::{LoginCredentials, TrainType};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::AppError;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/{backend}/session", post(sign_in).delete(sign_out))
}

/// Resolve the `{backend}` path segment (`ktx` / `srt`)
pub(crate) fn controller(state: &AppState, backend: &str) -> Result<Arc<RunController>, AppError> {
    let train_type =
        TrainType::parse(backend).ok_or_else(|| AppError::NotFoundError(format!("Unknown backend: {}", backend)))?;
    Ok(state.desk.controller(train_type).clone())
}

#[derive(Debug, Deserialize)]
pub struct SignInRequest {
    pub user_id: String,
    pub password: String,
    #[serde(default)]
    pub remember: bool,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub backend: TrainType,
    pub signed_in: bool,
}

pub async fn sign_in(
    State(state): State<AppState>,
    Path(backend): Path<String>,
    Json(req): Json<SignInRequest>,
) -> Result<Json<SessionResponse>, AppError> {
    let controller = controller(&state, &backend)?;
    controller
        .sign_in(LoginCredentials::new(&req.user_id, &req.password), req.remember)
        .await?;

    Ok(Json(SessionResponse {
        backend: controller.train_type(),
        signed_in: true,
    }))
}

pub async fn sign_out(
    State(state): State<AppState>,
    Path(backend): Path<String>,
) -> Result<Json<SessionResponse>, AppError> {
    let controller = controller(&state, &backend)?;
    controller.sign_out().await?;

    Ok(Json(SessionResponse {
        backend: controller.train_type(),
        signed_in: false,
    }))
}
