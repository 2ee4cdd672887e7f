use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use railhold_booking::RunSnapshot;
use railhold_core::passenger::from_counts;
use railhold_core::request::{parse_departure_date, parse_departure_time};
use railhold_core::{CreditCardInfo, ReservationRequest, ScheduleCandidate, SeatPreference, TrainType};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::error::AppError;
use crate::sessions::controller;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/{backend}/search", post(search))
        .route("/v1/{backend}/runs", post(start_run).get(run_status))
        .route("/v1/{backend}/runs/stop", post(stop_run))
        .route("/v1/{backend}/alert/ack", post(acknowledge_alert))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Trip criteria as typed by the user; date is `YYYYMMDD` or `YYYY-MM-DD`,
/// time is `HHMM` or `HHMMSS`
#[derive(Debug, Clone, Deserialize)]
pub struct TripRequest {
    pub departure_station: String,
    pub arrival_station: String,
    pub departure_date: String,
    pub departure_time: String,
    #[serde(default = "one_adult")]
    pub adults: u32,
    #[serde(default)]
    pub children: u32,
    #[serde(default)]
    pub seniors: u32,
    #[serde(default)]
    pub seat_preference: SeatPreference,
}

fn one_adult() -> u32 {
    1
}

impl TripRequest {
    fn into_request(self, train_type: TrainType) -> Result<ReservationRequest, AppError> {
        Ok(ReservationRequest {
            departure_date: parse_departure_date(&self.departure_date)?,
            departure_time: parse_departure_time(&self.departure_time)?,
            departure_station: self.departure_station,
            arrival_station: self.arrival_station,
            passengers: from_counts(self.adults, self.children, self.seniors),
            train_type,
            seat_preference: self.seat_preference,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub candidates: Vec<ScheduleCandidate>,
}

#[derive(Debug, Deserialize)]
pub struct StartRunRequest {
    pub selected: Vec<ScheduleCandidate>,
    pub request: TripRequest,
    #[serde(default)]
    pub card: Option<CreditCardInfo>,
    #[serde(default)]
    pub auto_save: bool,
}

#[derive(Debug, Serialize)]
pub struct RunResponse {
    pub run_id: Uuid,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn search(
    State(state): State<AppState>,
    Path(backend): Path<String>,
    Json(req): Json<TripRequest>,
) -> Result<Json<SearchResponse>, AppError> {
    let controller = controller(&state, &backend)?;
    let request = req.into_request(controller.train_type())?;

    let candidates = controller.search(&request).await?;
    Ok(Json(SearchResponse { candidates }))
}

pub async fn start_run(
    State(state): State<AppState>,
    Path(backend): Path<String>,
    Json(req): Json<StartRunRequest>,
) -> Result<Json<RunResponse>, AppError> {
    let controller = controller(&state, &backend)?;
    let request = req.request.into_request(controller.train_type())?;

    let run_id = controller
        .start_run(req.selected, request, req.card, req.auto_save)
        .await?;
    info!(backend = %controller.train_type(), %run_id, "Run started via API");

    Ok(Json(RunResponse { run_id }))
}

pub async fn stop_run(
    State(state): State<AppState>,
    Path(backend): Path<String>,
) -> Result<Json<RunResponse>, AppError> {
    let run_id = controller(&state, &backend)?.stop_run().await?;
    Ok(Json(RunResponse { run_id }))
}

pub async fn acknowledge_alert(
    State(state): State<AppState>,
    Path(backend): Path<String>,
) -> Result<Json<RunResponse>, AppError> {
    let run_id = controller(&state, &backend)?.acknowledge_alert().await?;
    Ok(Json(RunResponse { run_id }))
}

pub async fn run_status(
    State(state): State<AppState>,
    Path(backend): Path<String>,
) -> Result<Json<RunSnapshot>, AppError> {
    Ok(Json(controller(&state, &backend)?.status()))
}
