use chrono::{DateTime, Utc};
use railhold_core::{BackendError, TrainType};
use railhold_shared::models::events::ReservationWonEvent;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Phase of a backend's reservation run
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunPhase {
    #[default]
    Idle,
    Running,
    Paying,
    Succeeded,
    Stopped,
    AwaitingPaymentAlert,
}

impl RunPhase {
    pub fn is_finished(&self) -> bool {
        matches!(self, RunPhase::Succeeded | RunPhase::Stopped)
    }
}

/// Mutable run bookkeeping, written only by the worker that owns the run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunState {
    pub running: bool,
    pub attempt_count: u64,
    pub alert_active: bool,
}

/// Read-only view of a backend's run, published by its worker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSnapshot {
    pub backend: TrainType,
    pub run_id: Option<Uuid>,
    pub phase: RunPhase,
    pub running: bool,
    pub attempt_count: u64,
    pub alert_active: bool,
    pub reservation_id: Option<String>,
    pub won: Option<ReservationWonEvent>,
    pub last_message: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl RunSnapshot {
    pub fn idle(backend: TrainType) -> Self {
        Self {
            backend,
            run_id: None,
            phase: RunPhase::Idle,
            running: false,
            attempt_count: 0,
            alert_active: false,
            reservation_id: None,
            won: None,
            last_message: None,
            started_at: None,
            updated_at: Utc::now(),
        }
    }

    pub fn started(backend: TrainType, run_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            run_id: Some(run_id),
            phase: RunPhase::Running,
            running: true,
            started_at: Some(now),
            updated_at: now,
            ..Self::idle(backend)
        }
    }

    pub(crate) fn apply(&mut self, phase: RunPhase, state: &RunState) {
        self.phase = phase;
        self.running = state.running;
        self.attempt_count = state.attempt_count;
        self.alert_active = state.alert_active;
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("Select at least one train")]
    NoCandidates,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("{found} trains cannot be booked through the {expected} desk")]
    TrainTypeMismatch {
        expected: TrainType,
        found: TrainType,
    },

    #[error("A {0} run is already active")]
    AlreadyRunning(TrainType),

    #[error("No active {0} run")]
    NoActiveRun(TrainType),

    #[error("Sign in to {0} first")]
    NotSignedIn(TrainType),

    #[error("{0} refused the login")]
    AuthenticationFailed(TrainType),

    #[error("No {0} alert to acknowledge")]
    NoActiveAlert(TrainType),

    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Storage error: {0}")]
    Storage(String),
}
