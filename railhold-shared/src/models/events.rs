use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// One line of a run journal. `seq` is strictly increasing within a process.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct RunLogEvent {
    pub seq: u64,
    pub backend: String,
    pub level: LogLevel,
    pub message: String,
    pub logged_at: DateTime<Utc>,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct ReservationWonEvent {
    pub run_id: Uuid,
    pub backend: String,
    pub reservation_id: String,
    pub train_number: String,
    pub attempt: u64,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct AlertRaisedEvent {
    pub run_id: Uuid,
    pub backend: String,
    pub reservation_id: Option<String>,
    pub reason: String,
    pub timestamp: i64,
}
