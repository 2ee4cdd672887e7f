use serde::{Deserialize, Serialize};

use crate::schedule::ScheduleCandidate;

/// A backend-confirmed reservation (seat held, not yet paid)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Reservation {
    pub reservation_id: String,
}

/// Result of one reservation attempt.
///
/// Build it through [`ReservationOutcome::won`] or [`ReservationOutcome::lost`]:
/// a won outcome always carries the reservation id and the schedule, a lost
/// one always carries a reason.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReservationOutcome {
    pub success: bool,
    pub reservation_id: Option<String>,
    pub message: String,
    pub won_schedule: Option<ScheduleCandidate>,
}

impl ReservationOutcome {
    pub fn won(reservation_id: impl Into<String>, schedule: ScheduleCandidate) -> Self {
        Self {
            success: true,
            reservation_id: Some(reservation_id.into()),
            message: "Reservation successful".to_string(),
            won_schedule: Some(schedule),
        }
    }

    pub fn lost(message: impl Into<String>) -> Self {
        Self {
            success: false,
            reservation_id: None,
            message: message.into(),
            won_schedule: None,
        }
    }

    pub fn train_number(&self) -> Option<&str> {
        self.won_schedule.as_ref().map(|s| s.train_number.as_str())
    }
}
