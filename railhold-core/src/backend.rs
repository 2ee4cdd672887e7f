use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};

use crate::passenger::PassengerGroup;
use crate::payment::CreditCardInfo;
use crate::request::ReservationRequest;
use crate::reservation::Reservation;
use crate::schedule::{ScheduleCandidate, SeatFlags, TrainType};
use crate::seat::SeatClass;

#[derive(Debug, Clone, thiserror::Error)]
pub enum BackendError {
    #[error("not logged in")]
    NotLoggedIn,
    #[error("network failure: {0}")]
    Network(String),
    #[error("unexpected response: {0}")]
    Protocol(String),
    #[error("rejected by backend: {0}")]
    Rejected(String),
}

/// Search criteria sent to a rail backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub departure_station: String,
    pub arrival_station: String,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub passengers: Vec<PassengerGroup>,
    pub train_type: TrainType,
}

impl SearchQuery {
    pub fn from_request(request: &ReservationRequest) -> Self {
        Self {
            departure_station: request.departure_station.clone(),
            arrival_station: request.arrival_station.clone(),
            date: request.departure_date,
            time: request.departure_time,
            passengers: request.passengers.clone(),
            train_type: request.train_type,
        }
    }
}

/// Capability interface a rail backend (KTX, SRT) exposes to the booking core.
///
/// Calls are awaited one at a time by a single worker; implementations keep
/// their session state behind interior mutability.
#[async_trait]
pub trait RailBackend: Send + Sync {
    fn train_type(&self) -> TrainType;

    /// Authenticate; `Ok(false)` means the credentials were refused
    async fn login(&self, user_id: &str, password: &str) -> Result<bool, BackendError>;

    async fn logout(&self) -> Result<bool, BackendError>;

    /// Live availability for the given criteria
    async fn search(&self, query: &SearchQuery) -> Result<Vec<ScheduleCandidate>, BackendError>;

    /// Seat inventory of a schedule returned by `search`
    fn seat_flags(&self, schedule: &ScheduleCandidate) -> SeatFlags {
        schedule.seats
    }

    /// Try to hold seats on one train; `Ok(None)` means the seats were gone
    async fn reserve(
        &self,
        schedule: &ScheduleCandidate,
        passengers: &[PassengerGroup],
        seat_class: SeatClass,
    ) -> Result<Option<Reservation>, BackendError>;

    /// Pay a held reservation; `Ok(false)` means the payment was declined
    async fn pay(&self, reservation_id: &str, card: &CreditCardInfo) -> Result<bool, BackendError>;

    /// Discard and recreate the client session (requires a fresh login)
    async fn reset_session(&self) -> Result<(), BackendError>;
}
