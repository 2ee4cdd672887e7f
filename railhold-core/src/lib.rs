pub mod backend;
pub mod credentials;
pub mod passenger;
pub mod payment;
pub mod request;
pub mod reservation;
pub mod schedule;
pub mod seat;

pub use backend::{BackendError, RailBackend, SearchQuery};
pub use credentials::{CredentialStore, LoginCredentials};
pub use passenger::{PassengerGroup, PassengerKind};
pub use payment::{CardType, CardValidationError, CreditCardInfo, PaymentOutcome};
pub use request::ReservationRequest;
pub use reservation::{Reservation, ReservationOutcome};
pub use schedule::{ScheduleCandidate, SeatFlags, TrainType};
pub use seat::{resolve_seat_class, SeatClass, SeatPreference};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Validation failed: {0}")]
    ValidationError(String),
    #[error("Storage error: {0}")]
    StorageError(String),
    #[error("Internal error: {0}")]
    InternalError(String),
}

pub type CoreResult<T> = Result<T, CoreError>;
