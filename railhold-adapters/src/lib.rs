pub mod korail;
pub mod ktx;
pub mod sandbox;
pub mod srt;
pub mod srt_client;

use chrono::NaiveDateTime;
use railhold_core::{BackendError, CreditCardInfo};

pub use ktx::KtxBackend;
pub use sandbox::{SandboxKorail, SandboxSrt, SandboxTimetable};
pub use srt::SrtBackend;

/// Failure raised by a wire client
#[derive(Debug, Clone, thiserror::Error)]
pub enum ClientError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("{0}")]
    Refused(String),
}

impl From<ClientError> for BackendError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::InvalidCredentials => BackendError::Rejected("invalid credentials".to_string()),
            ClientError::Connection(msg) => BackendError::Network(msg),
            ClientError::Malformed(msg) => BackendError::Protocol(msg),
            ClientError::Refused(msg) => BackendError::Rejected(msg),
        }
    }
}

/// Card fields in the shape both wire clients take them
#[derive(Debug, Clone)]
pub struct CardPayload {
    pub number: String,
    pub password: String,
    pub validation_number: String,
    pub expire: String,
    pub card_type: &'static str,
}

impl CardPayload {
    pub fn from_card(card: &CreditCardInfo) -> Self {
        Self {
            number: card.number.expose().clone(),
            password: card.password.expose().clone(),
            validation_number: card.validation_number().unwrap_or_default().to_string(),
            expire: card.expiry.clone(),
            card_type: card.card_type().code(),
        }
    }
}

/// Parse the `YYYYMMDD` + `HHMMSS` pair both backends report
pub(crate) fn parse_timestamp(date: &str, time: &str) -> Result<NaiveDateTime, BackendError> {
    let joined = format!("{}{}", date, time);
    NaiveDateTime::parse_from_str(&joined, "%Y%m%d%H%M%S")
        .map_err(|_| BackendError::Protocol(format!("unparseable timestamp {:?}", joined)))
}
