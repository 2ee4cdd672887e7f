use railhold_shared::Masked;
use serde::{Deserialize, Serialize};

/// Card type code understood by both rail backends
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CardType {
    Personal,
    Corporate,
}

impl CardType {
    pub fn code(&self) -> &'static str {
        match self {
            CardType::Personal => "J",
            CardType::Corporate => "S",
        }
    }
}

/// Locally entered payment card.
///
/// Personal cards are verified with the holder's birth date (YYMMDD),
/// corporate cards with the business registration number.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreditCardInfo {
    pub number: Masked<String>,
    pub password: Masked<String>,
    /// YYMM
    pub expiry: String,
    #[serde(default)]
    pub birth_date: Option<Masked<String>>,
    #[serde(default)]
    pub business_id: Option<Masked<String>>,
    #[serde(default)]
    pub corporate: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CardValidationError {
    #[error("card number is missing")]
    MissingNumber,
    #[error("card password is missing")]
    MissingPassword,
    #[error("card expiry (YYMM) is missing")]
    MissingExpiry,
    #[error("birth date (YYMMDD) is required for a personal card")]
    MissingBirthDate,
    #[error("business registration number is required for a corporate card")]
    MissingBusinessId,
    #[error("only one of birth date or business number may be set")]
    AmbiguousHolderProof,
}

fn present(value: &Option<Masked<String>>) -> bool {
    value.as_ref().map(|v| !v.is_blank()).unwrap_or(false)
}

impl CreditCardInfo {
    pub fn personal(number: &str, password: &str, expiry: &str, birth_date: &str) -> Self {
        Self {
            number: number.into(),
            password: password.into(),
            expiry: expiry.to_string(),
            birth_date: Some(birth_date.into()),
            business_id: None,
            corporate: false,
        }
    }

    pub fn corporate(number: &str, password: &str, expiry: &str, business_id: &str) -> Self {
        Self {
            number: number.into(),
            password: password.into(),
            expiry: expiry.to_string(),
            birth_date: None,
            business_id: Some(business_id.into()),
            corporate: true,
        }
    }

    /// Completeness check run before any payment call
    pub fn validate(&self) -> Result<(), CardValidationError> {
        if self.number.is_blank() {
            return Err(CardValidationError::MissingNumber);
        }
        if self.password.is_blank() {
            return Err(CardValidationError::MissingPassword);
        }
        if self.expiry.trim().is_empty() {
            return Err(CardValidationError::MissingExpiry);
        }

        match (self.corporate, present(&self.birth_date), present(&self.business_id)) {
            (_, true, true) => Err(CardValidationError::AmbiguousHolderProof),
            (false, false, _) => Err(CardValidationError::MissingBirthDate),
            (true, _, false) => Err(CardValidationError::MissingBusinessId),
            _ => Ok(()),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    pub fn card_type(&self) -> CardType {
        if self.corporate {
            CardType::Corporate
        } else {
            CardType::Personal
        }
    }

    /// Birth date or business number, whichever matches the card type
    pub fn validation_number(&self) -> Option<&str> {
        let proof = if self.corporate { &self.business_id } else { &self.birth_date };
        proof.as_ref().map(|v| v.expose().as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaymentOutcome {
    pub success: bool,
    pub reservation_id: Option<String>,
    pub message: String,
}

impl PaymentOutcome {
    pub fn paid(reservation_id: impl Into<String>) -> Self {
        Self {
            success: true,
            reservation_id: Some(reservation_id.into()),
            message: "Payment successful".to_string(),
        }
    }

    pub fn failed(reservation_id: Option<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            reservation_id,
            message: message.into(),
        }
    }
}
