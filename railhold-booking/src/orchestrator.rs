use railhold_core::{CreditCardInfo, PaymentOutcome, RailBackend, ReservationOutcome};
use std::sync::Arc;
use tracing::{info, warn};

/// Pays a won reservation with the card the run was started with
pub struct PaymentStep {
    backend: Arc<dyn RailBackend>,
}

impl PaymentStep {
    pub fn new(backend: Arc<dyn RailBackend>) -> Self {
        Self { backend }
    }

    /// The card is checked locally first; an incomplete card never reaches
    /// the backend.
    pub async fn process(&self, outcome: &ReservationOutcome, card: Option<&CreditCardInfo>) -> PaymentOutcome {
        let Some(reservation_id) = outcome.reservation_id.as_deref().filter(|_| outcome.success) else {
            return PaymentOutcome::failed(None, "no reservation to pay");
        };

        let Some(card) = card else {
            warn!(reservation = %reservation_id, "No payment card available");
            return PaymentOutcome::failed(Some(reservation_id.to_string()), "no payment card on file");
        };

        if let Err(e) = card.validate() {
            warn!(reservation = %reservation_id, "Payment card rejected locally: {}", e);
            return PaymentOutcome::failed(Some(reservation_id.to_string()), format!("payment card invalid: {}", e));
        }

        match self.backend.pay(reservation_id, card).await {
            Ok(true) => {
                info!(reservation = %reservation_id, "Payment accepted");
                PaymentOutcome::paid(reservation_id)
            }
            Ok(false) => PaymentOutcome::failed(Some(reservation_id.to_string()), "Payment failed"),
            Err(e) => PaymentOutcome::failed(Some(reservation_id.to_string()), format!("payment error: {}", e)),
        }
    }
}
