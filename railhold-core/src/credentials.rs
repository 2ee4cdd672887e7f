use async_trait::async_trait;
use railhold_shared::Masked;
use serde::{Deserialize, Serialize};

use crate::payment::CreditCardInfo;
use crate::schedule::TrainType;
use crate::CoreResult;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoginCredentials {
    pub user_id: String,
    pub password: Masked<String>,
}

impl LoginCredentials {
    pub fn new(user_id: &str, password: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            password: password.into(),
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.user_id.trim().is_empty() && !self.password.is_blank()
    }
}

/// Storage for remembered logins (one per backend) and the payment card
/// (shared by both backends).
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn load_login(&self, train_type: TrainType) -> CoreResult<Option<LoginCredentials>>;

    async fn save_login(&self, train_type: TrainType, credentials: &LoginCredentials) -> CoreResult<()>;

    /// Returns true when something was deleted
    async fn delete_login(&self, train_type: TrainType) -> CoreResult<bool>;

    async fn load_card(&self) -> CoreResult<Option<CreditCardInfo>>;

    async fn save_card(&self, card: &CreditCardInfo) -> CoreResult<()>;

    async fn delete_card(&self) -> CoreResult<bool>;
}
