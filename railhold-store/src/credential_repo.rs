use async_trait::async_trait;
use railhold_core::{CoreResult, CredentialStore, CreditCardInfo, LoginCredentials, TrainType};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

/// Process-local credential store. Nothing outlives the process.
#[derive(Default)]
pub struct InMemoryCredentialStore {
    logins: RwLock<HashMap<TrainType, LoginCredentials>>,
    card: RwLock<Option<CreditCardInfo>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn load_login(&self, train_type: TrainType) -> CoreResult<Option<LoginCredentials>> {
        Ok(self.logins.read().await.get(&train_type).cloned())
    }

    async fn save_login(&self, train_type: TrainType, credentials: &LoginCredentials) -> CoreResult<()> {
        debug!(backend = %train_type, user = %credentials.user_id, "Saving login");
        self.logins.write().await.insert(train_type, credentials.clone());
        Ok(())
    }

    async fn delete_login(&self, train_type: TrainType) -> CoreResult<bool> {
        Ok(self.logins.write().await.remove(&train_type).is_some())
    }

    async fn load_card(&self) -> CoreResult<Option<CreditCardInfo>> {
        Ok(self.card.read().await.clone())
    }

    async fn save_card(&self, card: &CreditCardInfo) -> CoreResult<()> {
        debug!(card = ?card.number, "Saving payment card");
        *self.card.write().await = Some(card.clone());
        Ok(())
    }

    async fn delete_card(&self) -> CoreResult<bool> {
        Ok(self.card.write().await.take().is_some())
    }
}
