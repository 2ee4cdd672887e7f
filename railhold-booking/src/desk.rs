use railhold_core::TrainType;
use std::sync::Arc;

use crate::controller::RunController;
use crate::journal::RunJournal;

/// The two independent backend controllers plus the journal they share
pub struct RailDesk {
    ktx: Arc<RunController>,
    srt: Arc<RunController>,
    journal: Arc<RunJournal>,
}

impl RailDesk {
    pub fn new(ktx: RunController, srt: RunController, journal: Arc<RunJournal>) -> Self {
        Self {
            ktx: Arc::new(ktx),
            srt: Arc::new(srt),
            journal,
        }
    }

    pub fn controller(&self, train_type: TrainType) -> &Arc<RunController> {
        match train_type {
            TrainType::Ktx => &self.ktx,
            TrainType::Srt => &self.srt,
        }
    }

    pub fn controllers(&self) -> [&Arc<RunController>; 2] {
        TrainType::ALL.map(|train_type| self.controller(train_type))
    }

    pub fn journal(&self) -> &Arc<RunJournal> {
        &self.journal
    }

    /// Sign every backend in with its stored login; returns the backends
    /// that were restored
    pub async fn restore_sessions(&self) -> Vec<TrainType> {
        let mut restored = Vec::new();
        for controller in self.controllers() {
            match controller.restore_session().await {
                Ok(true) => restored.push(controller.train_type()),
                Ok(false) => {}
                Err(e) => {
                    self.journal
                        .warn(controller.train_type().as_str(), format!("Stored login not restored: {}", e));
                }
            }
        }
        restored
    }
}
