pub mod alert;
pub mod attempt;
pub mod controller;
pub mod desk;
pub mod journal;
pub mod models;
pub mod orchestrator;
pub mod retry;

#[cfg(test)]
mod testing;

pub use alert::{AlertEscalation, AlertHandle, AlertSink, BellAlertSink, TracingAlertSink};
pub use attempt::AttemptEngine;
pub use controller::RunController;
pub use desk::RailDesk;
pub use journal::RunJournal;
pub use models::{RunError, RunPhase, RunSnapshot, RunState};
pub use orchestrator::PaymentStep;
pub use retry::RetryPolicy;
