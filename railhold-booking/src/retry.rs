//! The polling loop behind a reservation run.

use chrono::Utc;
use rand::Rng;
use railhold_core::{
    CreditCardInfo, LoginCredentials, RailBackend, ReservationOutcome, ReservationRequest, ScheduleCandidate,
};
use railhold_shared::models::events::{AlertRaisedEvent, ReservationWonEvent};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::alert::AlertEscalation;
use crate::attempt::AttemptEngine;
use crate::journal::RunJournal;
use crate::models::{RunPhase, RunSnapshot, RunState};
use crate::orchestrator::PaymentStep;

pub const DEFAULT_SESSION_RESET_EVERY: u64 = 500;

/// Inter-attempt delay bounds and the session reset period
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub delay_min: Duration,
    pub delay_max: Duration,
    /// Reset the backend session on every attempt that is a multiple of this;
    /// zero disables resets
    pub session_reset_every: u64,
}

impl RetryPolicy {
    pub fn from_millis(delay_min_ms: u64, delay_max_ms: u64, session_reset_every: u64) -> Self {
        let (lo, hi) = if delay_min_ms <= delay_max_ms {
            (delay_min_ms, delay_max_ms)
        } else {
            (delay_max_ms, delay_min_ms)
        };
        Self {
            delay_min: Duration::from_millis(lo),
            delay_max: Duration::from_millis(hi),
            session_reset_every,
        }
    }

    /// Uniform in `[delay_min, delay_max]`
    pub fn jittered_delay(&self) -> Duration {
        let lo = self.delay_min.as_millis() as u64;
        let hi = self.delay_max.as_millis() as u64;
        if hi <= lo {
            return self.delay_min;
        }
        Duration::from_millis(rand::thread_rng().gen_range(lo..=hi))
    }

    pub fn is_reset_due(&self, attempt: u64) -> bool {
        self.session_reset_every > 0 && attempt > 0 && attempt % self.session_reset_every == 0
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_millis(1000, 2000, DEFAULT_SESSION_RESET_EVERY)
    }
}

/// Everything a run needs that the caller decided when starting it
pub(crate) struct RunPlan {
    pub run_id: Uuid,
    pub selected: Vec<ScheduleCandidate>,
    pub request: ReservationRequest,
    pub card: Option<CreditCardInfo>,
    pub credentials: LoginCredentials,
}

/// Signals from the caller; the worker only reads them
pub(crate) struct RunSignals {
    pub stop: watch::Receiver<bool>,
    pub ack: watch::Receiver<bool>,
}

/// Owns the [`RunState`] of one run and drives it to a terminal phase
pub(crate) struct ReservationWorker {
    backend: Arc<dyn RailBackend>,
    engine: AttemptEngine,
    payment: PaymentStep,
    alerts: AlertEscalation,
    journal: Arc<RunJournal>,
    policy: RetryPolicy,
    plan: RunPlan,
    signals: RunSignals,
    status: Arc<watch::Sender<RunSnapshot>>,
    state: RunState,
}

impl ReservationWorker {
    pub fn new(
        backend: Arc<dyn RailBackend>,
        alerts: AlertEscalation,
        journal: Arc<RunJournal>,
        policy: RetryPolicy,
        plan: RunPlan,
        signals: RunSignals,
        status: Arc<watch::Sender<RunSnapshot>>,
    ) -> Self {
        Self {
            engine: AttemptEngine::new(backend.clone()),
            payment: PaymentStep::new(backend.clone()),
            backend,
            alerts,
            journal,
            policy,
            plan,
            signals,
            status,
            state: RunState::default(),
        }
    }

    fn label(&self) -> &'static str {
        self.backend.train_type().as_str()
    }

    fn publish(&self, phase: RunPhase, message: Option<String>) {
        let state = self.state.clone();
        self.status.send_modify(|snapshot| {
            snapshot.apply(phase, &state);
            if message.is_some() {
                snapshot.last_message = message;
            }
        });
    }

    /// A dropped controller counts as a stop
    fn stop_requested(&self) -> bool {
        *self.signals.stop.borrow() || self.signals.stop.has_changed().is_err()
    }

    fn finish(&mut self, phase: RunPhase, message: String) -> RunPhase {
        self.state.running = false;
        self.state.alert_active = false;
        self.publish(phase, Some(message));
        phase
    }

    fn stopped_by_user(&mut self) -> RunPhase {
        let message = format!("Stopped after {} attempt(s)", self.state.attempt_count);
        self.journal.info(self.label(), message.clone());
        self.finish(RunPhase::Stopped, message)
    }

    pub async fn run(mut self) -> RunPhase {
        self.state.running = true;
        let trains: Vec<&str> = self.plan.selected.iter().map(|s| s.train_number.as_str()).collect();
        self.journal.info(
            self.label(),
            format!("Run {} started for train(s) {}", self.plan.run_id, trains.join(", ")),
        );
        self.publish(RunPhase::Running, None);

        loop {
            if self.stop_requested() {
                return self.stopped_by_user();
            }

            self.state.attempt_count += 1;
            let attempt = self.state.attempt_count;
            self.publish(RunPhase::Running, None);

            if self.policy.is_reset_due(attempt) {
                if let Err(reason) = self.reset_session(attempt).await {
                    self.journal.error(self.label(), reason.clone());
                    return self.finish(RunPhase::Stopped, reason);
                }
            }

            let outcome = self.engine.attempt(&self.plan.selected, &self.plan.request).await;
            if outcome.success {
                return self.settle(outcome).await;
            }

            self.journal.info(self.label(), format!("Attempt {}: {}", attempt, outcome.message));
            self.publish(RunPhase::Running, Some(outcome.message));

            if self.stop_requested() {
                return self.stopped_by_user();
            }

            let delay = self.policy.jittered_delay();
            debug!(backend = self.label(), attempt, delay_ms = delay.as_millis() as u64, "Backing off");
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                // Wake early; the flag itself is read at the top of the loop
                _ = self.signals.stop.changed() => {}
            }
        }
    }

    /// Recreate the backend session and sign in again with the run's
    /// credentials. An `Err` carries the reason the run must stop.
    async fn reset_session(&self, attempt: u64) -> Result<(), String> {
        self.journal.info(self.label(), format!("Attempt {}: recreating session", attempt));

        if let Err(e) = self.backend.reset_session().await {
            warn!(backend = self.label(), "Session reset failed, signing in anyway: {}", e);
        }

        let credentials = &self.plan.credentials;
        match self.backend.login(&credentials.user_id, credentials.password.expose()).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(format!(
                "Re-authentication as {} was refused; sign in again before restarting",
                credentials.user_id
            )),
            Err(e) => Err(format!("Re-authentication failed: {}", e)),
        }
    }

    async fn settle(&mut self, outcome: ReservationOutcome) -> RunPhase {
        let reservation_id = outcome.reservation_id.clone().unwrap_or_default();
        let train_number = outcome.train_number().unwrap_or_default().to_string();
        self.journal.info(
            self.label(),
            format!(
                "Attempt {}: reserved train {} (reservation {})",
                self.state.attempt_count, train_number, reservation_id
            ),
        );

        let won = ReservationWonEvent {
            run_id: self.plan.run_id,
            backend: self.label().to_string(),
            reservation_id: reservation_id.clone(),
            train_number,
            attempt: self.state.attempt_count,
            timestamp: Utc::now().timestamp(),
        };
        self.status.send_modify(|snapshot| {
            snapshot.reservation_id = Some(reservation_id.clone());
            snapshot.won = Some(won);
        });
        self.publish(RunPhase::Paying, Some(outcome.message.clone()));

        let payment = self.payment.process(&outcome, self.plan.card.as_ref()).await;
        if payment.success {
            let message = format!("Reservation {} paid", reservation_id);
            self.journal.info(self.label(), message.clone());
            return self.finish(RunPhase::Succeeded, message);
        }

        // The seat stays held on the backend; only the user can finish the
        // payment now
        self.journal.error(
            self.label(),
            format!("Reservation {} is held but unpaid: {}", reservation_id, payment.message),
        );
        self.state.running = false;
        self.state.alert_active = true;
        self.publish(RunPhase::AwaitingPaymentAlert, Some(payment.message.clone()));

        let handle = self.alerts.raise(AlertRaisedEvent {
            run_id: self.plan.run_id,
            backend: self.label().to_string(),
            reservation_id: payment.reservation_id.clone(),
            reason: payment.message,
            timestamp: Utc::now().timestamp(),
        });

        // A stop sent while paying only ended the retrying; the alert waits
        // for an acknowledgement or a stop sent after it went up
        if *self.signals.stop.borrow_and_update() {
            self.journal.warn(
                self.label(),
                "Stop arrived during payment; alert stays on until acknowledged",
            );
        }

        tokio::select! {
            _ = until_set(&mut self.signals.ack) => {}
            _ = next_stop(&mut self.signals.stop) => {}
        }

        let beats = handle.acknowledge().await;
        let message = format!("Alert acknowledged after {} notification(s)", beats);
        self.journal.info(self.label(), message.clone());
        self.finish(RunPhase::Stopped, message)
    }
}

/// Resolves once the flag reads true or its sender is gone
async fn until_set(flag: &mut watch::Receiver<bool>) {
    loop {
        let set = *flag.borrow_and_update();
        if set || flag.changed().await.is_err() {
            return;
        }
    }
}

/// Resolves on the first stop sent after the last seen value, or once the
/// sender is gone
async fn next_stop(flag: &mut watch::Receiver<bool>) {
    while flag.changed().await.is_ok() {
        if *flag.borrow_and_update() {
            return;
        }
    }
}
