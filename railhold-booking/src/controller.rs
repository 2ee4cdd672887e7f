use railhold_core::schedule::sort_by_departure;
use railhold_core::{
    CredentialStore, CreditCardInfo, LoginCredentials, RailBackend, ReservationRequest, ScheduleCandidate,
    SearchQuery, TrainType,
};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use crate::alert::AlertEscalation;
use crate::journal::RunJournal;
use crate::models::{RunError, RunPhase, RunSnapshot};
use crate::retry::{ReservationWorker, RetryPolicy, RunPlan, RunSignals};

struct ActiveRun {
    run_id: Uuid,
    stop: watch::Sender<bool>,
    ack: watch::Sender<bool>,
    task: JoinHandle<RunPhase>,
}

impl ActiveRun {
    fn is_live(&self) -> bool {
        !self.task.is_finished()
    }
}

/// Caller-facing operations for one rail backend.
///
/// The controller starts at most one worker at a time and talks to it only
/// through the stop and acknowledge signals; run state is read back from the
/// snapshots the worker publishes.
pub struct RunController {
    backend: Arc<dyn RailBackend>,
    store: Arc<dyn CredentialStore>,
    journal: Arc<RunJournal>,
    policy: RetryPolicy,
    alerts: AlertEscalation,
    session: Mutex<Option<LoginCredentials>>,
    active: tokio::sync::Mutex<Option<ActiveRun>>,
    status: Arc<watch::Sender<RunSnapshot>>,
}

impl RunController {
    pub fn new(
        backend: Arc<dyn RailBackend>,
        store: Arc<dyn CredentialStore>,
        journal: Arc<RunJournal>,
        policy: RetryPolicy,
        alerts: AlertEscalation,
    ) -> Self {
        let (status, _) = watch::channel(RunSnapshot::idle(backend.train_type()));
        Self {
            backend,
            store,
            journal,
            policy,
            alerts,
            session: Mutex::new(None),
            active: tokio::sync::Mutex::new(None),
            status: Arc::new(status),
        }
    }

    pub fn train_type(&self) -> TrainType {
        self.backend.train_type()
    }

    fn label(&self) -> &'static str {
        self.train_type().as_str()
    }

    fn session(&self) -> Option<LoginCredentials> {
        self.session.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).clone()
    }

    fn set_session(&self, credentials: Option<LoginCredentials>) {
        *self.session.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = credentials;
    }

    pub fn is_signed_in(&self) -> bool {
        self.session().is_some()
    }

    async fn ensure_idle(&self) -> Result<(), RunError> {
        match self.active.lock().await.as_ref() {
            Some(run) if run.is_live() => Err(RunError::AlreadyRunning(self.train_type())),
            _ => Ok(()),
        }
    }

    /// Log in and keep the credentials for session resets. With `remember`
    /// the login is stored, otherwise any stored login is forgotten.
    pub async fn sign_in(&self, credentials: LoginCredentials, remember: bool) -> Result<(), RunError> {
        if !credentials.is_complete() {
            return Err(RunError::InvalidRequest("user id and password are required".to_string()));
        }
        self.ensure_idle().await?;

        let accepted = self
            .backend
            .login(&credentials.user_id, credentials.password.expose())
            .await?;
        if !accepted {
            self.set_session(None);
            self.journal.warn(self.label(), format!("Login refused for {}", credentials.user_id));
            return Err(RunError::AuthenticationFailed(self.train_type()));
        }

        self.journal.info(self.label(), format!("Signed in as {}", credentials.user_id));

        let stored = if remember {
            self.store.save_login(self.train_type(), &credentials).await
        } else {
            self.store.delete_login(self.train_type()).await.map(|_| ())
        };
        self.set_session(Some(credentials));
        stored.map_err(|e| RunError::Storage(e.to_string()))
    }

    /// Sign in with the stored login, if there is one
    pub async fn restore_session(&self) -> Result<bool, RunError> {
        let stored = self
            .store
            .load_login(self.train_type())
            .await
            .map_err(|e| RunError::Storage(e.to_string()))?;

        match stored {
            Some(credentials) => {
                self.sign_in(credentials, true).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub async fn sign_out(&self) -> Result<(), RunError> {
        self.ensure_idle().await?;
        self.backend.logout().await?;
        self.set_session(None);
        self.journal.info(self.label(), "Signed out");
        Ok(())
    }

    fn check_request(&self, request: &ReservationRequest) -> Result<(), RunError> {
        request.validate().map_err(|e| RunError::InvalidRequest(e.to_string()))?;
        if request.train_type != self.train_type() {
            return Err(RunError::TrainTypeMismatch {
                expected: self.train_type(),
                found: request.train_type,
            });
        }
        Ok(())
    }

    /// Candidates for a request, earliest departure first
    pub async fn search(&self, request: &ReservationRequest) -> Result<Vec<ScheduleCandidate>, RunError> {
        self.check_request(request)?;
        if !self.is_signed_in() {
            return Err(RunError::NotSignedIn(self.train_type()));
        }
        self.ensure_idle().await?;

        let mut candidates = self.backend.search(&SearchQuery::from_request(request)).await?;
        sort_by_departure(&mut candidates);
        self.journal.info(
            self.label(),
            format!(
                "Found {} train(s) {} -> {} on {}",
                candidates.len(),
                request.departure_station,
                request.arrival_station,
                request.departure_date
            ),
        );
        Ok(candidates)
    }

    /// Resolve the card for a run, saving a supplied one when asked to
    async fn run_card(&self, card: Option<CreditCardInfo>, auto_save: bool) -> Option<CreditCardInfo> {
        match card {
            Some(card) => {
                if auto_save && card.is_valid() {
                    if let Err(e) = self.store.save_card(&card).await {
                        warn!(backend = self.label(), "Could not save payment card: {}", e);
                    }
                }
                Some(card)
            }
            None => match self.store.load_card().await {
                Ok(stored) => stored,
                Err(e) => {
                    warn!(backend = self.label(), "Could not load payment card: {}", e);
                    None
                }
            },
        }
    }

    pub async fn start_run(
        &self,
        selected: Vec<ScheduleCandidate>,
        request: ReservationRequest,
        card: Option<CreditCardInfo>,
        auto_save: bool,
    ) -> Result<Uuid, RunError> {
        if selected.is_empty() {
            return Err(RunError::NoCandidates);
        }
        self.check_request(&request)?;
        if let Some(other) = selected.iter().find(|s| s.train_type != self.train_type()) {
            return Err(RunError::TrainTypeMismatch {
                expected: self.train_type(),
                found: other.train_type,
            });
        }

        let mut active = self.active.lock().await;
        if active.as_ref().is_some_and(ActiveRun::is_live) {
            return Err(RunError::AlreadyRunning(self.train_type()));
        }
        let credentials = self.session().ok_or(RunError::NotSignedIn(self.train_type()))?;

        let card = self.run_card(card, auto_save).await;
        if card.is_none() {
            self.journal.warn(self.label(), "No payment card; a won seat will need manual payment");
        }

        let run_id = Uuid::new_v4();
        let (stop_tx, stop_rx) = watch::channel(false);
        let (ack_tx, ack_rx) = watch::channel(false);
        self.status.send_replace(RunSnapshot::started(self.train_type(), run_id));

        let worker = ReservationWorker::new(
            self.backend.clone(),
            self.alerts.clone(),
            self.journal.clone(),
            self.policy,
            RunPlan {
                run_id,
                selected,
                request,
                card,
                credentials,
            },
            RunSignals { stop: stop_rx, ack: ack_rx },
            self.status.clone(),
        );

        info!(backend = self.label(), %run_id, "Starting run");
        *active = Some(ActiveRun {
            run_id,
            stop: stop_tx,
            ack: ack_tx,
            task: tokio::spawn(worker.run()),
        });

        Ok(run_id)
    }

    /// Ask the worker to stop; it does so at its next poll point
    pub async fn stop_run(&self) -> Result<Uuid, RunError> {
        let active = self.active.lock().await;
        match active.as_ref() {
            Some(run) if run.is_live() => {
                run.stop.send_replace(true);
                self.journal.info(self.label(), "Stop requested");
                Ok(run.run_id)
            }
            _ => Err(RunError::NoActiveRun(self.train_type())),
        }
    }

    pub async fn acknowledge_alert(&self) -> Result<Uuid, RunError> {
        let alert_active = self.status.borrow().alert_active;
        if !alert_active {
            return Err(RunError::NoActiveAlert(self.train_type()));
        }

        let active = self.active.lock().await;
        match active.as_ref() {
            Some(run) if run.is_live() => {
                run.ack.send_replace(true);
                Ok(run.run_id)
            }
            _ => Err(RunError::NoActiveAlert(self.train_type())),
        }
    }

    pub fn status(&self) -> RunSnapshot {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<RunSnapshot> {
        self.status.subscribe()
    }

    /// Wait until the current run publishes a snapshot matching `done`
    pub async fn wait_for<F>(&self, mut done: F) -> RunSnapshot
    where
        F: FnMut(&RunSnapshot) -> bool,
    {
        let mut rx = self.subscribe();
        loop {
            let snapshot = rx.borrow_and_update().clone();
            if done(&snapshot) || rx.changed().await.is_err() {
                return snapshot;
            }
        }
    }

    /// Wait until the current run has succeeded or stopped
    pub async fn settled(&self) -> RunSnapshot {
        self.wait_for(|s| s.phase.is_finished()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::TracingAlertSink;
    use crate::attempt::NO_SEATS_MESSAGE;
    use crate::testing::{request, train, valid_card, Call, CountingSink, ScriptedBackend};
    use railhold_core::{BackendError, SeatClass, SeatPreference};
    use railhold_shared::models::events::LogLevel;
    use railhold_store::InMemoryCredentialStore;
    use std::time::Duration;

    struct Fixture {
        backend: Arc<ScriptedBackend>,
        store: Arc<InMemoryCredentialStore>,
        journal: Arc<RunJournal>,
        controller: RunController,
    }

    fn fixture_with(backend: ScriptedBackend, policy: RetryPolicy, alerts: AlertEscalation) -> Fixture {
        let backend = Arc::new(backend);
        let store = Arc::new(InMemoryCredentialStore::new());
        let journal = Arc::new(RunJournal::new());
        let controller = RunController::new(backend.clone(), store.clone(), journal.clone(), policy, alerts);
        Fixture {
            backend,
            store,
            journal,
            controller,
        }
    }

    fn fixture(backend: ScriptedBackend) -> Fixture {
        fixture_with(
            backend,
            RetryPolicy::from_millis(1000, 2000, 500),
            AlertEscalation::new(Arc::new(TracingAlertSink), Duration::from_secs(1)),
        )
    }

    async fn signed_in(backend: ScriptedBackend) -> Fixture {
        let f = fixture(backend);
        f.controller.sign_in(LoginCredentials::new("member", "pw"), false).await.unwrap();
        f
    }

    fn sold_out() -> Vec<ScheduleCandidate> {
        vec![train("101", 10, 0, false, false)]
    }

    #[tokio::test]
    async fn test_start_run_rejects_bad_input() {
        let f = fixture(ScriptedBackend::new(TrainType::Ktx));
        let req = request(SeatPreference::GeneralOnly);

        assert!(matches!(
            f.controller.start_run(vec![], req.clone(), None, false).await,
            Err(RunError::NoCandidates)
        ));
        assert!(matches!(
            f.controller.start_run(sold_out(), req.clone(), None, false).await,
            Err(RunError::NotSignedIn(TrainType::Ktx))
        ));

        let mut srt_train = train("301", 10, 0, false, true);
        srt_train.train_type = TrainType::Srt;
        assert!(matches!(
            f.controller.start_run(vec![srt_train], req.clone(), None, false).await,
            Err(RunError::TrainTypeMismatch { found: TrainType::Srt, .. })
        ));

        let mut same_station = req.clone();
        same_station.arrival_station = same_station.departure_station.clone();
        assert!(matches!(
            f.controller.start_run(sold_out(), same_station, None, false).await,
            Err(RunError::InvalidRequest(_))
        ));

        assert!(f.backend.calls().is_empty());
        assert_eq!(f.controller.status().phase, RunPhase::Idle);
    }

    #[tokio::test]
    async fn test_sign_in_remembers_or_forgets() {
        let f = fixture(ScriptedBackend::new(TrainType::Ktx));

        f.controller.sign_in(LoginCredentials::new("member", "pw"), true).await.unwrap();
        assert!(f.store.load_login(TrainType::Ktx).await.unwrap().is_some());

        f.controller.sign_in(LoginCredentials::new("member", "pw"), false).await.unwrap();
        assert!(f.store.load_login(TrainType::Ktx).await.unwrap().is_none());
        assert!(f.controller.is_signed_in());

        assert!(matches!(
            f.controller.sign_in(LoginCredentials::new("", "pw"), false).await,
            Err(RunError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_refused_login_clears_session() {
        let f = fixture(ScriptedBackend::new(TrainType::Ktx).with_login(|n| Ok(n == 1)));
        f.controller.sign_in(LoginCredentials::new("member", "pw"), false).await.unwrap();

        let refused = f.controller.sign_in(LoginCredentials::new("member", "wrong"), false).await;
        assert!(matches!(refused, Err(RunError::AuthenticationFailed(TrainType::Ktx))));
        assert!(!f.controller.is_signed_in());
    }

    #[tokio::test]
    async fn test_restore_session_uses_stored_login() {
        let f = fixture(ScriptedBackend::new(TrainType::Ktx));
        assert!(!f.controller.restore_session().await.unwrap());

        f.store.save_login(TrainType::Ktx, &LoginCredentials::new("member", "pw")).await.unwrap();
        assert!(f.controller.restore_session().await.unwrap());
        assert!(f.controller.is_signed_in());
        assert_eq!(f.backend.count(&Call::Login), 1);
    }

    #[tokio::test]
    async fn test_search_sorts_candidates() {
        let f = signed_in(
            ScriptedBackend::new(TrainType::Ktx)
                .with_trains(vec![train("111", 11, 0, false, true), train("105", 9, 0, false, false)]),
        )
        .await;

        let found = f.controller.search(&request(SeatPreference::GeneralOnly)).await.unwrap();
        assert_eq!(
            found.iter().map(|s| s.train_number.as_str()).collect::<Vec<_>>(),
            vec!["105", "111"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_run_pays_and_finishes() {
        let f = signed_in(ScriptedBackend::new(TrainType::Ktx).with_search(|n| {
            Ok(vec![train("101", 10, 0, false, n >= 3)])
        }))
        .await;

        f.controller
            .start_run(sold_out(), request(SeatPreference::GeneralOnly), Some(valid_card()), true)
            .await
            .unwrap();
        let done = f.controller.settled().await;

        assert_eq!(done.phase, RunPhase::Succeeded);
        assert_eq!(done.attempt_count, 3);
        assert!(!done.running);
        assert_eq!(done.reservation_id.as_deref(), Some("R-101"));
        assert_eq!(done.won.as_ref().map(|w| w.attempt), Some(3));
        assert_eq!(f.backend.count(&Call::Search), 3);
        assert_eq!(f.backend.calls().last(), Some(&Call::Pay("R-101".to_string())));
        // auto-saved
        assert!(f.store.load_card().await.unwrap().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_start_while_running_is_rejected() {
        let f = signed_in(ScriptedBackend::new(TrainType::Ktx).with_trains(sold_out())).await;
        let req = request(SeatPreference::GeneralOnly);

        f.controller.start_run(sold_out(), req.clone(), None, false).await.unwrap();
        assert!(matches!(
            f.controller.start_run(sold_out(), req, None, false).await,
            Err(RunError::AlreadyRunning(TrainType::Ktx))
        ));

        f.controller.stop_run().await.unwrap();
        assert_eq!(f.controller.settled().await.phase, RunPhase::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_during_backoff_prevents_further_calls() {
        let f = fixture_with(
            ScriptedBackend::new(TrainType::Ktx).with_trains(sold_out()),
            RetryPolicy::from_millis(10_000, 10_000, 500),
            AlertEscalation::new(Arc::new(TracingAlertSink), Duration::from_secs(1)),
        );
        f.controller.sign_in(LoginCredentials::new("member", "pw"), false).await.unwrap();

        f.controller
            .start_run(sold_out(), request(SeatPreference::GeneralOnly), None, false)
            .await
            .unwrap();
        // First attempt done, worker is asleep in its backoff
        tokio::time::sleep(Duration::from_secs(1)).await;
        let calls_at_stop = f.backend.calls().len();

        f.controller.stop_run().await.unwrap();
        let done = f.controller.settled().await;
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(done.phase, RunPhase::Stopped);
        assert_eq!(done.attempt_count, 1);
        assert_eq!(f.backend.calls().len(), calls_at_stop);
        assert_eq!(f.backend.count(&Call::Search), 1);
        assert!(matches!(f.controller.stop_run().await, Err(RunError::NoActiveRun(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_attempt_waits_within_bounds() {
        let f = signed_in(
            ScriptedBackend::new(TrainType::Ktx)
                .with_trains(vec![train("101", 10, 0, false, true)])
                .with_reserve(|_, _| Err(BackendError::Network("connection reset".to_string()))),
        )
        .await;

        f.controller
            .start_run(sold_out(), request(SeatPreference::GeneralOnly), None, false)
            .await
            .unwrap();
        let snapshot = f.controller.wait_for(|s| s.attempt_count >= 6).await;
        f.controller.stop_run().await.unwrap();
        f.controller.settled().await;

        assert!(snapshot.last_message.is_some());
        let searches: Vec<_> = f
            .backend
            .timed_calls()
            .into_iter()
            .filter(|(call, _)| *call == Call::Search)
            .map(|(_, at)| at)
            .collect();
        assert!(searches.len() >= 5);
        for pair in searches.windows(2) {
            let gap = pair[1] - pair[0];
            assert!(gap >= Duration::from_millis(1000), "gap {:?} below minimum", gap);
            assert!(gap <= Duration::from_millis(2001), "gap {:?} above maximum", gap);
        }
        assert!(f
            .journal
            .history()
            .iter()
            .any(|e| e.message.contains("connection reset")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_resets_exactly_on_threshold_multiples() {
        let f = fixture_with(
            ScriptedBackend::new(TrainType::Ktx).with_search(|n| {
                Ok(vec![train("101", 10, 0, false, n == 1200)])
            }),
            RetryPolicy::from_millis(1, 2, 500),
            AlertEscalation::new(Arc::new(TracingAlertSink), Duration::from_secs(1)),
        );
        f.controller.sign_in(LoginCredentials::new("member", "pw"), false).await.unwrap();

        f.controller
            .start_run(sold_out(), request(SeatPreference::GeneralOnly), Some(valid_card()), false)
            .await
            .unwrap();
        let done = f.controller.settled().await;

        assert_eq!(done.phase, RunPhase::Succeeded);
        assert_eq!(done.attempt_count, 1200);

        // Resets land right before the 500th and 1000th searches
        let calls = f.backend.calls();
        let mut searches_before = Vec::new();
        let mut searches = 0;
        for call in &calls {
            match call {
                Call::Search => searches += 1,
                Call::Reset => searches_before.push(searches),
                _ => {}
            }
        }
        assert_eq!(searches_before, vec![499, 999]);
        assert_eq!(searches, 1200);
        // sign-in plus one login per reset
        assert_eq!(f.backend.count(&Call::Login), 3);
        assert_eq!(f.backend.pay_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refused_reauthentication_stops_the_run() {
        let f = fixture_with(
            ScriptedBackend::new(TrainType::Ktx)
                .with_trains(sold_out())
                .with_login(|n| Ok(n == 1)),
            RetryPolicy::from_millis(10, 20, 3),
            AlertEscalation::new(Arc::new(TracingAlertSink), Duration::from_secs(1)),
        );
        f.controller.sign_in(LoginCredentials::new("member", "pw"), false).await.unwrap();

        f.controller
            .start_run(sold_out(), request(SeatPreference::GeneralOnly), None, false)
            .await
            .unwrap();
        let done = f.controller.settled().await;

        assert_eq!(done.phase, RunPhase::Stopped);
        assert_eq!(done.attempt_count, 3);
        assert_eq!(f.backend.count(&Call::Search), 2);
        assert!(f
            .journal
            .history()
            .iter()
            .any(|e| e.level == LogLevel::Error && e.message.contains("refused")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_card_escalates_without_paying() {
        let sink = Arc::new(CountingSink::default());
        let f = fixture_with(
            ScriptedBackend::new(TrainType::Ktx).with_trains(vec![train("101", 10, 0, false, true)]),
            RetryPolicy::from_millis(1000, 2000, 500),
            AlertEscalation::new(sink.clone(), Duration::from_secs(1)),
        );
        f.controller.sign_in(LoginCredentials::new("member", "pw"), false).await.unwrap();
        let incomplete = CreditCardInfo::personal("1234567812345678", "12", "2812", "");

        f.controller
            .start_run(sold_out(), request(SeatPreference::GeneralOnly), Some(incomplete), true)
            .await
            .unwrap();
        let alerting = f.controller.wait_for(|s| s.alert_active).await;

        assert_eq!(alerting.phase, RunPhase::AwaitingPaymentAlert);
        assert!(!alerting.running);
        assert_eq!(alerting.reservation_id.as_deref(), Some("R-101"));
        assert_eq!(f.backend.pay_calls(), 0);
        assert!(f.store.load_card().await.unwrap().is_none());

        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert!(sink.beats.lock().unwrap().len() >= 3);

        f.controller.acknowledge_alert().await.unwrap();
        let done = f.controller.settled().await;
        assert_eq!(done.phase, RunPhase::Stopped);
        assert!(!done.alert_active);
        assert!(!done.running);
        assert!(matches!(
            f.controller.acknowledge_alert().await,
            Err(RunError::NoActiveAlert(TrainType::Ktx))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_declined_payment_escalates_then_ack_stops() {
        let f = signed_in(
            ScriptedBackend::new(TrainType::Ktx)
                .with_trains(vec![train("101", 10, 0, true, true)])
                .with_pay(Ok(false)),
        )
        .await;
        let mut req = request(SeatPreference::SpecialOnly);
        req.passengers = railhold_core::passenger::from_counts(1, 1, 0);

        f.controller.start_run(sold_out(), req, Some(valid_card()), false).await.unwrap();
        let alerting = f.controller.wait_for(|s| s.alert_active).await;

        assert_eq!(alerting.last_message.as_deref(), Some("Payment failed"));
        assert_eq!(f.backend.reserve_calls(), vec![("101".to_string(), SeatClass::Special)]);
        assert_eq!(f.backend.pay_calls(), 1);

        // No further attempts while the alert is up
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(f.backend.count(&Call::Search), 1);

        f.controller.acknowledge_alert().await.unwrap();
        assert_eq!(f.controller.settled().await.phase, RunPhase::Stopped);
        assert!(f
            .journal
            .history()
            .iter()
            .any(|e| e.message.starts_with("Alert acknowledged")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_during_payment_keeps_alert_ringing() {
        let sink = Arc::new(CountingSink::default());
        let f = fixture_with(
            ScriptedBackend::new(TrainType::Ktx)
                .with_trains(vec![train("101", 10, 0, false, true)])
                .with_pay(Ok(false))
                .with_pay_delay(Duration::from_secs(5)),
            RetryPolicy::from_millis(1000, 2000, 500),
            AlertEscalation::new(sink.clone(), Duration::from_secs(1)),
        );
        f.controller.sign_in(LoginCredentials::new("member", "pw"), false).await.unwrap();

        f.controller
            .start_run(sold_out(), request(SeatPreference::GeneralOnly), Some(valid_card()), false)
            .await
            .unwrap();
        f.controller.wait_for(|s| s.phase == RunPhase::Paying).await;
        f.controller.stop_run().await.unwrap();

        let alerting = f.controller.wait_for(|s| s.alert_active).await;
        assert_eq!(alerting.phase, RunPhase::AwaitingPaymentAlert);

        tokio::time::sleep(Duration::from_secs(30)).await;
        let status = f.controller.status();
        assert_eq!(status.phase, RunPhase::AwaitingPaymentAlert);
        assert!(status.alert_active);
        assert!(sink.beats.lock().unwrap().len() > 1);
        assert_eq!(f.backend.count(&Call::Search), 1);

        f.controller.acknowledge_alert().await.unwrap();
        let done = f.controller.settled().await;
        assert_eq!(done.phase, RunPhase::Stopped);
        assert!(!done.alert_active);
        assert!(f
            .journal
            .history()
            .iter()
            .any(|e| e.level == LogLevel::Warn && e.message.starts_with("Stop arrived during payment")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_while_alert_rings_acknowledges_it() {
        let f = signed_in(
            ScriptedBackend::new(TrainType::Ktx)
                .with_trains(vec![train("101", 10, 0, false, true)])
                .with_pay(Ok(false)),
        )
        .await;

        f.controller
            .start_run(sold_out(), request(SeatPreference::GeneralOnly), Some(valid_card()), false)
            .await
            .unwrap();
        f.controller.wait_for(|s| s.alert_active).await;
        tokio::time::sleep(Duration::from_millis(1500)).await;

        f.controller.stop_run().await.unwrap();
        let done = f.controller.settled().await;
        assert_eq!(done.phase, RunPhase::Stopped);
        assert!(!done.alert_active);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stored_card_is_used_when_none_given() {
        let f = signed_in(ScriptedBackend::new(TrainType::Ktx).with_trains(vec![train("101", 10, 0, false, true)])).await;
        f.store.save_card(&valid_card()).await.unwrap();

        f.controller
            .start_run(sold_out(), request(SeatPreference::GeneralOnly), None, false)
            .await
            .unwrap();

        assert_eq!(f.controller.settled().await.phase, RunPhase::Succeeded);
        assert_eq!(f.backend.pay_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lost_attempts_are_journaled() {
        let f = signed_in(ScriptedBackend::new(TrainType::Ktx).with_trains(sold_out())).await;

        f.controller
            .start_run(sold_out(), request(SeatPreference::GeneralOnly), None, false)
            .await
            .unwrap();
        f.controller.wait_for(|s| s.attempt_count >= 2).await;
        f.controller.stop_run().await.unwrap();
        f.controller.settled().await;

        let history = f.journal.history();
        assert!(history.iter().any(|e| e.message == format!("Attempt 1: {}", NO_SEATS_MESSAGE)));
        assert!(history.windows(2).all(|w| w[0].seq < w[1].seq));
    }
}
