use railhold_adapters::korail::{KorailClient, KorailClientFactory};
use railhold_adapters::srt_client::{SrtClient, SrtClientFactory};
use railhold_adapters::{KtxBackend, SandboxKorail, SandboxSrt, SandboxTimetable, SrtBackend};
use railhold_booking::{
    AlertEscalation, AlertSink, BellAlertSink, RailDesk, RetryPolicy, RunController, RunJournal, TracingAlertSink,
};
use railhold_core::{CredentialStore, RailBackend};
use railhold_store::{Config, InMemoryCredentialStore};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct AppState {
    pub desk: Arc<RailDesk>,
}

impl AppState {
    /// Wire both backends against the sandbox wire clients
    pub fn from_config(config: &Config) -> Self {
        let timetable = SandboxTimetable {
            seat_probability: config.sandbox.seat_probability,
            special_seat_probability: config.sandbox.special_seat_probability,
            trains_per_search: config.sandbox.trains_per_search,
            payments_succeed: config.sandbox.payments_succeed,
        };

        let korail_timetable = timetable.clone();
        let korail: KorailClientFactory =
            Arc::new(move || Arc::new(SandboxKorail::new(korail_timetable.clone())) as Arc<dyn KorailClient>);
        let srt: SrtClientFactory = Arc::new(move || Arc::new(SandboxSrt::new(timetable.clone())) as Arc<dyn SrtClient>);

        Self::with_backends(config, Arc::new(KtxBackend::new(korail)), Arc::new(SrtBackend::new(srt)))
    }

    pub fn with_backends(config: &Config, ktx: Arc<dyn RailBackend>, srt: Arc<dyn RailBackend>) -> Self {
        let store: Arc<dyn CredentialStore> = Arc::new(InMemoryCredentialStore::new());
        let journal = Arc::new(RunJournal::new());

        let policy = RetryPolicy::from_millis(
            config.retry.delay_min_ms,
            config.retry.delay_max_ms,
            config.retry.session_reset_every,
        );
        let sink: Arc<dyn AlertSink> = if config.alert.bell {
            Arc::new(BellAlertSink)
        } else {
            Arc::new(TracingAlertSink)
        };
        let alerts = AlertEscalation::new(sink, Duration::from_millis(config.alert.interval_ms));

        let desk = RailDesk::new(
            RunController::new(ktx, store.clone(), journal.clone(), policy, alerts.clone()),
            RunController::new(srt, store, journal.clone(), policy, alerts),
            journal,
        );

        Self { desk: Arc::new(desk) }
    }
}
