use railhold_shared::models::events::AlertRaisedEvent;
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::warn;

/// Notification device driven by an active alert, once per beat
pub trait AlertSink: Send + Sync {
    fn notify(&self, alert: &AlertRaisedEvent, beat: u64);
}

pub struct TracingAlertSink;

impl AlertSink for TracingAlertSink {
    fn notify(&self, alert: &AlertRaisedEvent, beat: u64) {
        warn!(
            backend = %alert.backend,
            reservation = ?alert.reservation_id,
            beat,
            "Payment needs manual action: {}",
            alert.reason
        );
    }
}

/// Rings the terminal bell on stderr, then logs like [`TracingAlertSink`]
pub struct BellAlertSink;

impl AlertSink for BellAlertSink {
    fn notify(&self, alert: &AlertRaisedEvent, beat: u64) {
        let mut stderr = std::io::stderr();
        let _ = stderr.write_all(b"\x07").and_then(|_| stderr.flush());
        TracingAlertSink.notify(alert, beat);
    }
}

/// Starts repeating alerts. Each raised alert runs on its own task until
/// its handle is acknowledged or dropped.
#[derive(Clone)]
pub struct AlertEscalation {
    sink: Arc<dyn AlertSink>,
    interval: Duration,
}

impl AlertEscalation {
    pub fn new(sink: Arc<dyn AlertSink>, interval: Duration) -> Self {
        Self {
            sink,
            interval: interval.max(Duration::from_millis(1)),
        }
    }

    pub fn raise(&self, alert: AlertRaisedEvent) -> AlertHandle {
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let beats = Arc::new(AtomicU64::new(0));

        let sink = self.sink.clone();
        let counter = beats.clone();
        let period = self.interval;

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    // Acknowledged, or the handle was dropped
                    _ = &mut stop_rx => break,
                    _ = ticker.tick() => {
                        let beat = counter.fetch_add(1, Ordering::SeqCst) + 1;
                        sink.notify(&alert, beat);
                    }
                }
            }
        });

        AlertHandle { stop: stop_tx, beats, task }
    }
}

pub struct AlertHandle {
    stop: oneshot::Sender<()>,
    beats: Arc<AtomicU64>,
    task: JoinHandle<()>,
}

impl AlertHandle {
    /// Silence the alert; returns how many beats were emitted
    pub async fn acknowledge(self) -> u64 {
        let _ = self.stop.send(());
        if let Err(e) = self.task.await {
            warn!("Alert task ended abnormally: {}", e);
        }
        self.beats.load(Ordering::SeqCst)
    }
}
