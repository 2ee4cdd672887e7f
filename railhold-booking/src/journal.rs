//! Append-only progress log shared by every run in the process.

use chrono::Utc;
use railhold_shared::models::events::{LogLevel, RunLogEvent};
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

const DEFAULT_HISTORY: usize = 2000;
const STREAM_BUFFER: usize = 256;

pub struct RunJournal {
    sender: broadcast::Sender<RunLogEvent>,
    entries: Mutex<Entries>,
    capacity: usize,
}

struct Entries {
    next_seq: u64,
    history: VecDeque<RunLogEvent>,
}

impl RunJournal {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_HISTORY)
    }

    /// Keep at most `capacity` entries for `history`; the stream is unaffected
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(STREAM_BUFFER);
        Self {
            sender,
            entries: Mutex::new(Entries {
                next_seq: 1,
                history: VecDeque::new(),
            }),
            capacity: capacity.max(1),
        }
    }

    pub fn info(&self, backend: &str, message: impl Into<String>) -> RunLogEvent {
        self.record(backend, LogLevel::Info, message)
    }

    pub fn warn(&self, backend: &str, message: impl Into<String>) -> RunLogEvent {
        self.record(backend, LogLevel::Warn, message)
    }

    pub fn error(&self, backend: &str, message: impl Into<String>) -> RunLogEvent {
        self.record(backend, LogLevel::Error, message)
    }

    pub fn record(&self, backend: &str, level: LogLevel, message: impl Into<String>) -> RunLogEvent {
        let message = message.into();
        match level {
            LogLevel::Info => info!(backend = %backend, "{}", message),
            LogLevel::Warn => warn!(backend = %backend, "{}", message),
            LogLevel::Error => error!(backend = %backend, "{}", message),
        }

        // seq assignment, append and broadcast happen under one lock so the
        // stream order always matches seq order
        let mut entries = self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let event = RunLogEvent {
            seq: entries.next_seq,
            backend: backend.to_string(),
            level,
            message,
            logged_at: Utc::now(),
        };
        entries.next_seq += 1;

        if entries.history.len() == self.capacity {
            entries.history.pop_front();
        }
        entries.history.push_back(event.clone());
        // No subscribers is fine
        let _ = self.sender.send(event.clone());

        event
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RunLogEvent> {
        self.sender.subscribe()
    }

    pub fn history(&self) -> Vec<RunLogEvent> {
        let entries = self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.history.iter().cloned().collect()
    }

    /// Entries with `seq` greater than `seq`
    pub fn since(&self, seq: u64) -> Vec<RunLogEvent> {
        let entries = self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        entries.history.iter().filter(|e| e.seq > seq).cloned().collect()
    }
}

impl Default for RunJournal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seq_is_strictly_increasing() {
        let journal = RunJournal::new();
        journal.info("KTX", "first");
        journal.warn("SRT", "second");
        journal.error("KTX", "third");

        let history = journal.history();
        assert_eq!(history.iter().map(|e| e.seq).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(history[1].backend, "SRT");
        assert_eq!(history[2].level, LogLevel::Error);
        assert!(history[0].logged_at <= history[2].logged_at);
    }

    #[test]
    fn test_history_is_bounded() {
        let journal = RunJournal::with_capacity(2);
        for i in 0..5 {
            journal.info("KTX", format!("line {}", i));
        }
        let history = journal.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].message, "line 3");
        assert_eq!(journal.since(4).len(), 1);
    }

    #[tokio::test]
    async fn test_subscribers_see_entries_in_order() {
        let journal = RunJournal::new();
        let mut rx = journal.subscribe();

        journal.info("KTX", "a");
        journal.info("KTX", "b");

        assert_eq!(rx.recv().await.unwrap().message, "a");
        assert_eq!(rx.recv().await.unwrap().message, "b");
    }
}
