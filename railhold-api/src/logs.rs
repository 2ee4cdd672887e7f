use axum::{
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Json, Router,
};
use futures_util::future::ready;
use futures_util::stream::{self, Stream, StreamExt};
use railhold_shared::models::events::RunLogEvent;
use serde::Deserialize;
use std::convert::Infallible;
use tokio_stream::wrappers::BroadcastStream;
use tracing::warn;

use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/logs", get(list_logs))
        .route("/v1/logs/stream", get(stream_logs))
}

#[derive(Debug, Deserialize)]
pub struct LogQuery {
    /// Only entries with a greater `seq`
    pub after: Option<u64>,
}

pub async fn list_logs(State(state): State<AppState>, Query(query): Query<LogQuery>) -> Json<Vec<RunLogEvent>> {
    let journal = state.desk.journal();
    Json(match query.after {
        Some(seq) => journal.since(seq),
        None => journal.history(),
    })
}

/// Journal as server-sent `log` events. With `after`, the retained backlog
/// past that seq is replayed before live entries.
pub async fn stream_logs(
    State(state): State<AppState>,
    Query(query): Query<LogQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let journal = state.desk.journal();

    // Subscribe before reading the backlog so nothing falls in between
    let rx = journal.subscribe();
    let backlog = query.after.map(|seq| journal.since(seq)).unwrap_or_default();
    let last_seen = backlog.last().map(|e| e.seq).or(query.after).unwrap_or(0);

    let live = BroadcastStream::new(rx).filter_map(move |item| {
        ready(match item {
            Ok(event) if event.seq > last_seen => Some(event),
            Ok(_) => None,
            Err(e) => {
                warn!("Log stream subscriber fell behind: {}", e);
                None
            }
        })
    });

    let events = stream::iter(backlog)
        .chain(live)
        .filter_map(|entry| ready(to_sse(&entry).map(Ok)));

    Sse::new(events).keep_alive(KeepAlive::default())
}

fn to_sse(entry: &RunLogEvent) -> Option<Event> {
    Event::default()
        .event("log")
        .id(entry.seq.to_string())
        .json_data(entry)
        .ok()
}
