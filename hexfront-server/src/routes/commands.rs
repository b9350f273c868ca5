//! Observer commands and the replication feed

use crate::error::ApiResult;
use crate::state::{SequencedEvent, ServerState};
use axum::{
    extract::{rejection::JsonRejection, Query, State},
    Json,
};
use hexfront_core::{Command, Replication};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

const POLL_STEP: Duration = Duration::from_millis(100);
const DEFAULT_POLL_MS: u64 = 5_000;
const MAX_POLL_MS: u64 = 30_000;

#[derive(Serialize)]
pub struct CommandResponse {
    pub events: Vec<Replication>,
    /// Sequence of the last event this command produced
    pub sequence: u64,
}

/// Execute a forwarded observer command
pub async fn handle_command(
    State(state): State<Arc<ServerState>>,
    payload: Result<Json<Command>, JsonRejection>,
) -> ApiResult<Json<CommandResponse>> {
    let Json(command) = payload?;
    let mut session = state.session.write().await;
    let events = session.handle_command(command)?;

    let mut log = state.events.write().await;
    log.append(events.clone());
    Ok(Json(CommandResponse {
        events,
        sequence: log.last_seq(),
    }))
}

/// Poll query params
#[derive(Deserialize)]
pub struct PollParams {
    /// Last sequence the observer applied
    pub since: Option<u64>,
    pub timeout_ms: Option<u64>,
}

#[derive(Serialize)]
pub struct EventsResponse {
    pub sequence: u64,
    /// Events were dropped from the log; fetch /api/map and start over
    pub resync: bool,
    pub events: Vec<SequencedEvent>,
}

/// Long-poll for replication after `since`
pub async fn poll_events(
    State(state): State<Arc<ServerState>>,
    Query(params): Query<PollParams>,
) -> Json<EventsResponse> {
    let since = params.since.unwrap_or(0);
    let timeout = params.timeout_ms.unwrap_or(DEFAULT_POLL_MS).min(MAX_POLL_MS);
    let attempts = (timeout / POLL_STEP.as_millis() as u64).max(1);

    for attempt in 0..attempts {
        {
            let log = state.events.read().await;
            let events = log.since(since);
            if !events.is_empty() || attempt + 1 == attempts {
                return Json(EventsResponse {
                    sequence: log.last_seq(),
                    resync: log.first_seq() > since + 1,
                    events,
                });
            }
        }
        tokio::time::sleep(POLL_STEP).await;
    }

    let log = state.events.read().await;
    Json(EventsResponse {
        sequence: log.last_seq(),
        resync: false,
        events: Vec::new(),
    })
}
