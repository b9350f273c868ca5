//! Status endpoint

use crate::state::ServerState;
use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

#[derive(Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub engine: &'static str,
    pub ready: bool,
    pub generation: u64,
    pub width: i32,
    pub height: i32,
    pub buildings: usize,
    /// Latest replication sequence
    pub sequence: u64,
}

pub async fn status_handler(State(state): State<Arc<ServerState>>) -> Json<StatusResponse> {
    let session = state.session.read().await;
    let sequence = state.events.read().await.last_seq();

    Json(StatusResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        engine: "rust",
        ready: session.is_ready(),
        generation: session.ready_generation(),
        width: session.grid().width(),
        height: session.grid().height(),
        buildings: session.buildings().count(),
        sequence,
    })
}
