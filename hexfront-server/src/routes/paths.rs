//! Path generation endpoints

use crate::error::ApiResult;
use crate::state::ServerState;
use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use hexfront_core::{BuildingId, HexCoord};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Deserialize)]
pub struct PathRequest {
    pub start: HexCoord,
    pub end: HexCoord,
}

#[derive(Deserialize)]
pub struct GatedPathRequest {
    pub from: BuildingId,
    pub to: BuildingId,
}

#[derive(Serialize)]
pub struct PathResponse {
    pub path: Vec<HexCoord>,
    /// Steps between the ends
    pub length: usize,
}

impl From<Vec<HexCoord>> for PathResponse {
    fn from(path: Vec<HexCoord>) -> Self {
        Self {
            length: path.len().saturating_sub(1),
            path,
        }
    }
}

/// Pave a random shortest path between two cells
pub async fn generate_path(
    State(state): State<Arc<ServerState>>,
    payload: Result<Json<PathRequest>, JsonRejection>,
) -> ApiResult<Json<PathResponse>> {
    let Json(req) = payload?;
    let path = state
        .mutate(|session| session.generate_path(req.start, req.end))
        .await?;
    Ok(Json(path.into()))
}

/// Pave a road between the gates of two buildings
pub async fn generate_gated_path(
    State(state): State<Arc<ServerState>>,
    payload: Result<Json<GatedPathRequest>, JsonRejection>,
) -> ApiResult<Json<PathResponse>> {
    let Json(req) = payload?;
    let path = state
        .mutate(|session| session.generate_gated_path(req.from, req.to))
        .await?;
    Ok(Json(path.into()))
}
