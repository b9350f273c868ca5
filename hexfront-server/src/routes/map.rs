//! Map load and save

use crate::error::{ApiError, ApiResult};
use crate::state::ServerState;
use anyhow::Context;
use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use hexfront_core::MapData;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Live grid and buildings as a saveable map
pub async fn get_map(State(state): State<Arc<ServerState>>) -> Json<MapData> {
    let session = state.session.read().await;
    Json(session.snapshot())
}

/// Either an inline map or a file to read; neither means the configured map
#[derive(Deserialize)]
pub struct LoadMapRequest {
    pub path: Option<PathBuf>,
    pub map: Option<MapData>,
}

#[derive(Serialize)]
pub struct LoadMapResponse {
    pub name: String,
    pub width: i32,
    pub height: i32,
    pub buildings: usize,
    pub generation: u64,
}

pub async fn load_map(
    State(state): State<Arc<ServerState>>,
    payload: Result<Json<LoadMapRequest>, JsonRejection>,
) -> ApiResult<Json<LoadMapResponse>> {
    let Json(req) = payload?;
    let map = match (req.map, req.path.or_else(|| state.map_path.clone())) {
        (Some(map), _) => map,
        (None, Some(path)) => MapData::load(&path)
            .with_context(|| format!("loading map {}", path.display()))?,
        (None, None) => {
            return Err(ApiError::BadRequest(
                "give a map or a path to load".to_string(),
            ))
        }
    };

    let response = state
        .mutate(|session| {
            session.load_map(&map)?;
            Ok(LoadMapResponse {
                name: map.name.clone(),
                width: map.width(),
                height: map.height(),
                buildings: session.buildings().count(),
                generation: session.ready_generation(),
            })
        })
        .await?;
    Ok(Json(response))
}

#[derive(Deserialize)]
pub struct SaveMapRequest {
    pub path: Option<PathBuf>,
}

#[derive(Serialize)]
pub struct SaveMapResponse {
    pub saved: PathBuf,
}

pub async fn save_map(
    State(state): State<Arc<ServerState>>,
    payload: Result<Json<SaveMapRequest>, JsonRejection>,
) -> ApiResult<Json<SaveMapResponse>> {
    let Json(req) = payload?;
    let Some(path) = req.path.or_else(|| state.map_path.clone()) else {
        return Err(ApiError::BadRequest("no path to save to".to_string()));
    };

    let snapshot = state.session.read().await.snapshot();
    snapshot
        .save(&path)
        .with_context(|| format!("saving map {}", path.display()))?;
    tracing::info!("Saved map '{}' to {}", snapshot.name, path.display());

    Ok(Json(SaveMapResponse { saved: path }))
}
