//! Building placement, upgrade and removal

use crate::error::ApiResult;
use crate::state::ServerState;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use hexfront_core::{BindingState, Building, BuildingId, HexCoord, OwnerId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Building as seen over HTTP, including its binding state
#[derive(Serialize)]
pub struct BuildingView {
    pub id: BuildingId,
    pub type_id: String,
    pub owner: OwnerId,
    pub level: i32,
    pub soldiers: i32,
    pub position: HexCoord,
    pub binding: BindingState,
}

impl From<&Building> for BuildingView {
    fn from(b: &Building) -> Self {
        Self {
            id: b.id,
            type_id: b.type_id.clone(),
            owner: b.owner,
            level: b.level,
            soldiers: b.soldiers,
            position: b.position,
            binding: b.binding,
        }
    }
}

pub async fn list_buildings(State(state): State<Arc<ServerState>>) -> Json<Vec<BuildingView>> {
    let session = state.session.read().await;
    Json(session.buildings().map(BuildingView::from).collect())
}

#[derive(Deserialize)]
pub struct PlaceRequest {
    pub coord: HexCoord,
    pub type_id: String,
    pub owner: OwnerId,
}

/// Place a building on a free cell
pub async fn place_building(
    State(state): State<Arc<ServerState>>,
    payload: Result<Json<PlaceRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<BuildingView>)> {
    let Json(req) = payload?;
    let view = state
        .mutate(|session| {
            let id = session.request_place_building(req.coord, &req.type_id, req.owner)?;
            session.building(id).map(BuildingView::from)
        })
        .await?;
    Ok((StatusCode::CREATED, Json(view)))
}

#[derive(Deserialize)]
pub struct UpgradeRequest {
    pub requester: OwnerId,
}

#[derive(Serialize)]
pub struct UpgradeResponse {
    pub building: BuildingView,
    /// Soldiers spent
    pub cost: i32,
}

pub async fn upgrade_building(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<u64>,
    payload: Result<Json<UpgradeRequest>, JsonRejection>,
) -> ApiResult<Json<UpgradeResponse>> {
    let Json(req) = payload?;
    let id = BuildingId(id);
    let response = state
        .mutate(|session| {
            let cost = session.request_upgrade(id, req.requester)?;
            Ok(UpgradeResponse {
                building: session.building(id).map(BuildingView::from)?,
                cost,
            })
        })
        .await?;
    Ok(Json(response))
}

pub async fn remove_building(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<u64>,
) -> ApiResult<StatusCode> {
    state
        .mutate(|session| session.request_remove_building(BuildingId(id)))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
