//! Grid and cell queries

use crate::error::ApiResult;
use crate::state::ServerState;
use axum::{
    extract::{Path, State},
    Json,
};
use hexfront_core::{
    BuildingId, GridResult, HexCoord, NullLifecycle, Occupancy, Session, VisualUpdate,
};
use serde::Serialize;
use std::sync::Arc;

/// A cell with its resolved visual
#[derive(Serialize)]
pub struct CellView {
    pub coord: HexCoord,
    pub is_path: bool,
    pub occupancy: Occupancy,
    pub bound: Option<BuildingId>,
    pub mask: u8,
    pub variant: String,
    pub rotation_steps: u8,
}

fn cell_view(session: &Session<NullLifecycle>, coord: HexCoord) -> GridResult<CellView> {
    let grid = session.grid();
    let cell = grid.cell(coord)?;
    let tile = grid.visual(coord, session.profile())?;

    Ok(CellView {
        coord,
        is_path: cell.is_path,
        occupancy: cell.occupancy,
        bound: cell.bound,
        mask: grid.connectivity_mask(coord)?,
        variant: tile.variant,
        rotation_steps: tile.rotation_steps,
    })
}

#[derive(Serialize)]
pub struct GridResponse {
    pub name: String,
    pub width: i32,
    pub height: i32,
    pub ready: bool,
    /// Row by row
    pub cells: Vec<CellView>,
}

/// Whole grid with visuals
pub async fn get_grid(State(state): State<Arc<ServerState>>) -> ApiResult<Json<GridResponse>> {
    let session = state.session.read().await;
    let grid = session.grid();

    let mut cells = Vec::with_capacity(grid.len());
    for row in 0..grid.height() {
        for col in 0..grid.width() {
            cells.push(cell_view(&session, HexCoord::new(col, row))?);
        }
    }

    Ok(Json(GridResponse {
        name: session.map_data().name.clone(),
        width: grid.width(),
        height: grid.height(),
        ready: session.is_ready(),
        cells,
    }))
}

/// One cell
pub async fn get_cell(
    State(state): State<Arc<ServerState>>,
    Path((col, row)): Path<(i32, i32)>,
) -> ApiResult<Json<CellView>> {
    let session = state.session.read().await;
    Ok(Json(cell_view(&session, HexCoord::new(col, row))?))
}

/// Pending visual refreshes, resolved and cleared
pub async fn drain_visuals(State(state): State<Arc<ServerState>>) -> Json<Vec<VisualUpdate>> {
    let mut session = state.session.write().await;
    Json(session.drain_visuals())
}
