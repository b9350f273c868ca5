//! Mapping of grid failures onto HTTP responses

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use hexfront_core::GridError;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Grid(#[from] GridError),

    #[error("{0}")]
    BadRequest(String),

    #[error("{}", .0.body_text())]
    Body(#[from] JsonRejection),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Grid(e) => grid_status(e),
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Body(rejection) => rejection.status(),
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable name
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Grid(e) => grid_kind(e),
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Body(_) => "invalid_body",
            ApiError::Internal(_) => "internal",
        }
    }
}

fn grid_status(error: &GridError) -> StatusCode {
    match error {
        GridError::OutOfBounds(_)
        | GridError::UnknownBuilding(_)
        | GridError::UnknownBuildingType(_) => StatusCode::NOT_FOUND,
        GridError::PathNotFound { .. } | GridError::NoGate(_) => StatusCode::UNPROCESSABLE_ENTITY,
        GridError::InvalidMapSize { .. } => StatusCode::BAD_REQUEST,
        GridError::CellOccupied { .. }
        | GridError::CellBlocked(_)
        | GridError::MaxLevel(_)
        | GridError::NotAtCapacity { .. } => StatusCode::CONFLICT,
        GridError::UnauthorizedAction { .. }
        | GridError::NotAuthority
        | GridError::NotObserver => StatusCode::FORBIDDEN,
        GridError::DetachedBindingTimeout { .. } | GridError::GridNotReady { .. } => {
            StatusCode::SERVICE_UNAVAILABLE
        }
        GridError::NoMatchingVariant { .. }
        | GridError::DuplicateCanonicalMask { .. }
        | GridError::DirectionTableMismatch(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn grid_kind(error: &GridError) -> &'static str {
    match error {
        GridError::OutOfBounds(_) => "out_of_bounds",
        GridError::NoMatchingVariant { .. } => "no_matching_variant",
        GridError::PathNotFound { .. } => "path_not_found",
        GridError::NoGate(_) => "no_gate",
        GridError::CellOccupied { .. } => "cell_occupied",
        GridError::UnauthorizedAction { .. } => "unauthorized_action",
        GridError::DetachedBindingTimeout { .. } => "detached_binding_timeout",
        GridError::GridNotReady { .. } => "grid_not_ready",
        GridError::UnknownBuilding(_) => "unknown_building",
        GridError::UnknownBuildingType(_) => "unknown_building_type",
        GridError::MaxLevel(_) => "max_level",
        GridError::NotAtCapacity { .. } => "not_at_capacity",
        GridError::CellBlocked(_) => "cell_blocked",
        GridError::InvalidMapSize { .. } => "invalid_map_size",
        GridError::NotAuthority => "not_authority",
        GridError::NotObserver => "not_observer",
        GridError::DuplicateCanonicalMask { .. } => "duplicate_canonical_mask",
        GridError::DirectionTableMismatch(_) => "direction_table_mismatch",
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{}", self);
        } else {
            tracing::debug!("Request failed: {}", self);
        }

        let body = Json(json!({
            "error": self.to_string(),
            "kind": self.kind(),
        }));
        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use hexfront_core::{BuildingId, HexCoord};

    #[test]
    fn test_status_mapping() {
        let occupied = ApiError::from(GridError::CellOccupied {
            coord: HexCoord::new(1, 1),
            existing: BuildingId(3),
        });
        assert_eq!(occupied.status(), StatusCode::CONFLICT);
        assert_eq!(occupied.kind(), "cell_occupied");

        let missing = ApiError::from(GridError::OutOfBounds(HexCoord::new(-1, 0)));
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);

        let bad = ApiError::BadRequest("no map given".to_string());
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);

        let huge = ApiError::from(GridError::InvalidMapSize {
            width: 5000,
            height: 5000,
            max_cells: 1_000_000,
        });
        assert_eq!(huge.status(), StatusCode::BAD_REQUEST);
        assert_eq!(huge.kind(), "invalid_map_size");
    }
}
