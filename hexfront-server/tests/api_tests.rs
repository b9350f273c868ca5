//! Integration tests for hexfront-server API

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use hexfront_server::{create_router, ServerConfig, ServerState};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn test_app() -> Router {
    let config = ServerConfig::default();
    let state = Arc::new(ServerState::with_seed(7));
    create_router(&config, state)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(app, request).await
}

async fn post(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

async fn delete(app: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    send(app, request).await
}

async fn place(app: &Router, col: i32, row: i32, type_id: &str, owner: u64) -> (StatusCode, Value) {
    post(
        app,
        "/api/buildings",
        json!({ "coord": { "col": col, "row": row }, "type_id": type_id, "owner": owner }),
    )
    .await
}

#[tokio::test]
async fn test_status_endpoint() {
    let app = test_app();
    let (status, json) = get(&app, "/api/status").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
    assert_eq!(json["engine"], "rust");
    assert_eq!(json["ready"], true);
    assert_eq!(json["width"], 10);
    assert_eq!(json["sequence"], 1);
}

#[tokio::test]
async fn test_grid_endpoint() {
    let app = test_app();
    let (status, json) = get(&app, "/api/grid").await;

    assert_eq!(status, StatusCode::OK);
    let cells = json["cells"].as_array().unwrap();
    assert_eq!(cells.len(), 100);
    assert_eq!(cells[0]["variant"], "grass");
    assert_eq!(cells[0]["occupancy"], "Empty");
}

#[tokio::test]
async fn test_cell_out_of_bounds() {
    let app = test_app();
    let (status, json) = get(&app, "/api/cell/42/0").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["kind"], "out_of_bounds");
}

#[tokio::test]
async fn test_place_building() {
    let app = test_app();

    let (status, json) = place(&app, 3, 3, "castle", 1).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(json["position"]["col"], 3);
    assert_eq!(json["binding"], "Bound");
    let id = json["id"].as_u64().unwrap();

    let (_, cell) = get(&app, "/api/cell/3/3").await;
    assert_eq!(cell["bound"], id);
    assert_eq!(cell["occupancy"], "Building");

    let (status, json) = place(&app, 3, 3, "tower", 2).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["kind"], "cell_occupied");

    let (status, json) = place(&app, 1, 1, "windmill", 2).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["kind"], "unknown_building_type");

    let (_, list) = get(&app, "/api/buildings").await;
    assert_eq!(list.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_upgrade_failures() {
    let app = test_app();
    let (_, json) = place(&app, 2, 2, "castle", 1).await;
    let id = json["id"].as_u64().unwrap();
    let uri = format!("/api/buildings/{}/upgrade", id);

    let (status, json) = post(&app, &uri, json!({ "requester": 1 })).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["kind"], "not_at_capacity");

    let (status, json) = post(&app, &uri, json!({ "requester": 5 })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["kind"], "unauthorized_action");
}

#[tokio::test]
async fn test_remove_building() {
    let app = test_app();
    let (_, json) = place(&app, 4, 4, "barracks", 1).await;
    let id = json["id"].as_u64().unwrap();

    let (status, _) = delete(&app, &format!("/api/buildings/{}", id)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, cell) = get(&app, "/api/cell/4/4").await;
    assert_eq!(cell["bound"], Value::Null);
    assert_eq!(cell["occupancy"], "Empty");

    let (status, json) = delete(&app, &format!("/api/buildings/{}", id)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["kind"], "unknown_building");
}

#[tokio::test]
async fn test_generate_path() {
    let app = test_app();
    let (status, json) = post(
        &app,
        "/api/path",
        json!({ "start": { "col": 0, "row": 0 }, "end": { "col": 9, "row": 9 } }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let path = json["path"].as_array().unwrap();
    assert_eq!(path.first().unwrap()["col"], 0);
    assert_eq!(path.last().unwrap()["row"], 9);
    assert_eq!(json["length"].as_u64().unwrap() as usize, path.len() - 1);

    let (_, cell) = get(&app, "/api/cell/0/0").await;
    assert_eq!(cell["is_path"], true);
}

#[tokio::test]
async fn test_gated_path_and_unreachable() {
    let app = test_app();
    let (_, a) = place(&app, 2, 2, "castle", 1).await;
    let (_, b) = place(&app, 7, 7, "castle", 2).await;

    let (status, json) = post(
        &app,
        "/api/path/gated",
        json!({ "from": a["id"], "to": b["id"] }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["path"][0], json!({ "col": 2, "row": 1 }));

    // Wall in (5, 5)
    let target = [(6, 6), (6, 5), (6, 4), (5, 4), (4, 5), (5, 6)];
    for (i, (col, row)) in target.iter().enumerate() {
        let (status, _) = place(&app, *col, *row, "tower", i as u64).await;
        assert_eq!(status, StatusCode::CREATED);
    }
    let (status, json) = post(
        &app,
        "/api/path",
        json!({ "start": { "col": 0, "row": 9 }, "end": { "col": 5, "row": 5 } }),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["kind"], "path_not_found");
}

#[tokio::test]
async fn test_command_and_event_feed() {
    let app = test_app();

    let (status, json) = post(
        &app,
        "/api/command",
        json!({ "type": "place_building", "coord": { "col": 1, "row": 1 }, "type_id": "tower", "owner": 3 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["events"][0]["type"], "building_spawned");
    assert_eq!(json["sequence"], 2);

    let (status, json) = get(&app, "/api/events?since=1&timeout_ms=100").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["resync"], false);
    let events = json["events"].as_array().unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["seq"], 2);
    assert_eq!(events[0]["event"]["building"]["owner"], 3);

    // Nothing new: the poll times out empty
    let (_, json) = get(&app, "/api/events?since=2&timeout_ms=100").await;
    assert!(json["events"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_unknown_command_rejected() {
    let app = test_app();
    let (status, json) = post(&app, "/api/command", json!({ "type": "launch_rockets" })).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["kind"], "invalid_body");
    assert!(json["error"].as_str().unwrap().contains("launch_rockets"));
}

#[tokio::test]
async fn test_malformed_body_is_json_error() {
    let app = test_app();
    let request = Request::builder()
        .method("POST")
        .uri("/api/buildings")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, json) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["kind"], "invalid_body");

    let request = Request::builder()
        .method("POST")
        .uri("/api/path")
        .body(Body::from("{}"))
        .unwrap();
    let (status, json) = send(&app, request).await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(json["kind"], "invalid_body");
}

#[tokio::test]
async fn test_oversized_map_load_rejected() {
    let app = test_app();
    let map = json!({
        "name": "huge",
        "terrain": { "width": 1_000_000, "height": 1_000_000, "cells": [] },
        "buildings": []
    });
    let (status, json) = post(&app, "/api/map/load", json!({ "map": map })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["kind"], "invalid_map_size");

    // The default grid is still in place
    let (status, json) = get(&app, "/api/grid").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["width"], 10);
}

#[tokio::test]
async fn test_map_load_and_snapshot() {
    let app = test_app();
    let mut terrain = vec![false; 4 * 3];
    terrain[1] = true;
    terrain[2] = true;

    let map = json!({
        "name": "strip",
        "terrain": { "width": 4, "height": 3, "cells": terrain },
        "buildings": [
            { "x": 3, "y": 0, "type_id": "tower", "owner": 1, "level": 2, "soldiers": 10 }
        ]
    });
    let (status, json) = post(&app, "/api/map/load", json!({ "map": map })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["buildings"], 1);
    assert_eq!(json["generation"], 2);

    let (_, snapshot) = get(&app, "/api/map").await;
    assert_eq!(snapshot["name"], "strip");
    assert_eq!(snapshot["terrain"]["cells"][2], true);
    assert_eq!(snapshot["buildings"][0]["x"], 3);

    // (2, 0) sits between a path cell and the tower
    let (_, cell) = get(&app, "/api/cell/2/0").await;
    assert_eq!(cell["variant"], "path_straight");

    let (status, json) = post(&app, "/api/map/load", json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["kind"], "bad_request");
}

#[tokio::test]
async fn test_visuals_drain_once() {
    let app = test_app();
    let (_, first) = get(&app, "/api/visuals").await;
    assert_eq!(first.as_array().unwrap().len(), 100);

    let (_, second) = get(&app, "/api/visuals").await;
    assert!(second.as_array().unwrap().is_empty());

    place(&app, 5, 5, "tower", 1).await;
    let (_, third) = get(&app, "/api/visuals").await;
    assert_eq!(third.as_array().unwrap().len(), 7);
}
