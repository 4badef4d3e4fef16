//! Health check and stream status endpoints

use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use invoicepayer_stream::StreamSnapshot;
use serde::Serialize;

use crate::http::AppState;

/// Health check router
pub fn create_health_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/streams", get(list_streams))
}

/// Basic health check (always returns OK if server is running)
pub async fn health_check() -> impl IntoResponse {
    "OK"
}

#[derive(Debug, Serialize)]
pub struct StreamsResponse {
    pub active_streams: usize,
    pub observers: usize,
    pub streams: Vec<StreamSnapshot>,
}

/// Open payment streams and their observer counts
pub async fn list_streams(State(state): State<AppState>) -> Json<StreamsResponse> {
    let streams = state.manager.snapshots();
    Json(StreamsResponse {
        active_streams: streams.len(),
        observers: streams.iter().map(|s| s.observers).sum(),
        streams,
    })
}
