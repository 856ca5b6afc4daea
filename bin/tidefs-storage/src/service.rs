//! HTTP service of a storage node

use crate::storage::Storage;
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use std::sync::Arc;
use tidefs_client::BlockStorage;
use tidefs_common::ReplicateRequest;
use tidefs_common::http::ApiError;
use tower_http::trace::TraceLayer;

#[derive(Debug, Deserialize)]
pub struct BlockQuery {
    pub id: String,
}

/// Routes of the storage node
pub fn router(storage: Arc<Storage>) -> Router {
    Router::new()
        .route("/block", get(get_block).put(put_block).delete(delete_block))
        .route("/replicate", post(replicate))
        .route("/health", get(health))
        // blocks are as large as the configured block size
        .layer(DefaultBodyLimit::disable())
        .layer(TraceLayer::new_for_http())
        .with_state(storage)
}

async fn put_block(
    State(storage): State<Arc<Storage>>,
    Query(query): Query<BlockQuery>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    storage.set(&query.id, body).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_block(
    State(storage): State<Arc<Storage>>,
    Query(query): Query<BlockQuery>,
) -> Result<Bytes, ApiError> {
    Ok(storage.get(&query.id).await?)
}

async fn delete_block(
    State(storage): State<Arc<Storage>>,
    Query(query): Query<BlockQuery>,
) -> Result<StatusCode, ApiError> {
    storage.unset(&query.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn replicate(
    State(storage): State<Arc<Storage>>,
    Json(request): Json<ReplicateRequest>,
) -> Result<StatusCode, ApiError> {
    storage
        .replicate(&request.block_id, &request.destination)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn health() -> &'static str {
    "OK"
}
