//! HTTP service of the master

use crate::master::Master;
use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use std::future::Future;
use std::sync::Arc;
use tidefs_common::http::ApiError;
use tidefs_common::{BlockAssign, CreateRequest, FileBlocks};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

#[derive(Debug, Deserialize)]
pub struct LookupQuery {
    pub name: String,
}

/// Routes of the master
pub fn router(master: Arc<Master>) -> Router {
    Router::new()
        .route("/create", post(create))
        .route("/lookup", get(lookup))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(master)
}

/// Serve `master` on `listener` until `shutdown` resolves
pub async fn serve<F>(
    listener: TcpListener,
    master: Arc<Master>,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router(master).into_make_service())
        .with_graceful_shutdown(shutdown)
        .await
}

async fn create(
    State(master): State<Arc<Master>>,
    Json(request): Json<CreateRequest>,
) -> Result<Json<Vec<BlockAssign>>, ApiError> {
    Ok(Json(master.create(&request)?))
}

async fn lookup(
    State(master): State<Arc<Master>>,
    Query(query): Query<LookupQuery>,
) -> Result<Json<FileBlocks>, ApiError> {
    Ok(Json(master.lookup(&query.name)?))
}

async fn health() -> &'static str {
    "OK"
}
