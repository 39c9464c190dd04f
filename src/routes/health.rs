use crate::state::AppState;
use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use sqlx::PgPool;
use std::sync::Arc;

/// Create a router to serve health checks.
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(is_alive))
        .route("/status", get(status))
}

/// Simple `is_alive` endpoint that will always return a 200 OK.
/// Used to indicate when the webserver is up and running.
#[tracing::instrument]
async fn is_alive() -> StatusCode {
    tracing::debug!("Service is alive");
    StatusCode::OK
}

#[derive(Debug, serde::Serialize)]
pub struct Status {
    db_connected: bool,
}

/// Report whether the database can be reached.
#[tracing::instrument(skip(db_pool))]
async fn status(State(db_pool): State<Arc<PgPool>>) -> Json<Status> {
    let db_connected = db_pool
        .acquire()
        .await
        .map_err(|e| {
            tracing::error!("{:?}", e);
            e
        })
        .is_ok();

    let status = Status { db_connected };
    tracing::info!("Status: {:?}", status);
    Json(status)
}
