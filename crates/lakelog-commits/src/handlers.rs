//! Axum handlers for the coordinated commits REST API.
//!
//! Store access is synchronous (redb), so every handler hops onto the
//! blocking pool before touching the log.

use crate::catalog;
use crate::error::CommitError;
use crate::types::{
    Commit, CreateTableRequest, GetCommitsQuery, HealthResponse, ListTablesResponse,
};
use crate::CommitsState;
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use std::sync::Arc;

type Result<T> = std::result::Result<T, CommitError>;

async fn run_blocking<T, F>(state: &Arc<CommitsState>, f: F) -> Result<T>
where
    F: FnOnce(&CommitsState) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = Arc::clone(state);
    tokio::task::spawn_blocking(move || f(&state))
        .await
        .map_err(|e| CommitError::internal(format!("commit task failed: {e}")))?
}

// ---- Coordinated commits ----

/// POST /coordinated-commits
///
/// # Errors
/// Returns `CommitError` if the request is invalid, loses a version race, or
/// the store fails.
pub async fn commit(
    State(state): State<Arc<CommitsState>>,
    Json(request): Json<Commit>,
) -> Result<impl IntoResponse> {
    run_blocking(&state, move |s| s.machine.commit(&request)).await?;
    Ok(Json(serde_json::json!({})))
}

/// GET /coordinated-commits
///
/// # Errors
/// Returns `CommitError` if the query is invalid or the table cannot hold
/// coordinated commits.
pub async fn get_commits(
    State(state): State<Arc<CommitsState>>,
    Query(query): Query<GetCommitsQuery>,
) -> Result<impl IntoResponse> {
    let response = run_blocking(&state, move |s| s.reader.query(&query)).await?;
    Ok(Json(response))
}

// ---- Tables ----

/// POST /tables
///
/// # Errors
/// Returns `CommitError` if the request is invalid or the store fails.
pub async fn create_table(
    State(state): State<Arc<CommitsState>>,
    Json(request): Json<CreateTableRequest>,
) -> Result<impl IntoResponse> {
    let table = run_blocking(&state, move |s| catalog::create_table(&s.store, request)).await?;
    Ok(Json(table))
}

/// GET /tables
///
/// # Errors
/// Returns `CommitError::Internal` if the store fails.
pub async fn list_tables(State(state): State<Arc<CommitsState>>) -> Result<impl IntoResponse> {
    let tables = run_blocking(&state, |s| catalog::list_tables(&s.store)).await?;
    Ok(Json(ListTablesResponse { tables }))
}

/// GET /tables/{table_id}
///
/// # Errors
/// Returns `CommitError::NotFound` if the table does not exist.
pub async fn get_table(
    State(state): State<Arc<CommitsState>>,
    Path(table_id): Path<String>,
) -> Result<impl IntoResponse> {
    let table = run_blocking(&state, move |s| catalog::get_table(&s.store, &table_id)).await?;
    Ok(Json(table))
}

// ---- Operational ----

/// GET /health
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

/// GET /metrics
pub async fn metrics(State(state): State<Arc<CommitsState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.export_prometheus(),
    )
}
