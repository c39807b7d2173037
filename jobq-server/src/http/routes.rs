//! The HTTP surface: `POST /jobs`, `GET /jobs`, `GET /jobs/{uid}/status`, `GET /jobs/{uid}/logs`,
//! `POST /jobs/{uid}/stop`, `GET /health`.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::StreamExt;
use serde::Deserialize;

use crate::coordinator::{Coordinator, LogsOutput};
use crate::error::Error;
use crate::model::{JobSpec, WorkloadIdentifier};

pub fn router(coordinator: Arc<Coordinator>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/jobs", post(submit).get(list))
        .route("/jobs/{uid}/status", get(status))
        .route("/jobs/{uid}/logs", get(logs))
        .route("/jobs/{uid}/stop", post(stop))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(coordinator)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn submit(
    State(coordinator): State<Arc<Coordinator>>,
    Json(spec): Json<JobSpec>,
) -> Result<Json<WorkloadIdentifier>, Error> {
    log::info!("submitting job {:?} in mode {:?}", spec.name, spec.mode.as_str());
    let identifier = coordinator.submit(spec).await?;
    Ok(Json(identifier))
}

#[derive(Deserialize)]
struct ListQuery {
    #[serde(default)]
    include_metadata: bool,
}

async fn list(
    State(coordinator): State<Arc<Coordinator>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<crate::model::ListWorkloadEntry>>, Error> {
    let entries = coordinator.list(query.include_metadata).await?;
    Ok(Json(entries))
}

fn lookup_identifier(coordinator: &Coordinator, uid: String) -> Result<WorkloadIdentifier, Error> {
    Ok(WorkloadIdentifier {
        group: String::new(),
        version: String::new(),
        kind: String::new(),
        namespace: coordinator.namespace()?,
        uid,
    })
}

async fn status(
    State(coordinator): State<Arc<Coordinator>>,
    Path(uid): Path<String>,
) -> Result<Json<crate::model::WorkloadMetadata>, Error> {
    let id = lookup_identifier(&coordinator, uid)?;
    let metadata = coordinator.status(&id).await?;
    Ok(Json(metadata))
}

#[derive(Deserialize)]
struct LogsQuery {
    #[serde(default)]
    stream: bool,
    #[serde(default = "default_tail")]
    tail: i64,
}

fn default_tail() -> i64 {
    -1
}

async fn logs(
    State(coordinator): State<Arc<Coordinator>>,
    Path(uid): Path<String>,
    Query(query): Query<LogsQuery>,
) -> Result<Response, Error> {
    let id = lookup_identifier(&coordinator, uid)?;
    let tail = if query.tail < 0 { None } else { Some(query.tail) };
    match coordinator.logs(&id, query.stream, tail).await? {
        LogsOutput::Text(text) => Ok(text.into_response()),
        LogsOutput::Stream(stream) => {
            let body_stream = stream.map(|chunk| chunk.map_err(std::io::Error::other));
            let body = axum::body::Body::from_stream(body_stream);
            Ok(body.into_response())
        }
    }
}

async fn stop(
    State(coordinator): State<Arc<Coordinator>>,
    Path(uid): Path<String>,
) -> Result<(), Error> {
    let id = lookup_identifier(&coordinator, uid)?;
    coordinator.stop(&id).await
}
