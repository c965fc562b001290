//! Fire-and-forget ingestion triggers.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/update` | Body: `{"url":"https://..."}` |
//! | `POST` | `/bulk-update` | Body: `{"manifest_url":"https://..."}`; rebuilds afterwards |
//! | `POST` | `/rebuild` | No body |
//!
//! All three answer `202` with `{"task_id":"<uuid>"}`. A body that does not
//! parse is a `400` and queues nothing.

use axum::{
  Json,
  extract::{State, rejection::JsonRejection},
  http::StatusCode,
};
use billserve_ingest::{Scheduler, TaskId};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ApiError;

#[derive(Debug, Serialize)]
pub struct Accepted {
  pub task_id: TaskId,
}

fn accepted(task_id: TaskId) -> (StatusCode, Json<Accepted>) {
  (StatusCode::ACCEPTED, Json(Accepted { task_id }))
}

fn require_url(field: &str, value: String) -> Result<String, ApiError> {
  let value = value.trim();
  if value.is_empty() {
    return Err(ApiError::BadRequest(format!("{field} must not be empty")));
  }
  Ok(value.to_owned())
}

// ─── Single document ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct UpdateBody {
  pub url: String,
}

/// `POST /update`
pub async fn update(
  State(scheduler): State<Scheduler>,
  body: Result<Json<UpdateBody>, JsonRejection>,
) -> Result<(StatusCode, Json<Accepted>), ApiError> {
  let Json(body) = body?;
  let url = require_url("url", body.url)?;
  let task_id = scheduler.ingest_document(url.clone());
  info!(%task_id, url, "document ingestion requested");
  Ok(accepted(task_id))
}

// ─── Bulk ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct BulkUpdateBody {
  pub manifest_url: String,
}

/// `POST /bulk-update`
pub async fn bulk_update(
  State(scheduler): State<Scheduler>,
  body: Result<Json<BulkUpdateBody>, JsonRejection>,
) -> Result<(StatusCode, Json<Accepted>), ApiError> {
  let Json(body) = body?;
  let manifest_url = require_url("manifest_url", body.manifest_url)?;
  let task_id = scheduler.bulk_ingest_from_manifest(manifest_url.clone());
  info!(%task_id, manifest_url, "bulk ingestion requested");
  Ok(accepted(task_id))
}

// ─── Rebuild ──────────────────────────────────────────────────────────────────

/// `POST /rebuild`
pub async fn rebuild(State(scheduler): State<Scheduler>) -> (StatusCode, Json<Accepted>) {
  let task_id = scheduler.rebuild_aggregation();
  info!(%task_id, "aggregation rebuild requested");
  accepted(task_id)
}
