//! Handlers for `/tasks` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/tasks` | Optional `?pending=true` for queued and running only |
//! | `GET`  | `/tasks/:id` | 404 if not found |

use axum::{
  Json,
  extract::{Path, Query, State},
};
use billserve_ingest::{Scheduler, TaskRecord};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct ListParams {
  #[serde(default)]
  pub pending: bool,
}

/// `GET /tasks[?pending=true]`
pub async fn list(
  State(scheduler): State<Scheduler>,
  Query(params): Query<ListParams>,
) -> Json<Vec<TaskRecord>> {
  let mut records = scheduler.registry().list();
  if params.pending {
    records.retain(|r| !r.state.is_finished());
  }
  Json(records)
}

/// `GET /tasks/:id`
pub async fn get_one(
  State(scheduler): State<Scheduler>,
  Path(id): Path<Uuid>,
) -> Result<Json<TaskRecord>, ApiError> {
  scheduler
    .registry()
    .get(id)
    .map(Json)
    .ok_or_else(|| ApiError::NotFound(format!("task {id}")))
}
