//! HTTP trigger surface for billserve.
//!
//! Every trigger only submits work to the pipeline's [`Scheduler`] and answers
//! `202 Accepted` with the new task's id; outcomes are observed through
//! `/tasks`. Reading the ingested bills is left to other consumers of the
//! store.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", billserve_api::api_router(handle.scheduler().clone()))
//! ```

pub mod error;
pub mod tasks;
pub mod triggers;

use axum::{
  Router,
  routing::{get, post},
};
use billserve_ingest::Scheduler;
use tower_http::trace::TraceLayer;

pub use error::ApiError;

/// Build the API router over a running pipeline's `scheduler`.
pub fn api_router(scheduler: Scheduler) -> Router<()> {
  Router::new()
    // Triggers
    .route("/update", post(triggers::update))
    .route("/bulk-update", post(triggers::bulk_update))
    .route("/rebuild", post(triggers::rebuild))
    // Observation
    .route("/tasks", get(tasks::list))
    .route("/tasks/{id}", get(tasks::get_one))
    .with_state(scheduler)
    .layer(TraceLayer::new_for_http())
}
