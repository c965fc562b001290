//! The billserve ingestion pipeline.
//!
//! Status documents are fetched through a [`DocumentSource`], normalised, and
//! upserted into a [`BillStore`] by tasks that a [`Pipeline`] executes on a
//! bounded worker pool. Callers only ever submit work through a
//! [`Scheduler`] and observe it through its [`TaskRegistry`].
//!
//! [`DocumentSource`]: billserve_govinfo::DocumentSource
//! [`BillStore`]: billserve_core::store::BillStore

pub mod aggregate;
pub mod config;
pub mod error;
pub mod ingest;
pub mod pipeline;
pub mod tasks;
pub mod upsert;

pub use config::PipelineConfig;
pub use error::{Error, Result, Stage};
pub use pipeline::{Pipeline, PipelineHandle};
pub use tasks::{Chain, Scheduler, Task, TaskId, TaskOutput, TaskRecord, TaskRegistry, TaskState};

#[cfg(test)]
mod testing;
#[cfg(test)]
mod tests;
