//! `billserve`: legislative bill ingestion service.
//!
//! Reads `billserve.toml` (or the path given with `--config`) and
//! `BILLSERVE_*` environment variables, opens the SQLite store and starts the
//! ingestion pipeline.
//!
//! # Usage
//!
//! ```text
//! billserve serve
//! billserve ingest https://www.govinfo.gov/bulkdata/BILLSTATUS/115/hr/BILLSTATUS-115hr996.xml
//! billserve bulk https://www.govinfo.gov/bulkdata/json/BILLSTATUS/115/hr
//! billserve rebuild
//! ```

mod settings;

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use billserve_govinfo::{HttpFetcher, Locator};
use billserve_ingest::{Pipeline, PipelineHandle, Scheduler, TaskId, TaskRecord, TaskState};
use billserve_store_sqlite::SqliteStore;
use clap::{Parser, Subcommand};
use settings::Settings;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Legislative bill ingestion service")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "billserve.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Serve the HTTP trigger API backed by the worker pool.
  Serve,
  /// Ingest one status document and wait for it and its related bills.
  Ingest { url: String },
  /// Ingest every document listed by a manifest, then rebuild.
  Bulk { manifest_url: String },
  /// Recompute the per-subject support splits.
  Rebuild,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();
  let settings = Settings::load(&cli.config)?;

  let store_path = expand_tilde(&settings.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;
  let fetcher = HttpFetcher::new(&settings.fetch_config()).context("failed to build HTTP client")?;
  let locator = Locator::new(settings.govinfo_base_url.clone());

  let handle = Pipeline::start(Arc::new(store), fetcher, locator, settings.pipeline_config());

  let result = match cli.command {
    Command::Serve => serve(&settings, &handle).await,
    Command::Ingest { url } => {
      let id = handle.scheduler().ingest_document(url);
      run_to_idle(handle.scheduler(), id).await
    }
    Command::Bulk { manifest_url } => {
      let id = handle.scheduler().bulk_ingest_from_manifest(manifest_url);
      run_to_idle(handle.scheduler(), id).await
    }
    Command::Rebuild => {
      let id = handle.scheduler().rebuild_aggregation();
      run_to_idle(handle.scheduler(), id).await
    }
  };

  handle.shutdown();
  result
}

async fn serve(settings: &Settings, handle: &PipelineHandle) -> anyhow::Result<()> {
  let app = billserve_api::api_router(handle.scheduler().clone());
  let address = settings.address();

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;
  Ok(())
}

/// Wait until nothing is queued or running, print what happened and fail if
/// the submitted task itself failed.
async fn run_to_idle(scheduler: &Scheduler, id: TaskId) -> anyhow::Result<()> {
  scheduler.registry().wait_idle().await;

  let records = scheduler.registry().list();
  let summary = Summary::of(&records);
  for record in &records {
    if let TaskState::Failed { error } = &record.state {
      println!("failed  {} {}: {error}", record.task.kind(), record.id);
    }
  }
  println!("{summary}");

  match scheduler.registry().get(id).map(|r| r.state) {
    Some(TaskState::Succeeded { output }) => {
      println!("result  {output:?}");
      Ok(())
    }
    Some(TaskState::Failed { error }) => anyhow::bail!("task {id} failed: {error}"),
    other => anyhow::bail!("task {id} did not finish: {other:?}"),
  }
}

// ─── Summary ──────────────────────────────────────────────────────────────────

#[derive(Debug, Default, PartialEq, Eq)]
struct Summary {
  succeeded:  usize,
  failed:     usize,
  unfinished: usize,
}

impl Summary {
  fn of(records: &[TaskRecord]) -> Self {
    records.iter().fold(Self::default(), |mut s, r| {
      match r.state {
        TaskState::Succeeded { .. } => s.succeeded += 1,
        TaskState::Failed { .. } => s.failed += 1,
        TaskState::Queued | TaskState::Running => s.unfinished += 1,
      }
      s
    })
  }
}

impl std::fmt::Display for Summary {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "tasks   {} succeeded, {} failed", self.succeeded, self.failed)?;
    if self.unfinished > 0 {
      write!(f, ", {} unfinished", self.unfinished)?;
    }
    Ok(())
  }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

#[cfg(test)]
mod tests {
  use billserve_ingest::{Task, TaskOutput};
  use uuid::Uuid;

  use super::*;

  fn record(state: TaskState) -> TaskRecord {
    TaskRecord {
      id: Uuid::new_v4(),
      task: Task::RebuildAggregation,
      state,
      attempts: 1,
      after: None,
    }
  }

  #[test]
  fn summary_counts_each_state() {
    let records = [
      record(TaskState::Succeeded { output: TaskOutput::Rebuilt { subjects: 3 } }),
      record(TaskState::Failed { error: "boom".into() }),
      record(TaskState::Failed { error: "boom".into() }),
      record(TaskState::Running),
    ];
    let summary = Summary::of(&records);
    assert_eq!(summary, Summary { succeeded: 1, failed: 2, unfinished: 1 });
    assert_eq!(summary.to_string(), "tasks   1 succeeded, 2 failed, 1 unfinished");
  }

  #[test]
  fn tilde_expands_to_home() {
    let Ok(home) = std::env::var("HOME") else { return };
    assert_eq!(expand_tilde(Path::new("~/bills.db")), PathBuf::from(home).join("bills.db"));
    assert_eq!(expand_tilde(Path::new("/tmp/bills.db")), PathBuf::from("/tmp/bills.db"));
  }
}
