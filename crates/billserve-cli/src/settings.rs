//! Layered runtime settings: defaults, then an optional TOML file, then
//! `BILLSERVE_*` environment variables.

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use anyhow::Context as _;
use billserve_core::party::PartyBuckets;
use billserve_govinfo::{FetchConfig, locate::DEFAULT_BASE_URL};
use billserve_ingest::PipelineConfig;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
  pub host:              String,
  pub port:              u16,
  pub store_path:        PathBuf,
  pub govinfo_base_url:  String,
  pub http_timeout_secs: u64,
  pub user_agent:        Option<String>,
  pub workers:           usize,
  pub task_retries:      u32,
  pub retry_delay_ms:    u64,
  /// Party abbreviation → `red`, `blue` or `white`.
  pub party_buckets:     PartyBuckets,
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      host:              "127.0.0.1".to_owned(),
      port:              8080,
      store_path:        PathBuf::from("billserve.db"),
      govinfo_base_url:  DEFAULT_BASE_URL.to_owned(),
      http_timeout_secs: 30,
      user_agent:        None,
      workers:           4,
      task_retries:      0,
      retry_delay_ms:    1000,
      party_buckets:     PartyBuckets::default(),
    }
  }
}

impl Settings {
  /// Read `path` if it exists and overlay the environment.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("BILLSERVE").try_parsing(true))
      .build()
      .context("failed to read configuration")?
      .try_deserialize()
      .context("failed to deserialise Settings")
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }

  pub fn fetch_config(&self) -> FetchConfig {
    FetchConfig {
      timeout:    Duration::from_secs(self.http_timeout_secs),
      user_agent: self.user_agent.clone(),
    }
  }

  pub fn pipeline_config(&self) -> PipelineConfig {
    PipelineConfig {
      workers:       self.workers,
      task_retries:  self.task_retries,
      retry_delay:   Duration::from_millis(self.retry_delay_ms),
      // Configuration keys may arrive lowercased; abbreviations are stored uppercase.
      party_buckets: PartyBuckets::new(
        self
          .party_buckets
          .iter()
          .map(|(abbreviation, bucket)| (abbreviation.to_uppercase(), bucket)),
      ),
    }
  }
}
