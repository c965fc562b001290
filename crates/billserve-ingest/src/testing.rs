//! In-memory fixtures for pipeline tests.

use std::{
  collections::HashMap,
  sync::{Arc, Mutex, PoisonError},
  time::Duration,
};

use billserve_core::party::PartyBuckets;
use billserve_govinfo::{DocumentSource, Error as FetchError, Locator};
use billserve_store_sqlite::SqliteStore;

use crate::{Pipeline, PipelineConfig, PipelineHandle};

pub const HR996: &[u8] = include_bytes!("../fixtures/BILLSTATUS-115hr996.xml");
pub const S534: &[u8] = include_bytes!("../fixtures/BILLSTATUS-115s534.xml");

/// URL → body map that counts how often each URL was fetched. Unknown URLs
/// answer 404.
#[derive(Clone, Default)]
pub struct StaticSource {
  documents: Arc<HashMap<String, Vec<u8>>>,
  fetches:   Arc<Mutex<HashMap<String, usize>>>,
}

impl StaticSource {
  pub fn new(documents: impl IntoIterator<Item = (String, Vec<u8>)>) -> Self {
    Self { documents: Arc::new(documents.into_iter().collect()), ..Self::default() }
  }

  pub fn fetch_count(&self, url: &str) -> usize {
    let fetches = self.fetches.lock().unwrap_or_else(PoisonError::into_inner);
    fetches.get(url).copied().unwrap_or(0)
  }
}

impl DocumentSource for StaticSource {
  async fn fetch(&self, url: String) -> Result<Vec<u8>, FetchError> {
    *self
      .fetches
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .entry(url.clone())
      .or_default() += 1;
    self
      .documents
      .get(&url)
      .cloned()
      .ok_or(FetchError::Transport { url, status: 404 })
  }
}

pub fn config(workers: usize) -> PipelineConfig {
  PipelineConfig {
    workers,
    task_retries: 0,
    retry_delay: Duration::from_millis(1),
    party_buckets: PartyBuckets::default(),
  }
}

pub async fn start(source: StaticSource, config: PipelineConfig) -> (Arc<SqliteStore>, PipelineHandle) {
  let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
  let handle = Pipeline::start(store.clone(), source, Locator::default(), config);
  (store, handle)
}

pub fn url(congress: u32, bill_type: &str, number: u32) -> String {
  Locator::default().document_url(congress, bill_type, number)
}
