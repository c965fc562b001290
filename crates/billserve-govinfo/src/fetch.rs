//! Fetching raw documents over HTTP.

use std::{future::Future, time::Duration};

use reqwest::{
  Client,
  header::{ACCEPT, ACCEPT_ENCODING, ACCEPT_LANGUAGE, HeaderMap, HeaderValue},
};

use crate::{Error, Result};

/// The upstream source rejects clients that do not send these.
const ACCEPT_VALUE: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";
const ACCEPT_ENCODING_VALUE: &str = "gzip, deflate, br";
const ACCEPT_LANGUAGE_VALUE: &str = "en-US,en;q=0.5";

/// Anything that can turn a URL into document bytes.
///
/// The ingestion pipeline only depends on this trait; tests substitute an
/// in-memory map.
pub trait DocumentSource: Send + Sync {
  fn fetch(&self, url: String) -> impl Future<Output = Result<Vec<u8>>> + Send + '_;
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
  /// Whole-request timeout. A stuck fetch holds its worker until this fires.
  pub timeout:    Duration,
  pub user_agent: Option<String>,
}

impl Default for FetchConfig {
  fn default() -> Self { Self { timeout: Duration::from_secs(30), user_agent: None } }
}

/// A [`DocumentSource`] backed by `reqwest` with rustls certificate
/// verification.
///
/// Performs exactly one GET per call; retrying is left to the caller.
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
  client: Client,
}

impl HttpFetcher {
  pub fn new(config: &FetchConfig) -> Result<Self> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_VALUE));
    headers.insert(ACCEPT_ENCODING, HeaderValue::from_static(ACCEPT_ENCODING_VALUE));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static(ACCEPT_LANGUAGE_VALUE));

    let mut builder = Client::builder()
      .default_headers(headers)
      .gzip(true)
      .brotli(true)
      .deflate(true)
      .timeout(config.timeout);
    if let Some(user_agent) = &config.user_agent {
      builder = builder.user_agent(user_agent.clone());
    }

    Ok(Self { client: builder.build()? })
  }
}

impl DocumentSource for HttpFetcher {
  async fn fetch(&self, url: String) -> Result<Vec<u8>> {
    tracing::debug!(%url, "fetching document");
    let resp = self.client.get(&url).send().await?;

    let status = resp.status();
    if !status.is_success() {
      return Err(Error::Transport { url, status: status.as_u16() });
    }
    Ok(resp.bytes().await?.to_vec())
  }
}
