//! Error type for `billserve-govinfo`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// The source answered with a non-success status.
  #[error("http status {status} for {url}")]
  Transport { url: String, status: u16 },

  #[error("request failed: {0}")]
  Request(#[from] reqwest::Error),

  #[error("xml error: {0}")]
  Xml(String),

  #[error("manifest is not valid: {0}")]
  Manifest(#[from] serde_json::Error),
}

impl Error {
  /// True for failures a later attempt might not hit again.
  pub fn is_transport(&self) -> bool { matches!(self, Self::Transport { .. } | Self::Request(_)) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
