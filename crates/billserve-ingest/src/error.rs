//! Error type for `billserve-ingest`.

use std::fmt;

use thiserror::Error;

/// Where in a document's ingestion a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
  Fetching,
  Normalizing,
  PersistingCore,
  PersistingRelations,
  SchedulingRelatedBills,
  Done,
}

impl fmt::Display for Stage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Self::Fetching => "fetching",
      Self::Normalizing => "normalizing",
      Self::PersistingCore => "persisting core",
      Self::PersistingRelations => "persisting relations",
      Self::SchedulingRelatedBills => "scheduling related bills",
      Self::Done => "done",
    })
  }
}

#[derive(Debug, Error)]
pub enum Error {
  /// A source document is missing a required field or its outer wrapper.
  #[error("malformed input: {0}")]
  MalformedInput(String),

  #[error("transport error: {0}")]
  Transport(#[source] billserve_govinfo::Error),

  /// A record refers to reference data the store does not hold.
  #[error("unknown {entity}: {key:?}")]
  Referential { entity: &'static str, key: String },

  /// A field value is outside its accepted literal set.
  #[error("invalid value for {field}: {value:?}")]
  ValueDomain { field: String, value: String },

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("{url}: failed while {stage}: {source}")]
  Stage {
    url:    String,
    stage:  Stage,
    #[source]
    source: Box<Error>,
  },

  /// A chained task was handed a predecessor result it cannot use.
  #[error("unexpected chain input: {0}")]
  ChainInput(&'static str),
}

impl Error {
  pub fn store<E: std::error::Error + Send + Sync + 'static>(err: E) -> Self {
    Self::Store(Box::new(err))
  }

  pub fn value(field: &str, value: impl Into<String>) -> Self {
    Self::ValueDomain { field: field.to_owned(), value: value.into() }
  }

  /// Only transport failures are worth another attempt.
  pub fn is_retryable(&self) -> bool {
    match self {
      Self::Transport(_) => true,
      Self::Stage { source, .. } => source.is_retryable(),
      _ => false,
    }
  }

  /// Errors confined to one sub-record of a document. The rest of the
  /// document can still be stored.
  pub fn is_record_scoped(&self) -> bool {
    matches!(self, Self::MalformedInput(_) | Self::Referential { .. } | Self::ValueDomain { .. })
  }
}

impl From<billserve_core::Error> for Error {
  fn from(err: billserve_core::Error) -> Self { Self::MalformedInput(err.to_string()) }
}

impl From<billserve_govinfo::Error> for Error {
  fn from(err: billserve_govinfo::Error) -> Self {
    if err.is_transport() {
      Self::Transport(err)
    } else {
      Self::MalformedInput(err.to_string())
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
