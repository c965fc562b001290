//! Error types for `billserve-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// Every required field absent from a record's top level, in declared order.
  #[error("missing required fields: {}", .0.join(", "))]
  MissingFields(Vec<String>),

  #[error("{0} is not a mapping")]
  NotAMapping(String),

  #[error("field {field:?} is not {expected}")]
  UnexpectedType {
    field:    String,
    expected: &'static str,
  },

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
