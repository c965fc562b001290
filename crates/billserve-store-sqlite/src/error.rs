//! Error type for `billserve-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("unknown legislator kind: {0:?}")]
  UnknownLegislatorKind(String),

  #[error("bill not found: {0}")]
  BillNotFound(uuid::Uuid),

  /// A get-or-create kept losing to concurrent writers.
  #[error("could not resolve {entity} after repeated insert conflicts")]
  UpsertConflict { entity: &'static str },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
