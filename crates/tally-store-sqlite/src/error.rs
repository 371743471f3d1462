//! Error type for `tally-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] tally_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A stored discriminant or counter that does not decode.
  #[error("corrupt row: {0}")]
  Decode(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Domain errors pass through untouched; everything else is an unexpected
/// storage failure.
impl From<Error> for tally_core::Error {
  fn from(err: Error) -> Self {
    match err {
      Error::Core(e) => e,
      other => tally_core::Error::Storage(Box::new(other)),
    }
  }
}
