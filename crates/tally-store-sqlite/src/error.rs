//! Error type for `tally-store-sqlite`.

use tally_core::store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A text column held a value no enum variant maps to.
  #[error("unknown {column} value: {value:?}")]
  UnknownDiscriminant {
    column: &'static str,
    value:  String,
  },
}

impl StoreError for Error {
  fn is_conflict(&self) -> bool {
    matches!(self, Self::Database(e) if is_unique_violation(e))
  }
}

/// A `UNIQUE` or primary-key constraint rejected the write. Foreign-key and
/// `CHECK` failures share the primary code, so the extended code decides.
fn is_unique_violation(err: &tokio_rusqlite::Error) -> bool {
  match err {
    tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(e, _)) => {
      e.code == rusqlite::ErrorCode::ConstraintViolation
        && matches!(
          e.extended_code,
          rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE | rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
        )
    }
    _ => false,
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
