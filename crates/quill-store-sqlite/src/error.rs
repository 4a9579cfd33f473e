//! Error type for `quill-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] quill_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A stored row violated an invariant the schema should uphold.
  #[error("corrupt row: {0}")]
  Decode(String),

  #[error("account not found: {0}")]
  AccountNotFound(uuid::Uuid),

  #[error("post not found: {0}")]
  PostNotFound(uuid::Uuid),

  #[error("no payment record for session {0:?}")]
  PaymentNotFound(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
