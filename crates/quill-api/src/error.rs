//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("unauthorized")]
  Unauthorized,

  #[error("forbidden: {0}")]
  Forbidden(String),

  #[error("not found: {0}")]
  NotFound(String),

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  /// A payment-contract violation. Indicates caller misuse of the core, so
  /// the response body is a generic message rather than the detail.
  #[error("payment processing error")]
  PaymentProcessing,

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  /// Wrap an opaque backend error.
  pub fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(e))
  }
}

/// Map domain failures to HTTP semantics. Gating rejections keep their
/// user-facing messages; contract violations are flattened to a generic
/// processing error.
impl From<quill_core::Error> for ApiError {
  fn from(e: quill_core::Error) -> Self {
    use quill_core::Error as E;
    match e {
      E::MissingAuthor | E::UnknownPlan(_) | E::NotPurchasable(_) => {
        Self::BadRequest(e.to_string())
      }
      E::LimitReached { .. } | E::NotPostOwner | E::GuestPostImmutable => {
        Self::Forbidden(e.to_string())
      }
      E::SlugTaken(_) | E::AccountExists => Self::Conflict(e.to_string()),
      E::PostNotFound(_) | E::AccountNotFound(_) => {
        Self::NotFound(e.to_string())
      }
      E::InvalidPaymentState { .. } | E::MissingPaymentDate => {
        Self::PaymentProcessing
      }
      E::Serialization(_) => Self::Store(Box::new(e)),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::Unauthorized => {
        (StatusCode::UNAUTHORIZED, "unauthorized".to_string())
      }
      ApiError::Forbidden(m) => (StatusCode::FORBIDDEN, m.clone()),
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::PaymentProcessing => {
        (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
      }
      ApiError::Store(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}
