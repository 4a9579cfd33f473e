//! Caller resolution from request credentials.
//!
//! Two schemes are accepted:
//!
//! - `Authorization: Basic base64(email:password)` — verified against the
//!   account's stored argon2 PHC hash.
//! - `Authorization: Bearer provider:external-id` — resolved to the linked
//!   account. First-sight account creation happens through the explicit
//!   external sign-in endpoint, not here.
//!
//! Routes that allow guest access resolve to `None` when no header is
//! present; a malformed or non-verifying header is always a 401.

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::http::{HeaderMap, header};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use quill_core::{account::Account, store::BlogStore};

use crate::error::ApiError;

/// Hash a password into an argon2 PHC string for storage.
pub fn hash_password(password: &str) -> Result<String, ApiError> {
  use argon2::{PasswordHasher, password_hash::SaltString};
  use rand_core::OsRng;

  let salt = SaltString::generate(&mut OsRng);
  Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .map(|h| h.to_string())
    .map_err(|e| ApiError::BadRequest(format!("cannot hash password: {e}")))
}

/// Resolve the caller, if any, from the request headers.
pub async fn resolve_caller<S>(
  headers: &HeaderMap,
  store:   &S,
) -> Result<Option<Account>, ApiError>
where
  S: BlogStore,
{
  let Some(header_val) = headers
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
  else {
    return Ok(None);
  };

  if let Some(encoded) = header_val.strip_prefix("Basic ") {
    return verify_basic(encoded, store).await.map(Some);
  }

  if let Some(token) = header_val.strip_prefix("Bearer ") {
    return verify_bearer(token, store).await.map(Some);
  }

  Err(ApiError::Unauthorized)
}

/// Resolve the caller or fail with 401 — for routes that require an account.
pub async fn require_caller<S>(
  headers: &HeaderMap,
  store:   &S,
) -> Result<Account, ApiError>
where
  S: BlogStore,
{
  resolve_caller(headers, store)
    .await?
    .ok_or(ApiError::Unauthorized)
}

async fn verify_basic<S>(encoded: &str, store: &S) -> Result<Account, ApiError>
where
  S: BlogStore,
{
  let decoded = B64.decode(encoded).map_err(|_| ApiError::Unauthorized)?;
  let creds = std::str::from_utf8(&decoded).map_err(|_| ApiError::Unauthorized)?;
  let (email, password) = creds.split_once(':').ok_or(ApiError::Unauthorized)?;

  let account = store
    .find_account_by_email(email)
    .await
    .map_err(ApiError::store)?
    .ok_or(ApiError::Unauthorized)?;

  let hash = account
    .password_hash
    .as_deref()
    .ok_or(ApiError::Unauthorized)?;
  let parsed_hash =
    PasswordHash::new(hash).map_err(|_| ApiError::Unauthorized)?;

  Argon2::default()
    .verify_password(password.as_bytes(), &parsed_hash)
    .map_err(|_| ApiError::Unauthorized)?;

  Ok(account)
}

async fn verify_bearer<S>(token: &str, store: &S) -> Result<Account, ApiError>
where
  S: BlogStore,
{
  let (provider, external_id) =
    token.split_once(':').ok_or(ApiError::Unauthorized)?;

  store
    .find_account_by_external(provider, external_id)
    .await
    .map_err(ApiError::store)?
    .ok_or(ApiError::Unauthorized)
}
