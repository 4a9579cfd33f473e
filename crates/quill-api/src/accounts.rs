//! Handlers for `/accounts` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/accounts` | Register with email + password |
//! | `POST` | `/accounts/external` | Sign in through an identity provider |
//! | `GET`  | `/accounts/me` | The authenticated caller's account |

use axum::{
  Json,
  extract::State,
  http::{HeaderMap, StatusCode},
  response::IntoResponse,
};
use chrono::Utc;
use quill_core::{
  Error,
  account::{Account, NewAccount},
  gateway::PaymentGateway,
  store::{BlogStore, ExternalProfile, IdentityBridge},
  subscription::refresh_subscription,
};
use serde::Deserialize;

use crate::{AppState, auth, error::ApiError};

// ─── Register ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RegisterBody {
  pub username:     String,
  pub email:        String,
  pub display_name: String,
  pub password:     String,
}

/// `POST /accounts` — returns 201 + the new account.
pub async fn register<S, G>(
  State(state): State<AppState<S, G>>,
  Json(body): Json<RegisterBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: BlogStore + IdentityBridge + Clone + Send + Sync + 'static,
  G: PaymentGateway + Clone + Send + Sync + 'static,
{
  let username = body.username.trim().to_lowercase();
  let email = body.email.trim().to_lowercase();
  let display_name = body.display_name.trim().to_string();

  if username.is_empty() || email.is_empty() || display_name.is_empty() {
    return Err(ApiError::BadRequest(
      "username, email, and display name are required".to_string(),
    ));
  }
  if body.password.is_empty() {
    return Err(ApiError::BadRequest("password is required".to_string()));
  }

  if store_has_account(&*state.store, &username, &email).await? {
    return Err(Error::AccountExists.into());
  }

  let account = state
    .store
    .create_account(NewAccount {
      username,
      email,
      display_name,
      password_hash: Some(auth::hash_password(&body.password)?),
      external: None,
    })
    .await
    .map_err(ApiError::store)?;

  Ok((StatusCode::CREATED, Json(account)))
}

async fn store_has_account<S>(
  store:    &S,
  username: &str,
  email:    &str,
) -> Result<bool, ApiError>
where
  S: BlogStore,
{
  let by_email = store
    .find_account_by_email(email)
    .await
    .map_err(ApiError::store)?;
  if by_email.is_some() {
    return Ok(true);
  }
  let by_username = store
    .find_account_by_username(username)
    .await
    .map_err(ApiError::store)?;
  Ok(by_username.is_some())
}

// ─── External sign-in ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ExternalSignInBody {
  pub provider:     String,
  pub external_id:  String,
  pub email:        String,
  pub username:     String,
  pub display_name: String,
}

/// `POST /accounts/external` — resolve a provider-asserted identity to a
/// local account, creating one on first sight.
///
/// An unlinked account that already owns the email is not silently taken
/// over; linking requires the password-authenticated flow.
pub async fn external_sign_in<S, G>(
  State(state): State<AppState<S, G>>,
  Json(body): Json<ExternalSignInBody>,
) -> Result<Json<Account>, ApiError>
where
  S: BlogStore + IdentityBridge + Clone + Send + Sync + 'static,
  G: PaymentGateway + Clone + Send + Sync + 'static,
{
  let email = body.email.trim().to_lowercase();

  let linked = state
    .store
    .find_account_by_external(&body.provider, &body.external_id)
    .await
    .map_err(ApiError::store)?;

  if linked.is_none()
    && state
      .store
      .find_account_by_email(&email)
      .await
      .map_err(ApiError::store)?
      .is_some()
  {
    return Err(Error::AccountExists.into());
  }

  let account = IdentityBridge::resolve(&*state.store, ExternalProfile {
    provider:     body.provider,
    external_id:  body.external_id,
    email,
    username:     body.username.trim().to_lowercase(),
    display_name: body.display_name.trim().to_string(),
  })
  .await
  .map_err(ApiError::store)?;

  Ok(Json(account))
}

// ─── Me ───────────────────────────────────────────────────────────────────────

/// `GET /accounts/me` — the caller's account with its subscription freshly
/// lazy-expired.
pub async fn me<S, G>(
  State(state): State<AppState<S, G>>,
  headers: HeaderMap,
) -> Result<Json<Account>, ApiError>
where
  S: BlogStore + IdentityBridge + Clone + Send + Sync + 'static,
  G: PaymentGateway + Clone + Send + Sync + 'static,
{
  let mut account = auth::require_caller(&headers, &*state.store).await?;
  refresh_subscription(&*state.store, &mut account, Utc::now())
    .await
    .map_err(ApiError::store)?;
  Ok(Json(account))
}
