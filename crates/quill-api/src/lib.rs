//! JSON REST API for Quill.
//!
//! Exposes an axum [`Router`] backed by any [`quill_core::store::BlogStore`]
//! and [`quill_core::gateway::PaymentGateway`]. TLS and transport concerns
//! are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", quill_api::api_router(state))
//! ```

pub mod accounts;
pub mod auth;
pub mod error;
pub mod payments;
pub mod posts;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use quill_core::{
  author::GuestPolicy,
  gateway::PaymentGateway,
  store::{BlogStore, IdentityBridge},
  tier::QuotaGate,
};

pub use error::ApiError;

/// Shared state threaded through all axum handlers.
#[derive(Clone)]
pub struct AppState<S, G> {
  pub store:        Arc<S>,
  pub gateway:      Arc<G>,
  pub quota:        Arc<QuotaGate>,
  pub guest_policy: Arc<GuestPolicy>,
}

/// Build a fully-materialised API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S, G>(state: AppState<S, G>) -> Router<()>
where
  S: BlogStore + IdentityBridge + Clone + Send + Sync + 'static,
  G: PaymentGateway + Clone + Send + Sync + 'static,
{
  Router::new()
    // Accounts
    .route("/accounts", post(accounts::register::<S, G>))
    .route("/accounts/external", post(accounts::external_sign_in::<S, G>))
    .route("/accounts/me", get(accounts::me::<S, G>))
    // Posts
    .route("/posts", get(posts::list::<S, G>).post(posts::create::<S, G>))
    .route(
      "/posts/{id}",
      get(posts::get_one::<S, G>)
        .put(posts::update::<S, G>)
        .delete(posts::delete_one::<S, G>),
    )
    .route("/posts/{id}/like", post(posts::toggle_like::<S, G>))
    // Payments
    .route("/payments", get(payments::history::<S, G>))
    .route("/payments/checkout", post(payments::checkout::<S, G>))
    .route("/payments/verify", post(payments::verify::<S, G>))
    .route("/payments/subscription", get(payments::subscription_status::<S, G>))
    .with_state(state)
}

#[cfg(test)]
mod tests;
