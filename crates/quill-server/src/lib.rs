//! Server assembly for Quill: configuration, the local payment gateway, and
//! the application router.

pub mod gateway;

use std::{path::PathBuf, sync::Arc};

use axum::Router;
use quill_api::AppState;
use quill_core::{author::GuestPolicy, tier::{QuotaGate, TierTable}};
use quill_store_sqlite::SqliteStore;
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use gateway::LocalGateway;

// ─── Configuration ────────────────────────────────────────────────────────────

fn default_approve_payments() -> bool { true }

/// Runtime server configuration, deserialised from `config.toml` with
/// `QUILL_`-prefixed environment overrides.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  pub host:       String,
  pub port:       u16,
  pub store_path: PathBuf,
  /// Where checkout redirects point; also the base for the local gateway's
  /// session URLs.
  pub base_url:   String,
  /// What to do with creation requests that name no author at all.
  #[serde(default)]
  pub guest_policy: GuestPolicy,
  /// Plan → limits table; override per deployment to tune caps.
  #[serde(default)]
  pub tiers: TierTable,
  /// Whether the local gateway settles sessions as paid. Disable to
  /// exercise the declined-payment path.
  #[serde(default = "default_approve_payments")]
  pub approve_payments: bool,
}

// ─── Application ──────────────────────────────────────────────────────────────

/// Build the application router over an opened store.
pub fn app(store: SqliteStore, config: &ServerConfig) -> Router {
  let gateway =
    LocalGateway::new(config.base_url.clone(), config.approve_payments);

  let state = AppState {
    store:        Arc::new(store),
    gateway:      Arc::new(gateway),
    quota:        Arc::new(QuotaGate::new(config.tiers.clone())),
    guest_policy: Arc::new(config.guest_policy.clone()),
  };

  Router::new()
    .nest("/api", quill_api::api_router(state))
    .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn minimal_config() -> ServerConfig {
    let settings = config::Config::builder()
      .add_source(config::File::from_str(
        r#"
          host = "127.0.0.1"
          port = 8080
          store_path = "quill.db"
          base_url = "http://localhost:8080"
        "#,
        config::FileFormat::Toml,
      ))
      .build()
      .unwrap();
    settings.try_deserialize().unwrap()
  }

  #[test]
  fn config_defaults_are_strict_and_approving() {
    let cfg = minimal_config();
    assert_eq!(cfg.guest_policy, GuestPolicy::Strict);
    assert!(cfg.approve_payments);
    assert_eq!(cfg.tiers, TierTable::default());
  }

  #[test]
  fn config_accepts_policy_and_tier_overrides() {
    let settings = config::Config::builder()
      .add_source(config::File::from_str(
        r#"
          host = "127.0.0.1"
          port = 8080
          store_path = "quill.db"
          base_url = "http://localhost:8080"
          approve_payments = false

          [guest_policy]
          mode = "lenient"
          fallback = "Anonymous Guest"

          [tiers.free]
          max_posts = 3
          features = { custom_domain = false, remove_ads = false, advanced_analytics = false, priority_support = false, team_collaboration = false, api_access = false }

          [tiers.pro]
          features = { custom_domain = true, remove_ads = true, advanced_analytics = true, priority_support = true, team_collaboration = false, api_access = false }

          [tiers.business]
          features = { custom_domain = true, remove_ads = true, advanced_analytics = true, priority_support = true, team_collaboration = true, api_access = true }
        "#,
        config::FileFormat::Toml,
      ))
      .build()
      .unwrap();
    let cfg: ServerConfig = settings.try_deserialize().unwrap();

    assert!(matches!(
      cfg.guest_policy,
      GuestPolicy::Lenient { ref fallback } if fallback == "Anonymous Guest"
    ));
    assert!(!cfg.approve_payments);
    assert_eq!(cfg.tiers.free.max_posts, Some(3));
    assert_eq!(cfg.tiers.pro.max_posts, None);
  }
}
