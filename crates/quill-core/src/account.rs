//! Account — a registered identity that can own posts and hold a
//! subscription.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::subscription::Subscription;

/// Linkage to a third-party identity provider, recorded when an account is
/// created (or later linked) through the identity bridge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalIdentity {
  /// Provider name, e.g. "google".
  pub provider:    String,
  /// The provider's stable subject identifier.
  pub external_id: String,
}

/// A registered account.
///
/// Exactly one credential path is populated: `password_hash` for local
/// registrations, `external` for accounts created through the identity
/// bridge. The subscription defaults to Free/inactive and is mutated only by
/// the payment projection and the lazy expiry write-back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
  pub account_id:    Uuid,
  pub username:      String,
  pub email:         String,
  pub display_name:  String,
  /// Argon2 PHC string. Never serialised into API responses.
  #[serde(skip_serializing, default)]
  pub password_hash: Option<String>,
  #[serde(skip_serializing, default)]
  pub external:      Option<ExternalIdentity>,
  pub subscription:  Subscription,
  pub created_at:    DateTime<Utc>,
}

/// Input to [`crate::store::BlogStore::create_account`].
/// `account_id` and `created_at` are assigned by the store; the subscription
/// starts at its Free/inactive default.
#[derive(Debug, Clone)]
pub struct NewAccount {
  pub username:      String,
  pub email:         String,
  pub display_name:  String,
  pub password_hash: Option<String>,
  pub external:      Option<ExternalIdentity>,
}
