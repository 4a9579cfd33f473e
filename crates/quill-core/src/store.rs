//! The `BlogStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g. `quill-store-sqlite`).
//! Higher layers (`quill-api`, `quill-server`) depend on this abstraction,
//! not on any concrete backend.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  account::{Account, NewAccount},
  payment::{NewPayment, PaymentRecord},
  post::{NewPost, Post},
  subscription::Subscription,
};

// ─── Query types ─────────────────────────────────────────────────────────────

/// Parameters for [`BlogStore::list_posts`].
#[derive(Debug, Clone, Default)]
pub struct PostQuery {
  /// Free-text filter over title and body.
  pub text:   Option<String>,
  /// Restrict to posts carrying this tag.
  pub tag:    Option<String>,
  /// Restrict to posts owned by this registered account.
  pub owner:  Option<Uuid>,
  /// The authenticated reader, if any. Unpublished posts are returned only
  /// to their own registered owner.
  pub viewer: Option<Uuid>,
  pub limit:  Option<usize>,
  pub offset: Option<usize>,
}

/// Fields of a post its registered owner may change. `None` leaves a field
/// untouched; a new title re-derives the slug.
#[derive(Debug, Clone, Default)]
pub struct PostPatch {
  pub title:     Option<String>,
  pub body:      Option<String>,
  pub excerpt:   Option<String>,
  pub published: Option<bool>,
  pub tags:      Option<Vec<String>>,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a Quill storage backend.
///
/// No operation here is transactional across entities: the quota gate's
/// count-then-create sequence and the payment/subscription write pair are
/// separate calls by design, so every write is individually idempotent or
/// safely re-drivable.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait BlogStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Accounts ──────────────────────────────────────────────────────────

  /// Create and persist an account with a Free/inactive subscription.
  /// Fails if the username or email is already taken.
  fn create_account(
    &self,
    input: NewAccount,
  ) -> impl Future<Output = Result<Account, Self::Error>> + Send + '_;

  /// Retrieve an account by id. Returns `None` if not found.
  fn get_account(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Account>, Self::Error>> + Send + '_;

  fn find_account_by_email<'a>(
    &'a self,
    email: &'a str,
  ) -> impl Future<Output = Result<Option<Account>, Self::Error>> + Send + 'a;

  fn find_account_by_username<'a>(
    &'a self,
    username: &'a str,
  ) -> impl Future<Output = Result<Option<Account>, Self::Error>> + Send + 'a;

  /// Look up the account linked to a third-party identity.
  fn find_account_by_external<'a>(
    &'a self,
    provider:    &'a str,
    external_id: &'a str,
  ) -> impl Future<Output = Result<Option<Account>, Self::Error>> + Send + 'a;

  /// Overwrite the account's subscription. Used by the payment projection
  /// and the lazy expiry write-back; both apply cleanly more than once.
  fn update_subscription<'a>(
    &'a self,
    id:           Uuid,
    subscription: &'a Subscription,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  // ── Posts ─────────────────────────────────────────────────────────────

  /// Persist a new post. The slug is derived from the title; a duplicate
  /// slug fails without writing anything.
  fn create_post(
    &self,
    input: NewPost,
  ) -> impl Future<Output = Result<Post, Self::Error>> + Send + '_;

  /// Count posts owned by a registered account, in any publish state.
  /// Always a fresh query; quota gating must not see cached counts.
  fn count_posts_by_owner(
    &self,
    account_id: Uuid,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  fn get_post(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Post>, Self::Error>> + Send + '_;

  fn find_post_by_slug<'a>(
    &'a self,
    slug: &'a str,
  ) -> impl Future<Output = Result<Option<Post>, Self::Error>> + Send + 'a;

  fn list_posts<'a>(
    &'a self,
    query: &'a PostQuery,
  ) -> impl Future<Output = Result<Vec<Post>, Self::Error>> + Send + 'a;

  /// Apply a patch to an existing post. Ownership is the caller's concern;
  /// the store only enforces slug uniqueness when the title changes.
  fn update_post(
    &self,
    id:    Uuid,
    patch: PostPatch,
  ) -> impl Future<Output = Result<Post, Self::Error>> + Send + '_;

  fn delete_post(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Toggle whether `account_id` likes the post; returns the updated post.
  fn toggle_like(
    &self,
    id:         Uuid,
    account_id: Uuid,
  ) -> impl Future<Output = Result<Post, Self::Error>> + Send + '_;

  // ── Payments ──────────────────────────────────────────────────────────

  /// Record an initiated checkout (status `Created`).
  fn create_payment(
    &self,
    input: NewPayment,
  ) -> impl Future<Output = Result<PaymentRecord, Self::Error>> + Send + '_;

  fn find_payment_by_session<'a>(
    &'a self,
    session_id: &'a str,
  ) -> impl Future<Output = Result<Option<PaymentRecord>, Self::Error>> + Send + 'a;

  /// Transition a record to `Paid`, stamping the payment date and validity
  /// window exactly once. Calling again on an already-paid record is a
  /// no-op returning the stored record, so verification can be re-driven.
  fn mark_payment_paid<'a>(
    &'a self,
    session_id:   &'a str,
    payment_date: DateTime<Utc>,
    valid_until:  DateTime<Utc>,
  ) -> impl Future<Output = Result<PaymentRecord, Self::Error>> + Send + 'a;

  /// Transition a record to `Failed`. Paid records are never demoted.
  fn mark_payment_failed<'a>(
    &'a self,
    session_id: &'a str,
  ) -> impl Future<Output = Result<PaymentRecord, Self::Error>> + Send + 'a;

  /// Payment history for an account, newest first.
  fn list_payments(
    &self,
    account_id: Uuid,
  ) -> impl Future<Output = Result<Vec<PaymentRecord>, Self::Error>> + Send + '_;
}

// ─── Identity bridge ─────────────────────────────────────────────────────────

/// Profile attributes asserted by a third-party identity provider, used to
/// create a local account on first sign-in.
#[derive(Debug, Clone)]
pub struct ExternalProfile {
  pub provider:     String,
  pub external_id:  String,
  pub email:        String,
  pub username:     String,
  pub display_name: String,
}

/// Resolves a third-party-authenticated caller to a local account, creating
/// one (Free/inactive subscription) on first sight. Downstream authorship
/// resolution only ever sees the resolved [`Account`], never raw provider
/// tokens.
pub trait IdentityBridge: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn resolve(
    &self,
    profile: ExternalProfile,
  ) -> impl Future<Output = Result<Account, Self::Error>> + Send + '_;
}
