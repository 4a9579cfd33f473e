//! Subscription state — the account-level plan assignment that payments
//! write and quota checks read.
//!
//! Expiry is observed, never scheduled: there is no background sweep. Every
//! read derives the active flag from the clock and, when a stored record has
//! gone stale, writes the correction back once. A failed write-back is
//! harmless; the next read recomputes the same answer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  account::Account,
  store::BlogStore,
};

// ─── Plan ────────────────────────────────────────────────────────────────────

/// The named subscription tier. Serialised capitalised ("Free", "Pro",
/// "Business") to match the stored plan names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Plan {
  Free,
  Pro,
  Business,
}

impl Plan {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Free => "Free",
      Self::Pro => "Pro",
      Self::Business => "Business",
    }
  }

  pub fn parse(s: &str) -> Result<Self> {
    match s {
      "Free" => Ok(Self::Free),
      "Pro" => Ok(Self::Pro),
      "Business" => Ok(Self::Business),
      other => Err(Error::UnknownPlan(other.to_string())),
    }
  }

  /// Monthly price in cents. `None` for Free, which cannot be purchased.
  pub fn monthly_price_cents(self) -> Option<u32> {
    match self {
      Self::Free => None,
      Self::Pro => Some(1200),
      Self::Business => Some(4900),
    }
  }
}

impl std::fmt::Display for Plan {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

// ─── Subscription ────────────────────────────────────────────────────────────

/// An account's current plan assignment.
///
/// Free never expires and carries no `valid_until` semantics. For paid plans,
/// `is_active` is true only while `valid_until` lies in the future; the flag
/// is corrected lazily on read, never rewritten to the Free plan literal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
  pub plan:        Plan,
  pub valid_until: Option<DateTime<Utc>>,
  pub is_active:   bool,
}

impl Default for Subscription {
  fn default() -> Self {
    Self { plan: Plan::Free, valid_until: None, is_active: false }
  }
}

impl Subscription {
  /// Whether the stored record claims active but the window has passed.
  pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
    self.is_active
      && self.valid_until.is_some_and(|until| now >= until)
  }

  /// Correct a stale active flag in place. Returns `true` if anything
  /// changed, so callers know whether to persist. Idempotent.
  pub fn lapse(&mut self, now: DateTime<Utc>) -> bool {
    if self.is_stale(now) {
      self.is_active = false;
      true
    } else {
      false
    }
  }

  /// The plan used for quota decisions. An expired paid subscription is
  /// treated as Free without mutating the stored plan name.
  pub fn effective_plan(&self, now: DateTime<Utc>) -> Plan {
    if self.plan == Plan::Free {
      return Plan::Free;
    }
    let live = self.is_active && !self.is_stale(now);
    if live { self.plan } else { Plan::Free }
  }
}

// ─── SubscriptionUpdate ──────────────────────────────────────────────────────

/// The assignment a paid payment record projects onto an account.
/// Applied as an unconditional overwrite: last payment wins, no stacking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionUpdate {
  pub plan:        Plan,
  pub valid_until: DateTime<Utc>,
  pub is_active:   bool,
}

impl SubscriptionUpdate {
  pub fn into_subscription(self) -> Subscription {
    Subscription {
      plan:        self.plan,
      valid_until: Some(self.valid_until),
      is_active:   self.is_active,
    }
  }
}

// ─── Lazy refresh ────────────────────────────────────────────────────────────

/// Re-derive an account's subscription-active flag from the clock and
/// persist the correction if the stored record was stale.
///
/// Safe to call on every read; it writes at most once per stale record.
pub async fn refresh_subscription<S>(
  store:   &S,
  account: &mut Account,
  now:     DateTime<Utc>,
) -> std::result::Result<(), S::Error>
where
  S: BlogStore,
{
  if account.subscription.lapse(now) {
    store
      .update_subscription(account.account_id, &account.subscription)
      .await?;
  }
  Ok(())
}
