//! Tier limits and the quota gate applied to post creation.
//!
//! The plan → limits table is an injected configuration value, not a
//! module-level constant, so alternate tables can be substituted in tests
//! and from the server config. Quota checks always run a fresh owned-post
//! count; the limit is a strict per-request gate, not a cached signal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{account::Account, store::BlogStore, subscription::Plan};

// ─── Limits table ────────────────────────────────────────────────────────────

/// Feature switches attached to a tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Features {
  pub custom_domain:      bool,
  pub remove_ads:         bool,
  pub advanced_analytics: bool,
  pub priority_support:   bool,
  pub team_collaboration: bool,
  pub api_access:         bool,
}

/// Limits for a single tier. `max_posts = None` means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierLimits {
  pub max_posts: Option<u32>,
  pub features:  Features,
}

impl TierLimits {
  /// Compute the quota snapshot for an owner with `count` existing posts.
  /// The boundary is inclusive: `count == max_posts` means zero remaining.
  pub fn quota(&self, count: u64) -> Quota {
    match self.max_posts {
      None => Quota { remaining: None, limit_reached: false },
      Some(max) => Quota {
        remaining:     Some(u64::from(max).saturating_sub(count) as u32),
        limit_reached: count >= u64::from(max),
      },
    }
  }
}

/// The full plan → limits mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierTable {
  pub free:     TierLimits,
  pub pro:      TierLimits,
  pub business: TierLimits,
}

impl TierTable {
  pub fn limits(&self, plan: Plan) -> &TierLimits {
    match plan {
      Plan::Free => &self.free,
      Plan::Pro => &self.pro,
      Plan::Business => &self.business,
    }
  }
}

impl Default for TierTable {
  fn default() -> Self {
    Self {
      free:     TierLimits {
        max_posts: Some(5),
        features:  Features {
          custom_domain:      false,
          remove_ads:         false,
          advanced_analytics: false,
          priority_support:   false,
          team_collaboration: false,
          api_access:         false,
        },
      },
      pro:      TierLimits {
        max_posts: None,
        features:  Features {
          custom_domain:      true,
          remove_ads:         true,
          advanced_analytics: true,
          priority_support:   true,
          team_collaboration: false,
          api_access:         false,
        },
      },
      business: TierLimits {
        max_posts: None,
        features:  Features {
          custom_domain:      true,
          remove_ads:         true,
          advanced_analytics: true,
          priority_support:   true,
          team_collaboration: true,
          api_access:         true,
        },
      },
    }
  }
}

// ─── Quota ───────────────────────────────────────────────────────────────────

/// Remaining-quota snapshot for an account. `remaining = None` encodes an
/// unbounded plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quota {
  pub remaining:     Option<u32>,
  pub limit_reached: bool,
}

// ─── Gate ────────────────────────────────────────────────────────────────────

/// Error from [`QuotaGate::admit`]: either the backing count query failed or
/// the gate denied the request.
#[derive(Debug, Error)]
pub enum AdmitError<E>
where
  E: std::error::Error + Send + Sync + 'static,
{
  #[error("store error: {0}")]
  Store(#[source] E),

  #[error(transparent)]
  Denied(crate::Error),
}

/// The quota gate evaluated before any post is persisted.
///
/// Quota only applies to registered accounts; guest submissions never pass
/// through here. Decisions use the account's *effective* plan, so an expired
/// paid subscription is limited like Free without its stored plan changing.
#[derive(Debug, Clone)]
pub struct QuotaGate {
  table: TierTable,
}

impl QuotaGate {
  pub fn new(table: TierTable) -> Self { Self { table } }

  pub fn table(&self) -> &TierTable { &self.table }

  /// Compute the quota snapshot for `account`, counting its owned posts
  /// fresh. Unbounded plans skip the count entirely.
  pub async fn evaluate<S>(
    &self,
    account: &Account,
    now:     DateTime<Utc>,
    store:   &S,
  ) -> std::result::Result<Quota, S::Error>
  where
    S: BlogStore,
  {
    let plan = account.subscription.effective_plan(now);
    let limits = self.table.limits(plan);
    if limits.max_posts.is_none() {
      return Ok(Quota { remaining: None, limit_reached: false });
    }
    let count = store.count_posts_by_owner(account.account_id).await?;
    Ok(limits.quota(count))
  }

  /// Gate contract: pass, or deny with the plan and cap named. Runs before
  /// content persistence; on denial nothing has been written.
  pub async fn admit<S>(
    &self,
    account: &Account,
    now:     DateTime<Utc>,
    store:   &S,
  ) -> std::result::Result<Quota, AdmitError<S::Error>>
  where
    S: BlogStore,
    S::Error: std::error::Error + Send + Sync + 'static,
  {
    let quota = self
      .evaluate(account, now, store)
      .await
      .map_err(AdmitError::Store)?;

    if quota.limit_reached {
      let plan = account.subscription.effective_plan(now);
      let max_posts = self
        .table
        .limits(plan)
        .max_posts
        .unwrap_or_default();
      return Err(AdmitError::Denied(crate::Error::LimitReached {
        plan,
        max_posts,
      }));
    }

    Ok(quota)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn free_limits() -> TierLimits {
    *TierTable::default().limits(Plan::Free)
  }

  #[test]
  fn boundary_is_inclusive_at_the_cap() {
    let limits = free_limits();

    let at_cap = limits.quota(5);
    assert_eq!(at_cap.remaining, Some(0));
    assert!(at_cap.limit_reached);

    let under = limits.quota(4);
    assert_eq!(under.remaining, Some(1));
    assert!(!under.limit_reached);
  }

  #[test]
  fn over_the_cap_clamps_remaining_to_zero() {
    let limits = free_limits();
    let over = limits.quota(7);
    assert_eq!(over.remaining, Some(0));
    assert!(over.limit_reached);
  }

  #[test]
  fn unbounded_plans_never_reach_the_limit() {
    let table = TierTable::default();
    for plan in [Plan::Pro, Plan::Business] {
      let limits = table.limits(plan);
      for count in [0u64, 5, 10_000] {
        let quota = limits.quota(count);
        assert_eq!(quota.remaining, None);
        assert!(!quota.limit_reached);
      }
    }
  }

  #[test]
  fn alternate_table_is_respected() {
    let mut table = TierTable::default();
    table.free.max_posts = Some(2);

    let quota = table.limits(Plan::Free).quota(2);
    assert!(quota.limit_reached);
  }
}
