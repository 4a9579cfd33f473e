//! Payment records and the projection from a paid record onto an account's
//! subscription.
//!
//! The validity window is one calendar month from the payment date, clamped
//! to the last day of shorter months. A later payment always overwrites the
//! current subscription outright: last payment wins, overlapping periods do
//! not stack.

use chrono::{DateTime, Months, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result, subscription::{Plan, SubscriptionUpdate}};

// ─── Status ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
  Created,
  Attempted,
  Paid,
  Failed,
}

impl PaymentStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Created => "created",
      Self::Attempted => "attempted",
      Self::Paid => "paid",
      Self::Failed => "failed",
    }
  }
}

impl std::fmt::Display for PaymentStatus {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

// ─── Record ──────────────────────────────────────────────────────────────────

/// A checkout attempt and its outcome. Never deleted; `payment_date` and
/// `valid_until` are set exactly once, when the record becomes paid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRecord {
  pub payment_id:   Uuid,
  /// The external gateway's session identifier.
  pub session_id:   String,
  pub account_id:   Uuid,
  pub amount_cents: i64,
  pub currency:     String,
  pub plan:         Plan,
  pub status:       PaymentStatus,
  pub payment_date: Option<DateTime<Utc>>,
  pub valid_until:  Option<DateTime<Utc>>,
  pub created_at:   DateTime<Utc>,
}

/// Input to [`crate::store::BlogStore::create_payment`], written when a
/// checkout is initiated. Status starts at `Created`.
#[derive(Debug, Clone)]
pub struct NewPayment {
  pub session_id:   String,
  pub account_id:   Uuid,
  pub amount_cents: i64,
  pub currency:     String,
  pub plan:         Plan,
}

// ─── Projection ──────────────────────────────────────────────────────────────

/// One calendar month after `at`: same day next month, clamped to the target
/// month's last day (Jan 31 → Feb 29 in a leap year). Saturates at the
/// datetime range boundary, which is unreachable for real payment dates.
pub fn add_calendar_month(at: DateTime<Utc>) -> DateTime<Utc> {
  at.checked_add_months(Months::new(1)).unwrap_or(at)
}

/// Project a paid record onto a subscription assignment.
///
/// Precondition: `record.status == Paid`. Anything else is a caller contract
/// violation surfaced as [`Error::InvalidPaymentState`]. The result is a
/// deterministic function of the record, so re-driving the projection (e.g.
/// on a retried verification) produces the same update.
pub fn project_payment(record: &PaymentRecord) -> Result<SubscriptionUpdate> {
  if record.status != PaymentStatus::Paid {
    return Err(Error::InvalidPaymentState { status: record.status });
  }

  let payment_date = record.payment_date.ok_or(Error::MissingPaymentDate)?;

  Ok(SubscriptionUpdate {
    plan:        record.plan,
    valid_until: record.valid_until.unwrap_or_else(|| add_calendar_month(payment_date)),
    is_active:   true,
  })
}
