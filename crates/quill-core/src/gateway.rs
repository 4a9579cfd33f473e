//! Payment gateway contract.
//!
//! The core never talks to a gateway directly beyond this surface: it
//! initiates checkout sessions and reads back a normalized session status.
//! The projection itself (`payment::project_payment`) consumes only the
//! locally stored [`crate::payment::PaymentRecord`].

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::{account::Account, subscription::Plan};

/// A newly created checkout session the caller should be redirected to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
  pub session_id:   String,
  pub redirect_url: String,
}

/// Normalized settlement state of a gateway session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayPaymentStatus {
  Paid,
  Unpaid,
}

/// What the gateway reports for a session on retrieval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewaySession {
  pub payment_status: GatewayPaymentStatus,
  pub amount_cents:   i64,
  pub currency:       String,
}

/// Abstraction over the external payment provider.
pub trait PaymentGateway: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Open a checkout session for `plan` on behalf of `account`.
  fn create_checkout_session<'a>(
    &'a self,
    account:      &'a Account,
    plan:         Plan,
    amount_cents: i64,
  ) -> impl Future<Output = Result<CheckoutSession, Self::Error>> + Send + 'a;

  /// Fetch the current settlement state of a previously created session.
  fn retrieve_session<'a>(
    &'a self,
    session_id: &'a str,
  ) -> impl Future<Output = Result<GatewaySession, Self::Error>> + Send + 'a;
}
