//! [`LocalGateway`] — an in-process payment gateway.
//!
//! Sessions are held in memory and settle according to configuration, so the
//! whole checkout → verify flow can be exercised without a real payment
//! provider. A production deployment would put a provider-backed
//! implementation of [`PaymentGateway`] here instead.

use std::{
  collections::HashMap,
  sync::{Arc, Mutex},
};

use quill_core::{
  account::Account,
  gateway::{
    CheckoutSession, GatewayPaymentStatus, GatewaySession, PaymentGateway,
  },
  subscription::Plan,
};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unknown gateway session: {0}")]
  UnknownSession(String),
}

/// Cloning is cheap — the session table is shared.
#[derive(Clone)]
pub struct LocalGateway {
  base_url: String,
  approve:  bool,
  sessions: Arc<Mutex<HashMap<String, i64>>>,
}

impl LocalGateway {
  pub fn new(base_url: String, approve: bool) -> Self {
    Self {
      base_url,
      approve,
      sessions: Arc::new(Mutex::new(HashMap::new())),
    }
  }
}

impl PaymentGateway for LocalGateway {
  type Error = Error;

  async fn create_checkout_session(
    &self,
    account:      &Account,
    plan:         Plan,
    amount_cents: i64,
  ) -> Result<CheckoutSession, Error> {
    let session_id = format!("local_{}", Uuid::new_v4().simple());
    self
      .sessions
      .lock()
      .expect("gateway session table poisoned")
      .insert(session_id.clone(), amount_cents);

    tracing::info!(
      session = %session_id,
      account = %account.account_id,
      %plan,
      amount_cents,
      "opened local checkout session"
    );

    Ok(CheckoutSession {
      redirect_url: format!("{}/checkout/{session_id}", self.base_url),
      session_id,
    })
  }

  async fn retrieve_session(
    &self,
    session_id: &str,
  ) -> Result<GatewaySession, Error> {
    let amount = self
      .sessions
      .lock()
      .expect("gateway session table poisoned")
      .get(session_id)
      .copied()
      .ok_or_else(|| Error::UnknownSession(session_id.to_string()))?;

    Ok(GatewaySession {
      payment_status: if self.approve {
        GatewayPaymentStatus::Paid
      } else {
        GatewayPaymentStatus::Unpaid
      },
      amount_cents:   amount,
      currency:       "USD".to_string(),
    })
  }
}
