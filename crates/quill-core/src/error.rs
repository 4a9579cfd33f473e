//! Error types for `quill-core`.

use thiserror::Error;
use uuid::Uuid;

use crate::{payment::PaymentStatus, subscription::Plan};

#[derive(Debug, Error)]
pub enum Error {
  #[error("an author is required: sign in or supply a guest display name")]
  MissingAuthor,

  #[error(
    "the {plan} plan allows at most {max_posts} posts; upgrade to create more"
  )]
  LimitReached { plan: Plan, max_posts: u32 },

  #[error("payment is {status}, not paid; projection requires a paid record")]
  InvalidPaymentState { status: PaymentStatus },

  #[error("payment record has no payment date")]
  MissingPaymentDate,

  #[error("a post with slug {0:?} already exists")]
  SlugTaken(String),

  #[error("post not found: {0}")]
  PostNotFound(Uuid),

  #[error("only the post's registered owner may modify it")]
  NotPostOwner,

  #[error("guest posts cannot be modified or deleted once created")]
  GuestPostImmutable,

  #[error("an account with that username or email already exists")]
  AccountExists,

  #[error("account not found: {0}")]
  AccountNotFound(Uuid),

  #[error("unknown plan: {0:?}")]
  UnknownPlan(String),

  #[error("the {0} plan cannot be purchased")]
  NotPurchasable(Plan),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
