//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings. List fields (tags, likes)
//! are stored as compact JSON arrays. UUIDs are stored as hyphenated
//! lowercase strings; plans and payment statuses as their canonical names.

use chrono::{DateTime, Utc};
use quill_core::{
  account::{Account, ExternalIdentity},
  payment::{PaymentRecord, PaymentStatus},
  post::{Owner, Post},
  subscription::{Plan, Subscription},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Plan ────────────────────────────────────────────────────────────────────

pub fn encode_plan(plan: Plan) -> &'static str { plan.as_str() }

pub fn decode_plan(s: &str) -> Result<Plan> { Ok(Plan::parse(s)?) }

// ─── PaymentStatus ───────────────────────────────────────────────────────────

pub fn encode_status(status: PaymentStatus) -> &'static str { status.as_str() }

pub fn decode_status(s: &str) -> Result<PaymentStatus> {
  match s {
    "created" => Ok(PaymentStatus::Created),
    "attempted" => Ok(PaymentStatus::Attempted),
    "paid" => Ok(PaymentStatus::Paid),
    "failed" => Ok(PaymentStatus::Failed),
    other => Err(Error::Decode(format!("unknown payment status: {other:?}"))),
  }
}

// ─── List columns ────────────────────────────────────────────────────────────

pub fn encode_tags(tags: &[String]) -> Result<String> {
  Ok(serde_json::to_string(tags)?)
}

pub fn decode_tags(s: &str) -> Result<Vec<String>> {
  Ok(serde_json::from_str(s)?)
}

pub fn encode_likes(likes: &[Uuid]) -> Result<String> {
  let strings: Vec<String> = likes.iter().copied().map(encode_uuid).collect();
  Ok(serde_json::to_string(&strings)?)
}

pub fn decode_likes(s: &str) -> Result<Vec<Uuid>> {
  let strings: Vec<String> = serde_json::from_str(s)?;
  strings.iter().map(|s| decode_uuid(s)).collect()
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from an `accounts` row.
pub struct RawAccount {
  pub account_id:    String,
  pub username:      String,
  pub email:         String,
  pub display_name:  String,
  pub password_hash: Option<String>,
  pub provider:      Option<String>,
  pub external_id:   Option<String>,
  pub plan:          String,
  pub valid_until:   Option<String>,
  pub is_active:     bool,
  pub created_at:    String,
}

impl RawAccount {
  pub fn into_account(self) -> Result<Account> {
    let external = match (self.provider, self.external_id) {
      (Some(provider), Some(external_id)) => {
        Some(ExternalIdentity { provider, external_id })
      }
      (None, None) => None,
      _ => {
        return Err(Error::Decode(
          "account has a partial external identity".to_string(),
        ));
      }
    };

    Ok(Account {
      account_id:    decode_uuid(&self.account_id)?,
      username:      self.username,
      email:         self.email,
      display_name:  self.display_name,
      password_hash: self.password_hash,
      external,
      subscription:  Subscription {
        plan:        decode_plan(&self.plan)?,
        valid_until: self.valid_until.as_deref().map(decode_dt).transpose()?,
        is_active:   self.is_active,
      },
      created_at:    decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from a `posts` row.
pub struct RawPost {
  pub post_id:      String,
  pub slug:         String,
  pub author_id:    Option<String>,
  pub guest_author: Option<String>,
  pub title:        String,
  pub body:         String,
  pub excerpt:      String,
  pub is_published: bool,
  pub tags:         String,
  pub likes:        String,
  pub created_at:   String,
  pub updated_at:   String,
}

impl RawPost {
  pub fn into_post(self) -> Result<Post> {
    let owner = match (self.author_id, self.guest_author) {
      (Some(id), None) => Owner::Registered(decode_uuid(&id)?),
      (None, Some(name)) => Owner::Guest(name),
      _ => {
        return Err(Error::Decode(
          "post must have exactly one of author_id / guest_author".to_string(),
        ));
      }
    };

    Ok(Post {
      post_id:    decode_uuid(&self.post_id)?,
      slug:       self.slug,
      owner,
      title:      self.title,
      body:       self.body,
      excerpt:    self.excerpt,
      published:  self.is_published,
      tags:       decode_tags(&self.tags)?,
      likes:      decode_likes(&self.likes)?,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw strings read directly from a `payments` row.
pub struct RawPayment {
  pub payment_id:   String,
  pub session_id:   String,
  pub account_id:   String,
  pub amount_cents: i64,
  pub currency:     String,
  pub plan:         String,
  pub status:       String,
  pub payment_date: Option<String>,
  pub valid_until:  Option<String>,
  pub created_at:   String,
}

impl RawPayment {
  pub fn into_payment(self) -> Result<PaymentRecord> {
    Ok(PaymentRecord {
      payment_id:   decode_uuid(&self.payment_id)?,
      session_id:   self.session_id,
      account_id:   decode_uuid(&self.account_id)?,
      amount_cents: self.amount_cents,
      currency:     self.currency,
      plan:         decode_plan(&self.plan)?,
      status:       decode_status(&self.status)?,
      payment_date: self.payment_date.as_deref().map(decode_dt).transpose()?,
      valid_until:  self.valid_until.as_deref().map(decode_dt).transpose()?,
      created_at:   decode_dt(&self.created_at)?,
    })
  }
}
