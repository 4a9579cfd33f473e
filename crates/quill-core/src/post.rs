//! Post — the content item, with authorship as a tagged variant.
//!
//! Ownership is a sum type rather than two nullable fields, so "exactly one
//! of registered author or guest name" holds by construction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Owner ───────────────────────────────────────────────────────────────────

/// Who a post is attributed to. Registered authors can later modify and
/// delete the post; a guest name is attribution only, with no mutator
/// identity behind it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Owner {
  Registered(Uuid),
  Guest(String),
}

impl Owner {
  pub fn account_id(&self) -> Option<Uuid> {
    match self {
      Self::Registered(id) => Some(*id),
      Self::Guest(_) => None,
    }
  }

  pub fn is_guest(&self) -> bool { matches!(self, Self::Guest(_)) }
}

// ─── Post ────────────────────────────────────────────────────────────────────

/// A published or draft post. The slug is derived from the title and unique
/// across the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
  pub post_id:    Uuid,
  pub slug:       String,
  pub owner:      Owner,
  pub title:      String,
  pub body:       String,
  pub excerpt:    String,
  pub published:  bool,
  pub tags:       Vec<String>,
  /// Accounts that have liked this post.
  pub likes:      Vec<Uuid>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

/// Input to [`crate::store::BlogStore::create_post`]. The id, slug, and
/// timestamps are assigned by the store; the owner comes out of authorship
/// resolution, never straight from a request body.
#[derive(Debug, Clone)]
pub struct NewPost {
  pub owner:     Owner,
  pub title:     String,
  pub body:      String,
  pub excerpt:   String,
  pub published: bool,
  pub tags:      Vec<String>,
}

// ─── Slug ────────────────────────────────────────────────────────────────────

/// Derive a URL slug from a title: lowercase, strip everything but word
/// characters and spaces, then collapse spaces into hyphens.
pub fn slugify(title: &str) -> String {
  let lowered = title.to_lowercase();
  let kept: String = lowered
    .chars()
    .filter(|c| c.is_alphanumeric() || *c == '_' || *c == ' ')
    .collect();
  kept
    .split_whitespace()
    .collect::<Vec<_>>()
    .join("-")
}
