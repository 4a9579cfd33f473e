//! Authorship resolution — deciding who a creation request is attributed to.
//!
//! A registered caller always wins; a guest name only applies when no caller
//! is present. What happens when neither is supplied is a policy decision:
//! the strict default rejects, while the lenient variant substitutes a fixed
//! fallback label.

use serde::{Deserialize, Serialize};

use crate::{Error, Result, account::Account, post::Owner};

/// Policy for creation requests that carry neither a caller identity nor a
/// guest display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum GuestPolicy {
  /// Reject unattributed requests outright.
  Strict,
  /// Attribute unattributed requests to a fixed fallback label.
  Lenient { fallback: String },
}

impl Default for GuestPolicy {
  fn default() -> Self { Self::Strict }
}

impl GuestPolicy {
  /// The lenient policy with the conventional "Guest User" label.
  pub fn lenient() -> Self {
    Self::Lenient { fallback: "Guest User".to_string() }
  }
}

/// Attribute a creation request to exactly one [`Owner`].
///
/// - A caller identity wins unconditionally; any supplied guest name is
///   ignored.
/// - Otherwise a non-empty (after trimming) guest name is used.
/// - With neither, the outcome follows `policy`.
pub fn resolve_owner(
  caller:     Option<&Account>,
  guest_name: Option<&str>,
  policy:     &GuestPolicy,
) -> Result<Owner> {
  if let Some(account) = caller {
    return Ok(Owner::Registered(account.account_id));
  }

  if let Some(name) = guest_name {
    let trimmed = name.trim();
    if !trimmed.is_empty() {
      return Ok(Owner::Guest(trimmed.to_string()));
    }
  }

  match policy {
    GuestPolicy::Strict => Err(Error::MissingAuthor),
    GuestPolicy::Lenient { fallback } => Ok(Owner::Guest(fallback.clone())),
  }
}
