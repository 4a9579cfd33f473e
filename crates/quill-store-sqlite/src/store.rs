//! [`SqliteStore`] — the SQLite implementation of [`BlogStore`].

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use quill_core::{
  account::{Account, NewAccount},
  payment::{NewPayment, PaymentRecord, PaymentStatus},
  post::{NewPost, Owner, Post, slugify},
  store::{BlogStore, ExternalProfile, IdentityBridge, PostPatch, PostQuery},
  subscription::Subscription,
};

use crate::{
  Error, Result,
  encode::{
    RawAccount, RawPayment, RawPost, encode_dt, encode_likes, encode_plan,
    encode_status, encode_tags, encode_uuid,
  },
  schema::SCHEMA,
};

// ─── Row mappers ─────────────────────────────────────────────────────────────

const ACCOUNT_COLS: &str = "account_id, username, email, display_name, \
   password_hash, provider, external_id, plan, valid_until, is_active, \
   created_at";

const POST_COLS: &str = "post_id, slug, author_id, guest_author, title, \
   body, excerpt, is_published, tags, likes, created_at, updated_at";

const PAYMENT_COLS: &str = "payment_id, session_id, account_id, \
   amount_cents, currency, plan, status, payment_date, valid_until, \
   created_at";

fn raw_account(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawAccount> {
  Ok(RawAccount {
    account_id:    row.get(0)?,
    username:      row.get(1)?,
    email:         row.get(2)?,
    display_name:  row.get(3)?,
    password_hash: row.get(4)?,
    provider:      row.get(5)?,
    external_id:   row.get(6)?,
    plan:          row.get(7)?,
    valid_until:   row.get(8)?,
    is_active:     row.get(9)?,
    created_at:    row.get(10)?,
  })
}

fn raw_post(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawPost> {
  Ok(RawPost {
    post_id:      row.get(0)?,
    slug:         row.get(1)?,
    author_id:    row.get(2)?,
    guest_author: row.get(3)?,
    title:        row.get(4)?,
    body:         row.get(5)?,
    excerpt:      row.get(6)?,
    is_published: row.get(7)?,
    tags:         row.get(8)?,
    likes:        row.get(9)?,
    created_at:   row.get(10)?,
    updated_at:   row.get(11)?,
  })
}

fn raw_payment(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawPayment> {
  Ok(RawPayment {
    payment_id:   row.get(0)?,
    session_id:   row.get(1)?,
    account_id:   row.get(2)?,
    amount_cents: row.get(3)?,
    currency:     row.get(4)?,
    plan:         row.get(5)?,
    status:       row.get(6)?,
    payment_date: row.get(7)?,
    valid_until:  row.get(8)?,
    created_at:   row.get(9)?,
  })
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Quill blog store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Fetch one account row by an arbitrary equality condition.
  async fn account_where(
    &self,
    condition: &'static str,
    param: String,
  ) -> Result<Option<Account>> {
    let raw: Option<RawAccount> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {ACCOUNT_COLS} FROM accounts WHERE {condition}"),
              rusqlite::params![param],
              raw_account,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawAccount::into_account).transpose()
  }

  async fn post_where(
    &self,
    condition: &'static str,
    param: String,
  ) -> Result<Option<Post>> {
    let raw: Option<RawPost> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {POST_COLS} FROM posts WHERE {condition}"),
              rusqlite::params![param],
              raw_post,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawPost::into_post).transpose()
  }

  async fn payment_where(
    &self,
    condition: &'static str,
    param: String,
  ) -> Result<Option<PaymentRecord>> {
    let raw: Option<RawPayment> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {PAYMENT_COLS} FROM payments WHERE {condition}"),
              rusqlite::params![param],
              raw_payment,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawPayment::into_payment).transpose()
  }

  /// Insert a fully-built [`Post`] row.
  async fn insert_post(&self, post: &Post) -> Result<()> {
    let post_id_str  = encode_uuid(post.post_id);
    let slug         = post.slug.clone();
    let author_id    = post.owner.account_id().map(encode_uuid);
    let guest_author = match &post.owner {
      Owner::Guest(name) => Some(name.clone()),
      Owner::Registered(_) => None,
    };
    let title        = post.title.clone();
    let body         = post.body.clone();
    let excerpt      = post.excerpt.clone();
    let is_published = post.published;
    let tags_str     = encode_tags(&post.tags)?;
    let likes_str    = encode_likes(&post.likes)?;
    let created_str  = encode_dt(post.created_at);
    let updated_str  = encode_dt(post.updated_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO posts (
             post_id, slug, author_id, guest_author, title, body, excerpt,
             is_published, tags, likes, created_at, updated_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
          rusqlite::params![
            post_id_str,
            slug,
            author_id,
            guest_author,
            title,
            body,
            excerpt,
            is_published,
            tags_str,
            likes_str,
            created_str,
            updated_str,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── BlogStore impl ──────────────────────────────────────────────────────────

impl BlogStore for SqliteStore {
  type Error = Error;

  // ── Accounts ──────────────────────────────────────────────────────────────

  async fn create_account(&self, input: NewAccount) -> Result<Account> {
    let account = Account {
      account_id:    Uuid::new_v4(),
      username:      input.username,
      email:         input.email,
      display_name:  input.display_name,
      password_hash: input.password_hash,
      external:      input.external,
      subscription:  Subscription::default(),
      created_at:    Utc::now(),
    };

    let id_str      = encode_uuid(account.account_id);
    let username    = account.username.clone();
    let email       = account.email.clone();
    let display     = account.display_name.clone();
    let pw_hash     = account.password_hash.clone();
    let provider    = account.external.as_ref().map(|e| e.provider.clone());
    let external_id = account.external.as_ref().map(|e| e.external_id.clone());
    let plan_str    = encode_plan(account.subscription.plan).to_owned();
    let at_str      = encode_dt(account.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO accounts (
             account_id, username, email, display_name, password_hash,
             provider, external_id, plan, valid_until, is_active, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, NULL, 0, ?9)",
          rusqlite::params![
            id_str,
            username,
            email,
            display,
            pw_hash,
            provider,
            external_id,
            plan_str,
            at_str,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(account)
  }

  async fn get_account(&self, id: Uuid) -> Result<Option<Account>> {
    self.account_where("account_id = ?1", encode_uuid(id)).await
  }

  async fn find_account_by_email(&self, email: &str) -> Result<Option<Account>> {
    self.account_where("email = ?1", email.to_owned()).await
  }

  async fn find_account_by_username(
    &self,
    username: &str,
  ) -> Result<Option<Account>> {
    self.account_where("username = ?1", username.to_owned()).await
  }

  async fn find_account_by_external(
    &self,
    provider:    &str,
    external_id: &str,
  ) -> Result<Option<Account>> {
    let provider = provider.to_owned();
    let external_id = external_id.to_owned();

    let raw: Option<RawAccount> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {ACCOUNT_COLS} FROM accounts
                 WHERE provider = ?1 AND external_id = ?2"
              ),
              rusqlite::params![provider, external_id],
              raw_account,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawAccount::into_account).transpose()
  }

  async fn update_subscription(
    &self,
    id:           Uuid,
    subscription: &Subscription,
  ) -> Result<()> {
    let id_str    = encode_uuid(id);
    let plan_str  = encode_plan(subscription.plan).to_owned();
    let until_str = subscription.valid_until.map(encode_dt);
    let is_active = subscription.is_active;

    let changed: usize = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE accounts SET plan = ?2, valid_until = ?3, is_active = ?4
           WHERE account_id = ?1",
          rusqlite::params![id_str, plan_str, until_str, is_active],
        )?)
      })
      .await?;

    if changed == 0 {
      return Err(Error::AccountNotFound(id));
    }
    Ok(())
  }

  // ── Posts ─────────────────────────────────────────────────────────────────

  async fn create_post(&self, input: NewPost) -> Result<Post> {
    let slug = slugify(&input.title);

    // Pre-check for a friendly error; the UNIQUE constraint remains the
    // backstop under the documented concurrent-create race.
    if self.find_post_by_slug(&slug).await?.is_some() {
      return Err(Error::Core(quill_core::Error::SlugTaken(slug)));
    }

    let now = Utc::now();
    let post = Post {
      post_id:    Uuid::new_v4(),
      slug,
      owner:      input.owner,
      title:      input.title,
      body:       input.body,
      excerpt:    input.excerpt,
      published:  input.published,
      tags:       input.tags,
      likes:      Vec::new(),
      created_at: now,
      updated_at: now,
    };

    self.insert_post(&post).await?;
    Ok(post)
  }

  async fn count_posts_by_owner(&self, account_id: Uuid) -> Result<u64> {
    let id_str = encode_uuid(account_id);

    let count: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT COUNT(*) FROM posts WHERE author_id = ?1",
          rusqlite::params![id_str],
          |row| row.get(0),
        )?)
      })
      .await?;

    Ok(count as u64)
  }

  async fn get_post(&self, id: Uuid) -> Result<Option<Post>> {
    self.post_where("post_id = ?1", encode_uuid(id)).await
  }

  async fn find_post_by_slug(&self, slug: &str) -> Result<Option<Post>> {
    self.post_where("slug = ?1", slug.to_owned()).await
  }

  async fn list_posts(&self, query: &PostQuery) -> Result<Vec<Post>> {
    let text_pattern = query.text.as_deref().map(|t| format!("%{t}%"));
    // Tags are stored as a JSON array, so a quoted-element pattern matches
    // whole tag names only.
    let tag_pattern = query.tag.as_deref().map(|t| format!("%\"{t}\"%"));
    let owner_str   = query.owner.map(encode_uuid);
    let viewer_str  = query.viewer.map(encode_uuid);
    let limit_val   = query.limit.unwrap_or(100) as i64;
    let offset_val  = query.offset.unwrap_or(0) as i64;

    let raws: Vec<RawPost> = self
      .conn
      .call(move |conn| {
        // Unpublished posts are visible only to their own registered owner.
        let mut conds: Vec<&'static str> = if viewer_str.is_some() {
          vec!["(p.is_published = 1 OR p.author_id = ?4)"]
        } else {
          vec!["p.is_published = 1"]
        };
        if text_pattern.is_some() {
          conds.push("(p.title LIKE ?1 OR p.body LIKE ?1)");
        }
        if tag_pattern.is_some() {
          conds.push("p.tags LIKE ?2");
        }
        if owner_str.is_some() {
          conds.push("p.author_id = ?3");
        }

        let sql = format!(
          "SELECT {POST_COLS} FROM posts p
           WHERE {}
           ORDER BY p.created_at DESC
           LIMIT ?5 OFFSET ?6",
          conds.join(" AND ")
        );

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(
            rusqlite::params![
              text_pattern.as_deref(),
              tag_pattern.as_deref(),
              owner_str.as_deref(),
              viewer_str.as_deref(),
              limit_val,
              offset_val,
            ],
            raw_post,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawPost::into_post).collect()
  }

  async fn update_post(&self, id: Uuid, patch: PostPatch) -> Result<Post> {
    let mut post = self
      .get_post(id)
      .await?
      .ok_or(Error::PostNotFound(id))?;

    if let Some(title) = patch.title {
      let new_slug = slugify(&title);
      if new_slug != post.slug {
        if let Some(existing) = self.find_post_by_slug(&new_slug).await?
          && existing.post_id != id
        {
          return Err(Error::Core(quill_core::Error::SlugTaken(new_slug)));
        }
        post.slug = new_slug;
      }
      post.title = title;
    }
    if let Some(body) = patch.body {
      post.body = body;
    }
    if let Some(excerpt) = patch.excerpt {
      post.excerpt = excerpt;
    }
    if let Some(published) = patch.published {
      post.published = published;
    }
    if let Some(tags) = patch.tags {
      post.tags = tags;
    }
    post.updated_at = Utc::now();

    let id_str       = encode_uuid(id);
    let slug         = post.slug.clone();
    let title        = post.title.clone();
    let body         = post.body.clone();
    let excerpt      = post.excerpt.clone();
    let is_published = post.published;
    let tags_str     = encode_tags(&post.tags)?;
    let updated_str  = encode_dt(post.updated_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE posts SET slug = ?2, title = ?3, body = ?4, excerpt = ?5,
             is_published = ?6, tags = ?7, updated_at = ?8
           WHERE post_id = ?1",
          rusqlite::params![
            id_str,
            slug,
            title,
            body,
            excerpt,
            is_published,
            tags_str,
            updated_str,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(post)
  }

  async fn delete_post(&self, id: Uuid) -> Result<()> {
    let id_str = encode_uuid(id);

    let changed: usize = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM posts WHERE post_id = ?1",
          rusqlite::params![id_str],
        )?)
      })
      .await?;

    if changed == 0 {
      return Err(Error::PostNotFound(id));
    }
    Ok(())
  }

  async fn toggle_like(&self, id: Uuid, account_id: Uuid) -> Result<Post> {
    let mut post = self
      .get_post(id)
      .await?
      .ok_or(Error::PostNotFound(id))?;

    if let Some(pos) = post.likes.iter().position(|l| *l == account_id) {
      post.likes.remove(pos);
    } else {
      post.likes.push(account_id);
    }

    let id_str    = encode_uuid(id);
    let likes_str = encode_likes(&post.likes)?;

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE posts SET likes = ?2 WHERE post_id = ?1",
          rusqlite::params![id_str, likes_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(post)
  }

  // ── Payments ──────────────────────────────────────────────────────────────

  async fn create_payment(&self, input: NewPayment) -> Result<PaymentRecord> {
    let record = PaymentRecord {
      payment_id:   Uuid::new_v4(),
      session_id:   input.session_id,
      account_id:   input.account_id,
      amount_cents: input.amount_cents,
      currency:     input.currency,
      plan:         input.plan,
      status:       PaymentStatus::Created,
      payment_date: None,
      valid_until:  None,
      created_at:   Utc::now(),
    };

    let id_str      = encode_uuid(record.payment_id);
    let session_id  = record.session_id.clone();
    let account_str = encode_uuid(record.account_id);
    let amount      = record.amount_cents;
    let currency    = record.currency.clone();
    let plan_str    = encode_plan(record.plan).to_owned();
    let status_str  = encode_status(record.status).to_owned();
    let at_str      = encode_dt(record.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO payments (
             payment_id, session_id, account_id, amount_cents, currency,
             plan, status, payment_date, valid_until, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, NULL, NULL, ?8)",
          rusqlite::params![
            id_str,
            session_id,
            account_str,
            amount,
            currency,
            plan_str,
            status_str,
            at_str,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(record)
  }

  async fn find_payment_by_session(
    &self,
    session_id: &str,
  ) -> Result<Option<PaymentRecord>> {
    self
      .payment_where("session_id = ?1", session_id.to_owned())
      .await
  }

  async fn mark_payment_paid(
    &self,
    session_id:   &str,
    payment_date: DateTime<Utc>,
    valid_until:  DateTime<Utc>,
  ) -> Result<PaymentRecord> {
    let session = session_id.to_owned();
    let paid_str  = encode_dt(payment_date);
    let until_str = encode_dt(valid_until);

    // The WHERE clause keeps this idempotent: an already-paid record keeps
    // its original payment date and validity window.
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE payments
           SET status = 'paid', payment_date = ?2, valid_until = ?3
           WHERE session_id = ?1 AND status != 'paid'",
          rusqlite::params![session, paid_str, until_str],
        )?;
        Ok(())
      })
      .await?;

    self
      .find_payment_by_session(session_id)
      .await?
      .ok_or_else(|| Error::PaymentNotFound(session_id.to_owned()))
  }

  async fn mark_payment_failed(
    &self,
    session_id: &str,
  ) -> Result<PaymentRecord> {
    let session = session_id.to_owned();

    // Paid records are never demoted.
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE payments SET status = 'failed'
           WHERE session_id = ?1 AND status != 'paid'",
          rusqlite::params![session],
        )?;
        Ok(())
      })
      .await?;

    self
      .find_payment_by_session(session_id)
      .await?
      .ok_or_else(|| Error::PaymentNotFound(session_id.to_owned()))
  }

  async fn list_payments(&self, account_id: Uuid) -> Result<Vec<PaymentRecord>> {
    let id_str = encode_uuid(account_id);

    let raws: Vec<RawPayment> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {PAYMENT_COLS} FROM payments
           WHERE account_id = ?1
           ORDER BY created_at DESC"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], raw_payment)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawPayment::into_payment).collect()
  }
}

// ─── IdentityBridge impl ─────────────────────────────────────────────────────

impl IdentityBridge for SqliteStore {
  type Error = Error;

  async fn resolve(&self, profile: ExternalProfile) -> Result<Account> {
    if let Some(account) = self
      .find_account_by_external(&profile.provider, &profile.external_id)
      .await?
    {
      return Ok(account);
    }

    self
      .create_account(NewAccount {
        username:      profile.username,
        email:         profile.email,
        display_name:  profile.display_name,
        password_hash: None,
        external:      Some(quill_core::account::ExternalIdentity {
          provider:    profile.provider,
          external_id: profile.external_id,
        }),
      })
      .await
  }
}
