//! Handlers for `/posts` endpoints — including the gated creation path.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`    | `/posts` | Optional `search`, `tag`, `owner`, `page`, `limit` |
//! | `POST`   | `/posts` | Authorship + quota gates, then create |
//! | `GET`    | `/posts/:slug` | 404 if missing; drafts owner-only |
//! | `PUT`    | `/posts/:id` | Registered owner only |
//! | `DELETE` | `/posts/:id` | Registered owner only |
//! | `POST`   | `/posts/:id/like` | Toggle the caller's like |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::{HeaderMap, StatusCode},
  response::IntoResponse,
};
use chrono::Utc;
use quill_core::{
  Error,
  author::resolve_owner,
  gateway::PaymentGateway,
  post::{NewPost, Owner, Post, slugify},
  store::{BlogStore, IdentityBridge, PostPatch, PostQuery},
  subscription::refresh_subscription,
  tier::{AdmitError, Quota},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AppState, auth, error::ApiError};

fn admit_error<E>(e: AdmitError<E>) -> ApiError
where
  E: std::error::Error + Send + Sync + 'static,
{
  match e {
    AdmitError::Store(e) => ApiError::store(e),
    AdmitError::Denied(e) => e.into(),
  }
}

// ─── Create ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreatePostBody {
  pub title:        String,
  pub body:         String,
  pub excerpt:      String,
  /// Display name for unauthenticated submissions. Ignored when the request
  /// carries a registered identity.
  pub guest_author: Option<String>,
  #[serde(default)]
  pub published:    bool,
  #[serde(default)]
  pub tags:         Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct CreatePostResponse {
  pub post:  Post,
  /// Present for registered authors: the quota after this creation.
  pub quota: Option<Quota>,
}

/// `POST /posts` — resolve authorship, gate on quota, then persist.
pub async fn create<S, G>(
  State(state): State<AppState<S, G>>,
  headers: HeaderMap,
  Json(body): Json<CreatePostBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: BlogStore + IdentityBridge + Clone + Send + Sync + 'static,
  G: PaymentGateway + Clone + Send + Sync + 'static,
{
  if body.title.trim().is_empty()
    || body.body.trim().is_empty()
    || body.excerpt.trim().is_empty()
  {
    return Err(ApiError::BadRequest(
      "title, body, and excerpt are required".to_string(),
    ));
  }

  let caller = auth::resolve_caller(&headers, &*state.store).await?;
  let now = Utc::now();

  let owner = resolve_owner(
    caller.as_ref(),
    body.guest_author.as_deref(),
    &state.guest_policy,
  )?;

  // Quota applies to registered authors only; guest submissions bypass it.
  if let Some(mut account) = caller.clone() {
    refresh_subscription(&*state.store, &mut account, now)
      .await
      .map_err(ApiError::store)?;
    state
      .quota
      .admit(&account, now, &*state.store)
      .await
      .map_err(admit_error)?;
  }

  let slug = slugify(&body.title);
  if state
    .store
    .find_post_by_slug(&slug)
    .await
    .map_err(ApiError::store)?
    .is_some()
  {
    return Err(Error::SlugTaken(slug).into());
  }

  let post = state
    .store
    .create_post(NewPost {
      owner,
      title:     body.title,
      body:      body.body,
      excerpt:   body.excerpt,
      published: body.published,
      tags:      body.tags,
    })
    .await
    .map_err(ApiError::store)?;

  let quota = match &caller {
    Some(account) => Some(
      state
        .quota
        .evaluate(account, now, &*state.store)
        .await
        .map_err(ApiError::store)?,
    ),
    None => None,
  };

  Ok((StatusCode::CREATED, Json(CreatePostResponse { post, quota })))
}

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  /// Free-text filter over title and body.
  pub search: Option<String>,
  pub tag:    Option<String>,
  /// Restrict to posts by this registered account.
  pub owner:  Option<Uuid>,
  pub page:   Option<usize>,
  pub limit:  Option<usize>,
}

/// `GET /posts` — published posts, plus the caller's own drafts.
pub async fn list<S, G>(
  State(state): State<AppState<S, G>>,
  headers: HeaderMap,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Post>>, ApiError>
where
  S: BlogStore + IdentityBridge + Clone + Send + Sync + 'static,
  G: PaymentGateway + Clone + Send + Sync + 'static,
{
  let caller = auth::resolve_caller(&headers, &*state.store).await?;

  let limit = params.limit.unwrap_or(10).max(1);
  let page = params.page.unwrap_or(1).max(1);

  let posts = state
    .store
    .list_posts(&PostQuery {
      text:   params.search,
      tag:    params.tag,
      owner:  params.owner,
      viewer: caller.map(|a| a.account_id),
      limit:  Some(limit),
      offset: Some((page - 1) * limit),
    })
    .await
    .map_err(ApiError::store)?;

  Ok(Json(posts))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /posts/:slug`
pub async fn get_one<S, G>(
  State(state): State<AppState<S, G>>,
  headers: HeaderMap,
  Path(slug): Path<String>,
) -> Result<Json<Post>, ApiError>
where
  S: BlogStore + IdentityBridge + Clone + Send + Sync + 'static,
  G: PaymentGateway + Clone + Send + Sync + 'static,
{
  let caller = auth::resolve_caller(&headers, &*state.store).await?;

  let post = state
    .store
    .find_post_by_slug(&slug)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("post {slug:?} not found")))?;

  if !post.published {
    let is_owner = matches!(
      (&post.owner, &caller),
      (Owner::Registered(owner), Some(account)) if *owner == account.account_id
    );
    if !is_owner {
      return Err(ApiError::Forbidden(
        "this post is not published".to_string(),
      ));
    }
  }

  Ok(Json(post))
}

// ─── Update / delete ─────────────────────────────────────────────────────────

/// Reject mutation unless `caller` is the post's registered owner. Guest
/// posts carry no mutator identity and are immutable through these paths.
fn check_owner(post: &Post, caller: &quill_core::account::Account) -> Result<(), ApiError> {
  match &post.owner {
    Owner::Guest(_) => Err(Error::GuestPostImmutable.into()),
    Owner::Registered(owner) if *owner != caller.account_id => {
      Err(Error::NotPostOwner.into())
    }
    Owner::Registered(_) => Ok(()),
  }
}

#[derive(Debug, Deserialize)]
pub struct UpdatePostBody {
  pub title:     Option<String>,
  pub body:      Option<String>,
  pub excerpt:   Option<String>,
  pub published: Option<bool>,
  pub tags:      Option<Vec<String>>,
}

/// `PUT /posts/:id` — registered owner only; a new title re-derives the slug.
pub async fn update<S, G>(
  State(state): State<AppState<S, G>>,
  headers: HeaderMap,
  Path(id): Path<Uuid>,
  Json(body): Json<UpdatePostBody>,
) -> Result<Json<Post>, ApiError>
where
  S: BlogStore + IdentityBridge + Clone + Send + Sync + 'static,
  G: PaymentGateway + Clone + Send + Sync + 'static,
{
  let caller = auth::require_caller(&headers, &*state.store).await?;

  let post = state
    .store
    .get_post(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("post {id} not found")))?;
  check_owner(&post, &caller)?;

  if let Some(title) = &body.title {
    let new_slug = slugify(title);
    if new_slug != post.slug
      && state
        .store
        .find_post_by_slug(&new_slug)
        .await
        .map_err(ApiError::store)?
        .is_some()
    {
      return Err(Error::SlugTaken(new_slug).into());
    }
  }

  let updated = state
    .store
    .update_post(id, PostPatch {
      title:     body.title,
      body:      body.body,
      excerpt:   body.excerpt,
      published: body.published,
      tags:      body.tags,
    })
    .await
    .map_err(ApiError::store)?;

  Ok(Json(updated))
}

/// `DELETE /posts/:id` — registered owner only.
pub async fn delete_one<S, G>(
  State(state): State<AppState<S, G>>,
  headers: HeaderMap,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: BlogStore + IdentityBridge + Clone + Send + Sync + 'static,
  G: PaymentGateway + Clone + Send + Sync + 'static,
{
  let caller = auth::require_caller(&headers, &*state.store).await?;

  let post = state
    .store
    .get_post(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("post {id} not found")))?;
  check_owner(&post, &caller)?;

  state.store.delete_post(id).await.map_err(ApiError::store)?;
  Ok(StatusCode::NO_CONTENT)
}

// ─── Like ─────────────────────────────────────────────────────────────────────

/// `POST /posts/:id/like` — toggle the caller's like on a post.
pub async fn toggle_like<S, G>(
  State(state): State<AppState<S, G>>,
  headers: HeaderMap,
  Path(id): Path<Uuid>,
) -> Result<Json<Post>, ApiError>
where
  S: BlogStore + IdentityBridge + Clone + Send + Sync + 'static,
  G: PaymentGateway + Clone + Send + Sync + 'static,
{
  let caller = auth::require_caller(&headers, &*state.store).await?;

  state
    .store
    .get_post(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("post {id} not found")))?;

  let post = state
    .store
    .toggle_like(id, caller.account_id)
    .await
    .map_err(ApiError::store)?;

  Ok(Json(post))
}
