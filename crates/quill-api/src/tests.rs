//! Router-level integration tests against an in-memory store and a stub
//! payment gateway.

use std::{
  collections::HashMap,
  sync::{Arc, Mutex},
};

use axum::{
  Router,
  body::Body,
  http::{Request, StatusCode, header},
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use quill_core::{
  account::Account,
  author::GuestPolicy,
  gateway::{
    CheckoutSession, GatewayPaymentStatus, GatewaySession, PaymentGateway,
  },
  subscription::Plan,
  tier::{QuotaGate, TierTable},
};
use quill_store_sqlite::SqliteStore;
use serde_json::{Value, json};
use tower::ServiceExt as _;
use uuid::Uuid;

use crate::{AppState, api_router};

// ─── Stub gateway ────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
#[error("unknown session: {0}")]
struct UnknownSession(String);

/// Remembers created sessions and settles them according to `approve`.
#[derive(Clone)]
struct StubGateway {
  approve:  bool,
  sessions: Arc<Mutex<HashMap<String, i64>>>,
}

impl StubGateway {
  fn new(approve: bool) -> Self {
    Self { approve, sessions: Arc::new(Mutex::new(HashMap::new())) }
  }
}

impl PaymentGateway for StubGateway {
  type Error = UnknownSession;

  async fn create_checkout_session(
    &self,
    _account:     &Account,
    _plan:        Plan,
    amount_cents: i64,
  ) -> Result<CheckoutSession, Self::Error> {
    let session_id = format!("stub_{}", Uuid::new_v4());
    self
      .sessions
      .lock()
      .unwrap()
      .insert(session_id.clone(), amount_cents);
    Ok(CheckoutSession {
      redirect_url: format!("https://pay.example.com/{session_id}"),
      session_id,
    })
  }

  async fn retrieve_session(
    &self,
    session_id: &str,
  ) -> Result<GatewaySession, Self::Error> {
    let amount = *self
      .sessions
      .lock()
      .unwrap()
      .get(session_id)
      .ok_or_else(|| UnknownSession(session_id.to_string()))?;
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

// ─── Harness ─────────────────────────────────────────────────────────────────

async fn make_router(policy: GuestPolicy, approve: bool) -> Router {
  let store = SqliteStore::open_in_memory().await.unwrap();
  api_router(AppState {
    store:        Arc::new(store),
    gateway:      Arc::new(StubGateway::new(approve)),
    quota:        Arc::new(QuotaGate::new(TierTable::default())),
    guest_policy: Arc::new(policy),
  })
}

async fn send(
  router: &Router,
  method: &str,
  uri:    &str,
  auth:   Option<&str>,
  body:   Option<Value>,
) -> (StatusCode, Value) {
  let mut builder = Request::builder().method(method).uri(uri);
  if let Some(auth) = auth {
    builder = builder.header(header::AUTHORIZATION, auth);
  }
  let request = match body {
    Some(v) => builder
      .header(header::CONTENT_TYPE, "application/json")
      .body(Body::from(v.to_string()))
      .unwrap(),
    None => builder.body(Body::empty()).unwrap(),
  };

  let response = router.clone().oneshot(request).await.unwrap();
  let status = response.status();
  let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
    .await
    .unwrap();
  let value = if bytes.is_empty() {
    Value::Null
  } else {
    serde_json::from_slice(&bytes).unwrap()
  };
  (status, value)
}

fn basic(email: &str, password: &str) -> String {
  format!("Basic {}", B64.encode(format!("{email}:{password}")))
}

async fn register(router: &Router, username: &str) -> String {
  let (status, _) = send(
    router,
    "POST",
    "/accounts",
    None,
    Some(json!({
      "username": username,
      "email": format!("{username}@example.com"),
      "display_name": username,
      "password": "hunter2",
    })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED);
  basic(&format!("{username}@example.com"), "hunter2")
}

fn post_body(title: &str) -> Value {
  json!({
    "title": title,
    "body": "some body text",
    "excerpt": "an excerpt",
    "published": true,
  })
}

// ─── Accounts ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn register_then_me_round_trip() {
  let router = make_router(GuestPolicy::Strict, true).await;
  let auth = register(&router, "alice").await;

  let (status, me) = send(&router, "GET", "/accounts/me", Some(&auth), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(me["username"], "alice");
  assert_eq!(me["subscription"]["plan"], "Free");
  // credentials never leak into responses
  assert!(me.get("password_hash").is_none());
}

#[tokio::test]
async fn register_duplicate_email_conflicts() {
  let router = make_router(GuestPolicy::Strict, true).await;
  register(&router, "bob").await;

  let (status, body) = send(
    &router,
    "POST",
    "/accounts",
    None,
    Some(json!({
      "username": "bob2",
      "email": "bob@example.com",
      "display_name": "Bob Again",
      "password": "hunter2",
    })),
  )
  .await;
  assert_eq!(status, StatusCode::CONFLICT);
  assert!(body["error"].as_str().unwrap().contains("already exists"));
}

#[tokio::test]
async fn me_without_credentials_is_unauthorized() {
  let router = make_router(GuestPolicy::Strict, true).await;
  let (status, _) = send(&router, "GET", "/accounts/me", None, None).await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn wrong_password_is_unauthorized() {
  let router = make_router(GuestPolicy::Strict, true).await;
  register(&router, "carol").await;

  let bad = basic("carol@example.com", "wrong");
  let (status, _) = send(&router, "GET", "/accounts/me", Some(&bad), None).await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn external_sign_in_creates_account_and_bearer_resolves() {
  let router = make_router(GuestPolicy::Strict, true).await;

  let (status, account) = send(
    &router,
    "POST",
    "/accounts/external",
    None,
    Some(json!({
      "provider": "google",
      "external_id": "sub-789",
      "email": "dora@example.com",
      "username": "dora",
      "display_name": "Dora",
    })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(account["subscription"]["plan"], "Free");

  let (status, me) = send(
    &router,
    "GET",
    "/accounts/me",
    Some("Bearer google:sub-789"),
    None,
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(me["username"], "dora");
}

#[tokio::test]
async fn external_sign_in_does_not_capture_existing_email() {
  let router = make_router(GuestPolicy::Strict, true).await;
  register(&router, "erin").await;

  let (status, _) = send(
    &router,
    "POST",
    "/accounts/external",
    None,
    Some(json!({
      "provider": "google",
      "external_id": "sub-erin",
      "email": "erin@example.com",
      "username": "erin-g",
      "display_name": "Erin",
    })),
  )
  .await;
  assert_eq!(status, StatusCode::CONFLICT);
}

// ─── Post creation gates ─────────────────────────────────────────────────────

#[tokio::test]
async fn unattributed_post_rejected_under_strict_policy() {
  let router = make_router(GuestPolicy::Strict, true).await;

  let (status, body) =
    send(&router, "POST", "/posts", None, Some(post_body("No Author"))).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert!(body["error"].as_str().unwrap().contains("display name"));
}

#[tokio::test]
async fn unattributed_post_defaulted_under_lenient_policy() {
  let router = make_router(GuestPolicy::lenient(), true).await;

  let (status, body) =
    send(&router, "POST", "/posts", None, Some(post_body("No Author"))).await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(body["post"]["owner"]["value"], "Guest User");
  assert!(body["quota"].is_null());
}

#[tokio::test]
async fn guest_name_attributes_the_post() {
  let router = make_router(GuestPolicy::Strict, true).await;

  let mut body = post_body("Guest Words");
  body["guest_author"] = json!("  Jane  ");
  let (status, response) = send(&router, "POST", "/posts", None, Some(body)).await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(response["post"]["owner"]["kind"], "guest");
  assert_eq!(response["post"]["owner"]["value"], "Jane");
}

#[tokio::test]
async fn registered_identity_wins_over_guest_name() {
  let router = make_router(GuestPolicy::Strict, true).await;
  let auth = register(&router, "frank").await;

  let mut body = post_body("Mine Actually");
  body["guest_author"] = json!("Jane");
  let (status, response) =
    send(&router, "POST", "/posts", Some(&auth), Some(body)).await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(response["post"]["owner"]["kind"], "registered");
  assert_eq!(response["quota"]["remaining"], 4);
}

#[tokio::test]
async fn free_plan_cap_denies_the_sixth_post() {
  let router = make_router(GuestPolicy::Strict, true).await;
  let auth = register(&router, "gail").await;

  for i in 0..5 {
    let (status, _) = send(
      &router,
      "POST",
      "/posts",
      Some(&auth),
      Some(post_body(&format!("Post number {i}"))),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
  }

  let (status, body) = send(
    &router,
    "POST",
    "/posts",
    Some(&auth),
    Some(post_body("One Too Many")),
  )
  .await;
  assert_eq!(status, StatusCode::FORBIDDEN);
  let message = body["error"].as_str().unwrap();
  assert!(message.contains("Free"), "message names the plan: {message}");
  assert!(message.contains('5'), "message names the cap: {message}");
}

#[tokio::test]
async fn guest_submissions_bypass_the_quota() {
  let router = make_router(GuestPolicy::Strict, true).await;

  for i in 0..6 {
    let mut body = post_body(&format!("Guest post {i}"));
    body["guest_author"] = json!("Prolific Guest");
    let (status, _) = send(&router, "POST", "/posts", None, Some(body)).await;
    assert_eq!(status, StatusCode::CREATED);
  }
}

#[tokio::test]
async fn duplicate_title_conflicts_on_slug() {
  let router = make_router(GuestPolicy::Strict, true).await;
  let auth = register(&router, "hank").await;

  let (status, _) = send(
    &router,
    "POST",
    "/posts",
    Some(&auth),
    Some(post_body("Same Title")),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED);

  let (status, _) = send(
    &router,
    "POST",
    "/posts",
    Some(&auth),
    Some(post_body("Same  Title!")),
  )
  .await;
  assert_eq!(status, StatusCode::CONFLICT);
}

// ─── Post visibility and mutation ────────────────────────────────────────────

#[tokio::test]
async fn drafts_are_visible_to_their_owner_only() {
  let router = make_router(GuestPolicy::Strict, true).await;
  let auth = register(&router, "iris").await;

  let mut body = post_body("Secret Draft");
  body["published"] = json!(false);
  let (status, _) = send(&router, "POST", "/posts", Some(&auth), Some(body)).await;
  assert_eq!(status, StatusCode::CREATED);

  let (status, _) =
    send(&router, "GET", "/posts/secret-draft", None, None).await;
  assert_eq!(status, StatusCode::FORBIDDEN);

  let (status, post) =
    send(&router, "GET", "/posts/secret-draft", Some(&auth), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(post["title"], "Secret Draft");
}

#[tokio::test]
async fn only_the_owner_can_update_or_delete() {
  let router = make_router(GuestPolicy::Strict, true).await;
  let owner = register(&router, "judy").await;
  let intruder = register(&router, "kyle").await;

  let (_, created) = send(
    &router,
    "POST",
    "/posts",
    Some(&owner),
    Some(post_body("Owned Post")),
  )
  .await;
  let id = created["post"]["post_id"].as_str().unwrap().to_string();

  let (status, _) = send(
    &router,
    "PUT",
    &format!("/posts/{id}"),
    Some(&intruder),
    Some(json!({"title": "Hijacked"})),
  )
  .await;
  assert_eq!(status, StatusCode::FORBIDDEN);

  let (status, _) =
    send(&router, "DELETE", &format!("/posts/{id}"), Some(&intruder), None).await;
  assert_eq!(status, StatusCode::FORBIDDEN);

  let (status, updated) = send(
    &router,
    "PUT",
    &format!("/posts/{id}"),
    Some(&owner),
    Some(json!({"title": "Renamed Post"})),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(updated["slug"], "renamed-post");

  let (status, _) =
    send(&router, "DELETE", &format!("/posts/{id}"), Some(&owner), None).await;
  assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn guest_posts_are_immutable_through_mutation_paths() {
  let router = make_router(GuestPolicy::Strict, true).await;
  let auth = register(&router, "lena").await;

  let mut body = post_body("Guest Forever");
  body["guest_author"] = json!("Driveby");
  let (_, created) = send(&router, "POST", "/posts", None, Some(body)).await;
  let id = created["post"]["post_id"].as_str().unwrap().to_string();

  let (status, response) = send(
    &router,
    "PUT",
    &format!("/posts/{id}"),
    Some(&auth),
    Some(json!({"title": "Claimed"})),
  )
  .await;
  assert_eq!(status, StatusCode::FORBIDDEN);
  assert!(response["error"].as_str().unwrap().contains("guest"));

  let (status, _) =
    send(&router, "DELETE", &format!("/posts/{id}"), Some(&auth), None).await;
  assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn mutation_requires_authentication() {
  let router = make_router(GuestPolicy::Strict, true).await;
  let id = Uuid::new_v4();

  let (status, _) = send(
    &router,
    "PUT",
    &format!("/posts/{id}"),
    None,
    Some(json!({"title": "Nope"})),
  )
  .await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn list_filters_and_paging() {
  let router = make_router(GuestPolicy::Strict, true).await;
  let auth = register(&router, "mara").await;

  let mut tagged = post_body("Tagged Entry");
  tagged["tags"] = json!(["rust"]);
  send(&router, "POST", "/posts", Some(&auth), Some(tagged)).await;
  send(&router, "POST", "/posts", Some(&auth), Some(post_body("Plain Entry")))
    .await;

  let (status, all) = send(&router, "GET", "/posts", None, None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(all.as_array().unwrap().len(), 2);

  let (_, by_tag) = send(&router, "GET", "/posts?tag=rust", None, None).await;
  assert_eq!(by_tag.as_array().unwrap().len(), 1);
  assert_eq!(by_tag[0]["title"], "Tagged Entry");

  let (_, paged) =
    send(&router, "GET", "/posts?limit=1&page=2", None, None).await;
  assert_eq!(paged.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn like_toggles_for_the_caller() {
  let router = make_router(GuestPolicy::Strict, true).await;
  let author = register(&router, "nick").await;
  let reader = register(&router, "olga").await;

  let (_, created) = send(
    &router,
    "POST",
    "/posts",
    Some(&author),
    Some(post_body("Likeable")),
  )
  .await;
  let id = created["post"]["post_id"].as_str().unwrap().to_string();

  let (status, liked) = send(
    &router,
    "POST",
    &format!("/posts/{id}/like"),
    Some(&reader),
    None,
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(liked["likes"].as_array().unwrap().len(), 1);

  let (_, unliked) = send(
    &router,
    "POST",
    &format!("/posts/{id}/like"),
    Some(&reader),
    None,
  )
  .await;
  assert!(unliked["likes"].as_array().unwrap().is_empty());
}

// ─── Payments ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn checkout_rejects_unknown_and_free_plans() {
  let router = make_router(GuestPolicy::Strict, true).await;
  let auth = register(&router, "pete").await;

  let (status, _) = send(
    &router,
    "POST",
    "/payments/checkout",
    Some(&auth),
    Some(json!({"plan": "Platinum"})),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);

  let (status, _) = send(
    &router,
    "POST",
    "/payments/checkout",
    Some(&auth),
    Some(json!({"plan": "Free"})),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn upgrade_lifts_the_posting_cap() {
  let router = make_router(GuestPolicy::Strict, true).await;
  let auth = register(&router, "quin").await;

  for i in 0..5 {
    send(
      &router,
      "POST",
      "/posts",
      Some(&auth),
      Some(post_body(&format!("Cap filler {i}"))),
    )
    .await;
  }
  let (status, _) = send(
    &router,
    "POST",
    "/posts",
    Some(&auth),
    Some(post_body("Blocked")),
  )
  .await;
  assert_eq!(status, StatusCode::FORBIDDEN);

  // Checkout, then verify against the (approving) gateway.
  let (status, checkout) = send(
    &router,
    "POST",
    "/payments/checkout",
    Some(&auth),
    Some(json!({"plan": "Pro"})),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(checkout["payment"]["amount_cents"], 1200);
  let session_id = checkout["session_id"].as_str().unwrap().to_string();

  let (status, verified) = send(
    &router,
    "POST",
    "/payments/verify",
    Some(&auth),
    Some(json!({"session_id": session_id})),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(verified["success"], true);
  assert_eq!(verified["subscription"]["plan"], "Pro");
  assert_eq!(verified["subscription"]["is_active"], true);

  // The cap no longer applies.
  let (status, created) = send(
    &router,
    "POST",
    "/posts",
    Some(&auth),
    Some(post_body("Unblocked")),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED);
  assert!(created["quota"]["remaining"].is_null());

  let (_, status_body) =
    send(&router, "GET", "/payments/subscription", Some(&auth), None).await;
  assert_eq!(status_body["plan"], "Pro");
  assert_eq!(status_body["limit_reached"], false);
  assert_eq!(status_body["features"]["custom_domain"], true);
}

#[tokio::test]
async fn declined_payment_marks_the_record_failed() {
  let router = make_router(GuestPolicy::Strict, false).await;
  let auth = register(&router, "rosa").await;

  let (_, checkout) = send(
    &router,
    "POST",
    "/payments/checkout",
    Some(&auth),
    Some(json!({"plan": "Business"})),
  )
  .await;
  let session_id = checkout["session_id"].as_str().unwrap().to_string();

  let (status, _) = send(
    &router,
    "POST",
    "/payments/verify",
    Some(&auth),
    Some(json!({"session_id": session_id})),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);

  let (_, history) = send(&router, "GET", "/payments", Some(&auth), None).await;
  assert_eq!(history[0]["status"], "failed");

  let (_, me) = send(&router, "GET", "/accounts/me", Some(&auth), None).await;
  assert_eq!(me["subscription"]["plan"], "Free");
}

#[tokio::test]
async fn verify_is_idempotent_for_a_paid_session() {
  let router = make_router(GuestPolicy::Strict, true).await;
  let auth = register(&router, "saul").await;

  let (_, checkout) = send(
    &router,
    "POST",
    "/payments/checkout",
    Some(&auth),
    Some(json!({"plan": "Pro"})),
  )
  .await;
  let session_id = checkout["session_id"].as_str().unwrap().to_string();

  let (_, first) = send(
    &router,
    "POST",
    "/payments/verify",
    Some(&auth),
    Some(json!({"session_id": session_id})),
  )
  .await;
  let (status, second) = send(
    &router,
    "POST",
    "/payments/verify",
    Some(&auth),
    Some(json!({"session_id": session_id})),
  )
  .await;

  assert_eq!(status, StatusCode::OK);
  assert_eq!(
    first["payment"]["valid_until"],
    second["payment"]["valid_until"]
  );
  assert_eq!(
    first["subscription"]["valid_until"],
    second["subscription"]["valid_until"]
  );
}

#[tokio::test]
async fn verify_unknown_session_is_not_found() {
  let router = make_router(GuestPolicy::Strict, true).await;
  let auth = register(&router, "tina").await;

  let (status, _) = send(
    &router,
    "POST",
    "/payments/verify",
    Some(&auth),
    Some(json!({"session_id": "stub_missing"})),
  )
  .await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn subscription_status_reports_free_quota() {
  let router = make_router(GuestPolicy::Strict, true).await;
  let auth = register(&router, "uma").await;

  let (status, body) =
    send(&router, "GET", "/payments/subscription", Some(&auth), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["plan"], "Free");
  assert_eq!(body["is_active"], false);
  assert_eq!(body["remaining"], 5);
  assert_eq!(body["limit_reached"], false);
  assert_eq!(body["features"]["api_access"], false);
}
