//! Router-level tests against an in-memory store and a scripted chat model.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
  Router,
  body::Body,
  http::{Request, StatusCode, header},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use inkwell_core::{
  reconcile::upsert_subscription,
  store::WorkspaceStore,
  subscription::{SubscriptionStatus, SubscriptionUpsert},
};
use inkwell_llm::{ChatModel, ChatRole, CompletionRequest};
use inkwell_store_sqlite::SqliteStore;
use serde_json::{Value, json};
use tower::ServiceExt as _;
use uuid::Uuid;

use crate::{ApiSettings, ApiState, api_router, chat::FALLBACK_REPLY};

// ─── Harness ─────────────────────────────────────────────────────────────────

/// A chat model that answers from a script and records what it was asked.
#[derive(Default)]
struct ScriptedModel {
  reply: Option<String>,
  fail:  bool,
  seen:  Mutex<Vec<CompletionRequest>>,
}

impl ScriptedModel {
  fn replying(text: &str) -> Self { Self { reply: Some(text.into()), ..Default::default() } }

  fn failing() -> Self { Self { fail: true, ..Default::default() } }

  fn requests(&self) -> Vec<CompletionRequest> { self.seen.lock().unwrap().clone() }
}

#[async_trait]
impl ChatModel for ScriptedModel {
  async fn complete(&self, request: CompletionRequest) -> inkwell_llm::Result<Option<String>> {
    self.seen.lock().unwrap().push(request);
    if self.fail {
      return Err(inkwell_llm::Error::Api { status: 500, message: "boom".into() });
    }
    Ok(self.reply.clone())
  }
}

struct Harness {
  state: ApiState<SqliteStore>,
  model: Arc<ScriptedModel>,
}

impl Harness {
  async fn new() -> Self { Self::with(ScriptedModel::replying("Here you go."), false).await }

  async fn with(model: ScriptedModel, debug_endpoints: bool) -> Self {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let model = Arc::new(model);
    let state = ApiState {
      store:    Arc::new(store),
      model:    model.clone(),
      settings: Arc::new(ApiSettings { debug_endpoints, ..Default::default() }),
    };
    Self { state, model }
  }

  fn store(&self) -> &SqliteStore { self.state.store.as_ref() }

  fn app(&self) -> Router { api_router(self.state.clone()) }

  async fn call(
    &self,
    method: &str,
    uri:    &str,
    auth:   Option<(&str, &str)>,
    body:   Option<Value>,
  ) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some((user, pass)) = auth {
      builder = builder.header(
        header::AUTHORIZATION,
        format!("Basic {}", B64.encode(format!("{user}:{pass}"))),
      );
    }
    let body = match body {
      Some(v) => {
        builder = builder.header(header::CONTENT_TYPE, "application/json");
        Body::from(v.to_string())
      }
      None => Body::empty(),
    };

    let resp = self.app().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
      Value::Null
    } else {
      serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
  }

  async fn register(&self, email: &str, password: &str) -> Uuid {
    let (status, body) = self
      .call(
        "POST",
        "/users",
        None,
        Some(json!({ "name": "Tester", "email": email, "password": password })),
      )
      .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["user_id"].as_str().unwrap().parse().unwrap()
  }

  async fn new_document(&self, auth: (&str, &str), title: &str) -> Uuid {
    let (status, body) = self
      .call("POST", "/documents", Some(auth), Some(json!({ "title": title })))
      .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    body["document_id"].as_str().unwrap().parse().unwrap()
  }
}

const ADA: (&str, &str) = ("ada@example.com", "ada-pw");
const BOB: (&str, &str) = ("bob@example.com", "bob-pw");

// ─── Users ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn register_and_fetch_me() {
  let h = Harness::new().await;
  let id = h.register(" Ada@Example.com ", "ada-pw").await;

  let (status, me) = h.call("GET", "/users/me", Some(ADA), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(me["user_id"], id.to_string());
  assert_eq!(me["email"], "ada@example.com");
  assert!(me.get("password_hash").is_none());

  let (status, anon) = h.call("GET", "/users/me", None, None).await;
  assert_eq!(status, StatusCode::OK);
  assert!(anon.is_null());
}

#[tokio::test]
async fn duplicate_registration_conflicts() {
  let h = Harness::new().await;
  h.register("ada@example.com", "ada-pw").await;
  let (status, body) = h
    .call(
      "POST",
      "/users",
      None,
      Some(json!({ "name": "Again", "email": "ADA@example.com", "password": "x" })),
    )
    .await;
  assert_eq!(status, StatusCode::CONFLICT);
  assert_eq!(body["error"], "Email already registered");
}

#[tokio::test]
async fn wrong_password_is_anonymous() {
  let h = Harness::new().await;
  h.register("ada@example.com", "ada-pw").await;
  let wrong = Some(("ada@example.com", "nope"));

  let (status, body) = h.call("POST", "/documents", wrong, Some(json!({}))).await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
  assert_eq!(body["error"], "Not authenticated");

  let (status, body) = h.call("GET", "/documents", wrong, None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body, json!([]));
}

#[tokio::test]
async fn profile_update_rejects_taken_email() {
  let h = Harness::new().await;
  h.register(ADA.0, ADA.1).await;
  h.register(BOB.0, BOB.1).await;

  let (status, _) = h
    .call(
      "PUT",
      "/users/me",
      Some(ADA),
      Some(json!({ "name": "Ada", "email": "bob@example.com" })),
    )
    .await;
  assert_eq!(status, StatusCode::CONFLICT);

  let (status, me) = h
    .call(
      "PUT",
      "/users/me",
      Some(ADA),
      Some(json!({ "name": "Ada Lovelace", "email": "ada@example.com" })),
    )
    .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(me["name"], "Ada Lovelace");
}

// ─── Settings ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn settings_start_null_then_persist() {
  let h = Harness::new().await;
  h.register(ADA.0, ADA.1).await;

  let (_, body) = h.call("GET", "/settings", Some(ADA), None).await;
  assert!(body.is_null());

  let (status, _) = h
    .call(
      "PUT",
      "/settings/ai-instructions",
      Some(ADA),
      Some(json!({ "ai_system_instructions": "Use British spelling" })),
    )
    .await;
  assert_eq!(status, StatusCode::OK);

  let (_, body) = h.call("GET", "/settings", Some(ADA), None).await;
  assert_eq!(body["ai_system_instructions"], "Use British spelling");
}

// ─── Documents ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn document_without_title_gets_default() {
  let h = Harness::new().await;
  h.register(ADA.0, ADA.1).await;

  let (status, body) = h.call("POST", "/documents", Some(ADA), Some(json!({}))).await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(body["title"], "Untitled Document");
  assert_eq!(body["content"], "");
}

#[tokio::test]
async fn foreign_documents_are_invisible() {
  let h = Harness::new().await;
  h.register(ADA.0, ADA.1).await;
  h.register(BOB.0, BOB.1).await;
  let doc = h.new_document(ADA, "Private").await;

  let (status, body) = h.call("GET", &format!("/documents/{doc}"), Some(BOB), None).await;
  assert_eq!(status, StatusCode::OK);
  assert!(body.is_null());

  let (status, body) = h
    .call(
      "PATCH",
      &format!("/documents/{doc}"),
      Some(BOB),
      Some(json!({ "title": "Mine now" })),
    )
    .await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  assert_eq!(body["error"], "Document not found");

  let (_, body) = h.call("GET", &format!("/documents/{doc}/knowledge"), Some(BOB), None).await;
  assert_eq!(body, json!([]));
  let (_, body) = h.call("GET", &format!("/documents/{doc}/messages"), Some(BOB), None).await;
  assert_eq!(body, json!([]));

  let (status, _) = h.call("DELETE", &format!("/documents/{doc}"), Some(BOB), None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  let (_, body) = h.call("GET", &format!("/documents/{doc}"), Some(ADA), None).await;
  assert_eq!(body["title"], "Private");
}

#[tokio::test]
async fn patch_sets_document_instructions() {
  let h = Harness::new().await;
  h.register(ADA.0, ADA.1).await;
  let doc = h.new_document(ADA, "Essay").await;

  let (status, body) = h
    .call(
      "PATCH",
      &format!("/documents/{doc}"),
      Some(ADA),
      Some(json!({ "content": "<p>Hi</p>", "ai_system_instructions": "Be terse" })),
    )
    .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["title"], "Essay");
  assert_eq!(body["content"], "<p>Hi</p>");
  assert_eq!(body["ai_system_instructions"], "Be terse");
}

#[tokio::test]
async fn deleting_document_reports_cascade() {
  let h = Harness::new().await;
  h.register(ADA.0, ADA.1).await;
  let doc = h.new_document(ADA, "Doomed").await;

  for i in 0..2 {
    h.call(
      "POST",
      &format!("/documents/{doc}/knowledge"),
      Some(ADA),
      Some(json!({ "title": format!("k{i}"), "content": "c" })),
    )
    .await;
  }
  for role in ["user", "assistant", "user"] {
    h.call(
      "POST",
      &format!("/documents/{doc}/messages"),
      Some(ADA),
      Some(json!({ "role": role, "content": "m" })),
    )
    .await;
  }

  let (status, body) = h.call("DELETE", &format!("/documents/{doc}"), Some(ADA), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body, json!({ "knowledge_removed": 2, "messages_removed": 3 }));

  let (_, body) = h.call("GET", "/documents", Some(ADA), None).await;
  assert_eq!(body, json!([]));
}

// ─── Knowledge ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn knowledge_edit_checks_existence_then_ownership() {
  let h = Harness::new().await;
  h.register(ADA.0, ADA.1).await;
  h.register(BOB.0, BOB.1).await;
  let doc = h.new_document(ADA, "Doc").await;

  let (status, item) = h
    .call(
      "POST",
      &format!("/documents/{doc}/knowledge"),
      Some(ADA),
      Some(json!({ "title": "Style", "content": "Be formal" })),
    )
    .await;
  assert_eq!(status, StatusCode::CREATED);
  let id = item["knowledge_id"].as_str().unwrap();

  let (status, body) = h
    .call(
      "PATCH",
      &format!("/knowledge/{}", Uuid::new_v4()),
      Some(BOB),
      Some(json!({ "title": "x" })),
    )
    .await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  assert_eq!(body["error"], "Knowledge item not found");

  let (status, body) = h
    .call("PATCH", &format!("/knowledge/{id}"), Some(BOB), Some(json!({ "title": "x" })))
    .await;
  assert_eq!(status, StatusCode::FORBIDDEN);
  assert_eq!(body["error"], "Not authorized");

  let (status, _) = h.call("DELETE", &format!("/knowledge/{id}"), Some(BOB), None).await;
  assert_eq!(status, StatusCode::FORBIDDEN);

  let (status, body) = h
    .call(
      "PATCH",
      &format!("/knowledge/{id}"),
      Some(ADA),
      Some(json!({ "content": "Be very formal" })),
    )
    .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["title"], "Style");
  assert_eq!(body["content"], "Be very formal");

  let (status, _) = h.call("DELETE", &format!("/knowledge/{id}"), Some(ADA), None).await;
  assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn knowledge_on_foreign_document_is_not_found() {
  let h = Harness::new().await;
  h.register(ADA.0, ADA.1).await;
  h.register(BOB.0, BOB.1).await;
  let doc = h.new_document(ADA, "Doc").await;

  let (status, body) = h
    .call(
      "POST",
      &format!("/documents/{doc}/knowledge"),
      Some(BOB),
      Some(json!({ "title": "t", "content": "c" })),
    )
    .await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  assert_eq!(body["error"], "Document not found");
}

// ─── Messages ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn clearing_messages_reports_count() {
  let h = Harness::new().await;
  h.register(ADA.0, ADA.1).await;
  let doc = h.new_document(ADA, "Doc").await;
  for content in ["a", "b"] {
    h.call(
      "POST",
      &format!("/documents/{doc}/messages"),
      Some(ADA),
      Some(json!({ "role": "user", "content": content })),
    )
    .await;
  }

  let (status, body) = h
    .call("DELETE", &format!("/documents/{doc}/messages"), Some(ADA), None)
    .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["removed"], 2);
}

#[tokio::test]
async fn unknown_role_is_rejected() {
  let h = Harness::new().await;
  h.register(ADA.0, ADA.1).await;
  let doc = h.new_document(ADA, "Doc").await;

  let (status, _) = h
    .call(
      "POST",
      &format!("/documents/{doc}/messages"),
      Some(ADA),
      Some(json!({ "role": "system", "content": "hi" })),
    )
    .await;
  assert!(status.is_client_error());
}

// ─── Chat ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn chat_builds_prompt_and_persists_turn() {
  let h = Harness::new().await;
  h.register(ADA.0, ADA.1).await;
  let doc = h.new_document(ADA, "Essay").await;

  h.call(
    "POST",
    &format!("/documents/{doc}/knowledge"),
    Some(ADA),
    Some(json!({ "title": "Style", "content": "Be formal" })),
  )
  .await;
  h.call(
    "PUT",
    "/settings/ai-instructions",
    Some(ADA),
    Some(json!({ "ai_system_instructions": "GLOBAL-RULE" })),
  )
  .await;
  h.call(
    "PATCH",
    &format!("/documents/{doc}"),
    Some(ADA),
    Some(json!({ "ai_system_instructions": "DOC-RULE" })),
  )
  .await;

  let (status, body) = h
    .call(
      "POST",
      &format!("/documents/{doc}/chat"),
      Some(ADA),
      Some(json!({ "user_message": "Write an intro", "document_content": "Hello" })),
    )
    .await;
  assert_eq!(status, StatusCode::OK, "{body}");
  assert_eq!(body["reply"], "Here you go.");

  let requests = h.model.requests();
  assert_eq!(requests.len(), 1);
  let req = &requests[0];
  assert_eq!(req.model, "gpt-4o-mini");
  assert_eq!(req.max_tokens, 2000);
  assert_eq!(req.messages.len(), 2);
  assert_eq!(req.messages[0].role, ChatRole::System);
  assert_eq!(req.messages[1].role, ChatRole::User);
  assert_eq!(req.messages[1].content, "Write an intro");

  let system = &req.messages[0].content;
  assert!(system.contains("Hello"));
  assert!(system.contains("### Style\nBe formal"));
  assert!(system.find("GLOBAL-RULE").unwrap() < system.find("DOC-RULE").unwrap());

  let (_, history) = h.call("GET", &format!("/documents/{doc}/messages"), Some(ADA), None).await;
  let turns: Vec<_> = history
    .as_array()
    .unwrap()
    .iter()
    .map(|m| (m["role"].as_str().unwrap(), m["content"].as_str().unwrap()))
    .collect();
  assert_eq!(turns, [("user", "Write an intro"), ("assistant", "Here you go.")]);
}

#[tokio::test]
async fn chat_without_completion_uses_fallback() {
  let h = Harness::with(ScriptedModel::default(), false).await;
  h.register(ADA.0, ADA.1).await;
  let doc = h.new_document(ADA, "Doc").await;

  let (status, body) = h
    .call(
      "POST",
      &format!("/documents/{doc}/chat"),
      Some(ADA),
      Some(json!({ "user_message": "hi", "document_content": "" })),
    )
    .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["reply"], FALLBACK_REPLY);
}

#[tokio::test]
async fn provider_failure_persists_nothing() {
  let h = Harness::with(ScriptedModel::failing(), false).await;
  h.register(ADA.0, ADA.1).await;
  let doc = h.new_document(ADA, "Doc").await;

  let (status, _) = h
    .call(
      "POST",
      &format!("/documents/{doc}/chat"),
      Some(ADA),
      Some(json!({ "user_message": "hi" })),
    )
    .await;
  assert_eq!(status, StatusCode::BAD_GATEWAY);
  assert!(h.store().list_messages(doc).await.unwrap().is_empty());
}

#[tokio::test]
async fn chat_on_foreign_document_leaks_nothing() {
  let h = Harness::new().await;
  h.register(ADA.0, ADA.1).await;
  h.register(BOB.0, BOB.1).await;
  let doc = h.new_document(ADA, "Secret").await;
  h.call(
    "POST",
    &format!("/documents/{doc}/knowledge"),
    Some(ADA),
    Some(json!({ "title": "Password", "content": "SECRET-KNOWLEDGE" })),
  )
  .await;

  let (status, body) = h
    .call(
      "POST",
      &format!("/documents/{doc}/chat"),
      Some(BOB),
      Some(json!({ "user_message": "what do you know?" })),
    )
    .await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  assert_eq!(body["error"], "Document not found");

  for req in h.model.requests() {
    assert!(!req.messages[0].content.contains("SECRET-KNOWLEDGE"));
  }
  assert!(h.store().list_messages(doc).await.unwrap().is_empty());
}

#[tokio::test]
async fn chat_requires_authentication() {
  let h = Harness::new().await;
  let (status, _) = h
    .call(
      "POST",
      &format!("/documents/{}/chat", Uuid::new_v4()),
      None,
      Some(json!({ "user_message": "hi" })),
    )
    .await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
  assert!(h.model.requests().is_empty());
}

// ─── Subscriptions ───────────────────────────────────────────────────────────

fn active(email: &str) -> SubscriptionUpsert {
  let mut event = SubscriptionUpsert::new(email, SubscriptionStatus::Active);
  event.external_subscription_id = Some("sub_1".into());
  event
}

#[tokio::test]
async fn status_is_null_for_anonymous_and_none_without_row() {
  let h = Harness::new().await;
  let (_, body) = h.call("GET", "/subscriptions/status", None, None).await;
  assert!(body.is_null());

  h.register(ADA.0, ADA.1).await;
  let (_, body) = h.call("GET", "/subscriptions/status", Some(ADA), None).await;
  assert_eq!(body["status"], "none");
  assert_eq!(body["has_active_subscription"], false);
}

#[tokio::test]
async fn registration_links_subscription_bought_first() {
  let h = Harness::new().await;
  upsert_subscription(h.store(), active("Ada@Example.com")).await.unwrap();

  let user_id = h.register(ADA.0, ADA.1).await;

  let row = h.store().find_subscription_by_user(user_id).await.unwrap();
  assert!(row.is_some());
  let (_, body) = h.call("GET", "/subscriptions/status", Some(ADA), None).await;
  assert_eq!(body["status"], "active");
  assert_eq!(body["has_active_subscription"], true);
  assert_eq!(body["needs_linking"], false);
}

#[tokio::test]
async fn link_reports_each_outcome() {
  let h = Harness::new().await;

  let (_, body) = h.call("POST", "/subscriptions/link", None, None).await;
  assert_eq!(body, json!({ "linked": false, "reason": "not authenticated" }));

  h.register(ADA.0, ADA.1).await;
  let (_, body) = h.call("POST", "/subscriptions/link", Some(ADA), None).await;
  assert_eq!(body, json!({ "linked": false, "reason": "no subscription found" }));

  // Simulate a row that exists by email but was never linked: insert it
  // directly, bypassing the reconciler's link-on-insert.
  h.store()
    .insert_subscription(inkwell_core::subscription::NewSubscription {
      user_id:                  None,
      email:                    ADA.0.into(),
      external_customer_id:     None,
      external_subscription_id: Some("sub_1".into()),
      status:                   SubscriptionStatus::Active,
      current_period_end:       None,
    })
    .await
    .unwrap()
    .unwrap();

  let (_, body) = h.call("GET", "/subscriptions/status", Some(ADA), None).await;
  assert_eq!(body["needs_linking"], true);

  let (_, body) = h.call("POST", "/subscriptions/link", Some(ADA), None).await;
  assert_eq!(body, json!({ "linked": true, "reason": "linked now" }));
  let (_, body) = h.call("POST", "/subscriptions/link", Some(ADA), None).await;
  assert_eq!(body, json!({ "linked": true, "reason": "already linked" }));
}

#[tokio::test]
async fn by_email_check() {
  let h = Harness::new().await;
  upsert_subscription(h.store(), active("ada@example.com")).await.unwrap();

  let (_, body) = h
    .call("GET", "/subscriptions/by-email?email=ADA%40example.com", None, None)
    .await;
  assert_eq!(body, json!({ "has_active_subscription": true, "status": "active" }));

  let (_, body) = h
    .call("GET", "/subscriptions/by-email?email=nobody%40example.com", None, None)
    .await;
  assert_eq!(body, json!({ "has_active_subscription": false }));
}

// ─── Debug ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn debug_routes_are_absent_by_default() {
  let h = Harness::new().await;
  h.register(ADA.0, ADA.1).await;
  let (status, _) = h.call("GET", "/debug/subscriptions", Some(ADA), None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn debug_activation_creates_then_updates() {
  let h = Harness::with(ScriptedModel::default(), true).await;
  let user_id = h.register(ADA.0, ADA.1).await;

  let (status, body) = h.call("POST", "/debug/subscriptions", Some(ADA), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["action"], "created new subscription");

  let mut event = SubscriptionUpsert::new(ADA.0, SubscriptionStatus::Canceled);
  event.external_subscription_id = Some("debug_subscription".into());
  upsert_subscription(h.store(), event).await.unwrap();

  let (_, body) = h.call("POST", "/debug/subscriptions", Some(ADA), None).await;
  assert_eq!(body["action"], "updated existing subscription to active");

  let (_, rows) = h.call("GET", "/debug/subscriptions", Some(ADA), None).await;
  let rows = rows.as_array().unwrap();
  assert_eq!(rows.len(), 1);
  assert_eq!(rows[0]["status"], "active");
  assert_eq!(rows[0]["user_id"], user_id.to_string());
}
