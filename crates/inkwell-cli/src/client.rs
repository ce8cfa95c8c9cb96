//! Async HTTP client wrapping the Inkwell JSON API.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use inkwell_api::{
  chat::{ChatRequest, ChatResponse},
  messages::Cleared,
  subscriptions::{LinkOutcome, StatusView},
};
use inkwell_core::{
  document::{Document, DocumentDeletion, KnowledgeItem, Message},
  user::{User, UserSettings},
};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::debug;
use uuid::Uuid;

/// Connection settings for the Inkwell API.
#[derive(Debug, Clone)]
pub struct ApiConfig {
  pub base_url: String,
  pub email:    String,
  pub password: String,
}

/// Async HTTP client for the Inkwell REST API.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct ApiClient {
  client: Client,
  config: ApiConfig,
}

/// Turn a non-2xx response into an error carrying the server's message.
async fn expect_success(resp: Response, what: &str) -> Result<Response> {
  let status = resp.status();
  if status.is_success() {
    return Ok(resp);
  }
  let message = resp
    .json::<Value>()
    .await
    .ok()
    .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_owned))
    .unwrap_or_else(|| status.to_string());
  Err(anyhow!("{what} → {status}: {message}"))
}

impl ApiClient {
  pub fn new(config: ApiConfig) -> Result<Self> {
    let client = Client::builder()
      // Chat calls wait on the model provider.
      .timeout(Duration::from_secs(120))
      .build()
      .context("failed to build HTTP client")?;
    Ok(Self { client, config })
  }

  pub fn email(&self) -> &str { &self.config.email }

  fn url(&self, path: &str) -> String {
    format!("{}/api{}", self.config.base_url.trim_end_matches('/'), path)
  }

  fn auth(&self, req: RequestBuilder) -> RequestBuilder {
    if self.config.email.is_empty() {
      req
    } else {
      req.basic_auth(&self.config.email, Some(&self.config.password))
    }
  }

  async fn send<T: DeserializeOwned>(&self, req: RequestBuilder, what: &str) -> Result<T> {
    debug!(what, "api request");
    let resp = self
      .auth(req)
      .send()
      .await
      .with_context(|| format!("{what} failed"))?;
    expect_success(resp, what)
      .await?
      .json()
      .await
      .with_context(|| format!("deserialising {what} response"))
  }

  async fn send_empty(&self, req: RequestBuilder, what: &str) -> Result<()> {
    let resp = self
      .auth(req)
      .send()
      .await
      .with_context(|| format!("{what} failed"))?;
    expect_success(resp, what).await.map(drop)
  }

  // ── Users ─────────────────────────────────────────────────────────────────

  /// `POST /api/users`
  pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<User> {
    let body = json!({ "name": name, "email": email, "password": password });
    self
      .send(self.client.post(self.url("/users")).json(&body), "POST /users")
      .await
  }

  /// `GET /api/users/me`
  pub async fn me(&self) -> Result<Option<User>> {
    self.send(self.client.get(self.url("/users/me")), "GET /users/me").await
  }

  // ── Settings ──────────────────────────────────────────────────────────────

  /// `GET /api/settings`
  pub async fn settings(&self) -> Result<Option<UserSettings>> {
    self.send(self.client.get(self.url("/settings")), "GET /settings").await
  }

  /// `PUT /api/settings/ai-instructions`
  pub async fn set_instructions(&self, instructions: &str) -> Result<UserSettings> {
    let body = json!({ "ai_system_instructions": instructions });
    self
      .send(
        self.client.put(self.url("/settings/ai-instructions")).json(&body),
        "PUT /settings/ai-instructions",
      )
      .await
  }

  // ── Documents ─────────────────────────────────────────────────────────────

  /// `GET /api/documents`
  pub async fn list_documents(&self) -> Result<Vec<Document>> {
    self.send(self.client.get(self.url("/documents")), "GET /documents").await
  }

  /// `POST /api/documents`
  pub async fn create_document(&self, title: Option<&str>) -> Result<Document> {
    let body = json!({ "title": title });
    self
      .send(self.client.post(self.url("/documents")).json(&body), "POST /documents")
      .await
  }

  /// `GET /api/documents/{id}`
  pub async fn get_document(&self, id: Uuid) -> Result<Option<Document>> {
    self
      .send(self.client.get(self.url(&format!("/documents/{id}"))), "GET /documents/{id}")
      .await
  }

  /// `PATCH /api/documents/{id}`. `patch` holds only the fields to change.
  pub async fn update_document(&self, id: Uuid, patch: &Value) -> Result<Document> {
    self
      .send(
        self.client.patch(self.url(&format!("/documents/{id}"))).json(patch),
        "PATCH /documents/{id}",
      )
      .await
  }

  /// `DELETE /api/documents/{id}`
  pub async fn delete_document(&self, id: Uuid) -> Result<DocumentDeletion> {
    self
      .send(
        self.client.delete(self.url(&format!("/documents/{id}"))),
        "DELETE /documents/{id}",
      )
      .await
  }

  // ── Knowledge ─────────────────────────────────────────────────────────────

  /// `GET /api/documents/{id}/knowledge`
  pub async fn list_knowledge(&self, document_id: Uuid) -> Result<Vec<KnowledgeItem>> {
    self
      .send(
        self.client.get(self.url(&format!("/documents/{document_id}/knowledge"))),
        "GET /documents/{id}/knowledge",
      )
      .await
  }

  /// `POST /api/documents/{id}/knowledge`
  pub async fn add_knowledge(
    &self,
    document_id: Uuid,
    title: &str,
    content: &str,
  ) -> Result<KnowledgeItem> {
    let body = json!({ "title": title, "content": content });
    self
      .send(
        self
          .client
          .post(self.url(&format!("/documents/{document_id}/knowledge")))
          .json(&body),
        "POST /documents/{id}/knowledge",
      )
      .await
  }

  /// `PATCH /api/knowledge/{id}`. `patch` holds only the fields to change.
  pub async fn update_knowledge(&self, knowledge_id: Uuid, patch: &Value) -> Result<KnowledgeItem> {
    self
      .send(
        self.client.patch(self.url(&format!("/knowledge/{knowledge_id}"))).json(patch),
        "PATCH /knowledge/{id}",
      )
      .await
  }

  /// `DELETE /api/knowledge/{id}`
  pub async fn delete_knowledge(&self, knowledge_id: Uuid) -> Result<()> {
    self
      .send_empty(
        self.client.delete(self.url(&format!("/knowledge/{knowledge_id}"))),
        "DELETE /knowledge/{id}",
      )
      .await
  }

  // ── Messages and chat ─────────────────────────────────────────────────────

  /// `GET /api/documents/{id}/messages`
  pub async fn list_messages(&self, document_id: Uuid) -> Result<Vec<Message>> {
    self
      .send(
        self.client.get(self.url(&format!("/documents/{document_id}/messages"))),
        "GET /documents/{id}/messages",
      )
      .await
  }

  /// `DELETE /api/documents/{id}/messages`. Returns how many were removed.
  pub async fn clear_messages(&self, document_id: Uuid) -> Result<usize> {
    let cleared: Cleared = self
      .send(
        self.client.delete(self.url(&format!("/documents/{document_id}/messages"))),
        "DELETE /documents/{id}/messages",
      )
      .await?;
    Ok(cleared.removed)
  }

  /// `POST /api/documents/{id}/chat`
  pub async fn chat(&self, document_id: Uuid, request: &ChatRequest) -> Result<String> {
    let resp: ChatResponse = self
      .send(
        self
          .client
          .post(self.url(&format!("/documents/{document_id}/chat")))
          .json(request),
        "POST /documents/{id}/chat",
      )
      .await?;
    Ok(resp.reply)
  }

  // ── Subscriptions ─────────────────────────────────────────────────────────

  /// `GET /api/subscriptions/status`
  pub async fn subscription_status(&self) -> Result<Option<StatusView>> {
    self
      .send(self.client.get(self.url("/subscriptions/status")), "GET /subscriptions/status")
      .await
  }

  /// `POST /api/subscriptions/link`
  pub async fn link_subscription(&self) -> Result<LinkOutcome> {
    self
      .send(self.client.post(self.url("/subscriptions/link")), "POST /subscriptions/link")
      .await
  }
}

#[cfg(test)]
mod tests {
  use std::sync::{Arc, Mutex};

  use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    routing::patch,
  };

  use super::*;

  #[derive(Clone, Default)]
  struct Seen {
    body: Arc<Mutex<Option<Value>>>,
    auth: Arc<Mutex<Option<String>>>,
  }

  async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
    format!("http://{addr}/")
  }

  fn client(base_url: String) -> ApiClient {
    ApiClient::new(ApiConfig {
      base_url,
      email: "ada@example.com".into(),
      password: "hunter2".into(),
    })
    .unwrap()
  }

  #[tokio::test]
  async fn update_knowledge_patches_only_given_fields() {
    let seen = Seen::default();
    let router = Router::new()
      .route(
        "/api/knowledge/{id}",
        patch(
          |State(seen): State<Seen>,
           Path(id): Path<Uuid>,
           headers: HeaderMap,
           Json(body): Json<Value>| async move {
            *seen.auth.lock().unwrap() = headers
              .get(header::AUTHORIZATION)
              .and_then(|v| v.to_str().ok())
              .map(str::to_owned);
            *seen.body.lock().unwrap() = Some(body);
            Json(json!({
              "knowledge_id": id,
              "document_id": Uuid::nil(),
              "title": "Style",
              "content": "Be terse",
              "created_at": "2030-01-01T00:00:00Z",
            }))
          },
        ),
      )
      .with_state(seen.clone());
    let api = client(serve(router).await);

    let id = Uuid::new_v4();
    let item = api
      .update_knowledge(id, &json!({ "content": "Be terse" }))
      .await
      .unwrap();

    assert_eq!(item.knowledge_id, id);
    assert_eq!(item.content, "Be terse");
    assert_eq!(*seen.body.lock().unwrap(), Some(json!({ "content": "Be terse" })));
    assert!(seen.auth.lock().unwrap().as_deref().is_some_and(|a| a.starts_with("Basic ")));
  }

  #[tokio::test]
  async fn update_knowledge_surfaces_server_message() {
    let router = Router::new().route(
      "/api/knowledge/{id}",
      patch(|| async {
        (StatusCode::FORBIDDEN, Json(json!({ "error": "Not authorized" })))
      }),
    );
    let api = client(serve(router).await);

    let err = api
      .update_knowledge(Uuid::new_v4(), &json!({ "title": "x" }))
      .await
      .unwrap_err();
    assert!(err.to_string().contains("Not authorized"));
  }
}
