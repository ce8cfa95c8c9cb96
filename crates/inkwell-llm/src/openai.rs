use async_trait::async_trait;
use tracing::debug;

use crate::{ChatModel, CompletionRequest, Error, Result};

pub const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";

/// Client for an OpenAI-compatible chat-completions API.
#[derive(Clone)]
pub struct OpenAiChat {
  http:     reqwest::Client,
  api_key:  String,
  api_base: String,
}

impl OpenAiChat {
  pub fn new(api_key: impl Into<String>, api_base: Option<String>) -> Self {
    let base = api_base.unwrap_or_else(|| DEFAULT_API_BASE.to_owned());
    Self {
      http:     reqwest::Client::new(),
      api_key:  api_key.into(),
      api_base: base.trim_end_matches('/').to_owned(),
    }
  }

  pub fn api_base(&self) -> &str { &self.api_base }
}

#[async_trait]
impl ChatModel for OpenAiChat {
  async fn complete(&self, request: CompletionRequest) -> Result<Option<String>> {
    let url = format!("{}/chat/completions", self.api_base);
    debug!(%url, model = %request.model, messages = request.messages.len(), "chat completion");

    let response = self
      .http
      .post(&url)
      .bearer_auth(&self.api_key)
      .json(&request)
      .send()
      .await?;

    let status = response.status();
    if !status.is_success() {
      let message = response.text().await.unwrap_or_default();
      return Err(Error::Api { status: status.as_u16(), message });
    }

    let data: serde_json::Value = response
      .json()
      .await
      .map_err(|e| Error::Parse(e.to_string()))?;
    Ok(parse_reply(&data))
  }
}

/// Pull `choices[0].message.content` out of a completion body. A missing
/// choice or a null or blank content all read as no reply.
pub(crate) fn parse_reply(data: &serde_json::Value) -> Option<String> {
  data
    .get("choices")?
    .get(0)?
    .get("message")?
    .get("content")?
    .as_str()
    .filter(|s| !s.trim().is_empty())
    .map(str::to_owned)
}

#[cfg(test)]
mod tests {
  use std::sync::{Arc, Mutex};

  use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
  };
  use serde_json::{Value, json};

  use super::*;
  use crate::{ChatMessage, DEFAULT_MODEL};

  #[derive(Clone, Default)]
  struct Seen {
    body: Arc<Mutex<Option<Value>>>,
    auth: Arc<Mutex<Option<String>>>,
  }

  async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
    format!("http://{addr}/v1/")
  }

  fn request() -> CompletionRequest {
    CompletionRequest {
      model:       DEFAULT_MODEL.into(),
      messages:    vec![ChatMessage::system("be nice"), ChatMessage::user("hi")],
      temperature: 0.7,
      max_tokens:  2000,
    }
  }

  #[test]
  fn parse_reply_reads_first_choice() {
    let data = json!({ "choices": [{ "message": { "content": "Hello!" } }] });
    assert_eq!(parse_reply(&data).as_deref(), Some("Hello!"));
  }

  #[test]
  fn parse_reply_treats_missing_and_empty_as_none() {
    assert_eq!(parse_reply(&json!({ "choices": [] })), None);
    assert_eq!(parse_reply(&json!({})), None);
    assert_eq!(
      parse_reply(&json!({ "choices": [{ "message": { "content": null } }] })),
      None
    );
    assert_eq!(
      parse_reply(&json!({ "choices": [{ "message": { "content": "" } }] })),
      None
    );
  }

  #[tokio::test]
  async fn sends_openai_shaped_request() {
    let seen = Seen::default();
    let router = Router::new()
      .route(
        "/v1/chat/completions",
        post(|State(seen): State<Seen>, headers: HeaderMap, Json(body): Json<Value>| async move {
          *seen.auth.lock().unwrap() = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
          *seen.body.lock().unwrap() = Some(body);
          Json(json!({ "choices": [{ "message": { "role": "assistant", "content": "Sure." } }] }))
        }),
      )
      .with_state(seen.clone());
    let base = serve(router).await;

    let client = OpenAiChat::new("sk-test", Some(base));
    let reply = client.complete(request()).await.unwrap();
    assert_eq!(reply.as_deref(), Some("Sure."));

    assert_eq!(seen.auth.lock().unwrap().as_deref(), Some("Bearer sk-test"));
    let body = seen.body.lock().unwrap().clone().unwrap();
    assert_eq!(body["model"], "gpt-4o-mini");
    assert_eq!(body["max_tokens"], 2000);
    assert_eq!(body["messages"][0]["role"], "system");
    assert_eq!(body["messages"][1]["role"], "user");
    assert_eq!(body["messages"][1]["content"], "hi");
    let temperature = body["temperature"].as_f64().unwrap();
    assert_eq!(temperature, 0.7);
  }

  #[tokio::test]
  async fn provider_error_is_reported() {
    let router = Router::new().route(
      "/v1/chat/completions",
      post(|| async { (StatusCode::TOO_MANY_REQUESTS, "slow down") }),
    );
    let base = serve(router).await;

    let err = OpenAiChat::new("k", Some(base)).complete(request()).await.unwrap_err();
    match err {
      Error::Api { status, message } => {
        assert_eq!(status, 429);
        assert_eq!(message, "slow down");
      }
      other => panic!("unexpected error: {other}"),
    }
  }

  #[test]
  fn trailing_slash_is_trimmed() {
    let client = OpenAiChat::new("k", Some("http://localhost:1/v1///".into()));
    assert_eq!(client.api_base(), "http://localhost:1/v1");
  }
}
