//! Chat-completion client for the writing assistant.
//!
//! [`ChatModel`] is the seam the API layer talks to; [`OpenAiChat`] is the
//! production implementation against any OpenAI-compatible
//! `/chat/completions` endpoint.

mod openai;

pub mod error;

use async_trait::async_trait;
use serde::Serialize;

pub use error::{Error, Result};
pub use openai::{DEFAULT_API_BASE, OpenAiChat};

/// Model used when configuration does not name one.
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
  System,
  User,
  Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
  pub role:    ChatRole,
  pub content: String,
}

impl ChatMessage {
  pub fn system(content: impl Into<String>) -> Self {
    Self { role: ChatRole::System, content: content.into() }
  }

  pub fn user(content: impl Into<String>) -> Self {
    Self { role: ChatRole::User, content: content.into() }
  }
}

/// One completion call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
  pub model:       String,
  pub messages:    Vec<ChatMessage>,
  pub temperature: f64,
  pub max_tokens:  u32,
}

/// Anything that can turn a conversation into a reply.
///
/// Returns `Ok(None)` when the provider answered successfully but produced
/// no text; callers decide what to show instead.
#[async_trait]
pub trait ChatModel: Send + Sync {
  async fn complete(&self, request: CompletionRequest) -> Result<Option<String>>;
}
