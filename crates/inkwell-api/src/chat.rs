//! The chat action: one assistant turn for a document.
//!
//! `POST /documents/{id}/chat` with `{"user_message","document_content"}`
//! returns `{"reply"}`. The client sends the live editor content so the
//! assistant sees unsaved edits.

use axum::{
  Json,
  extract::{Path, State},
};
use inkwell_core::{
  document::Role,
  prompt::{PromptContext, assemble_system_prompt},
  store::WorkspaceStore,
};
use inkwell_llm::{ChatMessage, ChatModel, CompletionRequest};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::{ApiSettings, ApiState, auth::AuthUser, error::ApiError, owned_document};

/// Shown when the provider answers without any text.
pub const FALLBACK_REPLY: &str =
  "I apologize, but I couldn't generate a response. Please try again.";

pub const TEMPERATURE: f64 = 0.7;
pub const MAX_TOKENS: u32 = 2000;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatRequest {
  pub user_message:     String,
  #[serde(default)]
  pub document_content: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatResponse {
  pub reply: String,
}

/// Run one chat turn for `user_id` on `document_id` and return the reply.
///
/// Context that the caller may not see (knowledge and instructions of a
/// document they do not own) is left out of the prompt rather than failing.
/// Both messages are persisted only after the provider has answered, so a
/// provider failure leaves the history untouched.
pub async fn run_chat<S>(
  store:       &S,
  model:       &dyn ChatModel,
  settings:    &ApiSettings,
  user_id:     Uuid,
  document_id: Uuid,
  request:     ChatRequest,
) -> Result<String, ApiError>
where
  S: WorkspaceStore,
{
  let document = owned_document(store, user_id, document_id).await?;

  let knowledge = match &document {
    Some(_) => store
      .list_knowledge(document_id)
      .await
      .map_err(ApiError::store)?,
    None => Vec::new(),
  };
  let global = store
    .get_settings(user_id)
    .await
    .map_err(ApiError::store)?
    .and_then(|s| s.ai_system_instructions)
    .unwrap_or_default();
  let per_document = document
    .as_ref()
    .and_then(|d| d.ai_system_instructions.as_deref())
    .unwrap_or_default();

  let system = assemble_system_prompt(&PromptContext {
    document_content:      &request.document_content,
    knowledge:             &knowledge,
    global_instructions:   &global,
    document_instructions: per_document,
  });
  debug!(
    %document_id,
    knowledge = knowledge.len(),
    prompt_len = system.len(),
    "assembled system prompt"
  );

  let completion = model
    .complete(CompletionRequest {
      model:       settings.model.clone(),
      messages:    vec![
        ChatMessage::system(system),
        ChatMessage::user(request.user_message.clone()),
      ],
      temperature: TEMPERATURE,
      max_tokens:  MAX_TOKENS,
    })
    .await
    .map_err(ApiError::Upstream)?;
  let reply = completion.unwrap_or_else(|| FALLBACK_REPLY.to_owned());

  if document.is_none() {
    return Err(ApiError::document_not_found());
  }
  store
    .append_message(document_id, Role::User, request.user_message)
    .await
    .map_err(ApiError::store)?;
  store
    .append_message(document_id, Role::Assistant, reply.clone())
    .await
    .map_err(ApiError::store)?;

  info!(%document_id, reply_len = reply.len(), "chat turn completed");
  Ok(reply)
}

/// `POST /documents/{id}/chat`
pub async fn handler<S>(
  State(state): State<ApiState<S>>,
  AuthUser(user): AuthUser,
  Path(document_id): Path<Uuid>,
  Json(request): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError>
where
  S: WorkspaceStore + 'static,
{
  if request.user_message.trim().is_empty() {
    return Err(ApiError::BadRequest("user_message must not be empty".into()));
  }
  let reply = run_chat(
    state.store.as_ref(),
    state.model.as_ref(),
    &state.settings,
    user.user_id,
    document_id,
    request,
  )
  .await?;
  Ok(Json(ChatResponse { reply }))
}
