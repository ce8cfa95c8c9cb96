//! Handlers for a document's chat history.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/documents/{id}/messages` | Insertion order; `[]` if not owned |
//! | `POST`   | `/documents/{id}/messages` | Body: `{"role":"user\|assistant","content"}`; returns 201 |
//! | `DELETE` | `/documents/{id}/messages` | Returns `{"removed": n}` |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use inkwell_core::{
  document::{Message, Role},
  store::WorkspaceStore,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  ApiState,
  auth::{AuthUser, MaybeUser},
  error::ApiError,
  owned_document, require_document,
};

/// `GET /documents/{id}/messages`
pub async fn list<S>(
  State(state): State<ApiState<S>>,
  MaybeUser(user): MaybeUser,
  Path(document_id): Path<Uuid>,
) -> Result<Json<Vec<Message>>, ApiError>
where
  S: WorkspaceStore + 'static,
{
  let Some(user) = user else {
    return Ok(Json(Vec::new()));
  };
  if owned_document(state.store.as_ref(), user.user_id, document_id)
    .await?
    .is_none()
  {
    return Ok(Json(Vec::new()));
  }
  let messages = state
    .store
    .list_messages(document_id)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(messages))
}

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub role:    Role,
  pub content: String,
}

/// `POST /documents/{id}/messages`
pub async fn create<S>(
  State(state): State<ApiState<S>>,
  AuthUser(user): AuthUser,
  Path(document_id): Path<Uuid>,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: WorkspaceStore + 'static,
{
  require_document(state.store.as_ref(), user.user_id, document_id).await?;
  let message = state
    .store
    .append_message(document_id, body.role, body.content)
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(message)))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Cleared {
  pub removed: usize,
}

/// `DELETE /documents/{id}/messages`
pub async fn clear<S>(
  State(state): State<ApiState<S>>,
  AuthUser(user): AuthUser,
  Path(document_id): Path<Uuid>,
) -> Result<Json<Cleared>, ApiError>
where
  S: WorkspaceStore + 'static,
{
  require_document(state.store.as_ref(), user.user_id, document_id).await?;
  let removed = state
    .store
    .clear_messages(document_id)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(Cleared { removed }))
}
