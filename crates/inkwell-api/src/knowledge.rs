//! Handlers for knowledge items.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/documents/{id}/knowledge` | `[]` if the document is missing or not owned |
//! | `POST`   | `/documents/{id}/knowledge` | Body: `{"title","content"}`; returns 201 |
//! | `PATCH`  | `/knowledge/{id}` | Body: [`KnowledgePatch`] |
//! | `DELETE` | `/knowledge/{id}` | 204 |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use inkwell_core::{
  document::{KnowledgeItem, KnowledgePatch},
  store::WorkspaceStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
  ApiState,
  auth::{AuthUser, MaybeUser},
  error::ApiError,
  owned_document, require_document,
};

/// `GET /documents/{id}/knowledge`
pub async fn list<S>(
  State(state): State<ApiState<S>>,
  MaybeUser(user): MaybeUser,
  Path(document_id): Path<Uuid>,
) -> Result<Json<Vec<KnowledgeItem>>, ApiError>
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
  let items = state
    .store
    .list_knowledge(document_id)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(items))
}

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub title:   String,
  pub content: String,
}

/// `POST /documents/{id}/knowledge`
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
  let item = state
    .store
    .add_knowledge(document_id, body.title, body.content)
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(item)))
}

/// Load a knowledge item the caller may modify: 404 if it does not exist,
/// 403 if its document belongs to someone else.
async fn require_item<S>(
  state:        &ApiState<S>,
  user_id:      Uuid,
  knowledge_id: Uuid,
) -> Result<KnowledgeItem, ApiError>
where
  S: WorkspaceStore,
{
  let item = state
    .store
    .get_knowledge(knowledge_id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound("Knowledge item not found".into()))?;
  if owned_document(state.store.as_ref(), user_id, item.document_id)
    .await?
    .is_none()
  {
    return Err(ApiError::Forbidden);
  }
  Ok(item)
}

/// `PATCH /knowledge/{id}`
pub async fn update<S>(
  State(state): State<ApiState<S>>,
  AuthUser(user): AuthUser,
  Path(id): Path<Uuid>,
  Json(patch): Json<KnowledgePatch>,
) -> Result<Json<KnowledgeItem>, ApiError>
where
  S: WorkspaceStore + 'static,
{
  require_item(&state, user.user_id, id).await?;
  let item = state
    .store
    .update_knowledge(id, patch)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound("Knowledge item not found".into()))?;
  Ok(Json(item))
}

/// `DELETE /knowledge/{id}`
pub async fn remove<S>(
  State(state): State<ApiState<S>>,
  AuthUser(user): AuthUser,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError>
where
  S: WorkspaceStore + 'static,
{
  require_item(&state, user.user_id, id).await?;
  state
    .store
    .delete_knowledge(id)
    .await
    .map_err(ApiError::store)?;
  Ok(StatusCode::NO_CONTENT)
}
