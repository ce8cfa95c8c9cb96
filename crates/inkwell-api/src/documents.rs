//! Handlers for `/documents` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/documents` | Caller's documents, most recently updated first |
//! | `POST`   | `/documents` | Body: `{"title":"..."}` (optional); returns 201 |
//! | `GET`    | `/documents/{id}` | `null` if missing or not owned |
//! | `PATCH`  | `/documents/{id}` | Body: [`DocumentPatch`] |
//! | `DELETE` | `/documents/{id}` | Also removes knowledge items and messages |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use inkwell_core::{
  document::{Document, DocumentDeletion, DocumentPatch},
  store::WorkspaceStore,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::{
  ApiState,
  auth::{AuthUser, MaybeUser},
  error::ApiError,
  owned_document, require_document,
};

// ─── List ────────────────────────────────────────────────────────────────────

/// `GET /documents`
pub async fn list<S>(
  State(state): State<ApiState<S>>,
  MaybeUser(user): MaybeUser,
) -> Result<Json<Vec<Document>>, ApiError>
where
  S: WorkspaceStore + 'static,
{
  let Some(user) = user else {
    return Ok(Json(Vec::new()));
  };
  let documents = state
    .store
    .list_documents(user.user_id)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(documents))
}

// ─── Create ──────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct CreateBody {
  #[serde(default)]
  pub title: Option<String>,
}

/// `POST /documents`
pub async fn create<S>(
  State(state): State<ApiState<S>>,
  AuthUser(user): AuthUser,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: WorkspaceStore + 'static,
{
  let document = state
    .store
    .create_document(user.user_id, body.title.unwrap_or_default())
    .await
    .map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(document)))
}

// ─── Get one ─────────────────────────────────────────────────────────────────

/// `GET /documents/{id}`
pub async fn get_one<S>(
  State(state): State<ApiState<S>>,
  MaybeUser(user): MaybeUser,
  Path(id): Path<Uuid>,
) -> Result<Json<Option<Document>>, ApiError>
where
  S: WorkspaceStore + 'static,
{
  let Some(user) = user else {
    return Ok(Json(None));
  };
  let document = owned_document(state.store.as_ref(), user.user_id, id).await?;
  Ok(Json(document))
}

// ─── Update ──────────────────────────────────────────────────────────────────

/// `PATCH /documents/{id}`
pub async fn update<S>(
  State(state): State<ApiState<S>>,
  AuthUser(user): AuthUser,
  Path(id): Path<Uuid>,
  Json(patch): Json<DocumentPatch>,
) -> Result<Json<Document>, ApiError>
where
  S: WorkspaceStore + 'static,
{
  require_document(state.store.as_ref(), user.user_id, id).await?;
  let document = state
    .store
    .update_document(id, patch)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(ApiError::document_not_found)?;
  Ok(Json(document))
}

// ─── Delete ──────────────────────────────────────────────────────────────────

/// `DELETE /documents/{id}`
pub async fn remove<S>(
  State(state): State<ApiState<S>>,
  AuthUser(user): AuthUser,
  Path(id): Path<Uuid>,
) -> Result<Json<DocumentDeletion>, ApiError>
where
  S: WorkspaceStore + 'static,
{
  require_document(state.store.as_ref(), user.user_id, id).await?;
  let deletion = state
    .store
    .delete_document(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(ApiError::document_not_found)?;
  info!(
    document_id = %id,
    knowledge = deletion.knowledge_removed,
    messages = deletion.messages_removed,
    "document deleted"
  );
  Ok(Json(deletion))
}
