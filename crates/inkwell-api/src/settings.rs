//! Handlers for `/settings` endpoints.

use axum::{Json, extract::State};
use inkwell_core::{store::WorkspaceStore, user::UserSettings};
use serde::Deserialize;

use crate::{
  ApiState,
  auth::{AuthUser, MaybeUser},
  error::ApiError,
};

/// `GET /settings`. `null` for anonymous callers and for users who never
/// saved any settings.
pub async fn get_one<S>(
  State(state): State<ApiState<S>>,
  MaybeUser(user): MaybeUser,
) -> Result<Json<Option<UserSettings>>, ApiError>
where
  S: WorkspaceStore + 'static,
{
  let Some(user) = user else {
    return Ok(Json(None));
  };
  let settings = state
    .store
    .get_settings(user.user_id)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(settings))
}

#[derive(Debug, Deserialize)]
pub struct InstructionsBody {
  pub ai_system_instructions: String,
}

/// `PUT /settings/ai-instructions`
pub async fn put_ai_instructions<S>(
  State(state): State<ApiState<S>>,
  AuthUser(user): AuthUser,
  Json(body): Json<InstructionsBody>,
) -> Result<Json<UserSettings>, ApiError>
where
  S: WorkspaceStore + 'static,
{
  let settings = state
    .store
    .put_ai_instructions(user.user_id, body.ai_system_instructions)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(settings))
}
