//! Handlers for `/users` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/users` | Body: `{"name","email","password"}`; 201, 409 if the email is taken |
//! | `GET`  | `/users/me` | The caller, or `null` |
//! | `PUT`  | `/users/me` | Body: `{"name","email"}`; 409 if the email belongs to someone else |

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use inkwell_core::{
  email::normalize_email,
  reconcile::link_to_user,
  store::WorkspaceStore,
  user::{NewUser, User},
};
use serde::Deserialize;
use tracing::info;

use crate::{
  ApiState,
  auth::{AuthUser, MaybeUser, hash_password},
  error::ApiError,
};

fn valid_email(raw: &str) -> Result<String, ApiError> {
  let email = normalize_email(raw);
  if email.is_empty() || !email.contains('@') {
    return Err(ApiError::BadRequest("A valid email is required".into()));
  }
  Ok(email)
}

// ─── Register ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RegisterBody {
  #[serde(default)]
  pub name:     String,
  pub email:    String,
  pub password: String,
}

/// `POST /users`. Any subscription bought with the same email before signing
/// up is linked to the new account.
pub async fn register<S>(
  State(state): State<ApiState<S>>,
  Json(body): Json<RegisterBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: WorkspaceStore + 'static,
{
  let email = valid_email(&body.email)?;
  if body.password.is_empty() {
    return Err(ApiError::BadRequest("Password must not be empty".into()));
  }

  let user = state
    .store
    .create_user(NewUser {
      name:          body.name.trim().to_owned(),
      email:         email.clone(),
      password_hash: hash_password(&body.password)?,
    })
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::Conflict("Email already registered".into()))?;

  let linked = link_to_user(state.store.as_ref(), &email, user.user_id)
    .await
    .map_err(ApiError::store)?;
  info!(user_id = %user.user_id, linked_subscription = linked, "registered user");

  Ok((StatusCode::CREATED, Json(user)))
}

// ─── Me ──────────────────────────────────────────────────────────────────────

/// `GET /users/me`
pub async fn me(MaybeUser(user): MaybeUser) -> Json<Option<User>> { Json(user) }

#[derive(Debug, Deserialize)]
pub struct ProfileBody {
  pub name:  String,
  pub email: String,
}

/// `PUT /users/me`
pub async fn update_me<S>(
  State(state): State<ApiState<S>>,
  AuthUser(user): AuthUser,
  Json(body): Json<ProfileBody>,
) -> Result<Json<User>, ApiError>
where
  S: WorkspaceStore + 'static,
{
  let email = valid_email(&body.email)?;
  let updated = state
    .store
    .update_profile(user.user_id, body.name.trim().to_owned(), email)
    .await
    .map_err(ApiError::store)?;
  if !updated {
    return Err(ApiError::Conflict("Email already in use".into()));
  }

  let user = state
    .store
    .get_user(user.user_id)
    .await
    .map_err(ApiError::store)?
    .ok_or(ApiError::Unauthorized)?;
  Ok(Json(user))
}
