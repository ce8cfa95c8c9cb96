//! HTTP Basic-auth extractors and password hashing.
//!
//! Credentials are `email:password`. The email is normalised before lookup,
//! and the password is checked against the argon2 hash stored for that user.

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString,
};
use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, header, request::Parts},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use inkwell_core::{email::normalize_email, store::WorkspaceStore, user::User};
use rand_core::OsRng;
use tracing::debug;

use crate::{ApiState, error::ApiError};

/// An authenticated caller. Rejects with 401 when credentials are missing or
/// wrong.
pub struct AuthUser(pub User);

/// The caller if authenticated, `None` otherwise. Never rejects on bad
/// credentials; read endpoints use it to degrade to empty results.
pub struct MaybeUser(pub Option<User>);

/// Split a `Basic` authorization header into `(email, password)`.
fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
  let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
  let encoded = value.strip_prefix("Basic ")?;
  let decoded = B64.decode(encoded.trim()).ok()?;
  let creds = String::from_utf8(decoded).ok()?;
  let (email, password) = creds.split_once(':')?;
  Some((normalize_email(email), password.to_owned()))
}

/// Resolve the caller from request headers. `Ok(None)` covers every form of
/// missing or invalid credentials; only store failures are errors.
pub async fn authenticate<S>(headers: &HeaderMap, store: &S) -> Result<Option<User>, ApiError>
where
  S: WorkspaceStore,
{
  let Some((email, password)) = basic_credentials(headers) else {
    return Ok(None);
  };

  let Some(creds) = store
    .find_credentials(email)
    .await
    .map_err(ApiError::store)?
  else {
    debug!("basic auth for unknown email");
    return Ok(None);
  };

  let Ok(parsed) = PasswordHash::new(&creds.password_hash) else {
    return Ok(None);
  };
  if Argon2::default()
    .verify_password(password.as_bytes(), &parsed)
    .is_err()
  {
    debug!(user_id = %creds.user.user_id, "basic auth password mismatch");
    return Ok(None);
  }

  Ok(Some(creds.user))
}

/// Produce an argon2 PHC string for a new password.
pub fn hash_password(password: &str) -> Result<String, ApiError> {
  let salt = SaltString::generate(&mut OsRng);
  Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .map(|hash| hash.to_string())
    .map_err(|e| ApiError::Internal(format!("argon2 error: {e}")))
}

impl<S> FromRequestParts<ApiState<S>> for AuthUser
where
  S: WorkspaceStore + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &ApiState<S>,
  ) -> Result<Self, Self::Rejection> {
    authenticate(&parts.headers, state.store.as_ref())
      .await?
      .map(AuthUser)
      .ok_or(ApiError::Unauthorized)
  }
}

impl<S> FromRequestParts<ApiState<S>> for MaybeUser
where
  S: WorkspaceStore + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &ApiState<S>,
  ) -> Result<Self, Self::Rejection> {
    Ok(MaybeUser(authenticate(&parts.headers, state.store.as_ref()).await?))
  }
}

#[cfg(test)]
mod tests {
  use axum::http::HeaderValue;

  use super::*;

  fn headers(value: &str) -> HeaderMap {
    let mut h = HeaderMap::new();
    h.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
    h
  }

  #[test]
  fn parses_and_normalises_basic_credentials() {
    let encoded = B64.encode(" Ada@Example.com:pa:ss");
    let (email, password) = basic_credentials(&headers(&format!("Basic {encoded}"))).unwrap();
    assert_eq!(email, "ada@example.com");
    assert_eq!(password, "pa:ss");
  }

  #[test]
  fn rejects_other_schemes_and_garbage() {
    assert!(basic_credentials(&HeaderMap::new()).is_none());
    assert!(basic_credentials(&headers("Bearer abc")).is_none());
    assert!(basic_credentials(&headers("Basic !!!not-base64!!!")).is_none());
    let no_colon = B64.encode("justauser");
    assert!(basic_credentials(&headers(&format!("Basic {no_colon}"))).is_none());
  }

  #[test]
  fn hashed_password_verifies() {
    let hash = hash_password("hunter2").unwrap();
    let parsed = PasswordHash::new(&hash).unwrap();
    assert!(Argon2::default().verify_password(b"hunter2", &parsed).is_ok());
    assert!(Argon2::default().verify_password(b"hunter3", &parsed).is_err());
  }
}
