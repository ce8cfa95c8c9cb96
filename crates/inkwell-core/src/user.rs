//! Users and their per-account settings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An account holder. The password hash lives in [`Credentials`] and is never
/// part of this type, so a `User` is always safe to serialise to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
  pub user_id:    Uuid,
  pub name:       String,
  pub email:      String,
  pub created_at: DateTime<Utc>,
}

/// Input to [`WorkspaceStore::create_user`](crate::store::WorkspaceStore::create_user).
#[derive(Debug, Clone)]
pub struct NewUser {
  pub name:          String,
  /// Already normalised by the caller.
  pub email:         String,
  /// argon2 PHC string.
  pub password_hash: String,
}

/// A user together with the stored password hash, for authentication only.
#[derive(Debug, Clone)]
pub struct Credentials {
  pub user:          User,
  pub password_hash: String,
}

/// Per-user settings. One row per user, created on first write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSettings {
  pub user_id:                Uuid,
  /// Global AI instructions applied to every document the user owns.
  pub ai_system_instructions: Option<String>,
}
