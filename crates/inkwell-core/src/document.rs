//! Documents and the two kinds of child records hanging off them: knowledge
//! items (reference snippets) and chat messages.
//!
//! Children have no lifecycle of their own. Deleting a document removes all
//! of its knowledge items and messages.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Error;

/// Title given to documents created without one.
pub const DEFAULT_TITLE: &str = "Untitled Document";

// ─── Document ────────────────────────────────────────────────────────────────

/// A user-owned rich-text document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
  pub document_id:            Uuid,
  pub user_id:                Uuid,
  pub title:                  String,
  /// Serialised rich-text body, opaque to the backend.
  pub content:                String,
  pub updated_at:             DateTime<Utc>,
  /// Instructions for the assistant that apply to this document only.
  pub ai_system_instructions: Option<String>,
}

impl Document {
  pub fn is_owned_by(&self, user_id: Uuid) -> bool { self.user_id == user_id }
}

/// A partial update. `None` fields are left untouched; `updated_at` is always
/// bumped.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocumentPatch {
  pub title:                  Option<String>,
  pub content:                Option<String>,
  pub ai_system_instructions: Option<String>,
}

/// What a cascading document delete removed alongside the document itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentDeletion {
  pub knowledge_removed: usize,
  pub messages_removed:  usize,
}

// ─── Knowledge ───────────────────────────────────────────────────────────────

/// A reference snippet the assistant sees as context for one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeItem {
  pub knowledge_id: Uuid,
  pub document_id:  Uuid,
  pub title:        String,
  pub content:      String,
  pub created_at:   DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct KnowledgePatch {
  pub title:   Option<String>,
  pub content: Option<String>,
}

// ─── Messages ────────────────────────────────────────────────────────────────

/// Who authored a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
  User,
  Assistant,
}

impl Role {
  pub fn as_str(self) -> &'static str {
    match self {
      Role::User => "user",
      Role::Assistant => "assistant",
    }
  }
}

impl fmt::Display for Role {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Role {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "user" => Ok(Role::User),
      "assistant" => Ok(Role::Assistant),
      other => Err(Error::UnknownRole(other.to_owned())),
    }
  }
}

/// One turn of a document's chat thread. Append-only; ordered by insertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
  pub message_id:  Uuid,
  pub document_id: Uuid,
  pub role:        Role,
  pub content:     String,
  pub created_at:  DateTime<Utc>,
}
