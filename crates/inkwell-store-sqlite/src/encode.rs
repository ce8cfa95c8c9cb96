//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings. UUIDs are stored as
//! hyphenated lowercase strings. Enums are stored as their snake_case names.

use chrono::{DateTime, SecondsFormat, Utc};
use inkwell_core::{
  document::{Document, KnowledgeItem, Message, Role},
  subscription::{Subscription, SubscriptionStatus},
  user::{Credentials, User, UserSettings},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

/// Fixed-width microsecond precision so stored timestamps sort lexically.
pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Enums ────────────────────────────────────────────────────────────────────

pub fn decode_role(s: &str) -> Result<Role> { Ok(s.parse()?) }

pub fn decode_status(s: &str) -> Result<SubscriptionStatus> { Ok(s.parse()?) }

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching [`RawUser`]; shared by every user query.
pub const USER_COLUMNS: &str = "user_id, name, email, created_at, password_hash";

/// Raw strings read directly from a `users` row.
pub struct RawUser {
  pub user_id:       String,
  pub name:          String,
  pub email:         String,
  pub created_at:    String,
  pub password_hash: String,
}

impl RawUser {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      user_id:       row.get(0)?,
      name:          row.get(1)?,
      email:         row.get(2)?,
      created_at:    row.get(3)?,
      password_hash: row.get(4)?,
    })
  }

  pub fn into_credentials(self) -> Result<Credentials> {
    Ok(Credentials {
      user:          User {
        user_id:    decode_uuid(&self.user_id)?,
        name:       self.name,
        email:      self.email,
        created_at: decode_dt(&self.created_at)?,
      },
      password_hash: self.password_hash,
    })
  }

  pub fn into_user(self) -> Result<User> { Ok(self.into_credentials()?.user) }
}

/// Raw strings read directly from a `user_settings` row.
pub struct RawSettings {
  pub user_id:                String,
  pub ai_system_instructions: Option<String>,
}

impl RawSettings {
  pub fn into_settings(self) -> Result<UserSettings> {
    Ok(UserSettings {
      user_id:                decode_uuid(&self.user_id)?,
      ai_system_instructions: self.ai_system_instructions,
    })
  }
}

pub const DOCUMENT_COLUMNS: &str =
  "document_id, user_id, title, content, updated_at, ai_system_instructions";

/// Raw strings read directly from a `documents` row.
pub struct RawDocument {
  pub document_id:            String,
  pub user_id:                String,
  pub title:                  String,
  pub content:                String,
  pub updated_at:             String,
  pub ai_system_instructions: Option<String>,
}

impl RawDocument {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      document_id:            row.get(0)?,
      user_id:                row.get(1)?,
      title:                  row.get(2)?,
      content:                row.get(3)?,
      updated_at:             row.get(4)?,
      ai_system_instructions: row.get(5)?,
    })
  }

  pub fn into_document(self) -> Result<Document> {
    Ok(Document {
      document_id:            decode_uuid(&self.document_id)?,
      user_id:                decode_uuid(&self.user_id)?,
      title:                  self.title,
      content:                self.content,
      updated_at:             decode_dt(&self.updated_at)?,
      ai_system_instructions: self.ai_system_instructions,
    })
  }
}

pub const KNOWLEDGE_COLUMNS: &str = "knowledge_id, document_id, title, content, created_at";

/// Raw strings read directly from a `knowledge` row.
pub struct RawKnowledge {
  pub knowledge_id: String,
  pub document_id:  String,
  pub title:        String,
  pub content:      String,
  pub created_at:   String,
}

impl RawKnowledge {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      knowledge_id: row.get(0)?,
      document_id:  row.get(1)?,
      title:        row.get(2)?,
      content:      row.get(3)?,
      created_at:   row.get(4)?,
    })
  }

  pub fn into_item(self) -> Result<KnowledgeItem> {
    Ok(KnowledgeItem {
      knowledge_id: decode_uuid(&self.knowledge_id)?,
      document_id:  decode_uuid(&self.document_id)?,
      title:        self.title,
      content:      self.content,
      created_at:   decode_dt(&self.created_at)?,
    })
  }
}

pub const MESSAGE_COLUMNS: &str = "message_id, document_id, role, content, created_at";

/// Raw strings read directly from a `messages` row.
pub struct RawMessage {
  pub message_id:  String,
  pub document_id: String,
  pub role:        String,
  pub content:     String,
  pub created_at:  String,
}

impl RawMessage {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      message_id:  row.get(0)?,
      document_id: row.get(1)?,
      role:        row.get(2)?,
      content:     row.get(3)?,
      created_at:  row.get(4)?,
    })
  }

  pub fn into_message(self) -> Result<Message> {
    Ok(Message {
      message_id:  decode_uuid(&self.message_id)?,
      document_id: decode_uuid(&self.document_id)?,
      role:        decode_role(&self.role)?,
      content:     self.content,
      created_at:  decode_dt(&self.created_at)?,
    })
  }
}

pub const SUBSCRIPTION_COLUMNS: &str = "subscription_id, user_id, email, external_customer_id, \
  external_subscription_id, status, current_period_end";

/// Raw strings read directly from a `subscriptions` row.
pub struct RawSubscription {
  pub subscription_id:          String,
  pub user_id:                  Option<String>,
  pub email:                    String,
  pub external_customer_id:     Option<String>,
  pub external_subscription_id: Option<String>,
  pub status:                   String,
  pub current_period_end:       Option<String>,
}

impl RawSubscription {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      subscription_id:          row.get(0)?,
      user_id:                  row.get(1)?,
      email:                    row.get(2)?,
      external_customer_id:     row.get(3)?,
      external_subscription_id: row.get(4)?,
      status:                   row.get(5)?,
      current_period_end:       row.get(6)?,
    })
  }

  pub fn into_subscription(self) -> Result<Subscription> {
    Ok(Subscription {
      subscription_id:          decode_uuid(&self.subscription_id)?,
      user_id:                  self.user_id.as_deref().map(decode_uuid).transpose()?,
      email:                    self.email,
      external_customer_id:     self.external_customer_id,
      external_subscription_id: self.external_subscription_id,
      status:                   decode_status(&self.status)?,
      current_period_end:       self
        .current_period_end
        .as_deref()
        .map(decode_dt)
        .transpose()?,
    })
  }
}
