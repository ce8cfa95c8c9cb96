//! [`SqliteStore`]: the SQLite implementation of [`WorkspaceStore`].

use std::path::Path;

use chrono::{DateTime, SubsecRound as _, Utc};
use rusqlite::OptionalExtension as _;
use tracing::debug;
use uuid::Uuid;

use inkwell_core::{
  document::{
    DEFAULT_TITLE, Document, DocumentDeletion, DocumentPatch, KnowledgeItem, KnowledgePatch,
    Message, Role,
  },
  store::WorkspaceStore,
  subscription::{NewSubscription, Subscription},
  user::{Credentials, NewUser, User, UserSettings},
};

use crate::{
  Error, Result,
  encode::{
    DOCUMENT_COLUMNS, KNOWLEDGE_COLUMNS, MESSAGE_COLUMNS, RawDocument, RawKnowledge,
    RawMessage, RawSettings, RawSubscription, RawUser, SUBSCRIPTION_COLUMNS, USER_COLUMNS,
    encode_dt, encode_uuid,
  },
  schema::SCHEMA,
};

/// Timestamps are stored at microsecond precision; truncate up front so a
/// value handed back from a write equals the value later read back.
fn now() -> DateTime<Utc> { Utc::now().trunc_subsecs(6) }

// ─── Store ───────────────────────────────────────────────────────────────────

/// An Inkwell store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run a query expected to return at most one row keyed by a single text
  /// parameter.
  async fn query_opt<T, F>(&self, sql: String, key: String, map: F) -> Result<Option<T>>
  where
    T: Send + 'static,
    F: FnOnce(&rusqlite::Row<'_>) -> rusqlite::Result<T> + Send + 'static,
  {
    let row = self
      .conn
      .call(move |conn| Ok(conn.query_row(&sql, rusqlite::params![key], map).optional()?))
      .await?;
    Ok(row)
  }

  /// Run a query returning every row keyed by a single text parameter.
  async fn query_all<T, F>(&self, sql: String, key: String, map: F) -> Result<Vec<T>>
  where
    T: Send + 'static,
    F: FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<T> + Send + 'static,
  {
    let rows = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![key], map)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(rows)
  }

  /// Run a write keyed by a single text parameter; returns affected rows.
  async fn execute_keyed(&self, sql: &'static str, key: String) -> Result<usize> {
    let changed = self
      .conn
      .call(move |conn| Ok(conn.execute(sql, rusqlite::params![key])?))
      .await?;
    Ok(changed)
  }

  async fn find_subscription_where(
    &self,
    column: &'static str,
    key: String,
  ) -> Result<Option<Subscription>> {
    let sql =
      format!("SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE {column} = ?1 LIMIT 1");
    let raw = self.query_opt(sql, key, RawSubscription::from_row).await?;
    raw.map(RawSubscription::into_subscription).transpose()
  }
}

// ─── WorkspaceStore impl ─────────────────────────────────────────────────────

impl WorkspaceStore for SqliteStore {
  type Error = Error;

  // ── Users ─────────────────────────────────────────────────────────────────

  async fn create_user(&self, input: NewUser) -> Result<Option<User>> {
    let user = User {
      user_id:    Uuid::new_v4(),
      name:       input.name,
      email:      input.email,
      created_at: now(),
    };

    let id_str = encode_uuid(user.user_id);
    let name   = user.name.clone();
    let email  = user.email.clone();
    let at_str = encode_dt(user.created_at);
    let hash   = input.password_hash;

    let inserted = self
      .conn
      .call(move |conn| {
        let n = conn.execute(
          "INSERT INTO users (user_id, name, email, created_at, password_hash)
           VALUES (?1, ?2, ?3, ?4, ?5)
           ON CONFLICT(email) DO NOTHING",
          rusqlite::params![id_str, name, email, at_str, hash],
        )?;
        Ok(n == 1)
      })
      .await?;

    Ok(inserted.then_some(user))
  }

  async fn get_user(&self, user_id: Uuid) -> Result<Option<User>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE user_id = ?1");
    let raw = self.query_opt(sql, encode_uuid(user_id), RawUser::from_row).await?;
    raw.map(RawUser::into_user).transpose()
  }

  async fn find_user_by_email(&self, email: String) -> Result<Option<User>> {
    Ok(self.find_credentials(email).await?.map(|c| c.user))
  }

  async fn find_credentials(&self, email: String) -> Result<Option<Credentials>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1");
    let raw = self.query_opt(sql, email, RawUser::from_row).await?;
    raw.map(RawUser::into_credentials).transpose()
  }

  async fn update_profile(&self, user_id: Uuid, name: String, email: String) -> Result<bool> {
    let id_str = encode_uuid(user_id);

    let updated = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let taken: bool = tx
          .query_row(
            "SELECT 1 FROM users WHERE email = ?1 AND user_id != ?2",
            rusqlite::params![email, id_str],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);
        if taken {
          return Ok(false);
        }
        let n = tx.execute(
          "UPDATE users SET name = ?2, email = ?3 WHERE user_id = ?1",
          rusqlite::params![id_str, name, email],
        )?;
        tx.commit()?;
        Ok(n == 1)
      })
      .await?;

    Ok(updated)
  }

  // ── Settings ──────────────────────────────────────────────────────────────

  async fn get_settings(&self, user_id: Uuid) -> Result<Option<UserSettings>> {
    let raw = self
      .query_opt(
        "SELECT user_id, ai_system_instructions FROM user_settings WHERE user_id = ?1".into(),
        encode_uuid(user_id),
        |row| {
          Ok(RawSettings {
            user_id:                row.get(0)?,
            ai_system_instructions: row.get(1)?,
          })
        },
      )
      .await?;
    raw.map(RawSettings::into_settings).transpose()
  }

  async fn put_ai_instructions(&self, user_id: Uuid, instructions: String) -> Result<UserSettings> {
    let id_str = encode_uuid(user_id);
    let stored = instructions.clone();

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO user_settings (user_id, ai_system_instructions) VALUES (?1, ?2)
           ON CONFLICT(user_id) DO UPDATE
             SET ai_system_instructions = excluded.ai_system_instructions",
          rusqlite::params![id_str, stored],
        )?;
        Ok(())
      })
      .await?;

    Ok(UserSettings { user_id, ai_system_instructions: Some(instructions) })
  }

  // ── Documents ─────────────────────────────────────────────────────────────

  async fn create_document(&self, user_id: Uuid, title: String) -> Result<Document> {
    let title = if title.trim().is_empty() { DEFAULT_TITLE.to_owned() } else { title };
    let document = Document {
      document_id: Uuid::new_v4(),
      user_id,
      title,
      content: String::new(),
      updated_at: now(),
      ai_system_instructions: None,
    };

    let id_str    = encode_uuid(document.document_id);
    let owner_str = encode_uuid(user_id);
    let title     = document.title.clone();
    let at_str    = encode_dt(document.updated_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO documents (document_id, user_id, title, content, updated_at)
           VALUES (?1, ?2, ?3, '', ?4)",
          rusqlite::params![id_str, owner_str, title, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(document)
  }

  async fn get_document(&self, document_id: Uuid) -> Result<Option<Document>> {
    let sql = format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE document_id = ?1");
    let raw = self
      .query_opt(sql, encode_uuid(document_id), RawDocument::from_row)
      .await?;
    raw.map(RawDocument::into_document).transpose()
  }

  async fn list_documents(&self, user_id: Uuid) -> Result<Vec<Document>> {
    let sql = format!(
      "SELECT {DOCUMENT_COLUMNS} FROM documents WHERE user_id = ?1
       ORDER BY updated_at DESC, rowid DESC"
    );
    let raws = self
      .query_all(sql, encode_uuid(user_id), RawDocument::from_row)
      .await?;
    raws.into_iter().map(RawDocument::into_document).collect()
  }

  async fn update_document(
    &self,
    document_id: Uuid,
    patch:       DocumentPatch,
  ) -> Result<Option<Document>> {
    let id_str = encode_uuid(document_id);
    let at_str = encode_dt(now());
    let select = format!("SELECT {DOCUMENT_COLUMNS} FROM documents WHERE document_id = ?1");

    let raw: Option<RawDocument> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let current = tx
          .query_row(&select, rusqlite::params![id_str], RawDocument::from_row)
          .optional()?;
        let Some(mut raw) = current else {
          return Ok(None);
        };

        if let Some(title) = patch.title {
          raw.title = title;
        }
        if let Some(content) = patch.content {
          raw.content = content;
        }
        if let Some(instructions) = patch.ai_system_instructions {
          raw.ai_system_instructions = Some(instructions);
        }
        raw.updated_at = at_str;

        tx.execute(
          "UPDATE documents
             SET title = ?2, content = ?3, updated_at = ?4, ai_system_instructions = ?5
           WHERE document_id = ?1",
          rusqlite::params![
            raw.document_id,
            raw.title,
            raw.content,
            raw.updated_at,
            raw.ai_system_instructions
          ],
        )?;
        tx.commit()?;
        Ok(Some(raw))
      })
      .await?;

    raw.map(RawDocument::into_document).transpose()
  }

  async fn delete_document(&self, document_id: Uuid) -> Result<Option<DocumentDeletion>> {
    let id_str = encode_uuid(document_id);

    let deletion = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let knowledge_removed = tx.execute(
          "DELETE FROM knowledge WHERE document_id = ?1",
          rusqlite::params![id_str],
        )?;
        let messages_removed = tx.execute(
          "DELETE FROM messages WHERE document_id = ?1",
          rusqlite::params![id_str],
        )?;
        let documents_removed = tx.execute(
          "DELETE FROM documents WHERE document_id = ?1",
          rusqlite::params![id_str],
        )?;
        if documents_removed == 0 {
          // Nothing to cascade from; dropping `tx` rolls back.
          return Ok(None);
        }
        tx.commit()?;
        Ok(Some(DocumentDeletion { knowledge_removed, messages_removed }))
      })
      .await?;

    if let Some(d) = &deletion {
      debug!(
        %document_id,
        knowledge = d.knowledge_removed,
        messages = d.messages_removed,
        "deleted document"
      );
    }
    Ok(deletion)
  }

  // ── Knowledge ─────────────────────────────────────────────────────────────

  async fn add_knowledge(
    &self,
    document_id: Uuid,
    title:       String,
    content:     String,
  ) -> Result<KnowledgeItem> {
    let item = KnowledgeItem {
      knowledge_id: Uuid::new_v4(),
      document_id,
      title,
      content,
      created_at: now(),
    };

    let id_str  = encode_uuid(item.knowledge_id);
    let doc_str = encode_uuid(document_id);
    let title   = item.title.clone();
    let content = item.content.clone();
    let at_str  = encode_dt(item.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO knowledge (knowledge_id, document_id, title, content, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![id_str, doc_str, title, content, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(item)
  }

  async fn get_knowledge(&self, knowledge_id: Uuid) -> Result<Option<KnowledgeItem>> {
    let sql = format!("SELECT {KNOWLEDGE_COLUMNS} FROM knowledge WHERE knowledge_id = ?1");
    let raw = self
      .query_opt(sql, encode_uuid(knowledge_id), RawKnowledge::from_row)
      .await?;
    raw.map(RawKnowledge::into_item).transpose()
  }

  async fn list_knowledge(&self, document_id: Uuid) -> Result<Vec<KnowledgeItem>> {
    let sql =
      format!("SELECT {KNOWLEDGE_COLUMNS} FROM knowledge WHERE document_id = ?1 ORDER BY rowid");
    let raws = self
      .query_all(sql, encode_uuid(document_id), RawKnowledge::from_row)
      .await?;
    raws.into_iter().map(RawKnowledge::into_item).collect()
  }

  async fn update_knowledge(
    &self,
    knowledge_id: Uuid,
    patch:        KnowledgePatch,
  ) -> Result<Option<KnowledgeItem>> {
    let id_str = encode_uuid(knowledge_id);
    let select = format!("SELECT {KNOWLEDGE_COLUMNS} FROM knowledge WHERE knowledge_id = ?1");

    let raw: Option<RawKnowledge> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let current = tx
          .query_row(&select, rusqlite::params![id_str], RawKnowledge::from_row)
          .optional()?;
        let Some(mut raw) = current else {
          return Ok(None);
        };

        if let Some(title) = patch.title {
          raw.title = title;
        }
        if let Some(content) = patch.content {
          raw.content = content;
        }

        tx.execute(
          "UPDATE knowledge SET title = ?2, content = ?3 WHERE knowledge_id = ?1",
          rusqlite::params![raw.knowledge_id, raw.title, raw.content],
        )?;
        tx.commit()?;
        Ok(Some(raw))
      })
      .await?;

    raw.map(RawKnowledge::into_item).transpose()
  }

  async fn delete_knowledge(&self, knowledge_id: Uuid) -> Result<bool> {
    let n = self
      .execute_keyed(
        "DELETE FROM knowledge WHERE knowledge_id = ?1",
        encode_uuid(knowledge_id),
      )
      .await?;
    Ok(n == 1)
  }

  // ── Messages ──────────────────────────────────────────────────────────────

  async fn append_message(
    &self,
    document_id: Uuid,
    role:        Role,
    content:     String,
  ) -> Result<Message> {
    let message = Message {
      message_id: Uuid::new_v4(),
      document_id,
      role,
      content,
      created_at: now(),
    };

    let id_str   = encode_uuid(message.message_id);
    let doc_str  = encode_uuid(document_id);
    let role_str = role.as_str();
    let content  = message.content.clone();
    let at_str   = encode_dt(message.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO messages (message_id, document_id, role, content, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![id_str, doc_str, role_str, content, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(message)
  }

  async fn list_messages(&self, document_id: Uuid) -> Result<Vec<Message>> {
    let sql =
      format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE document_id = ?1 ORDER BY rowid");
    let raws = self
      .query_all(sql, encode_uuid(document_id), RawMessage::from_row)
      .await?;
    raws.into_iter().map(RawMessage::into_message).collect()
  }

  async fn clear_messages(&self, document_id: Uuid) -> Result<usize> {
    self
      .execute_keyed(
        "DELETE FROM messages WHERE document_id = ?1",
        encode_uuid(document_id),
      )
      .await
  }

  // ── Subscriptions ─────────────────────────────────────────────────────────

  async fn find_subscription_by_external_id(
    &self,
    external_subscription_id: String,
  ) -> Result<Option<Subscription>> {
    self
      .find_subscription_where("external_subscription_id", external_subscription_id)
      .await
  }

  async fn find_subscription_by_email(&self, email: String) -> Result<Option<Subscription>> {
    self.find_subscription_where("email", email).await
  }

  async fn find_subscription_by_user(&self, user_id: Uuid) -> Result<Option<Subscription>> {
    self
      .find_subscription_where("user_id", encode_uuid(user_id))
      .await
  }

  async fn insert_subscription(&self, input: NewSubscription) -> Result<Option<Subscription>> {
    let subscription = Subscription {
      subscription_id:          Uuid::new_v4(),
      user_id:                  input.user_id,
      email:                    input.email,
      external_customer_id:     input.external_customer_id,
      external_subscription_id: input.external_subscription_id,
      status:                   input.status,
      current_period_end:       input.current_period_end.map(|t| t.trunc_subsecs(6)),
    };

    let id_str     = encode_uuid(subscription.subscription_id);
    let user_str   = subscription.user_id.map(encode_uuid);
    let email      = subscription.email.clone();
    let customer   = subscription.external_customer_id.clone();
    let external   = subscription.external_subscription_id.clone();
    let status_str = subscription.status.as_str();
    let period_str = subscription.current_period_end.map(encode_dt);

    let inserted = self
      .conn
      .call(move |conn| {
        let n = conn.execute(
          "INSERT INTO subscriptions (
             subscription_id, user_id, email, external_customer_id,
             external_subscription_id, status, current_period_end
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
           ON CONFLICT(email) DO NOTHING",
          rusqlite::params![
            id_str, user_str, email, customer, external, status_str, period_str
          ],
        )?;
        Ok(n == 1)
      })
      .await?;

    Ok(inserted.then_some(subscription))
  }

  async fn update_subscription(&self, subscription: Subscription) -> Result<()> {
    let id         = subscription.subscription_id;
    let id_str     = encode_uuid(id);
    let customer   = subscription.external_customer_id;
    let external   = subscription.external_subscription_id;
    let status_str = subscription.status.as_str();
    let period_str = subscription.current_period_end.map(encode_dt);

    let n = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE subscriptions
             SET external_customer_id = ?2, external_subscription_id = ?3,
                 status = ?4, current_period_end = ?5
           WHERE subscription_id = ?1",
          rusqlite::params![id_str, customer, external, status_str, period_str],
        )?)
      })
      .await?;

    if n == 0 {
      return Err(Error::SubscriptionNotFound(id));
    }
    Ok(())
  }

  async fn link_subscription(&self, email: String, user_id: Uuid) -> Result<bool> {
    let user_str = encode_uuid(user_id);
    let n = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE subscriptions SET user_id = ?2 WHERE email = ?1 AND user_id IS NULL",
          rusqlite::params![email, user_str],
        )?)
      })
      .await?;
    Ok(n == 1)
  }

  async fn set_subscription_owner(&self, subscription_id: Uuid, user_id: Uuid) -> Result<()> {
    let id_str   = encode_uuid(subscription_id);
    let user_str = encode_uuid(user_id);
    let n = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE subscriptions SET user_id = ?2 WHERE subscription_id = ?1",
          rusqlite::params![id_str, user_str],
        )?)
      })
      .await?;
    if n == 0 {
      return Err(Error::SubscriptionNotFound(subscription_id));
    }
    Ok(())
  }

  async fn list_subscriptions(&self) -> Result<Vec<Subscription>> {
    let raws: Vec<RawSubscription> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {SUBSCRIPTION_COLUMNS} FROM subscriptions ORDER BY rowid"
        ))?;
        let rows = stmt
          .query_map([], RawSubscription::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawSubscription::into_subscription).collect()
  }
}
