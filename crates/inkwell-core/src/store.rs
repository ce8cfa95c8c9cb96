//! The `WorkspaceStore` trait.
//!
//! The trait is implemented by storage backends (e.g. `inkwell-store-sqlite`).
//! Higher layers (`inkwell-api`, `inkwell-server`) depend on this abstraction,
//! not on any concrete backend.
//!
//! The store performs no authorisation. Ownership checks live with the
//! callers, which know who is asking.

use std::future::Future;

use uuid::Uuid;

use crate::{
  document::{
    Document, DocumentDeletion, DocumentPatch, KnowledgeItem, KnowledgePatch, Message, Role,
  },
  subscription::{NewSubscription, Subscription},
  user::{Credentials, NewUser, User, UserSettings},
};

/// Abstraction over an Inkwell storage backend.
///
/// Every method is a single atomic operation against the backend; nothing
/// spans calls. All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait WorkspaceStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Users ─────────────────────────────────────────────────────────────

  /// Persist a new user. Returns `None` if the email is already registered.
  fn create_user(
    &self,
    input: NewUser,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  fn get_user(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  fn find_user_by_email(
    &self,
    email: String,
  ) -> impl Future<Output = Result<Option<User>, Self::Error>> + Send + '_;

  /// Fetch a user and their password hash by email, for authentication.
  fn find_credentials(
    &self,
    email: String,
  ) -> impl Future<Output = Result<Option<Credentials>, Self::Error>> + Send + '_;

  /// Change a user's name and email. Returns `false` (and changes nothing) if
  /// the email belongs to another user.
  fn update_profile(
    &self,
    user_id: Uuid,
    name: String,
    email: String,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Settings ──────────────────────────────────────────────────────────

  fn get_settings(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Option<UserSettings>, Self::Error>> + Send + '_;

  /// Set the global AI instructions, creating the settings row on first use.
  fn put_ai_instructions(
    &self,
    user_id: Uuid,
    instructions: String,
  ) -> impl Future<Output = Result<UserSettings, Self::Error>> + Send + '_;

  // ── Documents ─────────────────────────────────────────────────────────

  fn create_document(
    &self,
    user_id: Uuid,
    title: String,
  ) -> impl Future<Output = Result<Document, Self::Error>> + Send + '_;

  fn get_document(
    &self,
    document_id: Uuid,
  ) -> impl Future<Output = Result<Option<Document>, Self::Error>> + Send + '_;

  /// All documents owned by `user_id`, most recently updated first.
  fn list_documents(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Document>, Self::Error>> + Send + '_;

  /// Apply `patch` and bump `updated_at`. Returns `None` if not found.
  fn update_document(
    &self,
    document_id: Uuid,
    patch: DocumentPatch,
  ) -> impl Future<Output = Result<Option<Document>, Self::Error>> + Send + '_;

  /// Delete a document together with its knowledge items and messages.
  /// Returns `None` if the document did not exist.
  fn delete_document(
    &self,
    document_id: Uuid,
  ) -> impl Future<Output = Result<Option<DocumentDeletion>, Self::Error>> + Send + '_;

  // ── Knowledge ─────────────────────────────────────────────────────────

  fn add_knowledge(
    &self,
    document_id: Uuid,
    title: String,
    content: String,
  ) -> impl Future<Output = Result<KnowledgeItem, Self::Error>> + Send + '_;

  fn get_knowledge(
    &self,
    knowledge_id: Uuid,
  ) -> impl Future<Output = Result<Option<KnowledgeItem>, Self::Error>> + Send + '_;

  /// Knowledge items of a document in insertion order.
  fn list_knowledge(
    &self,
    document_id: Uuid,
  ) -> impl Future<Output = Result<Vec<KnowledgeItem>, Self::Error>> + Send + '_;

  fn update_knowledge(
    &self,
    knowledge_id: Uuid,
    patch: KnowledgePatch,
  ) -> impl Future<Output = Result<Option<KnowledgeItem>, Self::Error>> + Send + '_;

  /// Returns `false` if the item did not exist.
  fn delete_knowledge(
    &self,
    knowledge_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Messages ──────────────────────────────────────────────────────────

  fn append_message(
    &self,
    document_id: Uuid,
    role: Role,
    content: String,
  ) -> impl Future<Output = Result<Message, Self::Error>> + Send + '_;

  /// Messages of a document in insertion order.
  fn list_messages(
    &self,
    document_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Message>, Self::Error>> + Send + '_;

  /// Delete every message of a document; returns how many were removed.
  fn clear_messages(
    &self,
    document_id: Uuid,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  // ── Subscriptions ─────────────────────────────────────────────────────

  fn find_subscription_by_external_id(
    &self,
    external_subscription_id: String,
  ) -> impl Future<Output = Result<Option<Subscription>, Self::Error>> + Send + '_;

  fn find_subscription_by_email(
    &self,
    email: String,
  ) -> impl Future<Output = Result<Option<Subscription>, Self::Error>> + Send + '_;

  fn find_subscription_by_user(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Option<Subscription>, Self::Error>> + Send + '_;

  /// Insert a subscription row. Emails are unique: returns `None` without
  /// writing if a row for the same email already exists.
  fn insert_subscription(
    &self,
    input: NewSubscription,
  ) -> impl Future<Output = Result<Option<Subscription>, Self::Error>> + Send + '_;

  /// Overwrite the mutable billing fields (status, external ids, period end)
  /// of an existing row. Email and user link are left untouched.
  fn update_subscription(
    &self,
    subscription: Subscription,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Set the user link on the row for `email`, only if it is currently unset.
  /// Returns `true` if a link was written.
  fn link_subscription(
    &self,
    email: String,
    user_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Force a subscription's user link, replacing any existing one. Only the
  /// debug endpoints use this.
  fn set_subscription_owner(
    &self,
    subscription_id: Uuid,
    user_id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn list_subscriptions(
    &self,
  ) -> impl Future<Output = Result<Vec<Subscription>, Self::Error>> + Send + '_;
}
