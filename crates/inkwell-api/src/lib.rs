//! JSON REST API for Inkwell.
//!
//! Exposes an axum [`Router`] backed by any
//! [`WorkspaceStore`](inkwell_core::store::WorkspaceStore) and any
//! [`ChatModel`]. Callers authenticate with HTTP Basic (`email:password`).
//! TLS and transport concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", inkwell_api::api_router(state))
//! ```

pub mod auth;
pub mod chat;
pub mod debug;
pub mod documents;
pub mod error;
pub mod knowledge;
pub mod messages;
pub mod settings;
pub mod subscriptions;
pub mod users;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, patch, post, put},
};
use inkwell_core::{document::Document, store::WorkspaceStore};
use inkwell_llm::{ChatModel, DEFAULT_MODEL};
use uuid::Uuid;

pub use error::ApiError;

// ─── State ───────────────────────────────────────────────────────────────────

/// Knobs the API reads at request time.
#[derive(Debug, Clone)]
pub struct ApiSettings {
  /// Model id passed to the chat provider.
  pub model:           String,
  /// Mount the `/debug/*` routes.
  pub debug_endpoints: bool,
}

impl Default for ApiSettings {
  fn default() -> Self {
    Self { model: DEFAULT_MODEL.to_owned(), debug_endpoints: false }
  }
}

/// Shared state threaded through all API handlers.
pub struct ApiState<S> {
  pub store:    Arc<S>,
  pub model:    Arc<dyn ChatModel>,
  pub settings: Arc<ApiSettings>,
}

// Manual impl: cloning the `Arc`s never needs `S: Clone`.
impl<S> Clone for ApiState<S> {
  fn clone(&self) -> Self {
    Self {
      store:    Arc::clone(&self.store),
      model:    Arc::clone(&self.model),
      settings: Arc::clone(&self.settings),
    }
  }
}

// ─── Ownership ───────────────────────────────────────────────────────────────

/// The document if it exists and belongs to `user_id`.
pub(crate) async fn owned_document<S>(
  store:       &S,
  user_id:     Uuid,
  document_id: Uuid,
) -> Result<Option<Document>, ApiError>
where
  S: WorkspaceStore,
{
  Ok(
    store
      .get_document(document_id)
      .await
      .map_err(ApiError::store)?
      .filter(|d| d.is_owned_by(user_id)),
  )
}

/// Like [`owned_document`] but a missing or foreign document is a 404.
pub(crate) async fn require_document<S>(
  store:       &S,
  user_id:     Uuid,
  document_id: Uuid,
) -> Result<Document, ApiError>
where
  S: WorkspaceStore,
{
  owned_document(store, user_id, document_id)
    .await?
    .ok_or_else(ApiError::document_not_found)
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(state: ApiState<S>) -> Router<()>
where
  S: WorkspaceStore + 'static,
{
  let mut router: Router<ApiState<S>> = Router::new()
    // Users
    .route("/users", post(users::register::<S>))
    .route("/users/me", get(users::me).put(users::update_me::<S>))
    // Settings
    .route("/settings", get(settings::get_one::<S>))
    .route("/settings/ai-instructions", put(settings::put_ai_instructions::<S>))
    // Documents
    .route("/documents", get(documents::list::<S>).post(documents::create::<S>))
    .route(
      "/documents/{id}",
      get(documents::get_one::<S>)
        .patch(documents::update::<S>)
        .delete(documents::remove::<S>),
    )
    // Knowledge
    .route(
      "/documents/{id}/knowledge",
      get(knowledge::list::<S>).post(knowledge::create::<S>),
    )
    .route(
      "/knowledge/{id}",
      patch(knowledge::update::<S>).delete(knowledge::remove::<S>),
    )
    // Messages
    .route(
      "/documents/{id}/messages",
      get(messages::list::<S>)
        .post(messages::create::<S>)
        .delete(messages::clear::<S>),
    )
    // Chat
    .route("/documents/{id}/chat", post(chat::handler::<S>))
    // Subscriptions
    .route("/subscriptions/status", get(subscriptions::status::<S>))
    .route("/subscriptions/by-email", get(subscriptions::by_email::<S>))
    .route("/subscriptions/link", post(subscriptions::link::<S>));

  if state.settings.debug_endpoints {
    router = router.route(
      "/debug/subscriptions",
      get(debug::list::<S>).post(debug::activate::<S>),
    );
  }

  router.with_state(state)
}

#[cfg(test)]
mod tests;
