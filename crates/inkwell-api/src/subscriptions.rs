//! Handlers for `/subscriptions` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/subscriptions/status` | Caller's status, `null` if anonymous |
//! | `GET`  | `/subscriptions/by-email?email=` | Whether an email has an active subscription |
//! | `POST` | `/subscriptions/link` | Attach an orphaned subscription to the caller |

use axum::{
  Json,
  extract::{Query, State},
};
use chrono::{DateTime, Utc};
use inkwell_core::{
  email::normalize_email,
  reconcile::link_to_user,
  store::WorkspaceStore,
  subscription::{Subscription, SubscriptionStatus},
};
use serde::{Deserialize, Serialize};

use crate::{ApiState, auth::MaybeUser, error::ApiError};

// ─── Status ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusView {
  pub status:                  SubscriptionStatus,
  pub has_active_subscription: bool,
  pub current_period_end:      Option<DateTime<Utc>>,
  /// The row was found by email but is not yet linked to the caller.
  pub needs_linking:           bool,
}

impl StatusView {
  fn none() -> Self {
    Self {
      status:                  SubscriptionStatus::None,
      has_active_subscription: false,
      current_period_end:      None,
      needs_linking:           false,
    }
  }
}

impl From<Subscription> for StatusView {
  fn from(s: Subscription) -> Self {
    Self {
      status:                  s.status,
      has_active_subscription: s.status.is_active(),
      current_period_end:      s.current_period_end,
      needs_linking:           s.user_id.is_none(),
    }
  }
}

/// `GET /subscriptions/status`. Looks up by user link first, then by the
/// caller's email for rows the webhook created before sign-up.
pub async fn status<S>(
  State(state): State<ApiState<S>>,
  MaybeUser(user): MaybeUser,
) -> Result<Json<Option<StatusView>>, ApiError>
where
  S: WorkspaceStore + 'static,
{
  let Some(user) = user else {
    return Ok(Json(None));
  };

  let mut found = state
    .store
    .find_subscription_by_user(user.user_id)
    .await
    .map_err(ApiError::store)?;
  if found.is_none() {
    found = state
      .store
      .find_subscription_by_email(normalize_email(&user.email))
      .await
      .map_err(ApiError::store)?;
  }

  Ok(Json(Some(found.map_or_else(StatusView::none, StatusView::from))))
}

// ─── By email ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ByEmailParams {
  pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailCheck {
  pub has_active_subscription: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub status:                  Option<SubscriptionStatus>,
}

/// `GET /subscriptions/by-email?email=<email>`
pub async fn by_email<S>(
  State(state): State<ApiState<S>>,
  Query(params): Query<ByEmailParams>,
) -> Result<Json<EmailCheck>, ApiError>
where
  S: WorkspaceStore + 'static,
{
  let found = state
    .store
    .find_subscription_by_email(normalize_email(&params.email))
    .await
    .map_err(ApiError::store)?;
  Ok(Json(EmailCheck {
    has_active_subscription: found.as_ref().is_some_and(|s| s.status.is_active()),
    status:                  found.map(|s| s.status),
  }))
}

// ─── Link ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkOutcome {
  pub linked: bool,
  pub reason: String,
}

impl LinkOutcome {
  fn new(linked: bool, reason: &str) -> Self { Self { linked, reason: reason.to_owned() } }
}

/// `POST /subscriptions/link`. Always 200; the outcome is in the body.
pub async fn link<S>(
  State(state): State<ApiState<S>>,
  MaybeUser(user): MaybeUser,
) -> Result<Json<LinkOutcome>, ApiError>
where
  S: WorkspaceStore + 'static,
{
  let Some(user) = user else {
    return Ok(Json(LinkOutcome::new(false, "not authenticated")));
  };

  let email = normalize_email(&user.email);
  let Some(subscription) = state
    .store
    .find_subscription_by_email(email.clone())
    .await
    .map_err(ApiError::store)?
  else {
    return Ok(Json(LinkOutcome::new(false, "no subscription found")));
  };

  if subscription.user_id.is_some() {
    return Ok(Json(LinkOutcome::new(true, "already linked")));
  }

  // A concurrent link between the read and the write still counts as linked.
  let outcome = if link_to_user(state.store.as_ref(), &email, user.user_id)
    .await
    .map_err(ApiError::store)?
  {
    LinkOutcome::new(true, "linked now")
  } else {
    LinkOutcome::new(true, "already linked")
  };
  Ok(Json(outcome))
}
