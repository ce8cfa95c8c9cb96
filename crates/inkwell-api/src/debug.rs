//! Troubleshooting endpoints for when webhooks are not arriving. Mounted only
//! when `debug_endpoints` is enabled.

use axum::{Json, extract::State};
use inkwell_core::{
  email::normalize_email,
  store::WorkspaceStore,
  subscription::{NewSubscription, Subscription, SubscriptionStatus},
};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{ApiState, auth::AuthUser, error::ApiError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugOutcome {
  pub success: bool,
  pub action:  String,
}

/// `POST /debug/subscriptions`: mark the caller's subscription active and
/// owned by them, creating a placeholder row if none exists.
pub async fn activate<S>(
  State(state): State<ApiState<S>>,
  AuthUser(user): AuthUser,
) -> Result<Json<DebugOutcome>, ApiError>
where
  S: WorkspaceStore + 'static,
{
  let email = normalize_email(&user.email);
  warn!(user_id = %user.user_id, "debug subscription activation");

  let existing = state
    .store
    .find_subscription_by_email(email.clone())
    .await
    .map_err(ApiError::store)?;

  let action = match existing {
    Some(mut subscription) => {
      let id = subscription.subscription_id;
      subscription.status = SubscriptionStatus::Active;
      state
        .store
        .update_subscription(subscription)
        .await
        .map_err(ApiError::store)?;
      state
        .store
        .set_subscription_owner(id, user.user_id)
        .await
        .map_err(ApiError::store)?;
      "updated existing subscription to active"
    }
    None => {
      state
        .store
        .insert_subscription(NewSubscription {
          user_id:                  Some(user.user_id),
          email,
          external_customer_id:     Some("debug_customer".into()),
          external_subscription_id: Some("debug_subscription".into()),
          status:                   SubscriptionStatus::Active,
          current_period_end:       None,
        })
        .await
        .map_err(ApiError::store)?
        .ok_or_else(|| ApiError::Conflict("Subscription created concurrently".into()))?;
      "created new subscription"
    }
  };

  Ok(Json(DebugOutcome { success: true, action: action.into() }))
}

/// `GET /debug/subscriptions`: every stored row.
pub async fn list<S>(
  State(state): State<ApiState<S>>,
  AuthUser(_): AuthUser,
) -> Result<Json<Vec<Subscription>>, ApiError>
where
  S: WorkspaceStore + 'static,
{
  let all = state
    .store
    .list_subscriptions()
    .await
    .map_err(ApiError::store)?;
  Ok(Json(all))
}
