//! Subscription reconciliation.
//!
//! Billing events arrive from the provider's webhook in any order and may be
//! redelivered. [`upsert_subscription`] folds each one into the single row
//! kept per email, so applying the same event twice leaves the same state.
//!
//! Lookup order is external subscription id first, then email. An existing
//! row is patched non-destructively: the status is always replaced, the other
//! billing fields only when the event carries a non-empty value. A new row is
//! linked to the user with the same email if one exists.
//!
//! Two concurrent deliveries for a new email both miss on lookup and both
//! try to insert. The store's uniqueness constraint on email lets exactly one
//! insert through; the loser re-reads the winner's row and patches it.

use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
  email::normalize_email,
  store::WorkspaceStore,
  subscription::{NewSubscription, Subscription, SubscriptionUpsert},
};

#[derive(Debug, Error)]
pub enum ReconcileError<E: std::error::Error + 'static> {
  #[error("store error: {0}")]
  Store(#[source] E),

  /// The insert lost a uniqueness race but the winning row could not be read
  /// back. Only possible if the row was deleted in between.
  #[error("subscription for {0} vanished during upsert")]
  Vanished(String),
}

fn store_err<E: std::error::Error + 'static>(e: E) -> ReconcileError<E> {
  ReconcileError::Store(e)
}

/// Treat `Some("")` (and whitespace) the same as `None`.
fn non_empty(value: &Option<String>) -> Option<String> {
  value
    .as_deref()
    .map(str::trim)
    .filter(|v| !v.is_empty())
    .map(str::to_owned)
}

/// Fold an event into an existing row. Status always wins; everything else
/// only overwrites when the event actually carries a value.
pub fn merge(mut current: Subscription, event: &SubscriptionUpsert) -> Subscription {
  current.status = event.status;
  if let Some(customer) = non_empty(&event.external_customer_id) {
    current.external_customer_id = Some(customer);
  }
  if let Some(sub) = non_empty(&event.external_subscription_id) {
    current.external_subscription_id = Some(sub);
  }
  if let Some(end) = event.current_period_end {
    current.current_period_end = Some(end);
  }
  current
}

/// Create or update the subscription row for a billing event. Returns the
/// row's id.
pub async fn upsert_subscription<S>(
  store: &S,
  event: SubscriptionUpsert,
) -> Result<Uuid, ReconcileError<S::Error>>
where
  S: WorkspaceStore,
{
  let email = normalize_email(&event.email);
  let external_id = non_empty(&event.external_subscription_id);

  let by_external = match external_id {
    Some(id) => store
      .find_subscription_by_external_id(id)
      .await
      .map_err(store_err)?,
    None => None,
  };
  let existing = match by_external {
    Some(found) => Some(found),
    None => store
      .find_subscription_by_email(email.clone())
      .await
      .map_err(store_err)?,
  };

  if let Some(current) = existing {
    return patch(store, current, &event).await;
  }

  let user = store
    .find_user_by_email(email.clone())
    .await
    .map_err(store_err)?;
  let user_id = user.map(|u| u.user_id);

  let input = NewSubscription {
    user_id,
    email: email.clone(),
    external_customer_id: non_empty(&event.external_customer_id),
    external_subscription_id: non_empty(&event.external_subscription_id),
    status: event.status,
    current_period_end: event.current_period_end,
  };

  match store.insert_subscription(input).await.map_err(store_err)? {
    Some(created) => {
      info!(
        %email,
        subscription_id = %created.subscription_id,
        linked_user = ?user_id,
        "created subscription"
      );
      Ok(created.subscription_id)
    }
    None => {
      debug!(%email, "lost insert race, patching the existing row");
      let current = store
        .find_subscription_by_email(email.clone())
        .await
        .map_err(store_err)?
        .ok_or(ReconcileError::Vanished(email))?;
      patch(store, current, &event).await
    }
  }
}

async fn patch<S>(
  store: &S,
  current: Subscription,
  event: &SubscriptionUpsert,
) -> Result<Uuid, ReconcileError<S::Error>>
where
  S: WorkspaceStore,
{
  let id = current.subscription_id;
  let merged = merge(current, event);
  debug!(subscription_id = %id, status = %merged.status, "updating subscription");
  store.update_subscription(merged).await.map_err(store_err)?;
  Ok(id)
}

/// Attach an orphaned subscription row to `user_id`. Never replaces an
/// existing link. Returns `true` if a link was written.
pub async fn link_to_user<S>(
  store: &S,
  email: &str,
  user_id: Uuid,
) -> Result<bool, S::Error>
where
  S: WorkspaceStore,
{
  let linked = store
    .link_subscription(normalize_email(email), user_id)
    .await?;
  if linked {
    info!(%user_id, "linked subscription to user");
  }
  Ok(linked)
}

#[cfg(test)]
mod tests {
  use chrono::{TimeZone, Utc};

  use super::*;
  use crate::subscription::SubscriptionStatus;

  fn stored() -> Subscription {
    Subscription {
      subscription_id:          Uuid::new_v4(),
      user_id:                  None,
      email:                    "a@b.com".into(),
      external_customer_id:     Some("cus_1".into()),
      external_subscription_id: Some("sub_1".into()),
      status:                   SubscriptionStatus::Active,
      current_period_end:       Some(Utc.timestamp_opt(1_700_000_000, 0).unwrap()),
    }
  }

  #[test]
  fn merge_always_takes_status() {
    let merged = merge(stored(), &SubscriptionUpsert::new("a@b.com", SubscriptionStatus::Canceled));
    assert_eq!(merged.status, SubscriptionStatus::Canceled);
  }

  #[test]
  fn merge_keeps_fields_missing_from_event() {
    let before = stored();
    let merged = merge(
      before.clone(),
      &SubscriptionUpsert::new("a@b.com", SubscriptionStatus::Canceled),
    );
    assert_eq!(merged.external_customer_id, before.external_customer_id);
    assert_eq!(merged.external_subscription_id, before.external_subscription_id);
    assert_eq!(merged.current_period_end, before.current_period_end);
  }

  #[test]
  fn merge_treats_empty_strings_as_missing() {
    let mut event = SubscriptionUpsert::new("a@b.com", SubscriptionStatus::Active);
    event.external_customer_id = Some(String::new());
    event.external_subscription_id = Some("  ".into());
    let merged = merge(stored(), &event);
    assert_eq!(merged.external_customer_id.as_deref(), Some("cus_1"));
    assert_eq!(merged.external_subscription_id.as_deref(), Some("sub_1"));
  }

  #[test]
  fn merge_overwrites_present_fields() {
    let mut event = SubscriptionUpsert::new("a@b.com", SubscriptionStatus::PastDue);
    event.external_customer_id = Some("cus_2".into());
    let merged = merge(stored(), &event);
    assert_eq!(merged.external_customer_id.as_deref(), Some("cus_2"));
    assert_eq!(merged.status, SubscriptionStatus::PastDue);
  }

  #[test]
  fn merge_never_touches_email_or_link() {
    let mut before = stored();
    before.user_id = Some(Uuid::new_v4());
    let merged = merge(
      before.clone(),
      &SubscriptionUpsert::new("other@b.com", SubscriptionStatus::Active),
    );
    assert_eq!(merged.email, before.email);
    assert_eq!(merged.user_id, before.user_id);
  }
}
