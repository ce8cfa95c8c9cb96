//! Billing state.
//!
//! A subscription row is keyed by email and may exist before the matching
//! user signs up. The user link is backfilled later and never overwritten.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
  Active,
  Canceled,
  PastDue,
  None,
}

impl SubscriptionStatus {
  pub fn as_str(self) -> &'static str {
    match self {
      SubscriptionStatus::Active => "active",
      SubscriptionStatus::Canceled => "canceled",
      SubscriptionStatus::PastDue => "past_due",
      SubscriptionStatus::None => "none",
    }
  }

  pub fn is_active(self) -> bool { matches!(self, SubscriptionStatus::Active) }
}

impl fmt::Display for SubscriptionStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for SubscriptionStatus {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "active" => Ok(SubscriptionStatus::Active),
      "canceled" => Ok(SubscriptionStatus::Canceled),
      "past_due" => Ok(SubscriptionStatus::PastDue),
      "none" => Ok(SubscriptionStatus::None),
      other => Err(Error::UnknownStatus(other.to_owned())),
    }
  }
}

/// A stored subscription row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
  pub subscription_id:          Uuid,
  pub user_id:                  Option<Uuid>,
  pub email:                    String,
  pub external_customer_id:     Option<String>,
  pub external_subscription_id: Option<String>,
  pub status:                   SubscriptionStatus,
  pub current_period_end:       Option<DateTime<Utc>>,
}

/// Input to [`WorkspaceStore::insert_subscription`](crate::store::WorkspaceStore::insert_subscription).
#[derive(Debug, Clone)]
pub struct NewSubscription {
  pub user_id:                  Option<Uuid>,
  pub email:                    String,
  pub external_customer_id:     Option<String>,
  pub external_subscription_id: Option<String>,
  pub status:                   SubscriptionStatus,
  pub current_period_end:       Option<DateTime<Utc>>,
}

/// A billing fact reported by the provider, as handed to the reconciler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionUpsert {
  pub email:                    String,
  pub external_customer_id:     Option<String>,
  pub external_subscription_id: Option<String>,
  pub status:                   SubscriptionStatus,
  pub current_period_end:       Option<DateTime<Utc>>,
}

impl SubscriptionUpsert {
  pub fn new(email: impl Into<String>, status: SubscriptionStatus) -> Self {
    Self {
      email: email.into(),
      external_customer_id: None,
      external_subscription_id: None,
      status,
      current_period_end: None,
    }
  }
}
