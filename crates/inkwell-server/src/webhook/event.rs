//! Billing events decoded from the provider's loose JSON payloads.
//!
//! Payloads are not schema-checked. Each field is looked up through an
//! ordered list of JSON pointers and the first non-empty string wins, which
//! tolerates the provider moving fields between payload versions.

use chrono::{DateTime, Datelike, Utc};
use inkwell_core::subscription::{SubscriptionStatus, SubscriptionUpsert};
use serde_json::Value;

// ─── Field locations ─────────────────────────────────────────────────────────

const SUBSCRIPTION_EMAIL: &[&str] = &["/data/customer/email", "/data/user/email", "/customer/email"];
const SUBSCRIPTION_CUSTOMER_ID: &[&str] = &["/data/customer/id", "/data/user/id"];
const SUBSCRIPTION_ID: &[&str] = &["/data/id"];
const PERIOD_END: &str = "/data/current_period_end";

const PURCHASE_EMAIL: &[&str] = &["/data/customer/email", "/data/customer_email"];
const ORDER_CUSTOMER_ID: &[&str] = &["/data/customer/id"];
const ORDER_SUBSCRIPTION_ID: &[&str] = &["/data/subscription_id", "/data/id"];
const CHECKOUT_ID: &[&str] = &["/data/id"];

/// First non-empty string found at any of `pointers`, in order.
fn first_string(payload: &Value, pointers: &[&str]) -> Option<String> {
  pointers
    .iter()
    .filter_map(|p| payload.pointer(p))
    .filter_map(Value::as_str)
    .map(str::trim)
    .find(|s| !s.is_empty())
    .map(str::to_owned)
}

/// RFC 3339 strings, or epoch milliseconds as a number. Dates outside years
/// 0 to 9999 have no four-digit RFC 3339 form and are treated as absent.
fn period_end(payload: &Value) -> Option<DateTime<Utc>> {
  let end = match payload.pointer(PERIOD_END)? {
    Value::String(s) => DateTime::parse_from_rfc3339(s)
      .ok()
      .map(|dt| dt.with_timezone(&Utc)),
    Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
    _ => None,
  }?;
  (0..=9999).contains(&end.year()).then_some(end)
}

// ─── Events ──────────────────────────────────────────────────────────────────

/// What a webhook delivery means for subscription state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BillingEvent {
  /// `subscription.*`. `update` is `None` when no email could be found.
  SubscriptionChanged {
    event_type: String,
    update:     Option<SubscriptionUpsert>,
  },
  /// `checkout.created` / `checkout.updated`; informational only.
  Checkout {
    event_type:  String,
    checkout_id: Option<String>,
    email:       Option<String>,
  },
  /// `order.created` / `order.paid`; activates the buyer's subscription.
  Order {
    event_type: String,
    update:     Option<SubscriptionUpsert>,
  },
  Unknown(String),
}

impl BillingEvent {
  /// Classify a parsed payload by its `type` field.
  pub fn classify(payload: &Value) -> Self {
    let event_type = payload
      .get("type")
      .and_then(Value::as_str)
      .unwrap_or_default()
      .to_owned();

    match event_type.as_str() {
      "subscription.created" | "subscription.updated" | "subscription.active" => {
        let update = subscription_update(payload, SubscriptionStatus::Active);
        BillingEvent::SubscriptionChanged { event_type, update }
      }
      "subscription.canceled" | "subscription.revoked" => {
        let update = subscription_update(payload, SubscriptionStatus::Canceled);
        BillingEvent::SubscriptionChanged { event_type, update }
      }
      "checkout.created" | "checkout.updated" => BillingEvent::Checkout {
        checkout_id: first_string(payload, CHECKOUT_ID),
        email: first_string(payload, PURCHASE_EMAIL),
        event_type,
      },
      "order.created" | "order.paid" => {
        let update = order_update(payload);
        BillingEvent::Order { event_type, update }
      }
      _ => BillingEvent::Unknown(event_type),
    }
  }
}

fn subscription_update(payload: &Value, status: SubscriptionStatus) -> Option<SubscriptionUpsert> {
  let email = first_string(payload, SUBSCRIPTION_EMAIL)?;
  Some(SubscriptionUpsert {
    email,
    external_customer_id: first_string(payload, SUBSCRIPTION_CUSTOMER_ID),
    external_subscription_id: first_string(payload, SUBSCRIPTION_ID),
    status,
    current_period_end: period_end(payload),
  })
}

fn order_update(payload: &Value) -> Option<SubscriptionUpsert> {
  let email = first_string(payload, PURCHASE_EMAIL)?;
  Some(SubscriptionUpsert {
    email,
    external_customer_id: first_string(payload, ORDER_CUSTOMER_ID),
    external_subscription_id: first_string(payload, ORDER_SUBSCRIPTION_ID),
    status: SubscriptionStatus::Active,
    current_period_end: None,
  })
}
