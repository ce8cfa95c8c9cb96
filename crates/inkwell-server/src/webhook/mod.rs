//! Billing webhook ingestion.
//!
//! | Method    | Path | Notes |
//! |-----------|------|-------|
//! | `POST`    | `/webhook` | Standard Webhooks delivery; always 200 once accepted |
//! | `OPTIONS` | `/webhook` | CORS preflight |
//! | `GET`     | `/webhook` | Reachability probe |
//! | `GET`     | `/polar-webhook` | Legacy path; points at `/webhook` |

pub mod event;
pub mod signature;

use axum::{
  Json,
  extract::State,
  http::{HeaderMap, HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use bytes::Bytes;
use chrono::Utc;
use inkwell_core::{
  reconcile::{ReconcileError, upsert_subscription},
  store::WorkspaceStore,
};
use serde_json::{Value, json};
use tracing::{debug, error, info, warn};

use crate::AppState;
use event::BillingEvent;

const ALLOW_HEADERS: &str = "Content-Type, webhook-id, webhook-timestamp, webhook-signature";

/// A plain-text reply carrying the permissive CORS origin header.
fn cors_text(status: StatusCode, body: &'static str) -> Response {
  let mut res = (status, body).into_response();
  res
    .headers_mut()
    .insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
  res
}

/// `(webhook-id, webhook-timestamp, webhook-signature)` when all are present.
fn signature_headers(headers: &HeaderMap) -> Option<(&str, &str, &str)> {
  let get = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
  Some((get("webhook-id")?, get("webhook-timestamp")?, get("webhook-signature")?))
}

/// Decide whether a delivery may be processed. `Err` carries the 403 reply.
fn authenticate_delivery<S>(
  state:   &AppState<S>,
  headers: &HeaderMap,
  body:    &[u8],
) -> Result<(), Response> {
  let Some(secret) = state.config.webhook_secret.as_deref() else {
    warn!("webhook secret not configured, accepting unsigned delivery");
    return Ok(());
  };

  let Some((id, timestamp, sig)) = signature_headers(headers) else {
    warn!("webhook delivery without signature headers rejected");
    return Err(cors_text(StatusCode::FORBIDDEN, "Missing signature headers"));
  };

  signature::check_timestamp(timestamp, Utc::now().timestamp(), state.config.webhook_tolerance_secs)
    .and_then(|()| signature::verify(secret, id, timestamp, body, sig))
    .map_err(|e| {
      warn!(webhook_id = id, error = %e, "webhook signature rejected");
      cors_text(StatusCode::FORBIDDEN, "Invalid signature")
    })
}

/// How a classified event was handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
  Processed,
  /// A subscription event arrived without any customer email.
  MissingEmail,
}

/// Apply one billing event to the store.
pub async fn apply_event<S>(
  store: &S,
  event: BillingEvent,
) -> Result<Outcome, ReconcileError<S::Error>>
where
  S: WorkspaceStore,
{
  match event {
    BillingEvent::SubscriptionChanged { event_type, update: Some(update) } => {
      let status = update.status;
      let id = upsert_subscription(store, update).await?;
      info!(%event_type, subscription_id = %id, %status, "subscription reconciled");
      Ok(Outcome::Processed)
    }
    BillingEvent::SubscriptionChanged { event_type, update: None } => {
      warn!(%event_type, "subscription event without customer email");
      Ok(Outcome::MissingEmail)
    }
    BillingEvent::Checkout { event_type, checkout_id, email } => {
      info!(%event_type, ?checkout_id, ?email, "checkout event");
      Ok(Outcome::Processed)
    }
    BillingEvent::Order { event_type, update: Some(update) } => {
      let id = upsert_subscription(store, update).await?;
      info!(%event_type, subscription_id = %id, "subscription activated from order");
      Ok(Outcome::Processed)
    }
    BillingEvent::Order { event_type, update: None } => {
      debug!(%event_type, "order event without customer email");
      Ok(Outcome::Processed)
    }
    BillingEvent::Unknown(event_type) => {
      info!(%event_type, "unhandled webhook event type");
      Ok(Outcome::Processed)
    }
  }
}

/// `POST /webhook`
pub async fn receive<S>(
  State(state): State<AppState<S>>,
  headers: HeaderMap,
  body: Bytes,
) -> Response
where
  S: WorkspaceStore + 'static,
{
  debug!(len = body.len(), "webhook delivery");
  if let Err(rejection) = authenticate_delivery(&state, &headers, &body) {
    return rejection;
  }

  let payload: Value = match serde_json::from_slice(&body) {
    Ok(v) => v,
    Err(e) => {
      warn!(error = %e, "webhook body is not JSON");
      return (StatusCode::BAD_REQUEST, "Invalid JSON").into_response();
    }
  };

  match apply_event(state.store.as_ref(), BillingEvent::classify(&payload)).await {
    Ok(Outcome::Processed) => cors_text(StatusCode::OK, "OK"),
    Ok(Outcome::MissingEmail) => cors_text(StatusCode::OK, "OK - but no email found"),
    Err(e) => {
      // Still a 200; the failure is only logged.
      error!(error = %e, "webhook processing failed");
      cors_text(StatusCode::OK, "OK - error logged")
    }
  }
}

/// `OPTIONS /webhook`
pub async fn preflight() -> Response {
  let mut res = StatusCode::NO_CONTENT.into_response();
  let h = res.headers_mut();
  h.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
  h.insert(
    header::ACCESS_CONTROL_ALLOW_METHODS,
    HeaderValue::from_static("POST, OPTIONS"),
  );
  h.insert(
    header::ACCESS_CONTROL_ALLOW_HEADERS,
    HeaderValue::from_static(ALLOW_HEADERS),
  );
  res
}

/// `GET /webhook`
pub async fn probe<S>(State(state): State<AppState<S>>) -> Response
where
  S: WorkspaceStore + 'static,
{
  let body = Json(json!({
    "status": "ok",
    "message": "Webhook endpoint is accessible. POST to this endpoint to deliver events.",
    "expectedUrl": state.config.webhook_url(),
  }));
  let mut res = body.into_response();
  res
    .headers_mut()
    .insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
  res
}

/// `GET /polar-webhook`
pub async fn moved<S>(State(state): State<AppState<S>>) -> Json<Value>
where
  S: WorkspaceStore + 'static,
{
  Json(json!({
    "status": "ok",
    "message": format!("This endpoint has moved. Use: {}", state.config.webhook_url()),
  }))
}
