//! Session state as an explicit machine.
//!
//! A [`SessionState`] only changes through [`transition`], a pure function of
//! the current state and one observed [`SessionEvent`]. Observations come
//! from a [`StatusProbe`]; [`await_confirmation`] runs the probe in a
//! producer task that pushes events over a channel, while the caller drives
//! the machine under one overall deadline.

use std::{fmt, future::Future, time::Duration};

use anyhow::{Context as _, Result};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::client::ApiClient;

/// Default overall wait for a checkout to be confirmed.
pub const CONFIRMATION_BUDGET: Duration = Duration::from_secs(30);
/// Default delay between subscription probes.
pub const POLL_EVERY: Duration = Duration::from_secs(1);

// ─── States and events ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
  /// Nothing is known yet.
  Loading,
  Unauthenticated,
  /// A checkout was completed and the subscription is not yet visible.
  Verifying,
  /// Signed in without an active subscription.
  TrialRequired,
  Active,
}

impl SessionState {
  /// States that further observations are not expected to change.
  pub fn is_settled(self) -> bool {
    matches!(self, SessionState::Active | SessionState::Unauthenticated)
  }

  pub fn as_str(self) -> &'static str {
    match self {
      SessionState::Loading => "loading",
      SessionState::Unauthenticated => "unauthenticated",
      SessionState::Verifying => "verifying",
      SessionState::TrialRequired => "trial-required",
      SessionState::Active => "active",
    }
  }
}

impl fmt::Display for SessionState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
  /// Whether the credentials were accepted.
  AuthResolved(bool),
  /// Whether the account currently has an active subscription.
  SubscriptionObserved(bool),
  CheckoutCompleted,
  VerificationTimedOut,
  SignedOut,
}

/// Apply one event. Pairs with no listed effect leave the state unchanged.
pub fn transition(state: SessionState, event: SessionEvent) -> SessionState {
  use SessionEvent as E;
  use SessionState as S;

  match (state, event) {
    (_, E::SignedOut | E::AuthResolved(false)) => S::Unauthenticated,
    (S::Unauthenticated, E::AuthResolved(true)) => S::Loading,

    (S::Loading | S::TrialRequired, E::CheckoutCompleted) => S::Verifying,

    (S::Unauthenticated, E::SubscriptionObserved(_)) => S::Unauthenticated,
    (_, E::SubscriptionObserved(true)) => S::Active,
    (S::Loading | S::Active, E::SubscriptionObserved(false)) => S::TrialRequired,

    (S::Verifying, E::VerificationTimedOut) => S::TrialRequired,

    (state, _) => state,
  }
}

// ─── Probing ─────────────────────────────────────────────────────────────────

/// Source of session facts.
pub trait StatusProbe: Send + Sync {
  fn is_authenticated(&self) -> impl Future<Output = Result<bool>> + Send + '_;

  fn has_active_subscription(&self) -> impl Future<Output = Result<bool>> + Send + '_;
}

impl StatusProbe for ApiClient {
  async fn is_authenticated(&self) -> Result<bool> { Ok(self.me().await?.is_some()) }

  async fn has_active_subscription(&self) -> Result<bool> {
    Ok(
      self
        .subscription_status()
        .await?
        .is_some_and(|s| s.has_active_subscription),
    )
  }
}

/// Resolve the current state with one probe of each fact.
pub async fn resolve<P: StatusProbe>(probe: &P) -> Result<SessionState> {
  let authenticated = probe.is_authenticated().await?;
  let state = transition(SessionState::Loading, SessionEvent::AuthResolved(authenticated));
  if !authenticated {
    return Ok(state);
  }
  let active = probe.has_active_subscription().await?;
  Ok(transition(state, SessionEvent::SubscriptionObserved(active)))
}

/// Report auth once, then subscription state every `poll_every` until the
/// receiver goes away. Failed subscription probes are logged and retried.
async fn produce<P: StatusProbe>(
  probe: P,
  poll_every: Duration,
  tx: mpsc::Sender<SessionEvent>,
) -> Result<()> {
  let authenticated = probe.is_authenticated().await.context("checking credentials")?;
  if tx.send(SessionEvent::AuthResolved(authenticated)).await.is_err() || !authenticated {
    return Ok(());
  }

  loop {
    match probe.has_active_subscription().await {
      Ok(active) => {
        if tx.send(SessionEvent::SubscriptionObserved(active)).await.is_err() {
          return Ok(());
        }
      }
      Err(e) => warn!(error = %e, "subscription probe failed"),
    }
    tokio::time::sleep(poll_every).await;
  }
}

/// Feed received events into `state` until it settles or the channel closes.
async fn drive(rx: &mut mpsc::Receiver<SessionEvent>, state: &mut SessionState) {
  while let Some(event) = rx.recv().await {
    let next = transition(*state, event);
    debug!(from = %state, ?event, to = %next, "session transition");
    *state = next;
    if next.is_settled() {
      break;
    }
  }
}

/// Wait for a just-completed checkout to show up as an active subscription.
///
/// Returns [`SessionState::Active`] once confirmed, or
/// [`SessionState::TrialRequired`] if `budget` runs out first.
pub async fn await_confirmation<P>(
  probe: P,
  budget: Duration,
  poll_every: Duration,
) -> Result<SessionState>
where
  P: StatusProbe + 'static,
{
  let (tx, mut rx) = mpsc::channel(8);
  let producer = tokio::spawn(produce(probe, poll_every, tx));

  let mut state = transition(SessionState::Loading, SessionEvent::CheckoutCompleted);
  let timed_out = tokio::time::timeout(budget, drive(&mut rx, &mut state))
    .await
    .is_err();

  if timed_out {
    producer.abort();
    return Ok(transition(state, SessionEvent::VerificationTimedOut));
  }
  if state.is_settled() {
    producer.abort();
    return Ok(state);
  }

  // The channel closed on its own, so the producer has already finished.
  producer.await.context("status probe task panicked")??;
  Ok(state)
}
