//! Auth-state change notifications.
//!
//! [`AuthStateHub`] is the `onAuthStateChanged` registry: listeners are called
//! on every sign-in and sign-out, and detach when their [`Subscription`] is
//! dropped. A dropped subscription is never called again, so a disposed view
//! cannot act on a stale callback.

use std::{
  collections::BTreeMap,
  sync::{
    Arc, Mutex, PoisonError, Weak,
    atomic::{AtomicU64, Ordering},
  },
};

use crate::identity::Identity;

/// A change in who is signed in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthChange {
  SignedIn(Identity),
  SignedOut(Identity),
}

impl AuthChange {
  /// The signed-in user after this change, if any.
  pub fn current(&self) -> Option<&Identity> {
    match self {
      Self::SignedIn(identity) => Some(identity),
      Self::SignedOut(_) => None,
    }
  }

  /// The user this change concerns.
  pub fn identity(&self) -> &Identity {
    match self {
      Self::SignedIn(identity) | Self::SignedOut(identity) => identity,
    }
  }
}

type Listener = Arc<dyn Fn(&AuthChange) + Send + Sync>;

#[derive(Default)]
struct HubInner {
  next_id:   AtomicU64,
  listeners: Mutex<BTreeMap<u64, Listener>>,
}

impl HubInner {
  fn listeners(&self) -> std::sync::MutexGuard<'_, BTreeMap<u64, Listener>> {
    self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
  }
}

/// Listener registry for [`AuthChange`] events.
///
/// Cloning is cheap; clones share the same registry.
#[derive(Clone, Default)]
pub struct AuthStateHub {
  inner: Arc<HubInner>,
}

impl AuthStateHub {
  pub fn new() -> Self { Self::default() }

  /// Register `listener`. It stays attached until the returned
  /// [`Subscription`] is dropped.
  #[must_use = "dropping the subscription detaches the listener"]
  pub fn on_auth_state_changed<F>(&self, listener: F) -> Subscription
  where
    F: Fn(&AuthChange) + Send + Sync + 'static,
  {
    let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
    self.inner.listeners().insert(id, Arc::new(listener));
    Subscription { id, hub: Arc::downgrade(&self.inner) }
  }

  /// Deliver `change` to every attached listener, in registration order.
  pub fn publish(&self, change: &AuthChange) {
    // Snapshot first so listeners may subscribe or unsubscribe re-entrantly.
    let listeners: Vec<Listener> =
      self.inner.listeners().values().cloned().collect();
    for listener in listeners {
      listener(change);
    }
  }

  pub fn listener_count(&self) -> usize { self.inner.listeners().len() }
}

/// Handle for an attached listener. Dropping it detaches the listener.
pub struct Subscription {
  id:  u64,
  hub: Weak<HubInner>,
}

impl Drop for Subscription {
  fn drop(&mut self) {
    if let Some(hub) = self.hub.upgrade() {
      hub.listeners().remove(&self.id);
    }
  }
}

#[cfg(test)]
mod tests {
  use std::sync::atomic::AtomicUsize;

  use uuid::Uuid;

  use super::*;

  fn alice() -> Identity {
    Identity { user_id: Uuid::nil(), email: "alice@example.com".into() }
  }

  #[test]
  fn listeners_receive_published_changes() {
    let hub = AuthStateHub::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = calls.clone();
    let _sub = hub.on_auth_state_changed(move |change| {
      assert!(change.current().is_some());
      seen.fetch_add(1, Ordering::SeqCst);
    });

    hub.publish(&AuthChange::SignedIn(alice()));
    hub.publish(&AuthChange::SignedIn(alice()));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[test]
  fn dropping_subscription_detaches() {
    let hub = AuthStateHub::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = calls.clone();
    let sub = hub.on_auth_state_changed(move |_| {
      seen.fetch_add(1, Ordering::SeqCst);
    });
    assert_eq!(hub.listener_count(), 1);

    drop(sub);
    hub.publish(&AuthChange::SignedOut(alice()));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(hub.listener_count(), 0);
  }

  #[test]
  fn subscription_outliving_hub_is_harmless() {
    let hub = AuthStateHub::new();
    let sub = hub.on_auth_state_changed(|_| {});
    drop(hub);
    drop(sub);
  }

  #[test]
  fn signed_out_has_no_current_user() {
    let change = AuthChange::SignedOut(alice());
    assert!(change.current().is_none());
    assert_eq!(change.identity().email, "alice@example.com");
  }
}
