//! The access guard: a small state machine deciding whether a navigation (or
//! request) may proceed.
//!
//! ```text
//! Unknown ──session callback──▶ SignedIn ──role result──▶ decision
//!    │                              │
//!    └─▶ SignedOut ─▶ RedirectToLogin
//! ```
//!
//! [`Guard::evaluate`] is a pure function of `(session, role)`: the same
//! inputs always produce the same [`Decision`].

use std::sync::{Arc, Mutex, PoisonError};

use crate::{
  auth_state::{AuthStateHub, Subscription},
  identity::Identity,
  role::Role,
};

pub const LOGIN_ROUTE: &str = "/login";
pub const UNAUTHORIZED_ROUTE: &str = "/unauthorized";

/// What the protected route demands of the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Requirement {
  /// Any signed-in user holding some role.
  Authenticated,
  /// One of the listed roles.
  AnyOf(Vec<Role>),
  /// A role with access to the named resource.
  Resource(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
  /// The identity provider has not reported yet.
  Unknown,
  SignedOut,
  SignedIn(Identity),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleState {
  /// Lookup in flight.
  Pending,
  /// Lookup finished; `None` when the user has no role after policy.
  Resolved(Option<Role>),
  /// Lookup failed. Never treated as a grant.
  Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
  /// Render a neutral loading state.
  Loading,
  Allow,
  RedirectToLogin,
  RedirectToUnauthorized,
}

impl Decision {
  pub fn redirect_target(self) -> Option<&'static str> {
    match self {
      Self::RedirectToLogin => Some(LOGIN_ROUTE),
      Self::RedirectToUnauthorized => Some(UNAUTHORIZED_ROUTE),
      Self::Loading | Self::Allow => None,
    }
  }
}

// ─── Guard ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Guard {
  requirement: Requirement,
}

impl Guard {
  pub fn new(requirement: Requirement) -> Self { Self { requirement } }

  pub fn authenticated() -> Self { Self::new(Requirement::Authenticated) }

  pub fn any_of(roles: impl IntoIterator<Item = Role>) -> Self {
    Self::new(Requirement::AnyOf(roles.into_iter().collect()))
  }

  pub fn resource(name: impl Into<String>) -> Self {
    Self::new(Requirement::Resource(name.into()))
  }

  pub fn requirement(&self) -> &Requirement { &self.requirement }

  pub fn evaluate(&self, session: &SessionState, role: &RoleState) -> Decision {
    match session {
      SessionState::Unknown => return Decision::Loading,
      SessionState::SignedOut => return Decision::RedirectToLogin,
      SessionState::SignedIn(_) => {}
    }

    let role = match role {
      RoleState::Pending => return Decision::Loading,
      RoleState::Failed | RoleState::Resolved(None) => {
        return Decision::RedirectToUnauthorized;
      }
      RoleState::Resolved(Some(role)) => *role,
    };

    if role.is_unrestricted() {
      return Decision::Allow;
    }

    let permitted = match &self.requirement {
      Requirement::Authenticated => true,
      Requirement::AnyOf(roles) => roles.contains(&role),
      Requirement::Resource(name) => role.has_access(name),
    };

    if permitted {
      Decision::Allow
    } else {
      Decision::RedirectToUnauthorized
    }
  }
}

// ─── Per-mount session ───────────────────────────────────────────────────────

/// One mount of a guarded view or one guarded request.
///
/// The session callback is accepted exactly once; later callbacks are
/// ignored so a mount never flips its decision mid-flight.
#[derive(Debug, Clone)]
pub struct GuardSession {
  guard:   Guard,
  session: SessionState,
  role:    RoleState,
}

impl GuardSession {
  pub fn new(guard: Guard) -> Self {
    Self {
      guard,
      session: SessionState::Unknown,
      role: RoleState::Pending,
    }
  }

  /// Apply the identity provider's callback. Returns `false` if a callback
  /// was already applied.
  pub fn on_session(&mut self, identity: Option<Identity>) -> bool {
    if self.session != SessionState::Unknown {
      return false;
    }
    self.session = match identity {
      Some(identity) => SessionState::SignedIn(identity),
      None => SessionState::SignedOut,
    };
    true
  }

  /// Record the role lookup result (after the missing-role policy).
  pub fn on_role_resolved(&mut self, role: Option<Role>) {
    if matches!(self.session, SessionState::SignedIn(_)) {
      self.role = RoleState::Resolved(role);
    }
  }

  /// Record a failed role lookup.
  pub fn on_role_failed(&mut self) {
    if matches!(self.session, SessionState::SignedIn(_)) {
      self.role = RoleState::Failed;
    }
  }

  pub fn identity(&self) -> Option<&Identity> {
    match &self.session {
      SessionState::SignedIn(identity) => Some(identity),
      _ => None,
    }
  }

  pub fn role(&self) -> Option<Role> {
    match self.role {
      RoleState::Resolved(role) => role,
      _ => None,
    }
  }

  pub fn decision(&self) -> Decision {
    self.guard.evaluate(&self.session, &self.role)
  }

  /// Attach this session to `hub`; the first published change becomes its
  /// session callback. Dropping the [`MountedGuard`] detaches it.
  pub fn mount(self, hub: &AuthStateHub) -> MountedGuard {
    let state = Arc::new(Mutex::new(self));
    let slot = Arc::clone(&state);
    let subscription = hub.on_auth_state_changed(move |change| {
      slot
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .on_session(change.current().cloned());
    });
    MountedGuard { state, _subscription: subscription }
  }
}

/// A [`GuardSession`] listening on an [`AuthStateHub`].
pub struct MountedGuard {
  state:         Arc<Mutex<GuardSession>>,
  _subscription: Subscription,
}

impl MountedGuard {
  /// Run `f` against the underlying session, e.g. to feed the role result.
  pub fn with_session<R>(&self, f: impl FnOnce(&mut GuardSession) -> R) -> R {
    f(&mut self.state.lock().unwrap_or_else(PoisonError::into_inner))
  }

  pub fn decision(&self) -> Decision { self.with_session(|s| s.decision()) }
}
