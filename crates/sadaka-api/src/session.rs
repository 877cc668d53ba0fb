//! The [`AdminSession`] extractor: runs the access guard for one request.
//!
//! The bearer token is resolved to an identity, the identity to a role (with
//! the missing-role policy applied), and the [`GuardSession`] decides. Only
//! `Allow` yields an `AdminSession`; everything else becomes a `401` or `403`
//! carrying the redirect target.

use std::marker::PhantomData;

use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, header, request::Parts},
};
use sadaka_core::{
  blob::BlobStore,
  guard::{Decision, Guard, GuardSession, RoleState, SessionState},
  identity::Identity,
  role::{Role, resource},
  submission::Author,
};

use crate::{AppState, Backend, error::ApiError};

/// Pull the token out of `Authorization: Bearer <token>`.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
  headers
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .and_then(|v| v.strip_prefix("Bearer "))
    .map(str::trim)
    .filter(|t| !t.is_empty())
    .map(str::to_owned)
}

// ─── Access markers ──────────────────────────────────────────────────────────

/// The guard requirement a route is mounted with.
pub trait Access {
  fn guard() -> Guard;
}

/// Any signed-in user holding a role.
pub struct AnyRole;

impl Access for AnyRole {
  fn guard() -> Guard { Guard::authenticated() }
}

pub struct PostsAccess;

impl Access for PostsAccess {
  fn guard() -> Guard { Guard::resource(resource::POSTS) }
}

pub struct MediaAccess;

impl Access for MediaAccess {
  fn guard() -> Guard { Guard::resource(resource::MEDIA) }
}

pub struct UsersAccess;

impl Access for UsersAccess {
  fn guard() -> Guard { Guard::resource(resource::USERS) }
}

pub struct RolesAccess;

impl Access for RolesAccess {
  fn guard() -> Guard { Guard::resource(resource::ROLES) }
}

// ─── Extractor ───────────────────────────────────────────────────────────────

/// A request the guard allowed under requirement `A`.
pub struct AdminSession<A = AnyRole> {
  pub identity: Identity,
  pub role:     Role,
  _access:      PhantomData<fn() -> A>,
}

impl<A> AdminSession<A> {
  /// Re-run the guard for a resource only known after routing, such as the
  /// collection named in the path.
  pub fn require(&self, resource: &str) -> Result<(), ApiError> {
    let decision = Guard::resource(resource).evaluate(
      &SessionState::SignedIn(self.identity.clone()),
      &RoleState::Resolved(Some(self.role)),
    );
    if decision == Decision::Allow {
      return Ok(());
    }
    tracing::warn!(
      user_id = %self.identity.user_id,
      role = %self.role,
      resource,
      "access denied"
    );
    Err(ApiError::denied(decision))
  }

  pub fn author(&self) -> Author {
    Author {
      user_id: self.identity.user_id,
      email:   self.identity.email.clone(),
    }
  }
}

impl<S, B, A> FromRequestParts<AppState<S, B>> for AdminSession<A>
where
  S: Backend,
  B: BlobStore + 'static,
  A: Access,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S, B>,
  ) -> Result<Self, Self::Rejection> {
    let mut guard = GuardSession::new(A::guard());

    let identity = match bearer_token(&parts.headers) {
      Some(token) => state.store.current_user(token).await.map_err(ApiError::store)?,
      None => None,
    };
    guard.on_session(identity);

    if let Some(identity) = guard.identity().cloned() {
      match state.store.resolve_role(identity.user_id).await {
        Ok(stored) => {
          let role = state.auth.missing_role.effective_role(stored);
          if stored.is_none() && role.is_some() {
            tracing::warn!(
              user_id = %identity.user_id,
              email = %identity.email,
              "no role on record; granting super under the permissive missing-role policy"
            );
          }
          guard.on_role_resolved(role);
        }
        Err(e) => {
          tracing::error!(user_id = %identity.user_id, error = %e, "role lookup failed");
          guard.on_role_failed();
        }
      }
    }

    let decision = guard.decision();
    if let (Decision::Allow, Some(identity), Some(role)) =
      (decision, guard.identity(), guard.role())
    {
      return Ok(AdminSession {
        identity: identity.clone(),
        role,
        _access: PhantomData,
      });
    }

    tracing::warn!(
      path = %parts.uri.path(),
      user = ?guard.identity().map(|i| &i.email),
      ?decision,
      "access denied"
    );
    Err(ApiError::denied(decision))
  }
}
