//! Handlers for signing in and out, password resets and `/admin/me`.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/auth/sign-in` | `{email, password}` → [`SignedIn`] or 401 |
//! | `POST` | `/auth/sign-out` | Bearer token; 204 |
//! | `POST` | `/auth/password-reset` | `{email}`; always 202 |
//! | `POST` | `/auth/password-reset/confirm` | `{token, password}`; 204 |
//! | `GET`  | `/admin/me` | [`Me`] |

use axum::{
  Json,
  extract::State,
  http::{HeaderMap, StatusCode},
};
use chrono::{DateTime, Utc};
use sadaka_core::{
  auth_state::AuthChange,
  blob::BlobStore,
  identity::Identity,
  role::Role,
  validate::{Validate, password},
};
use serde::{Deserialize, Serialize};

use crate::{
  AppState, Backend,
  error::ApiError,
  session::{AdminSession, bearer_token},
};

// ─── Sign in / out ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct Credentials {
  pub email:    String,
  pub password: String,
}

#[derive(Debug, Serialize)]
pub struct SignedIn {
  pub token:         String,
  pub expires_at:    DateTime<Utc>,
  pub user:          Identity,
  /// `None` when the account has no role (and the policy grants none).
  pub role:          Option<Role>,
  pub landing_route: Option<&'static str>,
}

/// `POST /auth/sign-in`
pub async fn sign_in<S: Backend, B: BlobStore>(
  State(state): State<AppState<S, B>>,
  Json(creds): Json<Credentials>,
) -> Result<Json<SignedIn>, ApiError> {
  let Some(session) = state
    .store
    .sign_in(creds.email, creds.password)
    .await
    .map_err(ApiError::store)?
  else {
    tracing::warn!("sign-in rejected");
    return Err(ApiError::InvalidCredentials);
  };

  let stored = match state.store.resolve_role(session.identity.user_id).await {
    Ok(stored) => stored,
    Err(e) => {
      // The caller never receives the token, so it must not outlive this request.
      if let Err(sign_out) = state.store.sign_out(session.token).await {
        tracing::error!(error = %sign_out, "failed to end session after role lookup failure");
      }
      return Err(ApiError::store(e));
    }
  };
  let role = state.auth.missing_role.effective_role(stored);

  tracing::info!(
    user_id = %session.identity.user_id,
    email = %session.identity.email,
    role = ?role,
    "signed in"
  );
  state.auth_events.publish(&AuthChange::SignedIn(session.identity.clone()));

  Ok(Json(SignedIn {
    token: session.token,
    expires_at: session.expires_at,
    user: session.identity,
    role,
    landing_route: role.map(Role::landing_route),
  }))
}

/// `POST /auth/sign-out`. Ending an unknown session is not an error.
pub async fn sign_out<S: Backend, B: BlobStore>(
  State(state): State<AppState<S, B>>,
  headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
  let token = bearer_token(&headers).ok_or(ApiError::Unauthenticated)?;
  if let Some(identity) = state.store.sign_out(token).await.map_err(ApiError::store)? {
    tracing::info!(user_id = %identity.user_id, email = %identity.email, "signed out");
    state.auth_events.publish(&AuthChange::SignedOut(identity));
  }
  Ok(StatusCode::NO_CONTENT)
}

// ─── Password reset ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Validate)]
pub struct ResetRequest {
  #[validate(email(message = "must be a valid email address"))]
  pub email: String,
}

/// `POST /auth/password-reset`
///
/// Answers 202 whether or not the account exists. When it does, the reset
/// token goes out on the change feed for the mailer.
pub async fn request_reset<S: Backend, B: BlobStore>(
  State(state): State<AppState<S, B>>,
  Json(body): Json<ResetRequest>,
) -> Result<StatusCode, ApiError> {
  body.validate()?;

  state
    .store
    .request_password_reset(body.email)
    .await
    .map_err(ApiError::store)?;
  Ok(StatusCode::ACCEPTED)
}

#[derive(Debug, Deserialize, Validate)]
pub struct ResetConfirmation {
  pub token:    String,
  #[validate(custom(function = "password"))]
  pub password: String,
}

/// `POST /auth/password-reset/confirm`
pub async fn confirm_reset<S: Backend, B: BlobStore>(
  State(state): State<AppState<S, B>>,
  Json(body): Json<ResetConfirmation>,
) -> Result<StatusCode, ApiError> {
  body.validate()?;

  let done = state
    .store
    .confirm_password_reset(body.token, body.password)
    .await
    .map_err(ApiError::store)?;
  if !done {
    return Err(ApiError::BadRequest("reset link is invalid or has expired".into()));
  }
  Ok(StatusCode::NO_CONTENT)
}

// ─── Me ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct Me {
  pub user:          Identity,
  pub role:          Role,
  pub landing_route: &'static str,
  /// `None` for an unrestricted role.
  pub resources:     Option<&'static [&'static str]>,
}

/// `GET /admin/me`
pub async fn me(session: AdminSession) -> Json<Me> {
  Json(Me {
    landing_route: session.role.landing_route(),
    resources: session.role.permissions(),
    role: session.role,
    user: session.identity,
  })
}
