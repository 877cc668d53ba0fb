//! Identity provider abstraction: accounts, sessions and password resets.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The stable identity of a signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
  pub user_id: Uuid,
  pub email:   String,
}

/// An opaque bearer session issued on sign-in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
  pub token:      String,
  pub identity:   Identity,
  pub expires_at: DateTime<Utc>,
}

/// A single-use password reset token, to be delivered by email.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordReset {
  pub email:      String,
  pub token:      String,
  pub expires_at: DateTime<Utc>,
}

/// Lowercase and trim an email address for lookup and storage.
pub fn normalize_email(email: &str) -> String { email.trim().to_lowercase() }

/// Hosted-auth style identity service.
///
/// Credential failures are not errors: they surface as `None` / `false` so
/// callers cannot distinguish an unknown email from a wrong password.
pub trait IdentityProvider: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Create an account. `None` if the email is already registered.
  fn create_account(
    &self,
    email: String,
    password: String,
  ) -> impl Future<Output = Result<Option<Identity>, Self::Error>> + Send + '_;

  /// Verify credentials and issue a new session.
  fn sign_in(
    &self,
    email: String,
    password: String,
  ) -> impl Future<Output = Result<Option<Session>, Self::Error>> + Send + '_;

  /// Invalidate a session. Returns the identity it belonged to, if any.
  fn sign_out(
    &self,
    token: String,
  ) -> impl Future<Output = Result<Option<Identity>, Self::Error>> + Send + '_;

  /// Resolve a bearer token to the identity it represents. Expired and
  /// unknown tokens resolve to `None`.
  fn current_user(
    &self,
    token: String,
  ) -> impl Future<Output = Result<Option<Identity>, Self::Error>> + Send + '_;

  /// Issue a reset token for `email`, or `None` when no such account exists.
  fn request_password_reset(
    &self,
    email: String,
  ) -> impl Future<Output = Result<Option<PasswordReset>, Self::Error>> + Send + '_;

  /// Consume a reset token and set a new password. Returns `false` for an
  /// unknown, used or expired token.
  fn confirm_password_reset(
    &self,
    token: String,
    new_password: String,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;
}
