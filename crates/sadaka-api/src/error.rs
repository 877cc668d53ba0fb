//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use sadaka_core::{
  guard::{Decision, LOGIN_ROUTE, UNAUTHORIZED_ROUTE},
  validate::{ValidationErrors, field_errors},
};
use serde_json::json;
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("validation failed: {0}")]
  Validation(ValidationErrors),

  /// No valid session. The client should send the user to the login page.
  #[error("sign-in required")]
  Unauthenticated,

  /// Signed in, but the role does not cover the resource.
  #[error("not permitted")]
  Forbidden,

  #[error("invalid email or password")]
  InvalidCredentials,

  #[error("not found: {0}")]
  NotFound(String),

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("upload failed: {0}")]
  Upload(#[source] BoxError),

  #[error("store error: {0}")]
  Store(#[source] BoxError),
}

impl ApiError {
  pub fn store(err: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Store(Box::new(err))
  }

  pub fn upload(err: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Upload(Box::new(err))
  }

  /// The rejection for a non-`Allow` guard decision. An undecided guard
  /// never grants.
  pub fn denied(decision: Decision) -> Self {
    match decision {
      Decision::RedirectToLogin => Self::Unauthenticated,
      Decision::Allow | Decision::Loading | Decision::RedirectToUnauthorized => {
        Self::Forbidden
      }
    }
  }
}

impl From<ValidationErrors> for ApiError {
  fn from(errors: ValidationErrors) -> Self { Self::Validation(errors) }
}

impl From<sadaka_core::Error> for ApiError {
  fn from(err: sadaka_core::Error) -> Self {
    match err {
      sadaka_core::Error::Validation(errors) => Self::Validation(errors),
      other => Self::BadRequest(other.to_string()),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, body) = match &self {
      ApiError::Validation(errors) => (
        StatusCode::UNPROCESSABLE_ENTITY,
        json!({ "error": "validation failed", "fields": field_errors(errors) }),
      ),
      ApiError::Unauthenticated => (
        StatusCode::UNAUTHORIZED,
        json!({ "error": self.to_string(), "redirect": LOGIN_ROUTE }),
      ),
      ApiError::Forbidden => (
        StatusCode::FORBIDDEN,
        json!({ "error": self.to_string(), "redirect": UNAUTHORIZED_ROUTE }),
      ),
      ApiError::InvalidCredentials => {
        (StatusCode::UNAUTHORIZED, json!({ "error": self.to_string() }))
      }
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, json!({ "error": m })),
      ApiError::Conflict(m) => (StatusCode::CONFLICT, json!({ "error": m })),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, json!({ "error": m })),
      ApiError::Upload(e) => {
        tracing::error!(error = %e, "blob upload failed");
        (StatusCode::BAD_GATEWAY, json!({ "error": "upload failed" }))
      }
      ApiError::Store(e) => {
        tracing::error!(error = %e, "backend error");
        (StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": e.to_string() }))
      }
    };
    (status, Json(body)).into_response()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn decisions_map_to_redirects() {
    assert!(matches!(ApiError::denied(Decision::RedirectToLogin), ApiError::Unauthenticated));
    assert!(matches!(
      ApiError::denied(Decision::RedirectToUnauthorized),
      ApiError::Forbidden
    ));
    assert!(matches!(ApiError::denied(Decision::Loading), ApiError::Forbidden));
  }

  #[test]
  fn validation_is_unprocessable() {
    let errs = sadaka_core::validate::invalid("message", "length", "must be 10 to 5000 characters");
    let res = ApiError::from(errs).into_response();
    assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
  }
}
