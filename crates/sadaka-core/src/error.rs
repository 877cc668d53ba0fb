//! Error types for `sadaka-core`.

use thiserror::Error;

use crate::validate::ValidationErrors;

#[derive(Debug, Error)]
pub enum Error {
  #[error("validation failed: {0}")]
  Validation(ValidationErrors),

  #[error("unknown role: {0:?}")]
  UnknownRole(String),

  #[error("unknown status: {0:?}")]
  UnknownStatus(String),

  #[error("unknown collection: {0:?}")]
  UnknownCollection(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl From<ValidationErrors> for Error {
  fn from(errors: ValidationErrors) -> Self { Self::Validation(errors) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
