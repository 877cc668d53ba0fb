//! Shared validation for everything the public forms and the admin panel
//! write.
//!
//! Input types derive [`Validate`] next to their definition. This module
//! holds the rules the derive has no built-in for (blank text, phone
//! numbers, passwords) and flattens [`ValidationErrors`] into the per-field
//! list the API returns.

use std::borrow::Cow;

use serde::Serialize;
pub use validator::{Validate, ValidationError, ValidationErrors};

/// Shortest password accepted for new accounts and resets.
pub const MIN_PASSWORD_CHARS: usize = 8;

/// A single failed rule, as reported to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
  pub field:   String,
  pub message: String,
}

/// One entry per failed rule, ordered by field name.
pub fn field_errors(errors: &ValidationErrors) -> Vec<FieldError> {
  let mut out: Vec<FieldError> = errors
    .field_errors()
    .into_iter()
    .flat_map(|(field, errs)| {
      let field = field.to_string();
      errs.iter().map(move |e| FieldError { field: field.clone(), message: describe(e) })
    })
    .collect();
  out.sort_by(|a, b| a.field.cmp(&b.field));
  out
}

/// Whether any rule failed for `field`.
pub fn has_error(errors: &ValidationErrors, field: &str) -> bool {
  errors.field_errors().contains_key(field)
}

/// A one-rule error for checks made outside a derive.
pub fn invalid(
  field: &'static str,
  code: &'static str,
  message: impl Into<Cow<'static, str>>,
) -> ValidationErrors {
  let mut errors = ValidationErrors::new();
  errors.add(field, ValidationError::new(code).with_message(message.into()));
  errors
}

fn describe(error: &ValidationError) -> String {
  match &error.message {
    Some(message) => message.to_string(),
    None => error.code.to_string(),
  }
}

fn rule(code: &'static str, message: &'static str) -> ValidationError {
  ValidationError::new(code).with_message(Cow::Borrowed(message))
}

// ─── Custom rules ────────────────────────────────────────────────────────────

/// Something other than whitespace.
pub fn not_blank(value: &str) -> Result<(), ValidationError> {
  if value.trim().is_empty() {
    return Err(rule("required", "is required"));
  }
  Ok(())
}

pub fn phone(value: &str) -> Result<(), ValidationError> {
  if !is_valid_phone(value) {
    return Err(rule("phone", "must be a valid phone number"));
  }
  Ok(())
}

/// [`phone`] for optional inputs, where browsers send an empty string.
pub fn phone_or_blank(value: &str) -> Result<(), ValidationError> {
  if value.trim().is_empty() { Ok(()) } else { phone(value) }
}

pub fn password(value: &str) -> Result<(), ValidationError> {
  if value.chars().count() < MIN_PASSWORD_CHARS {
    return Err(
      ValidationError::new("password")
        .with_message(format!("must be at least {MIN_PASSWORD_CHARS} characters").into()),
    );
  }
  Ok(())
}

/// 7–20 characters of digits, spaces and `+-()`, with at least 7 digits.
pub fn is_valid_phone(value: &str) -> bool {
  let value = value.trim();
  let len = value.chars().count();
  let digits = value.chars().filter(char::is_ascii_digit).count();
  (7..=20).contains(&len)
    && digits >= 7
    && value
      .chars()
      .all(|c| c.is_ascii_digit() || matches!(c, ' ' | '+' | '-' | '(' | ')'))
}
