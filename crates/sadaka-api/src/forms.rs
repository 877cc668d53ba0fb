//! Handlers for the public forms.
//!
//! | Method | Path | Collection |
//! |--------|------|------------|
//! | `POST` | `/contact` | `contacts` |
//! | `POST` | `/help-requests` | `help_requests` |
//! | `POST` | `/registrations/children` | `children_registrations` |
//! | `POST` | `/registrations/charity` | `charity_registrations` |
//!
//! Each returns 201 with the new id, or 422 with a per-field error list. An
//! invalid form never reaches the store.

use axum::{Json, extract::State, http::StatusCode};
use sadaka_core::{
  blob::BlobStore,
  store::SiteStore,
  submission::{
    CharityRegistrationForm, ChildRegistrationForm, ContactForm, HelpRequestForm, Status,
    SubmissionForm,
  },
  validate::Validate,
};
use serde::Serialize;
use uuid::Uuid;

use crate::{AppState, Backend, error::ApiError};

/// What the public caller gets back: enough to reference the submission,
/// nothing more.
#[derive(Debug, Serialize)]
pub struct Received {
  pub id:     Uuid,
  pub status: Status,
}

async fn submit<S: SiteStore>(
  store: &S,
  form: SubmissionForm,
) -> Result<(StatusCode, Json<Received>), ApiError> {
  form.validate()?;
  let submission = store.add_submission(form).await.map_err(ApiError::store)?;
  tracing::info!(
    id = %submission.id,
    collection = %submission.collection(),
    "submission received"
  );
  Ok((
    StatusCode::CREATED,
    Json(Received { id: submission.id, status: submission.status }),
  ))
}

/// `POST /contact`
pub async fn contact<S: Backend, B: BlobStore>(
  State(state): State<AppState<S, B>>,
  Json(form): Json<ContactForm>,
) -> Result<(StatusCode, Json<Received>), ApiError> {
  submit(state.store.as_ref(), SubmissionForm::Contact(form)).await
}

/// `POST /help-requests`
pub async fn help_request<S: Backend, B: BlobStore>(
  State(state): State<AppState<S, B>>,
  Json(form): Json<HelpRequestForm>,
) -> Result<(StatusCode, Json<Received>), ApiError> {
  submit(state.store.as_ref(), SubmissionForm::HelpRequest(form)).await
}

/// `POST /registrations/children`
pub async fn child_registration<S: Backend, B: BlobStore>(
  State(state): State<AppState<S, B>>,
  Json(form): Json<ChildRegistrationForm>,
) -> Result<(StatusCode, Json<Received>), ApiError> {
  submit(state.store.as_ref(), SubmissionForm::ChildRegistration(form)).await
}

/// `POST /registrations/charity`
pub async fn charity_registration<S: Backend, B: BlobStore>(
  State(state): State<AppState<S, B>>,
  Json(form): Json<CharityRegistrationForm>,
) -> Result<(StatusCode, Json<Received>), ApiError> {
  submit(state.store.as_ref(), SubmissionForm::CharityRegistration(form)).await
}
