//! Admin handlers for submissions and their replies.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/admin/submissions/{collection}` | Optional `status`, `limit`, `offset` |
//! | `GET`  | `/admin/submissions/{collection}/{id}` | |
//! | `DELETE` | `/admin/submissions/{collection}/{id}` | 204 |
//! | `POST` | `/admin/submissions/{collection}/{id}/replies` | Body: `{"message":"..."}` |
//! | `PUT`  | `/admin/submissions/{collection}/{id}/status` | Body: `{"status":"read"}` |
//!
//! The collection is the guarded resource, so every handler checks it after
//! routing.

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
};
use sadaka_core::{
  blob::BlobStore,
  store::{StatusChange, SubmissionQuery},
  submission::{Collection, ReplyDraft, Status, Submission},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{AppState, Backend, error::ApiError, session::AdminSession};

/// Check the caller may act on the path's collection, then resolve it.
///
/// The guard runs on the raw name first: a departmental role asking for a
/// name outside its set is refused without learning whether it exists.
fn authorize(session: &AdminSession, collection: &str) -> Result<Collection, ApiError> {
  session.require(collection)?;
  collection
    .parse()
    .map_err(|_| ApiError::NotFound(format!("no collection named {collection:?}")))
}

fn not_found(collection: Collection, id: Uuid) -> ApiError {
  ApiError::NotFound(format!("{id} not found in {collection}"))
}

/// `GET /admin/submissions/{collection}`
pub async fn list<S: Backend, B: BlobStore>(
  session: AdminSession,
  State(state): State<AppState<S, B>>,
  Path(collection): Path<String>,
  Query(query): Query<SubmissionQuery>,
) -> Result<Json<Vec<Submission>>, ApiError> {
  let collection = authorize(&session, &collection)?;
  let submissions = state
    .store
    .list_submissions(collection, query)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(submissions))
}

/// `GET /admin/submissions/{collection}/{id}`
pub async fn get_one<S: Backend, B: BlobStore>(
  session: AdminSession,
  State(state): State<AppState<S, B>>,
  Path((collection, id)): Path<(String, Uuid)>,
) -> Result<Json<Submission>, ApiError> {
  let collection = authorize(&session, &collection)?;
  let submission = state
    .store
    .get_submission(collection, id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| not_found(collection, id))?;
  Ok(Json(submission))
}

/// `DELETE /admin/submissions/{collection}/{id}`
pub async fn delete_one<S: Backend, B: BlobStore>(
  session: AdminSession,
  State(state): State<AppState<S, B>>,
  Path((collection, id)): Path<(String, Uuid)>,
) -> Result<StatusCode, ApiError> {
  let collection = authorize(&session, &collection)?;
  if !state
    .store
    .delete_submission(collection, id)
    .await
    .map_err(ApiError::store)?
  {
    return Err(not_found(collection, id));
  }
  tracing::info!(%id, %collection, by = %session.identity.email, "submission deleted");
  Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct ReplyBody {
  pub message: String,
}

/// `POST /admin/submissions/{collection}/{id}/replies`
///
/// Appends to the reply log; earlier replies are never rewritten. The
/// submitter is mailed by the notifier once the change lands.
pub async fn reply<S: Backend, B: BlobStore>(
  session: AdminSession,
  State(state): State<AppState<S, B>>,
  Path((collection, id)): Path<(String, Uuid)>,
  Json(body): Json<ReplyBody>,
) -> Result<(StatusCode, Json<Submission>), ApiError> {
  let collection = authorize(&session, &collection)?;
  let draft = ReplyDraft::new(&body.message)?;
  let submission = state
    .store
    .append_reply(collection, id, draft, session.author())
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| not_found(collection, id))?;
  Ok((StatusCode::CREATED, Json(submission)))
}

#[derive(Debug, Deserialize)]
pub struct StatusBody {
  pub status: Status,
}

/// `PUT /admin/submissions/{collection}/{id}/status`
pub async fn set_status<S: Backend, B: BlobStore>(
  session: AdminSession,
  State(state): State<AppState<S, B>>,
  Path((collection, id)): Path<(String, Uuid)>,
  Json(body): Json<StatusBody>,
) -> Result<Json<StatusChange>, ApiError> {
  let collection = authorize(&session, &collection)?;
  let change = state
    .store
    .change_status(collection, id, body.status)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| not_found(collection, id))?;
  Ok(Json(change))
}
