//! Handlers for the media library.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/admin/media` | Optional `?category=` |
//! | `POST` | `/admin/media` | Raw body; `Content-Type`, `X-File-Name`, `?category=` |
//! | `DELETE` | `/admin/media/{id}` | Blob first, then the descriptor |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::{HeaderMap, StatusCode, header},
};
use bytes::Bytes;
use sadaka_core::{
  blob::BlobStore,
  media::{MediaAsset, NewMediaAsset, sanitize_file_name},
  validate::invalid,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
  AppState, Backend,
  error::ApiError,
  session::{AdminSession, MediaAccess},
};

/// Header carrying the client's original file name.
pub const FILE_NAME_HEADER: &str = "x-file-name";

const DEFAULT_CATEGORY: &str = "general";

#[derive(Debug, Default, Deserialize)]
pub struct CategoryParams {
  pub category: Option<String>,
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
  headers.get(name).and_then(|v| v.to_str().ok())
}

/// `GET /admin/media[?category=<name>]`
pub async fn list<S: Backend, B: BlobStore>(
  _session: AdminSession<MediaAccess>,
  State(state): State<AppState<S, B>>,
  Query(params): Query<CategoryParams>,
) -> Result<Json<Vec<MediaAsset>>, ApiError> {
  let category = params.category.filter(|c| !c.trim().is_empty());
  let assets = state.store.list_media(category).await.map_err(ApiError::store)?;
  Ok(Json(assets))
}

/// `POST /admin/media`: stores the body as-is and records a descriptor.
///
/// A backend upload failure is a `502`; nothing is recorded.
pub async fn upload<S: Backend, B: BlobStore>(
  session: AdminSession<MediaAccess>,
  State(state): State<AppState<S, B>>,
  Query(params): Query<CategoryParams>,
  headers: HeaderMap,
  body: Bytes,
) -> Result<(StatusCode, Json<MediaAsset>), ApiError> {
  if body.is_empty() {
    return Err(invalid("file", "required", "must not be empty").into());
  }

  let file_name = sanitize_file_name(header_str(&headers, FILE_NAME_HEADER).unwrap_or_default());
  let content_type = header_str(&headers, header::CONTENT_TYPE.as_str())
    .unwrap_or("application/octet-stream")
    .to_owned();
  let category = params
    .category
    .map(|c| c.trim().to_owned())
    .filter(|c| !c.is_empty())
    .unwrap_or_else(|| DEFAULT_CATEGORY.to_owned());
  let size = body.len() as u64;

  let blob = state
    .blobs
    .put(file_name.clone(), content_type.clone(), body.to_vec())
    .await
    .map_err(ApiError::upload)?;

  let asset = state
    .store
    .add_media(NewMediaAsset {
      url: blob.url,
      storage_key: blob.key,
      file_name,
      content_type,
      size,
      category,
    })
    .await
    .map_err(ApiError::store)?;

  tracing::info!(
    media_id = %asset.media_id,
    size,
    kind = asset.kind.as_str(),
    by = %session.identity.email,
    "media uploaded"
  );
  Ok((StatusCode::CREATED, Json(asset)))
}

/// `DELETE /admin/media/{id}`
///
/// Posts that reference the file keep their URL.
pub async fn delete_one<S: Backend, B: BlobStore>(
  session: AdminSession<MediaAccess>,
  State(state): State<AppState<S, B>>,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
  let asset = state
    .store
    .get_media(id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("media {id} not found")))?;

  let removed = state
    .blobs
    .delete(asset.storage_key.clone())
    .await
    .map_err(ApiError::upload)?;
  if !removed {
    tracing::warn!(media_id = %id, key = %asset.storage_key, "blob already missing");
  }

  state.store.delete_media(id).await.map_err(ApiError::store)?;
  tracing::info!(media_id = %id, by = %session.identity.email, "media deleted");
  Ok(StatusCode::NO_CONTENT)
}
