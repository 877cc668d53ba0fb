//! Handlers for news posts.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/posts` | Published posts, newest first |
//! | `GET`  | `/posts/{id}` | 404 unless published |
//! | `GET`  | `/admin/posts` | All posts, drafts included |
//! | `POST` | `/admin/posts` | Body: [`CreatePostBody`]; 201 + [`CreatedPost`] |
//! | `PUT`  | `/admin/posts/{id}` | Body: [`PostPatch`] |
//! | `DELETE` | `/admin/posts/{id}` | 204 |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use sadaka_core::{
  blob::BlobStore,
  media::{NewMediaAsset, sanitize_file_name},
  post::{NewPost, Post, PostPatch},
  validate::Validate,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  AppState, Backend,
  error::ApiError,
  session::{AdminSession, PostsAccess},
};

/// Media library category for images attached while creating a post.
pub const POST_IMAGE_CATEGORY: &str = "posts";

// ─── Public ──────────────────────────────────────────────────────────────────

/// `GET /posts`
pub async fn list_published<S: Backend, B: BlobStore>(
  State(state): State<AppState<S, B>>,
) -> Result<Json<Vec<Post>>, ApiError> {
  let posts = state.store.list_posts(true).await.map_err(ApiError::store)?;
  Ok(Json(posts))
}

/// `GET /posts/{id}`
pub async fn get_published<S: Backend, B: BlobStore>(
  State(state): State<AppState<S, B>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Post>, ApiError> {
  let post = state
    .store
    .get_post(id)
    .await
    .map_err(ApiError::store)?
    .filter(|p| p.published)
    .ok_or_else(|| ApiError::NotFound(format!("post {id} not found")))?;
  Ok(Json(post))
}

// ─── Admin ───────────────────────────────────────────────────────────────────

/// `GET /admin/posts`
pub async fn list_all<S: Backend, B: BlobStore>(
  _session: AdminSession<PostsAccess>,
  State(state): State<AppState<S, B>>,
) -> Result<Json<Vec<Post>>, ApiError> {
  let posts = state.store.list_posts(false).await.map_err(ApiError::store)?;
  Ok(Json(posts))
}

/// An image sent inline with a new post.
#[derive(Debug, Deserialize)]
pub struct InlineImage {
  pub file_name:    String,
  pub content_type: String,
  /// Standard base64.
  pub data:         String,
}

/// JSON body accepted by `POST /admin/posts`.
#[derive(Debug, Deserialize)]
pub struct CreatePostBody {
  #[serde(flatten)]
  pub post:  NewPost,
  #[serde(default)]
  pub image: Option<InlineImage>,
}

#[derive(Debug, Serialize)]
pub struct CreatedPost {
  pub post:     Post,
  /// Non-fatal problems, e.g. an image that could not be stored.
  pub warnings: Vec<String>,
}

/// Store an inline image and register it in the media library. Returns the
/// public URL, or `None` when the post must go out without an image. Every
/// problem is pushed onto `warnings`.
async fn store_image<S: Backend, B: BlobStore>(
  state: &AppState<S, B>,
  image: InlineImage,
  warnings: &mut Vec<String>,
) -> Option<String> {
  let data = match B64.decode(image.data.trim()) {
    Ok(data) => data,
    Err(e) => {
      warnings.push(format!("image was not valid base64: {e}"));
      return None;
    }
  };
  let file_name = sanitize_file_name(&image.file_name);
  let size = data.len() as u64;

  let blob = match state.blobs.put(file_name.clone(), image.content_type.clone(), data).await {
    Ok(blob) => blob,
    Err(e) => {
      tracing::warn!(error = %e, %file_name, "post image upload failed");
      warnings.push("image upload failed; the post was saved without an image".to_owned());
      return None;
    }
  };

  let asset = NewMediaAsset {
    url: blob.url.clone(),
    storage_key: blob.key,
    file_name,
    content_type: image.content_type,
    size,
    category: POST_IMAGE_CATEGORY.to_owned(),
  };
  if let Err(e) = state.store.add_media(asset).await {
    tracing::warn!(error = %e, url = %blob.url, "post image not added to the media library");
    warnings.push("image saved but not added to the media library".to_owned());
  }
  Some(blob.url)
}

/// `POST /admin/posts`
///
/// The post is created even if its image cannot be stored; the response
/// then lists the problem under `warnings`.
pub async fn create<S: Backend, B: BlobStore>(
  session: AdminSession<PostsAccess>,
  State(state): State<AppState<S, B>>,
  Json(body): Json<CreatePostBody>,
) -> Result<(StatusCode, Json<CreatedPost>), ApiError> {
  let mut input = body.post;
  input.validate()?;

  let mut warnings = Vec::new();
  if let Some(image) = body.image
    && let Some(url) = store_image(&state, image, &mut warnings).await
  {
    input.image_url = Some(url);
  }

  let post = state
    .store
    .create_post(session.identity.user_id, input)
    .await
    .map_err(ApiError::store)?;
  tracing::info!(post_id = %post.post_id, author = %session.identity.email, "post created");
  Ok((StatusCode::CREATED, Json(CreatedPost { post, warnings })))
}

/// `PUT /admin/posts/{id}`
pub async fn update<S: Backend, B: BlobStore>(
  _session: AdminSession<PostsAccess>,
  State(state): State<AppState<S, B>>,
  Path(id): Path<Uuid>,
  Json(patch): Json<PostPatch>,
) -> Result<Json<Post>, ApiError> {
  patch.validate()?;
  let post = state
    .store
    .update_post(id, patch)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("post {id} not found")))?;
  Ok(Json(post))
}

/// `DELETE /admin/posts/{id}`
pub async fn delete_one<S: Backend, B: BlobStore>(
  session: AdminSession<PostsAccess>,
  State(state): State<AppState<S, B>>,
  Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
  if !state.store.delete_post(id).await.map_err(ApiError::store)? {
    return Err(ApiError::NotFound(format!("post {id} not found")));
  }
  tracing::info!(post_id = %id, by = %session.identity.email, "post deleted");
  Ok(StatusCode::NO_CONTENT)
}
