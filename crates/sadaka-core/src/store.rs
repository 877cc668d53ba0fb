//! The `SiteStore` trait and supporting query and event types.
//!
//! The trait is implemented by storage backends (e.g. `sadaka-store-sqlite`).
//! Higher layers (`sadaka-api`, `sadaka-server`) depend on this abstraction,
//! not on any concrete backend.

use std::future::Future;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  identity::PasswordReset,
  media::{MediaAsset, NewMediaAsset},
  post::{NewPost, Post, PostPatch},
  submission::{Author, Collection, ReplyDraft, Status, Submission, SubmissionForm},
};

// ─── Query types ─────────────────────────────────────────────────────────────

/// Parameters for [`SiteStore::list_submissions`]. Results are newest first.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubmissionQuery {
  pub status: Option<Status>,
  pub limit:  Option<usize>,
  pub offset: Option<usize>,
}

/// Result of [`SiteStore::change_status`].
#[derive(Debug, Clone, Serialize)]
pub struct StatusChange {
  pub submission: Submission,
  /// `false` when the submission already had the requested status.
  pub changed:    bool,
}

// ─── Change feed ─────────────────────────────────────────────────────────────

/// A document-level change observed by background consumers (notifications).
#[derive(Debug, Clone)]
pub enum SiteEvent {
  SubmissionUpdated {
    before: Box<Submission>,
    after:  Box<Submission>,
  },
  PasswordResetRequested(PasswordReset),
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over the document store backing the site.
///
/// Replies are append-only: an append never rewrites earlier replies, and two
/// concurrent appends to one submission both persist.
pub trait SiteStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Submissions ───────────────────────────────────────────────────────

  /// Persist a new submission in the collection its form belongs to, with
  /// that collection's initial status. The form is assumed validated.
  fn add_submission(
    &self,
    form: SubmissionForm,
  ) -> impl Future<Output = Result<Submission, Self::Error>> + Send + '_;

  /// Fetch a submission with its replies. `None` if it does not exist in
  /// `collection`.
  fn get_submission(
    &self,
    collection: Collection,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Submission>, Self::Error>> + Send + '_;

  fn list_submissions(
    &self,
    collection: Collection,
    query: SubmissionQuery,
  ) -> impl Future<Output = Result<Vec<Submission>, Self::Error>> + Send + '_;

  /// Atomically append a reply and set the status to
  /// [`Status::Replied`]. Returns the updated submission, `None` if it does
  /// not exist in `collection`.
  fn append_reply(
    &self,
    collection: Collection,
    id: Uuid,
    draft: ReplyDraft,
    author: Author,
  ) -> impl Future<Output = Result<Option<Submission>, Self::Error>> + Send + '_;

  /// Set the status. Idempotent: repeating a call changes nothing.
  fn change_status(
    &self,
    collection: Collection,
    id: Uuid,
    status: Status,
  ) -> impl Future<Output = Result<Option<StatusChange>, Self::Error>> + Send + '_;

  /// Delete a submission and its replies. Returns `false` if not found.
  fn delete_submission(
    &self,
    collection: Collection,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Posts ─────────────────────────────────────────────────────────────

  fn create_post(
    &self,
    author_id: Uuid,
    input: NewPost,
  ) -> impl Future<Output = Result<Post, Self::Error>> + Send + '_;

  fn get_post(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Post>, Self::Error>> + Send + '_;

  /// All posts, newest first; only published ones if `published_only`.
  fn list_posts(
    &self,
    published_only: bool,
  ) -> impl Future<Output = Result<Vec<Post>, Self::Error>> + Send + '_;

  fn update_post(
    &self,
    id: Uuid,
    patch: PostPatch,
  ) -> impl Future<Output = Result<Option<Post>, Self::Error>> + Send + '_;

  fn delete_post(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Media ─────────────────────────────────────────────────────────────

  fn add_media(
    &self,
    input: NewMediaAsset,
  ) -> impl Future<Output = Result<MediaAsset, Self::Error>> + Send + '_;

  fn get_media(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<MediaAsset>, Self::Error>> + Send + '_;

  /// Newest first, optionally restricted to one category.
  fn list_media(
    &self,
    category: Option<String>,
  ) -> impl Future<Output = Result<Vec<MediaAsset>, Self::Error>> + Send + '_;

  /// Remove the descriptor and return it, so the caller can delete the blob.
  fn delete_media(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<MediaAsset>, Self::Error>> + Send + '_;
}
