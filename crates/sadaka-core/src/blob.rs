//! Blob storage abstraction for uploaded files.

use std::future::Future;

/// Where a blob ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
  /// Durable public URL.
  pub url: String,
  /// Backend-specific key, passed back to [`BlobStore::delete`].
  pub key: String,
}

pub trait BlobStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Store `data` under a name derived from `file_name`.
  fn put(
    &self,
    file_name: String,
    content_type: String,
    data: Vec<u8>,
  ) -> impl Future<Output = Result<StoredBlob, Self::Error>> + Send + '_;

  /// Remove a blob. Returns `false` if it did not exist.
  fn delete(
    &self,
    key: String,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;
}
