//! [`BlobStore`] on the local filesystem, served back under `/media`.

use std::{io, path::PathBuf};

use sadaka_core::{
  blob::{BlobStore, StoredBlob},
  media::sanitize_file_name,
};
use uuid::Uuid;

/// Route prefix the media directory is served under.
pub const MEDIA_ROUTE: &str = "/media";

/// Stores each blob as one file in `root`. Keys are `<uuid>-<file name>`, so
/// uploads never collide and a key is always a single path component.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
  root:     PathBuf,
  base_url: String,
}

impl FsBlobStore {
  pub fn new(root: impl Into<PathBuf>, base_url: &str) -> Self {
    Self {
      root:     root.into(),
      base_url: base_url.trim_end_matches('/').to_owned(),
    }
  }

  pub fn url_for(&self, key: &str) -> String { format!("{}{MEDIA_ROUTE}/{key}", self.base_url) }

  fn path_for(&self, key: &str) -> io::Result<PathBuf> {
    if key.is_empty() || key.contains(['/', '\\']) || key.starts_with('.') {
      return Err(io::Error::new(io::ErrorKind::InvalidInput, format!("bad blob key {key:?}")));
    }
    Ok(self.root.join(key))
  }
}

impl BlobStore for FsBlobStore {
  type Error = io::Error;

  async fn put(
    &self,
    file_name: String,
    content_type: String,
    data: Vec<u8>,
  ) -> io::Result<StoredBlob> {
    let key = format!("{}-{}", Uuid::new_v4().simple(), sanitize_file_name(&file_name));
    let path = self.path_for(&key)?;
    tokio::fs::create_dir_all(&self.root).await?;
    tokio::fs::write(&path, &data).await?;
    tracing::debug!(%key, %content_type, size = data.len(), "blob written");
    Ok(StoredBlob { url: self.url_for(&key), key })
  }

  async fn delete(&self, key: String) -> io::Result<bool> {
    let path = self.path_for(&key)?;
    match tokio::fs::remove_file(&path).await {
      Ok(()) => Ok(true),
      Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
      Err(e) => Err(e),
    }
  }
}
