//! Media library descriptors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Coarse type tag derived from a MIME type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
  Image,
  Video,
  Audio,
  Document,
  Other,
}

impl MediaKind {
  pub fn from_mime(mime: &str) -> Self {
    let mime = mime.trim().to_ascii_lowercase();
    let essence = mime.split(';').next().unwrap_or_default().trim();
    match essence.split_once('/') {
      Some(("image", _)) => Self::Image,
      Some(("video", _)) => Self::Video,
      Some(("audio", _)) => Self::Audio,
      Some(("text", _)) => Self::Document,
      Some(("application", sub))
        if sub == "pdf"
          || sub == "msword"
          || sub.starts_with("vnd.openxmlformats-officedocument")
          || sub.starts_with("vnd.oasis.opendocument") =>
      {
        Self::Document
      }
      _ => Self::Other,
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Image => "image",
      Self::Video => "video",
      Self::Audio => "audio",
      Self::Document => "document",
      Self::Other => "other",
    }
  }
}

/// A stored file. Deleting it does not touch documents that reference it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaAsset {
  pub media_id:     Uuid,
  pub url:          String,
  /// Backend key used to delete the blob.
  pub storage_key:  String,
  pub file_name:    String,
  pub content_type: String,
  pub kind:         MediaKind,
  pub size:         u64,
  pub category:     String,
  pub uploaded_at:  DateTime<Utc>,
}

/// Input to [`crate::store::SiteStore::add_media`], built after the blob
/// upload succeeded.
#[derive(Debug, Clone)]
pub struct NewMediaAsset {
  pub url:          String,
  pub storage_key:  String,
  pub file_name:    String,
  pub content_type: String,
  pub size:         u64,
  pub category:     String,
}

/// Reduce a client-supplied file name to a safe final path component.
pub fn sanitize_file_name(name: &str) -> String {
  let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
  let cleaned: String = base
    .chars()
    .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') { c } else { '_' })
    .collect();
  let cleaned = cleaned.trim_matches('.').to_owned();
  if cleaned.is_empty() { "upload".to_owned() } else { cleaned }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn kinds_from_mime() {
    assert_eq!(MediaKind::from_mime("image/png"), MediaKind::Image);
    assert_eq!(MediaKind::from_mime("Video/MP4"), MediaKind::Video);
    assert_eq!(MediaKind::from_mime("audio/mpeg"), MediaKind::Audio);
    assert_eq!(MediaKind::from_mime("application/pdf"), MediaKind::Document);
    assert_eq!(MediaKind::from_mime("text/plain; charset=utf-8"), MediaKind::Document);
    assert_eq!(MediaKind::from_mime("application/zip"), MediaKind::Other);
    assert_eq!(MediaKind::from_mime(""), MediaKind::Other);
  }

  #[test]
  fn file_names_are_flattened() {
    assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
    assert_eq!(sanitize_file_name("C:\\photos\\eid 2024.jpg"), "eid_2024.jpg");
    assert_eq!(sanitize_file_name(".."), "upload");
  }
}
