//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microseconds, `Z`)
//! so lexical order equals chronological order. Submission forms are stored
//! as their tagged JSON. UUIDs are stored as hyphenated lowercase strings.

use chrono::{DateTime, SecondsFormat, SubsecRound as _, Utc};
use sadaka_core::{
  media::{MediaAsset, MediaKind},
  post::Post,
  submission::{Author, Reply, Submission, SubmissionForm},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

/// The current time at the precision the store keeps.
pub fn now() -> DateTime<Utc> { Utc::now().trunc_subsecs(6) }

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::Decode(format!("bad timestamp {s:?}: {e}")))
}

// ─── MediaKind ───────────────────────────────────────────────────────────────

pub fn decode_media_kind(s: &str) -> Result<MediaKind> {
  match s {
    "image" => Ok(MediaKind::Image),
    "video" => Ok(MediaKind::Video),
    "audio" => Ok(MediaKind::Audio),
    "document" => Ok(MediaKind::Document),
    "other" => Ok(MediaKind::Other),
    other => Err(Error::Decode(format!("unknown media kind: {other:?}"))),
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read from a `replies` row.
pub struct RawReply {
  pub seq:          i64,
  pub reply_id:     String,
  pub message:      String,
  pub author_id:    String,
  pub author_email: String,
  pub created_at:   String,
}

impl RawReply {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      seq:          row.get(0)?,
      reply_id:     row.get(1)?,
      message:      row.get(2)?,
      author_id:    row.get(3)?,
      author_email: row.get(4)?,
      created_at:   row.get(5)?,
    })
  }

  pub fn into_reply(self) -> Result<Reply> {
    Ok(Reply {
      reply_id:   decode_uuid(&self.reply_id)?,
      seq:        u32::try_from(self.seq)
        .map_err(|_| Error::Decode(format!("bad reply seq {}", self.seq)))?,
      message:    self.message,
      author:     Author {
        user_id: decode_uuid(&self.author_id)?,
        email:   self.author_email,
      },
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read from a `submissions` row plus its reply rows.
pub struct RawSubmission {
  pub id:         String,
  pub status:     String,
  pub form_json:  String,
  pub created_at: String,
  pub replies:    Vec<RawReply>,
}

impl RawSubmission {
  pub fn into_submission(self) -> Result<Submission> {
    let form: SubmissionForm = serde_json::from_str(&self.form_json)?;
    let replies = self
      .replies
      .into_iter()
      .map(RawReply::into_reply)
      .collect::<Result<Vec<_>>>()?;

    Ok(Submission {
      id: decode_uuid(&self.id)?,
      created_at: decode_dt(&self.created_at)?,
      status: self.status.parse()?,
      form,
      replies,
    })
  }
}

/// Raw strings read from a `posts` row.
pub struct RawPost {
  pub post_id:    String,
  pub title:      String,
  pub body:       String,
  pub category:   String,
  pub image_url:  Option<String>,
  pub published:  bool,
  pub author_id:  String,
  pub created_at: String,
  pub updated_at: String,
}

impl RawPost {
  pub const COLUMNS: &'static str = "post_id, title, body, category, image_url, \
                                     published, author_id, created_at, updated_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      post_id:    row.get(0)?,
      title:      row.get(1)?,
      body:       row.get(2)?,
      category:   row.get(3)?,
      image_url:  row.get(4)?,
      published:  row.get(5)?,
      author_id:  row.get(6)?,
      created_at: row.get(7)?,
      updated_at: row.get(8)?,
    })
  }

  pub fn into_post(self) -> Result<Post> {
    Ok(Post {
      post_id:    decode_uuid(&self.post_id)?,
      title:      self.title,
      body:       self.body,
      category:   self.category,
      image_url:  self.image_url,
      published:  self.published,
      author_id:  decode_uuid(&self.author_id)?,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw strings read from a `media` row.
pub struct RawMedia {
  pub media_id:     String,
  pub url:          String,
  pub storage_key:  String,
  pub file_name:    String,
  pub content_type: String,
  pub kind:         String,
  pub size:         i64,
  pub category:     String,
  pub uploaded_at:  String,
}

impl RawMedia {
  pub const COLUMNS: &'static str = "media_id, url, storage_key, file_name, \
                                     content_type, kind, size, category, uploaded_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      media_id:     row.get(0)?,
      url:          row.get(1)?,
      storage_key:  row.get(2)?,
      file_name:    row.get(3)?,
      content_type: row.get(4)?,
      kind:         row.get(5)?,
      size:         row.get(6)?,
      category:     row.get(7)?,
      uploaded_at:  row.get(8)?,
    })
  }

  pub fn into_media(self) -> Result<MediaAsset> {
    Ok(MediaAsset {
      media_id:     decode_uuid(&self.media_id)?,
      url:          self.url,
      storage_key:  self.storage_key,
      file_name:    self.file_name,
      content_type: self.content_type,
      kind:         decode_media_kind(&self.kind)?,
      size:         u64::try_from(self.size)
        .map_err(|_| Error::Decode(format!("bad media size {}", self.size)))?,
      category:     self.category,
      uploaded_at:  decode_dt(&self.uploaded_at)?,
    })
  }
}
