//! [`SqliteStore`], the SQLite implementation of [`SiteStore`].

use std::path::Path;

use chrono::Duration;
use rusqlite::{OptionalExtension as _, TransactionBehavior};
use tokio::sync::broadcast;
use uuid::Uuid;

use sadaka_core::{
  media::{MediaAsset, MediaKind, NewMediaAsset},
  post::{NewPost, Post, PostPatch},
  store::{SiteEvent, SiteStore, StatusChange, SubmissionQuery},
  submission::{
    Author, Collection, ReplyDraft, Status, Submission, SubmissionForm,
  },
};

use crate::{
  Error, Result,
  encode::{RawMedia, RawPost, RawReply, RawSubmission, encode_dt, encode_uuid, now},
  schema::SCHEMA,
};

/// Capacity of the change-feed channel. Slow subscribers past this lag.
const EVENT_CAPACITY: usize = 256;

/// Default lifetime of a bearer session.
pub(crate) const DEFAULT_SESSION_TTL_HOURS: i64 = 24 * 7;

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Sadaka document store backed by a single SQLite file.
///
/// Cloning is cheap: the inner connection and the change-feed sender are
/// reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn:        tokio_rusqlite::Connection,
  pub(crate) events:      broadcast::Sender<SiteEvent>,
  pub(crate) session_ttl: Duration,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    Self::init(conn).await
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    Self::init(conn).await
  }

  async fn init(conn: tokio_rusqlite::Connection) -> Result<Self> {
    conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    let (events, _) = broadcast::channel(EVENT_CAPACITY);
    Ok(Self {
      conn,
      events,
      session_ttl: Duration::hours(DEFAULT_SESSION_TTL_HOURS),
    })
  }

  /// Override how long issued sessions stay valid.
  pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
    self.session_ttl = ttl;
    self
  }

  /// Subscribe to the change feed. Only events emitted after this call are
  /// received.
  pub fn subscribe(&self) -> broadcast::Receiver<SiteEvent> {
    self.events.subscribe()
  }

  pub(crate) fn emit(&self, event: SiteEvent) {
    // No subscribers is not an error: nobody is listening yet.
    if self.events.send(event).is_err() {
      tracing::trace!("change feed has no subscribers");
    }
  }
}

// ─── Row loaders (run on the connection thread) ──────────────────────────────

fn load_replies(
  conn: &rusqlite::Connection,
  id: &str,
) -> rusqlite::Result<Vec<RawReply>> {
  let mut stmt = conn.prepare_cached(
    "SELECT seq, reply_id, message, author_id, author_email, created_at
     FROM replies WHERE submission_id = ?1 ORDER BY seq",
  )?;
  let rows = stmt
    .query_map(rusqlite::params![id], RawReply::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(rows)
}

fn load_submission(
  conn: &rusqlite::Connection,
  collection: &str,
  id: &str,
) -> rusqlite::Result<Option<RawSubmission>> {
  let head = conn
    .query_row(
      "SELECT id, status, form_json, created_at
       FROM submissions WHERE id = ?1 AND collection = ?2",
      rusqlite::params![id, collection],
      |row| {
        Ok(RawSubmission {
          id:         row.get(0)?,
          status:     row.get(1)?,
          form_json:  row.get(2)?,
          created_at: row.get(3)?,
          replies:    Vec::new(),
        })
      },
    )
    .optional()?;

  match head {
    None => Ok(None),
    Some(mut raw) => {
      raw.replies = load_replies(conn, id)?;
      Ok(Some(raw))
    }
  }
}

/// Before/after snapshots of one write, `None` if the submission is missing.
type RawTransition = Option<(RawSubmission, RawSubmission)>;

fn decode_transition(raw: RawTransition) -> Result<Option<(Submission, Submission)>> {
  raw
    .map(|(before, after)| -> Result<_> {
      Ok((before.into_submission()?, after.into_submission()?))
    })
    .transpose()
}

// ─── SiteStore impl ──────────────────────────────────────────────────────────

impl SiteStore for SqliteStore {
  type Error = Error;

  // ── Submissions ───────────────────────────────────────────────────────────

  async fn add_submission(&self, form: SubmissionForm) -> Result<Submission> {
    let collection = form.collection();
    let submission = Submission {
      id: Uuid::new_v4(),
      created_at: now(),
      status: collection.initial_status(),
      form,
      replies: Vec::new(),
    };

    let id_str     = encode_uuid(submission.id);
    let coll_str   = collection.as_str();
    let status_str = submission.status.as_str();
    let form_json  = serde_json::to_string(&submission.form)?;
    let at_str     = encode_dt(submission.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO submissions (id, collection, status, form_json, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![id_str, coll_str, status_str, form_json, at_str],
        )?;
        Ok(())
      })
      .await?;

    tracing::debug!(id = %submission.id, %collection, "submission stored");
    Ok(submission)
  }

  async fn get_submission(
    &self,
    collection: Collection,
    id: Uuid,
  ) -> Result<Option<Submission>> {
    let id_str = encode_uuid(id);
    let raw = self
      .conn
      .call(move |conn| Ok(load_submission(conn, collection.as_str(), &id_str)?))
      .await?;
    raw.map(RawSubmission::into_submission).transpose()
  }

  async fn list_submissions(
    &self,
    collection: Collection,
    query: SubmissionQuery,
  ) -> Result<Vec<Submission>> {
    let status_str = query.status.map(Status::as_str);
    let limit_val  = query.limit.unwrap_or(100) as i64;
    let offset_val = query.offset.unwrap_or(0) as i64;

    let raws: Vec<RawSubmission> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT id, status, form_json, created_at
           FROM submissions
           WHERE collection = ?1 AND (?2 IS NULL OR status = ?2)
           ORDER BY created_at DESC, rowid DESC
           LIMIT ?3 OFFSET ?4",
        )?;
        let mut rows = stmt
          .query_map(
            rusqlite::params![collection.as_str(), status_str, limit_val, offset_val],
            |row| {
              Ok(RawSubmission {
                id:         row.get(0)?,
                status:     row.get(1)?,
                form_json:  row.get(2)?,
                created_at: row.get(3)?,
                replies:    Vec::new(),
              })
            },
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        for raw in &mut rows {
          raw.replies = load_replies(conn, &raw.id)?;
        }
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSubmission::into_submission).collect()
  }

  async fn append_reply(
    &self,
    collection: Collection,
    id: Uuid,
    draft: ReplyDraft,
    author: Author,
  ) -> Result<Option<Submission>> {
    let id_str       = encode_uuid(id);
    let reply_id_str = encode_uuid(Uuid::new_v4());
    let message      = draft.into_message();
    let author_id    = encode_uuid(author.user_id);
    let author_email = author.email;
    let at_str       = encode_dt(now());

    let raw: RawTransition = self
      .conn
      .call(move |conn| {
        // IMMEDIATE takes the write lock up front, so the MAX(seq) read and
        // the insert cannot interleave with another writer.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let Some(before) = load_submission(&tx, collection.as_str(), &id_str)? else {
          return Ok(None);
        };

        tx.execute(
          "INSERT INTO replies
             (submission_id, seq, reply_id, message, author_id, author_email, created_at)
           SELECT ?1, COALESCE(MAX(seq) + 1, 0), ?2, ?3, ?4, ?5, ?6
           FROM replies WHERE submission_id = ?1",
          rusqlite::params![id_str, reply_id_str, message, author_id, author_email, at_str],
        )?;
        tx.execute(
          "UPDATE submissions SET status = ?2 WHERE id = ?1",
          rusqlite::params![id_str, Status::Replied.as_str()],
        )?;

        let after = load_submission(&tx, collection.as_str(), &id_str)?;
        tx.commit()?;
        Ok(after.map(|after| (before, after)))
      })
      .await?;

    let Some((before, after)) = decode_transition(raw)? else {
      return Ok(None);
    };
    tracing::info!(
      %id,
      %collection,
      replies = after.replies.len(),
      "reply appended"
    );
    self.emit(SiteEvent::SubmissionUpdated {
      before: Box::new(before),
      after:  Box::new(after.clone()),
    });
    Ok(Some(after))
  }

  async fn change_status(
    &self,
    collection: Collection,
    id: Uuid,
    status: Status,
  ) -> Result<Option<StatusChange>> {
    let id_str = encode_uuid(id);

    let raw: Option<(RawSubmission, RawSubmission, bool)> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let Some(before) = load_submission(&tx, collection.as_str(), &id_str)? else {
          return Ok(None);
        };
        if before.status == status.as_str() {
          let same = load_submission(&tx, collection.as_str(), &id_str)?;
          return Ok(same.map(|same| (before, same, false)));
        }

        tx.execute(
          "UPDATE submissions SET status = ?2 WHERE id = ?1",
          rusqlite::params![id_str, status.as_str()],
        )?;
        let after = load_submission(&tx, collection.as_str(), &id_str)?;
        tx.commit()?;
        Ok(after.map(|after| (before, after, true)))
      })
      .await?;

    let Some((before, after, changed)) = raw else {
      return Ok(None);
    };
    let before = before.into_submission()?;
    let after = after.into_submission()?;

    if changed {
      tracing::info!(%id, %collection, from = %before.status, to = %status, "status changed");
      self.emit(SiteEvent::SubmissionUpdated {
        before: Box::new(before),
        after:  Box::new(after.clone()),
      });
    }
    Ok(Some(StatusChange { submission: after, changed }))
  }

  async fn delete_submission(&self, collection: Collection, id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(id);
    let deleted = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "DELETE FROM replies WHERE submission_id = ?1
             AND EXISTS (SELECT 1 FROM submissions WHERE id = ?1 AND collection = ?2)",
          rusqlite::params![id_str, collection.as_str()],
        )?;
        let n = tx.execute(
          "DELETE FROM submissions WHERE id = ?1 AND collection = ?2",
          rusqlite::params![id_str, collection.as_str()],
        )?;
        tx.commit()?;
        Ok(n > 0)
      })
      .await?;

    if deleted {
      tracing::info!(%id, %collection, "submission deleted");
    }
    Ok(deleted)
  }

  // ── Posts ─────────────────────────────────────────────────────────────────

  async fn create_post(&self, author_id: Uuid, input: NewPost) -> Result<Post> {
    let now = now();
    let post = Post {
      post_id: Uuid::new_v4(),
      title: input.title.trim().to_owned(),
      body: input.body,
      category: input.category.trim().to_owned(),
      image_url: input.image_url.filter(|u| !u.is_empty()),
      published: input.published,
      author_id,
      created_at: now,
      updated_at: now,
    };

    let raw = (
      encode_uuid(post.post_id),
      post.title.clone(),
      post.body.clone(),
      post.category.clone(),
      post.image_url.clone(),
      post.published,
      encode_uuid(author_id),
      encode_dt(now),
    );

    self
      .conn
      .call(move |conn| {
        let (id, title, body, category, image_url, published, author, at) = raw;
        conn.execute(
          "INSERT INTO posts
             (post_id, title, body, category, image_url, published, author_id, created_at, updated_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)",
          rusqlite::params![id, title, body, category, image_url, published, author, at],
        )?;
        Ok(())
      })
      .await?;

    Ok(post)
  }

  async fn get_post(&self, id: Uuid) -> Result<Option<Post>> {
    let id_str = encode_uuid(id);
    let raw: Option<RawPost> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {} FROM posts WHERE post_id = ?1", RawPost::COLUMNS),
            rusqlite::params![id_str],
            RawPost::from_row,
          )
          .optional()?)
      })
      .await?;
    raw.map(RawPost::into_post).transpose()
  }

  async fn list_posts(&self, published_only: bool) -> Result<Vec<Post>> {
    let raws: Vec<RawPost> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {} FROM posts
           WHERE (?1 = 0 OR published = 1)
           ORDER BY created_at DESC, rowid DESC",
          RawPost::COLUMNS
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![published_only], RawPost::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawPost::into_post).collect()
  }

  async fn update_post(&self, id: Uuid, patch: PostPatch) -> Result<Option<Post>> {
    let Some(mut post) = self.get_post(id).await? else {
      return Ok(None);
    };
    patch.apply(&mut post);
    post.updated_at = now();

    let raw = (
      encode_uuid(post.post_id),
      post.title.clone(),
      post.body.clone(),
      post.category.clone(),
      post.image_url.clone(),
      post.published,
      encode_dt(post.updated_at),
    );

    let updated = self
      .conn
      .call(move |conn| {
        let (id, title, body, category, image_url, published, at) = raw;
        let n = conn.execute(
          "UPDATE posts
           SET title = ?2, body = ?3, category = ?4, image_url = ?5,
               published = ?6, updated_at = ?7
           WHERE post_id = ?1",
          rusqlite::params![id, title, body, category, image_url, published, at],
        )?;
        Ok(n > 0)
      })
      .await?;

    Ok(updated.then_some(post))
  }

  async fn delete_post(&self, id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(id);
    let n = self
      .conn
      .call(move |conn| {
        Ok(conn.execute("DELETE FROM posts WHERE post_id = ?1", rusqlite::params![id_str])?)
      })
      .await?;
    Ok(n > 0)
  }

  // ── Media ─────────────────────────────────────────────────────────────────

  async fn add_media(&self, input: NewMediaAsset) -> Result<MediaAsset> {
    let asset = MediaAsset {
      media_id:     Uuid::new_v4(),
      kind:         MediaKind::from_mime(&input.content_type),
      url:          input.url,
      storage_key:  input.storage_key,
      file_name:    input.file_name,
      content_type: input.content_type,
      size:         input.size,
      category:     input.category.trim().to_owned(),
      uploaded_at:  now(),
    };

    let raw = RawMedia {
      media_id:     encode_uuid(asset.media_id),
      url:          asset.url.clone(),
      storage_key:  asset.storage_key.clone(),
      file_name:    asset.file_name.clone(),
      content_type: asset.content_type.clone(),
      kind:         asset.kind.as_str().to_owned(),
      size:         i64::try_from(asset.size)
        .map_err(|_| Error::Decode(format!("media too large: {}", asset.size)))?,
      category:     asset.category.clone(),
      uploaded_at:  encode_dt(asset.uploaded_at),
    };

    self
      .conn
      .call(move |conn| {
        conn.execute(
          &format!(
            "INSERT INTO media ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            RawMedia::COLUMNS
          ),
          rusqlite::params![
            raw.media_id,
            raw.url,
            raw.storage_key,
            raw.file_name,
            raw.content_type,
            raw.kind,
            raw.size,
            raw.category,
            raw.uploaded_at,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(asset)
  }

  async fn get_media(&self, id: Uuid) -> Result<Option<MediaAsset>> {
    let id_str = encode_uuid(id);
    let raw: Option<RawMedia> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            &format!("SELECT {} FROM media WHERE media_id = ?1", RawMedia::COLUMNS),
            rusqlite::params![id_str],
            RawMedia::from_row,
          )
          .optional()?)
      })
      .await?;
    raw.map(RawMedia::into_media).transpose()
  }

  async fn list_media(&self, category: Option<String>) -> Result<Vec<MediaAsset>> {
    let raws: Vec<RawMedia> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {} FROM media
           WHERE (?1 IS NULL OR category = ?1)
           ORDER BY uploaded_at DESC, rowid DESC",
          RawMedia::COLUMNS
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![category], RawMedia::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawMedia::into_media).collect()
  }

  async fn delete_media(&self, id: Uuid) -> Result<Option<MediaAsset>> {
    let Some(asset) = self.get_media(id).await? else {
      return Ok(None);
    };
    let id_str = encode_uuid(id);
    let n = self
      .conn
      .call(move |conn| {
        Ok(conn.execute("DELETE FROM media WHERE media_id = ?1", rusqlite::params![id_str])?)
      })
      .await?;
    Ok((n > 0).then_some(asset))
  }
}
