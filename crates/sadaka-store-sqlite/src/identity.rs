//! [`IdentityProvider`] implementation: argon2 password hashes, opaque bearer
//! tokens stored as SHA-256 digests, and single-use reset tokens.

use argon2::{
  Argon2, PasswordHash, PasswordHasher as _, PasswordVerifier as _,
  password_hash::SaltString,
};
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD as B64;
use chrono::Duration;
use rand_core::{OsRng, RngCore as _};
use rusqlite::OptionalExtension as _;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use sadaka_core::{
  identity::{Identity, IdentityProvider, PasswordReset, Session, normalize_email},
  store::SiteEvent,
};

use crate::{
  Error, Result, SqliteStore,
  encode::{decode_dt, decode_uuid, encode_dt, encode_uuid, now},
};

/// How long a password reset link stays valid.
const RESET_TTL_MINUTES: i64 = 60;

// ─── Helpers ─────────────────────────────────────────────────────────────────

pub(crate) fn hash_password(password: &str) -> Result<String> {
  let salt = SaltString::generate(&mut OsRng);
  Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .map(|h| h.to_string())
    .map_err(|e| Error::PasswordHash(e.to_string()))
}

fn verify_password(password: &str, phc: &str) -> bool {
  let Ok(parsed) = PasswordHash::new(phc) else {
    return false;
  };
  Argon2::default()
    .verify_password(password.as_bytes(), &parsed)
    .is_ok()
}

/// [`hash_password`] on the blocking pool.
async fn hash_password_off_runtime(password: String) -> Result<String> {
  tokio::task::spawn_blocking(move || hash_password(&password)).await?
}

/// [`verify_password`] on the blocking pool.
async fn verify_password_off_runtime(password: String, phc: String) -> Result<bool> {
  Ok(tokio::task::spawn_blocking(move || verify_password(&password, &phc)).await?)
}

/// 256 random bits, URL-safe base64.
fn new_token() -> String {
  let mut buf = [0u8; 32];
  OsRng.fill_bytes(&mut buf);
  B64.encode(buf)
}

fn token_digest(token: &str) -> String {
  hex::encode(Sha256::digest(token.as_bytes()))
}

struct RawIdentity {
  user_id: String,
  email:   String,
}

impl RawIdentity {
  fn into_identity(self) -> Result<Identity> {
    Ok(Identity { user_id: decode_uuid(&self.user_id)?, email: self.email })
  }
}

// ─── IdentityProvider impl ───────────────────────────────────────────────────

impl IdentityProvider for SqliteStore {
  type Error = Error;

  async fn create_account(&self, email: String, password: String) -> Result<Option<Identity>> {
    let identity = Identity { user_id: Uuid::new_v4(), email: normalize_email(&email) };
    let hash = hash_password_off_runtime(password).await?;

    let id_str    = encode_uuid(identity.user_id);
    let email_str = identity.email.clone();
    let at_str    = encode_dt(now());

    let inserted = self
      .conn
      .call(move |conn| {
        let n = conn.execute(
          "INSERT INTO users (user_id, email, password_hash, created_at)
           VALUES (?1, ?2, ?3, ?4)
           ON CONFLICT (email) DO NOTHING",
          rusqlite::params![id_str, email_str, hash, at_str],
        )?;
        Ok(n > 0)
      })
      .await?;

    if !inserted {
      tracing::debug!(email = %identity.email, "account already exists");
      return Ok(None);
    }
    tracing::info!(user_id = %identity.user_id, email = %identity.email, "account created");
    Ok(Some(identity))
  }

  async fn sign_in(&self, email: String, password: String) -> Result<Option<Session>> {
    let email = normalize_email(&email);
    let lookup = email.clone();

    let row: Option<(String, String)> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT user_id, password_hash FROM users WHERE email = ?1",
            rusqlite::params![lookup],
            |row| Ok((row.get(0)?, row.get(1)?)),
          )
          .optional()?)
      })
      .await?;

    let Some((user_id, phc)) = row else {
      return Ok(None);
    };
    if !verify_password_off_runtime(password, phc).await? {
      return Ok(None);
    }

    let token      = new_token();
    let now        = now();
    let expires_at = now + self.session_ttl;

    let digest  = token_digest(&token);
    let uid_str = user_id.clone();
    let now_str = encode_dt(now);
    let exp_str = encode_dt(expires_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO sessions (token_hash, user_id, created_at, expires_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![digest, uid_str, now_str, exp_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(Some(Session {
      token,
      identity: Identity { user_id: decode_uuid(&user_id)?, email },
      expires_at,
    }))
  }

  async fn sign_out(&self, token: String) -> Result<Option<Identity>> {
    let digest = token_digest(&token);
    let raw: Option<RawIdentity> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let raw = tx
          .query_row(
            "SELECT u.user_id, u.email
             FROM sessions s JOIN users u ON u.user_id = s.user_id
             WHERE s.token_hash = ?1",
            rusqlite::params![digest],
            |row| Ok(RawIdentity { user_id: row.get(0)?, email: row.get(1)? }),
          )
          .optional()?;
        tx.execute("DELETE FROM sessions WHERE token_hash = ?1", rusqlite::params![digest])?;
        tx.commit()?;
        Ok(raw)
      })
      .await?;
    raw.map(RawIdentity::into_identity).transpose()
  }

  async fn current_user(&self, token: String) -> Result<Option<Identity>> {
    let digest = token_digest(&token);
    let row: Option<(RawIdentity, String)> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT u.user_id, u.email, s.expires_at
             FROM sessions s JOIN users u ON u.user_id = s.user_id
             WHERE s.token_hash = ?1",
            rusqlite::params![digest],
            |row| {
              Ok((
                RawIdentity { user_id: row.get(0)?, email: row.get(1)? },
                row.get(2)?,
              ))
            },
          )
          .optional()?)
      })
      .await?;

    let Some((raw, expires_at)) = row else {
      return Ok(None);
    };
    if decode_dt(&expires_at)? <= now() {
      let digest = token_digest(&token);
      self
        .conn
        .call(move |conn| {
          conn.execute("DELETE FROM sessions WHERE token_hash = ?1", rusqlite::params![digest])?;
          Ok(())
        })
        .await?;
      return Ok(None);
    }
    raw.into_identity().map(Some)
  }

  async fn request_password_reset(&self, email: String) -> Result<Option<PasswordReset>> {
    let email = normalize_email(&email);
    let token = new_token();
    let expires_at = now() + Duration::minutes(RESET_TTL_MINUTES);

    let lookup  = email.clone();
    let digest  = token_digest(&token);
    let exp_str = encode_dt(expires_at);

    let issued = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let user_id: Option<String> = tx
          .query_row(
            "SELECT user_id FROM users WHERE email = ?1",
            rusqlite::params![lookup],
            |row| row.get(0),
          )
          .optional()?;
        let Some(user_id) = user_id else {
          return Ok(false);
        };
        tx.execute(
          "INSERT INTO password_resets (token_hash, user_id, expires_at) VALUES (?1, ?2, ?3)",
          rusqlite::params![digest, user_id, exp_str],
        )?;
        tx.commit()?;
        Ok(true)
      })
      .await?;

    if !issued {
      tracing::debug!("password reset requested for unknown email");
      return Ok(None);
    }

    let reset = PasswordReset { email, token, expires_at };
    self.emit(SiteEvent::PasswordResetRequested(reset.clone()));
    Ok(Some(reset))
  }

  async fn confirm_password_reset(&self, token: String, new_password: String) -> Result<bool> {
    let digest  = token_digest(&token);
    let hash    = hash_password_off_runtime(new_password).await?;
    let now_str = encode_dt(now());

    let reset = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        // Fixed-width timestamps compare correctly as text.
        let user_id: Option<String> = tx
          .query_row(
            "SELECT user_id FROM password_resets
             WHERE token_hash = ?1 AND used_at IS NULL AND expires_at > ?2",
            rusqlite::params![digest, now_str],
            |row| row.get(0),
          )
          .optional()?;
        let Some(user_id) = user_id else {
          return Ok(false);
        };
        tx.execute(
          "UPDATE password_resets SET used_at = ?2 WHERE token_hash = ?1",
          rusqlite::params![digest, now_str],
        )?;
        tx.execute(
          "UPDATE users SET password_hash = ?2 WHERE user_id = ?1",
          rusqlite::params![user_id, hash],
        )?;
        tx.execute("DELETE FROM sessions WHERE user_id = ?1", rusqlite::params![user_id])?;
        tx.commit()?;
        Ok(true)
      })
      .await?;

    if reset {
      tracing::info!("password reset completed");
    }
    Ok(reset)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn tokens_are_unique_and_urlsafe() {
    let a = new_token();
    let b = new_token();
    assert_ne!(a, b);
    assert_eq!(a.len(), 43);
    assert!(a.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
  }

  #[test]
  fn digest_is_stable_hex() {
    assert_eq!(token_digest("x"), token_digest("x"));
    assert_eq!(token_digest("x").len(), 64);
  }

  #[test]
  fn password_hash_verifies() {
    let phc = hash_password("hunter22").unwrap();
    assert!(verify_password("hunter22", &phc));
    assert!(!verify_password("hunter23", &phc));
    assert!(!verify_password("hunter22", "not-a-phc-string"));
  }

  /// A sign-in keeps the runtime thread free while argon2 runs: a task
  /// ticking every millisecond on the same thread never stalls for anything
  /// close to the cost of one hash.
  #[tokio::test(flavor = "current_thread")]
  async fn sign_in_hashes_off_the_runtime_thread() {
    use std::{
      sync::atomic::{AtomicBool, Ordering},
      time::{Duration as StdDuration, Instant},
    };

    let started = Instant::now();
    hash_password("timing-sample").unwrap();
    let one_hash = started.elapsed();

    let store = SqliteStore::open_in_memory().await.unwrap();
    store.create_account("a@x.com".into(), "password123".into()).await.unwrap();

    let done = AtomicBool::new(false);
    let heartbeat = async {
      let mut worst = StdDuration::ZERO;
      let mut last = Instant::now();
      while !done.load(Ordering::Relaxed) {
        tokio::time::sleep(StdDuration::from_millis(1)).await;
        worst = worst.max(last.elapsed());
        last = Instant::now();
      }
      worst
    };
    let sign_in = async {
      let session = store.sign_in("a@x.com".into(), "password123".into()).await;
      done.store(true, Ordering::Relaxed);
      session
    };

    let (worst_gap, session) = tokio::join!(heartbeat, sign_in);
    assert!(session.unwrap().is_some());
    assert!(
      worst_gap < one_hash / 2,
      "runtime stalled for {worst_gap:?}; one hash takes {one_hash:?}"
    );
  }
}
