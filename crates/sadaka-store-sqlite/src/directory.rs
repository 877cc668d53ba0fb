//! [`RoleDirectory`] implementation over the `roles` table.

use rusqlite::OptionalExtension as _;
use uuid::Uuid;

use sadaka_core::{
  directory::{RoleAssignment, RoleDirectory},
  role::Role,
};

use crate::{
  Error, Result, SqliteStore,
  encode::{encode_dt, encode_uuid, now},
};

impl RoleDirectory for SqliteStore {
  type Error = Error;

  async fn resolve_role(&self, user_id: Uuid) -> Result<Option<Role>> {
    let id_str = encode_uuid(user_id);
    let raw: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(conn
          .query_row(
            "SELECT role FROM roles WHERE user_id = ?1",
            rusqlite::params![id_str],
            |row| row.get(0),
          )
          .optional()?)
      })
      .await?;

    Ok(raw.map(|r| r.parse::<Role>()).transpose()?)
  }

  async fn assign_role(&self, user_id: Uuid, role: Role) -> Result<Option<RoleAssignment>> {
    let id_str = encode_uuid(user_id);
    let at_str = encode_dt(now());

    let user_exists = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let exists = tx
          .query_row(
            "SELECT 1 FROM users WHERE user_id = ?1",
            rusqlite::params![id_str],
            |_| Ok(true),
          )
          .optional()?
          .unwrap_or(false);
        if !exists {
          return Ok(false);
        }
        tx.execute(
          "INSERT INTO roles (user_id, role, assigned_at) VALUES (?1, ?2, ?3)
           ON CONFLICT (user_id) DO UPDATE
             SET role = excluded.role, assigned_at = excluded.assigned_at",
          rusqlite::params![id_str, role.as_str(), at_str],
        )?;
        tx.commit()?;
        Ok(true)
      })
      .await?;

    if !user_exists {
      return Ok(None);
    }
    tracing::info!(%user_id, %role, "role assigned");
    Ok(Some(RoleAssignment { user_id, role }))
  }

  async fn revoke_role(&self, user_id: Uuid) -> Result<bool> {
    let id_str = encode_uuid(user_id);
    let n = self
      .conn
      .call(move |conn| {
        Ok(conn.execute("DELETE FROM roles WHERE user_id = ?1", rusqlite::params![id_str])?)
      })
      .await?;
    if n > 0 {
      tracing::info!(%user_id, "role revoked");
    }
    Ok(n > 0)
  }
}
