//! Admin handlers for accounts and role assignments.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/admin/users` | `{email, password, role?}`; 201, 409 on duplicate email |
//! | `PUT`  | `/admin/roles/{user_id}` | `{role}` |
//! | `DELETE` | `/admin/roles/{user_id}` | 204 |

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
};
use sadaka_core::{
  blob::BlobStore,
  directory::RoleAssignment,
  identity::Identity,
  role::Role,
  validate::{Validate, password},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  AppState, Backend,
  error::ApiError,
  session::{AdminSession, RolesAccess, UsersAccess},
};

#[derive(Debug, Deserialize, Validate)]
pub struct NewUserBody {
  #[validate(email(message = "must be a valid email address"))]
  pub email:    String,
  #[validate(custom(function = "password"))]
  pub password: String,
  #[serde(default)]
  pub role:     Option<Role>,
}

#[derive(Debug, Serialize)]
pub struct CreatedUser {
  pub user: Identity,
  pub role: Option<Role>,
}

/// `POST /admin/users`
///
/// Assigning the initial role also needs the `roles` resource.
pub async fn create<S: Backend, B: BlobStore>(
  session: AdminSession<UsersAccess>,
  State(state): State<AppState<S, B>>,
  Json(body): Json<NewUserBody>,
) -> Result<(StatusCode, Json<CreatedUser>), ApiError> {
  body.validate()?;

  if body.role.is_some() {
    session.require(sadaka_core::role::resource::ROLES)?;
  }

  let user = state
    .store
    .create_account(body.email, body.password)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::Conflict("email already registered".into()))?;

  let role = match body.role {
    Some(role) => state
      .store
      .assign_role(user.user_id, role)
      .await
      .map_err(ApiError::store)?
      .map(|a| a.role),
    None => None,
  };

  tracing::info!(
    user_id = %user.user_id,
    email = %user.email,
    role = ?role,
    by = %session.identity.email,
    "user created"
  );
  Ok((StatusCode::CREATED, Json(CreatedUser { user, role })))
}

#[derive(Debug, Deserialize)]
pub struct RoleBody {
  pub role: Role,
}

/// `PUT /admin/roles/{user_id}`
pub async fn assign_role<S: Backend, B: BlobStore>(
  session: AdminSession<RolesAccess>,
  State(state): State<AppState<S, B>>,
  Path(user_id): Path<Uuid>,
  Json(body): Json<RoleBody>,
) -> Result<Json<RoleAssignment>, ApiError> {
  let assignment = state
    .store
    .assign_role(user_id, body.role)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("user {user_id} not found")))?;
  tracing::info!(%user_id, role = %assignment.role, by = %session.identity.email, "role assigned");
  Ok(Json(assignment))
}

/// `DELETE /admin/roles/{user_id}`
pub async fn revoke_role<S: Backend, B: BlobStore>(
  session: AdminSession<RolesAccess>,
  State(state): State<AppState<S, B>>,
  Path(user_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
  if !state.store.revoke_role(user_id).await.map_err(ApiError::store)? {
    return Err(ApiError::NotFound(format!("user {user_id} has no role")));
  }
  tracing::info!(%user_id, by = %session.identity.email, "role revoked");
  Ok(StatusCode::NO_CONTENT)
}
