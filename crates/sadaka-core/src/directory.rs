//! The role directory: one role document per user id.

use std::future::Future;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::role::Role;

/// What to do when a signed-in user has no role document.
///
/// `Deny` requires explicit provisioning. `GrantSuper` reproduces the legacy
/// behavior of treating an unprovisioned user as unrestricted; it is a
/// privilege-escalation hazard if a role document is ever lost and must be
/// opted into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingRolePolicy {
  #[default]
  Deny,
  GrantSuper,
}

impl MissingRolePolicy {
  /// The role a user is treated as holding once this policy is applied.
  pub fn effective_role(self, resolved: Option<Role>) -> Option<Role> {
    match (resolved, self) {
      (Some(role), _) => Some(role),
      (None, Self::Deny) => None,
      (None, Self::GrantSuper) => Some(Role::Super),
    }
  }
}

/// A role assignment as exposed to admins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
  pub user_id: Uuid,
  pub role:    Role,
}

/// Lookup and privileged assignment of roles.
pub trait RoleDirectory: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Look up the role document for `user_id`. `Ok(None)` means no document
  /// exists; backend failures are errors and never imply a grant.
  fn resolve_role(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<Option<Role>, Self::Error>> + Send + '_;

  /// Create or replace the role document for `user_id`. `None` if no such
  /// account exists.
  fn assign_role(
    &self,
    user_id: Uuid,
    role: Role,
  ) -> impl Future<Output = Result<Option<RoleAssignment>, Self::Error>> + Send + '_;

  /// Remove the role document. Returns `false` if none existed.
  fn revoke_role(
    &self,
    user_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;
}
