//! Roles and the static role-to-permission table.
//!
//! The table is compiled in; there is no runtime reconfiguration. A role is
//! either unrestricted ([`Role::Super`]) or departmental, in which case it may
//! act only on the resources listed for it below.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::Error;

/// Resource names gated by permission checks.
///
/// Submission resources share their names with the collection they guard.
pub mod resource {
  pub const POSTS: &str = "posts";
  pub const MEDIA: &str = "media";
  pub const CONTACTS: &str = "contacts";
  pub const HELP_REQUESTS: &str = "help_requests";
  pub const CHILDREN_REGISTRATIONS: &str = "children_registrations";
  pub const CHARITY_REGISTRATIONS: &str = "charity_registrations";
  pub const USERS: &str = "users";
  pub const ROLES: &str = "roles";
}

// ─── Permission table ────────────────────────────────────────────────────────

const DAWA: &[&str] = &[resource::POSTS, resource::MEDIA, resource::CONTACTS];

const RELIEF: &[&str] = &[
  resource::HELP_REQUESTS,
  resource::CHARITY_REGISTRATIONS,
  resource::MEDIA,
];

const SPONSORSHIP: &[&str] =
  &[resource::CHILDREN_REGISTRATIONS, resource::MEDIA];

// ─── Role ────────────────────────────────────────────────────────────────────

/// The department a user administers. A user holds exactly one role, or none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
  /// Unrestricted access to every resource, including unlisted ones.
  Super,
  /// Outreach department: news posts, media and contact messages.
  Dawa,
  /// Relief department: help requests and charity registrations.
  Relief,
  /// Child sponsorship department.
  Sponsorship,
}

impl Role {
  pub const ALL: [Role; 4] =
    [Role::Super, Role::Dawa, Role::Relief, Role::Sponsorship];

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Super => "super",
      Self::Dawa => "dawa",
      Self::Relief => "relief",
      Self::Sponsorship => "sponsorship",
    }
  }

  pub fn is_unrestricted(self) -> bool { matches!(self, Self::Super) }

  /// The static resource set for a departmental role; `None` for the
  /// unrestricted role, whose access is not enumerable.
  pub fn permissions(self) -> Option<&'static [&'static str]> {
    match self {
      Self::Super => None,
      Self::Dawa => Some(DAWA),
      Self::Relief => Some(RELIEF),
      Self::Sponsorship => Some(SPONSORSHIP),
    }
  }

  /// Whether this role may act on `resource`.
  pub fn has_access(self, resource: &str) -> bool {
    match self.permissions() {
      None => true,
      Some(allowed) => allowed.contains(&resource),
    }
  }

  /// Where an admin holding this role lands after signing in.
  pub fn landing_route(self) -> &'static str {
    match self {
      Self::Super => "/admin",
      Self::Dawa => "/admin/posts",
      Self::Relief => "/admin/help-requests",
      Self::Sponsorship => "/admin/children",
    }
  }
}

impl fmt::Display for Role {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Role {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Role::ALL
      .into_iter()
      .find(|r| r.as_str() == s)
      .ok_or_else(|| Error::UnknownRole(s.to_owned()))
  }
}
