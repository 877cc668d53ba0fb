//! Submissions (records created by the public forms) and their reply log.
//!
//! Each collection has its own form shape; they share only the envelope
//! (id, timestamp, status, replies). [`SubmissionForm`] is the tagged union
//! over those shapes so rendering and validation are exhaustive.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  role::resource,
  validate::{Validate, ValidationErrors, not_blank, phone, phone_or_blank},
};

// ─── Collection ──────────────────────────────────────────────────────────────

/// The document collection a submission lives in. Each collection is also the
/// resource name that gates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
  Contacts,
  HelpRequests,
  ChildrenRegistrations,
  CharityRegistrations,
}

impl Collection {
  pub const ALL: [Collection; 4] = [
    Collection::Contacts,
    Collection::HelpRequests,
    Collection::ChildrenRegistrations,
    Collection::CharityRegistrations,
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Contacts => resource::CONTACTS,
      Self::HelpRequests => resource::HELP_REQUESTS,
      Self::ChildrenRegistrations => resource::CHILDREN_REGISTRATIONS,
      Self::CharityRegistrations => resource::CHARITY_REGISTRATIONS,
    }
  }

  /// The resource name checked by the guard.
  pub fn resource(self) -> &'static str { self.as_str() }

  /// Status a new submission in this collection starts with.
  pub fn initial_status(self) -> Status {
    match self {
      Self::Contacts => Status::Unread,
      _ => Status::Pending,
    }
  }
}

impl fmt::Display for Collection {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Collection {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    Collection::ALL
      .into_iter()
      .find(|c| c.as_str() == s)
      .ok_or_else(|| Error::UnknownCollection(s.to_owned()))
  }
}

// ─── Status ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
  Unread,
  Read,
  Pending,
  Replied,
  Verified,
  Rejected,
}

impl Status {
  pub const ALL: [Status; 6] = [
    Status::Unread,
    Status::Read,
    Status::Pending,
    Status::Replied,
    Status::Verified,
    Status::Rejected,
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Unread => "unread",
      Self::Read => "read",
      Self::Pending => "pending",
      Self::Replied => "replied",
      Self::Verified => "verified",
      Self::Rejected => "rejected",
    }
  }
}

impl fmt::Display for Status {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Status {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    Status::ALL
      .into_iter()
      .find(|st| st.as_str() == s)
      .ok_or_else(|| Error::UnknownStatus(s.to_owned()))
  }
}

// ─── Forms ───────────────────────────────────────────────────────────────────

/// A message from the contact page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ContactForm {
  #[validate(custom(function = "not_blank"))]
  pub name:    String,
  #[validate(email(message = "must be a valid email address"))]
  pub email:   String,
  #[serde(default)]
  #[validate(custom(function = "phone_or_blank"))]
  pub phone:   Option<String>,
  #[validate(custom(function = "not_blank"))]
  pub subject: String,
  #[validate(length(min = 10, max = 5000, message = "must be 10 to 5000 characters"))]
  pub message: String,
}

/// A request for material help.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct HelpRequestForm {
  #[validate(custom(function = "not_blank"))]
  pub name:        String,
  #[validate(email(message = "must be a valid email address"))]
  pub email:       String,
  #[validate(custom(function = "phone"))]
  pub phone:       String,
  #[serde(default)]
  pub city:        Option<String>,
  /// Short category of need, e.g. "food", "rent", "medical".
  #[validate(custom(function = "not_blank"))]
  pub need:        String,
  #[validate(length(min = 20, max = 5000, message = "must be 20 to 5000 characters"))]
  pub description: String,
}

/// A child put forward for sponsorship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ChildRegistrationForm {
  #[validate(custom(function = "not_blank"))]
  pub guardian_name: String,
  #[validate(email(message = "must be a valid email address"))]
  pub email:         String,
  #[validate(custom(function = "phone"))]
  pub phone:         String,
  #[validate(custom(function = "not_blank"))]
  pub child_name:    String,
  #[validate(range(min = 0, max = 17, message = "must be between 0 and 17"))]
  pub child_age:     i64,
  #[serde(default)]
  pub notes:         Option<String>,
}

/// A partner organization applying to register.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct CharityRegistrationForm {
  #[validate(custom(function = "not_blank"))]
  pub organization:        String,
  #[validate(custom(function = "not_blank"))]
  pub contact_name:        String,
  #[validate(email(message = "must be a valid email address"))]
  pub email:               String,
  #[validate(custom(function = "phone"))]
  pub phone:               String,
  #[serde(default)]
  pub registration_number: Option<String>,
  #[validate(length(min = 20, message = "must be at least 20 characters"))]
  pub description:         String,
}

/// The typed payload of a submission. The variant decides the collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SubmissionForm {
  Contact(ContactForm),
  HelpRequest(HelpRequestForm),
  ChildRegistration(ChildRegistrationForm),
  CharityRegistration(CharityRegistrationForm),
}

impl SubmissionForm {
  pub fn collection(&self) -> Collection {
    match self {
      Self::Contact(_) => Collection::Contacts,
      Self::HelpRequest(_) => Collection::HelpRequests,
      Self::ChildRegistration(_) => Collection::ChildrenRegistrations,
      Self::CharityRegistration(_) => Collection::CharityRegistrations,
    }
  }

  /// The address replies are mailed to.
  pub fn contact_email(&self) -> &str {
    match self {
      Self::Contact(f) => &f.email,
      Self::HelpRequest(f) => &f.email,
      Self::ChildRegistration(f) => &f.email,
      Self::CharityRegistration(f) => &f.email,
    }
  }

  /// The person to greet in outgoing mail.
  pub fn contact_name(&self) -> &str {
    match self {
      Self::Contact(f) => &f.name,
      Self::HelpRequest(f) => &f.name,
      Self::ChildRegistration(f) => &f.guardian_name,
      Self::CharityRegistration(f) => &f.contact_name,
    }
  }

  /// A one-line summary used as the email subject context.
  pub fn summary(&self) -> String {
    match self {
      Self::Contact(f) => f.subject.trim().to_owned(),
      Self::HelpRequest(f) => format!("help request ({})", f.need.trim()),
      Self::ChildRegistration(f) => {
        format!("sponsorship registration for {}", f.child_name.trim())
      }
      Self::CharityRegistration(f) => {
        format!("registration of {}", f.organization.trim())
      }
    }
  }
}

impl Validate for SubmissionForm {
  fn validate(&self) -> Result<(), ValidationErrors> {
    match self {
      Self::Contact(f) => f.validate(),
      Self::HelpRequest(f) => f.validate(),
      Self::ChildRegistration(f) => f.validate(),
      Self::CharityRegistration(f) => f.validate(),
    }
  }
}

// ─── Replies ─────────────────────────────────────────────────────────────────

/// Who wrote a reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
  pub user_id: Uuid,
  pub email:   String,
}

/// An admin-authored message. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
  pub reply_id:   Uuid,
  /// Zero-based position in the submission's reply log.
  pub seq:        u32,
  pub message:    String,
  pub author:     Author,
  /// Server-assigned.
  pub created_at: DateTime<Utc>,
}

/// A validated reply message awaiting append.
#[derive(Debug, Clone, PartialEq, Eq, Validate)]
pub struct ReplyDraft {
  #[validate(
    custom(function = "not_blank"),
    length(max = 10000, message = "must be at most 10000 characters")
  )]
  message: String,
}

impl ReplyDraft {
  /// Trim `message`; reject it if nothing is left.
  pub fn new(message: &str) -> Result<Self> {
    let draft = Self { message: message.trim().to_owned() };
    draft.validate()?;
    Ok(draft)
  }

  pub fn message(&self) -> &str { &self.message }

  pub fn into_message(self) -> String { self.message }
}

// ─── Submission ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
  pub id:         Uuid,
  pub created_at: DateTime<Utc>,
  pub status:     Status,
  pub form:       SubmissionForm,
  /// Append order is the only order.
  pub replies:    Vec<Reply>,
}

impl Submission {
  pub fn collection(&self) -> Collection { self.form.collection() }

  pub fn last_reply(&self) -> Option<&Reply> { self.replies.last() }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::validate::{field_errors, has_error};

  fn contact(message: &str) -> SubmissionForm {
    SubmissionForm::Contact(ContactForm {
      name:    "Amina".into(),
      email:   "a@x.com".into(),
      phone:   None,
      subject: "Hi".into(),
      message: message.into(),
    })
  }

  #[test]
  fn valid_contact_passes() {
    assert!(contact("Please contact me about volunteering").validate().is_ok());
  }

  #[test]
  fn short_contact_message_is_rejected() {
    let errs = contact("short").validate().unwrap_err();
    assert!(has_error(&errs, "message"));
    assert_eq!(field_errors(&errs).len(), 1);
  }

  #[test]
  fn child_age_out_of_range() {
    let form = ChildRegistrationForm {
      guardian_name: "Fatima".into(),
      email:         "f@example.org".into(),
      phone:         "0612345678".into(),
      child_name:    "Yusuf".into(),
      child_age:     18,
      notes:         None,
    };
    assert!(has_error(&form.validate().unwrap_err(), "child_age"));
  }

  #[test]
  fn collections_start_with_their_status() {
    assert_eq!(contact("x").collection().initial_status(), Status::Unread);
    assert_eq!(Collection::HelpRequests.initial_status(), Status::Pending);
  }

  #[test]
  fn form_json_is_tagged_by_kind() {
    let json = serde_json::to_value(contact("Please contact me")).unwrap();
    assert_eq!(json["kind"], "contact");
    assert_eq!(json["email"], "a@x.com");
    let back: SubmissionForm = serde_json::from_value(json).unwrap();
    assert_eq!(back.collection(), Collection::Contacts);
  }

  #[test]
  fn reply_draft_trims_and_rejects_blank() {
    assert_eq!(ReplyDraft::new("  ok  ").unwrap().message(), "ok");
    assert!(matches!(ReplyDraft::new(" \n\t "), Err(Error::Validation(_))));
  }

  #[test]
  fn collection_names_roundtrip() {
    for c in Collection::ALL {
      assert_eq!(c.as_str().parse::<Collection>().unwrap(), c);
    }
    assert!("donations".parse::<Collection>().is_err());
  }
}
