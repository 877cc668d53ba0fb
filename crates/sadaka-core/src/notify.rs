//! Outbound email content: detecting a newly appended reply and rendering the
//! messages the notifier sends.

use serde::Serialize;

use crate::{
  identity::PasswordReset,
  submission::{Reply, Submission},
};

/// A rendered HTML email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Email {
  pub to:      String,
  pub subject: String,
  pub html:    String,
}

/// The reply appended between `before` and `after`, if any.
///
/// Only a growth of the reply log counts; status-only changes and updates to
/// a different submission yield `None`.
pub fn detect_new_reply<'a>(
  before: &Submission,
  after: &'a Submission,
) -> Option<&'a Reply> {
  if before.id != after.id || after.replies.len() <= before.replies.len() {
    return None;
  }
  after.replies.last()
}

/// Mail sent to the submitter when an admin replies.
pub fn reply_email(site_name: &str, submission: &Submission, reply: &Reply) -> Email {
  let form = &submission.form;
  let subject = format!("{site_name}: reply to your {}", form.summary());
  let body = escape_html(&reply.message).replace('\n', "<br>");
  let html = format!(
    "<!DOCTYPE html>\
     <html><body style=\"font-family:sans-serif\">\
     <p>Dear {name},</p>\
     <p>We have replied to your {summary}:</p>\
     <blockquote style=\"border-left:3px solid #2e7d32;padding-left:12px\">{body}</blockquote>\
     <p>Kind regards,<br>{site}</p>\
     </body></html>",
    name = escape_html(form.contact_name().trim()),
    summary = escape_html(&form.summary()),
    site = escape_html(site_name),
  );
  Email { to: form.contact_email().trim().to_owned(), subject, html }
}

/// Mail carrying a password reset link.
pub fn password_reset_email(site_name: &str, base_url: &str, reset: &PasswordReset) -> Email {
  let link = format!(
    "{}/reset-password?token={}",
    base_url.trim_end_matches('/'),
    reset.token
  );
  let html = format!(
    "<!DOCTYPE html>\
     <html><body style=\"font-family:sans-serif\">\
     <p>A password reset was requested for your {site} account.</p>\
     <p><a href=\"{link}\">Choose a new password</a></p>\
     <p>The link expires at {expires}. If you did not ask for this, ignore this email.</p>\
     </body></html>",
    site = escape_html(site_name),
    link = escape_html(&link),
    expires = reset.expires_at.format("%Y-%m-%d %H:%M UTC"),
  );
  Email {
    to: reset.email.clone(),
    subject: format!("{site_name}: password reset"),
    html,
  }
}

pub fn escape_html(s: &str) -> String {
  let mut out = String::with_capacity(s.len());
  for c in s.chars() {
    match c {
      '&' => out.push_str("&amp;"),
      '<' => out.push_str("&lt;"),
      '>' => out.push_str("&gt;"),
      '"' => out.push_str("&quot;"),
      '\'' => out.push_str("&#39;"),
      c => out.push(c),
    }
  }
  out
}

#[cfg(test)]
mod tests {
  use chrono::{TimeZone, Utc};
  use uuid::Uuid;

  use super::*;
  use crate::submission::{Author, ContactForm, Status, SubmissionForm};

  fn submission(replies: usize) -> Submission {
    let at = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
    Submission {
      id:         Uuid::nil(),
      created_at: at,
      status:     Status::Unread,
      form:       SubmissionForm::Contact(ContactForm {
        name:    "Amina <script>".into(),
        email:   "a@x.com".into(),
        phone:   None,
        subject: "Hi".into(),
        message: "Please contact me about volunteering".into(),
      }),
      replies:    (0..replies)
        .map(|i| Reply {
          reply_id:   Uuid::new_v4(),
          seq:        i as u32,
          message:    format!("reply {i}"),
          author:     Author { user_id: Uuid::nil(), email: "admin@x.org".into() },
          created_at: at,
        })
        .collect(),
    }
  }

  #[test]
  fn growth_of_reply_log_is_detected() {
    let before = submission(1);
    let after = submission(2);
    assert_eq!(detect_new_reply(&before, &after).unwrap().message, "reply 1");
  }

  #[test]
  fn status_only_change_is_not_a_reply() {
    let before = submission(1);
    let mut after = submission(1);
    after.status = Status::Verified;
    assert!(detect_new_reply(&before, &after).is_none());
  }

  #[test]
  fn reply_email_goes_to_stored_contact_and_escapes() {
    let s = submission(1);
    let email = reply_email("Sadaka", &s, &s.replies[0]);
    assert_eq!(email.to, "a@x.com");
    assert!(email.subject.contains("Hi"));
    assert!(email.html.contains("Amina &lt;script&gt;"));
    assert!(email.html.contains("reply 0"));
  }

  #[test]
  fn reset_email_links_token() {
    let reset = PasswordReset {
      email:      "admin@x.org".into(),
      token:      "abc123".into(),
      expires_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
    };
    let email = password_reset_email("Sadaka", "https://example.org/", &reset);
    assert!(email.html.contains("https://example.org/reset-password?token=abc123"));
    assert_eq!(email.to, "admin@x.org");
  }
}
