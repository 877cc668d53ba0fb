//! Change-feed observer that turns store events into email.
//!
//! A new reply mails the submitter; a password reset request mails the
//! account holder. Each email is sent on its own task so a slow relay never
//! holds up the feed, and a failed send is logged, not retried.

use std::sync::Arc;

use sadaka_core::{
  notify::{Email, detect_new_reply, password_reset_email, reply_email},
  store::SiteEvent,
};
use tokio::{sync::broadcast, task::JoinHandle};

use crate::mail::Mailer;

/// What outgoing mail needs to know about the site.
#[derive(Debug, Clone)]
pub struct NotifierSettings {
  pub site_name: String,
  pub base_url:  String,
}

/// The email an event calls for, if any.
pub fn email_for(event: &SiteEvent, settings: &NotifierSettings) -> Option<Email> {
  match event {
    SiteEvent::SubmissionUpdated { before, after } => {
      let reply = detect_new_reply(before, after)?;
      Some(reply_email(&settings.site_name, after, reply))
    }
    SiteEvent::PasswordResetRequested(reset) => {
      Some(password_reset_email(&settings.site_name, &settings.base_url, reset))
    }
  }
}

/// Run until the feed closes.
pub fn spawn_notifier<M>(
  mut events: broadcast::Receiver<SiteEvent>,
  mailer: Arc<M>,
  settings: NotifierSettings,
) -> JoinHandle<()>
where
  M: Mailer + 'static,
{
  tokio::spawn(async move {
    loop {
      let event = match events.recv().await {
        Ok(event) => event,
        Err(broadcast::error::RecvError::Lagged(missed)) => {
          tracing::warn!(missed, "notifier fell behind the change feed");
          continue;
        }
        Err(broadcast::error::RecvError::Closed) => break,
      };

      let Some(email) = email_for(&event, &settings) else {
        continue;
      };
      let mailer = Arc::clone(&mailer);
      tokio::spawn(async move {
        let to = email.to.clone();
        match mailer.send(email).await {
          Ok(()) => tracing::info!(%to, "notification sent"),
          Err(e) => tracing::error!(%to, error = %e, "notification failed"),
        }
      });
    }
    tracing::debug!("change feed closed; notifier stopping");
  })
}

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use sadaka_core::{
    identity::IdentityProvider,
    store::SiteStore,
    submission::{Author, Collection, ContactForm, ReplyDraft, Status, SubmissionForm},
  };
  use sadaka_store_sqlite::SqliteStore;
  use tokio::sync::mpsc;
  use uuid::Uuid;

  use super::*;
  use crate::mail::MailError;

  /// Hands every email to a channel.
  struct ChannelMailer(mpsc::UnboundedSender<Email>);

  impl Mailer for ChannelMailer {
    async fn send(&self, email: Email) -> Result<(), MailError> {
      let _ = self.0.send(email);
      Ok(())
    }
  }

  fn settings() -> NotifierSettings {
    NotifierSettings {
      site_name: "Sadaka".into(),
      base_url:  "https://sadaka.example".into(),
    }
  }

  fn contact() -> SubmissionForm {
    SubmissionForm::Contact(ContactForm {
      name:    "Amina".into(),
      email:   "a@x.com".into(),
      phone:   None,
      subject: "Volunteering".into(),
      message: "Please contact me about volunteering".into(),
    })
  }

  async fn next_email(rx: &mut mpsc::UnboundedReceiver<Email>) -> Email {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
      .await
      .expect("email within timeout")
      .expect("mailer channel open")
  }

  #[tokio::test]
  async fn new_reply_is_mailed_to_the_submitter() {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let _task = spawn_notifier(store.subscribe(), Arc::new(ChannelMailer(tx)), settings());

    let sub = store.add_submission(contact()).await.unwrap();
    let admin = Author { user_id: Uuid::new_v4(), email: "dawa@sadaka.org".into() };
    store
      .append_reply(
        Collection::Contacts,
        sub.id,
        ReplyDraft::new("Thank you, we will call you").unwrap(),
        admin,
      )
      .await
      .unwrap();

    let email = next_email(&mut rx).await;
    assert_eq!(email.to, "a@x.com");
    assert!(email.subject.contains("Volunteering"));
    assert!(email.html.contains("Thank you, we will call you"));
  }

  #[tokio::test]
  async fn status_changes_are_not_mailed() {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let _task = spawn_notifier(store.subscribe(), Arc::new(ChannelMailer(tx)), settings());

    let sub = store.add_submission(contact()).await.unwrap();
    store.change_status(Collection::Contacts, sub.id, Status::Read).await.unwrap();

    // A reset request afterwards is the first thing mailed.
    store.create_account("admin@sadaka.org".into(), "password123".into()).await.unwrap();
    store.request_password_reset("admin@sadaka.org".into()).await.unwrap();

    let email = next_email(&mut rx).await;
    assert_eq!(email.to, "admin@sadaka.org");
    assert!(email.html.contains("https://sadaka.example/reset-password?token="));
  }

  #[test]
  fn unrelated_events_need_no_email() {
    let submission = sadaka_core::submission::Submission {
      id:         Uuid::new_v4(),
      created_at: chrono::Utc::now(),
      status:     Status::Unread,
      form:       contact(),
      replies:    Vec::new(),
    };
    let mut after = submission.clone();
    after.status = Status::Read;
    let event = SiteEvent::SubmissionUpdated {
      before: Box::new(submission),
      after:  Box::new(after),
    };
    assert!(email_for(&event, &settings()).is_none());
  }
}
