//! Outbound email.
//!
//! [`SiteMailer`] is picked from the config: [`LogMailer`] for development,
//! [`WebhookMailer`] for a relay that accepts `{from, to, subject, html}`.

use std::future::Future;

use sadaka_core::notify::Email;
use serde::Serialize;
use thiserror::Error;

use crate::settings::{MailerKind, ServerConfig};

#[derive(Debug, Error)]
pub enum MailError {
  #[error("mail_webhook_url is required when mailer = \"webhook\"")]
  MissingWebhookUrl,

  #[error("mail relay request failed: {0}")]
  Http(#[from] reqwest::Error),
}

pub trait Mailer: Send + Sync {
  fn send(&self, email: Email) -> impl Future<Output = Result<(), MailError>> + Send + '_;
}

// ─── Log ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct LogMailer;

impl Mailer for LogMailer {
  async fn send(&self, email: Email) -> Result<(), MailError> {
    tracing::info!(to = %email.to, subject = %email.subject, "email (log mailer)");
    tracing::debug!(html = %email.html, "email body");
    Ok(())
  }
}

// ─── Webhook ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct WebhookMailer {
  client: reqwest::Client,
  url:    String,
  from:   String,
}

#[derive(Serialize)]
struct Outgoing<'a> {
  from:    &'a str,
  to:      &'a str,
  subject: &'a str,
  html:    &'a str,
}

impl WebhookMailer {
  pub fn new(url: impl Into<String>, from: impl Into<String>) -> Self {
    Self {
      client: reqwest::Client::new(),
      url:    url.into(),
      from:   from.into(),
    }
  }
}

impl Mailer for WebhookMailer {
  async fn send(&self, email: Email) -> Result<(), MailError> {
    self
      .client
      .post(&self.url)
      .json(&Outgoing {
        from:    &self.from,
        to:      &email.to,
        subject: &email.subject,
        html:    &email.html,
      })
      .send()
      .await?
      .error_for_status()?;
    tracing::debug!(to = %email.to, "email handed to relay");
    Ok(())
  }
}

// ─── Selection ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum SiteMailer {
  Log(LogMailer),
  Webhook(WebhookMailer),
}

impl SiteMailer {
  pub fn from_config(config: &ServerConfig) -> Result<Self, MailError> {
    match config.mailer {
      MailerKind::Log => Ok(Self::Log(LogMailer)),
      MailerKind::Webhook => {
        let url = config.mail_webhook_url.as_deref().ok_or(MailError::MissingWebhookUrl)?;
        Ok(Self::Webhook(WebhookMailer::new(url, config.mail_from.clone())))
      }
    }
  }
}

impl Mailer for SiteMailer {
  async fn send(&self, email: Email) -> Result<(), MailError> {
    match self {
      Self::Log(m) => m.send(email).await,
      Self::Webhook(m) => m.send(email).await,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn config(mailer: MailerKind, url: Option<&str>) -> ServerConfig {
    let mut cfg: ServerConfig = ServerConfig::builder()
      .unwrap()
      .build()
      .unwrap()
      .try_deserialize()
      .unwrap();
    cfg.mailer = mailer;
    cfg.mail_webhook_url = url.map(str::to_owned);
    cfg
  }

  #[test]
  fn webhook_needs_a_url() {
    assert!(matches!(
      SiteMailer::from_config(&config(MailerKind::Webhook, None)),
      Err(MailError::MissingWebhookUrl)
    ));
    assert!(matches!(
      SiteMailer::from_config(&config(MailerKind::Webhook, Some("http://relay.local/send"))),
      Ok(SiteMailer::Webhook(_))
    ));
    assert!(matches!(
      SiteMailer::from_config(&config(MailerKind::Log, None)),
      Ok(SiteMailer::Log(_))
    ));
  }

  #[tokio::test]
  async fn log_mailer_always_succeeds() {
    let email = Email { to: "a@x.com".into(), subject: "Hi".into(), html: "<p>Hi</p>".into() };
    LogMailer.send(email).await.unwrap();
  }
}
