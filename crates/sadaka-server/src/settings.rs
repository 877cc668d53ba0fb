//! Runtime settings: `config.toml` overridden by `SADAKA_*` variables.

use std::path::{Path, PathBuf};

use config::{Config, ConfigBuilder, ConfigError, Environment, File, builder::DefaultState};
use sadaka_core::directory::MissingRolePolicy;
use serde::Deserialize;

/// How outbound mail leaves the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MailerKind {
  /// Write each email to the log.
  #[default]
  Log,
  /// POST each email as JSON to `mail_webhook_url`.
  Webhook,
}

/// Runtime server configuration, deserialised from `config.toml`.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  pub host:              String,
  pub port:              u16,
  /// Public origin used in media URLs and reset links.
  pub base_url:          String,
  pub site_name:         String,
  pub store_path:        PathBuf,
  pub media_dir:         PathBuf,
  pub missing_role:      MissingRolePolicy,
  pub session_ttl_hours: i64,
  pub mailer:            MailerKind,
  pub mail_webhook_url:  Option<String>,
  pub mail_from:         String,
}

impl ServerConfig {
  /// Defaults for every key, so an empty file is a working local setup.
  pub fn builder() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder()
      .set_default("host", "127.0.0.1")?
      .set_default("port", 8080)?
      .set_default("base_url", "http://localhost:8080")?
      .set_default("site_name", "Sadaka")?
      .set_default("store_path", "sadaka.db")?
      .set_default("media_dir", "media")?
      .set_default("missing_role", "deny")?
      .set_default("session_ttl_hours", 24 * 7)?
      .set_default("mailer", "log")?
      .set_default("mail_from", "Sadaka <no-reply@localhost>")
  }

  /// Read `path` (optional) and the environment.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    Self::builder()?
      .add_source(File::from(path).required(false))
      .add_source(Environment::with_prefix("SADAKA"))
      .build()?
      .try_deserialize()
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }

  pub fn public_base(&self) -> &str { self.base_url.trim_end_matches('/') }
}
