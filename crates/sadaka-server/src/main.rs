//! sadaka-server binary.
//!
//! Reads `config.toml` (or the path given with `--config`) plus `SADAKA_*`
//! environment overrides, opens the SQLite store, and serves the API.
//!
//! # Bootstrapping the first admin
//!
//! ```text
//! cargo run -p sadaka-server --bin server -- --create-admin admin@example.org
//! ```
//!
//! The password is read from stdin; `--role` defaults to `super`.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::Parser;
use sadaka_api::{AppState, AuthSettings};
use sadaka_core::{
  directory::{MissingRolePolicy, RoleDirectory},
  identity::IdentityProvider,
  role::Role,
};
use sadaka_server::{
  FsBlobStore, ServerConfig, audit_auth_changes,
  mail::SiteMailer,
  notifier::{NotifierSettings, spawn_notifier},
};
use sadaka_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Sadaka admin backend")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Create an account with this email (password on stdin), assign it a
  /// role, and exit.
  #[arg(long, value_name = "EMAIL")]
  create_admin: Option<String>,

  /// Role given by `--create-admin`.
  #[arg(long, default_value = "super", requires = "create_admin")]
  role: Role,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let server_cfg = ServerConfig::load(&cli.config)
    .with_context(|| format!("failed to load configuration from {:?}", cli.config))?;

  let store_path = expand_tilde(&server_cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?
    .with_session_ttl(chrono::Duration::hours(server_cfg.session_ttl_hours));

  if let Some(email) = cli.create_admin {
    return create_admin(&store, email, cli.role).await;
  }

  if server_cfg.missing_role == MissingRolePolicy::GrantSuper {
    tracing::warn!("missing_role = grant_super: any account without a role has full access");
  }

  let mailer = SiteMailer::from_config(&server_cfg).context("failed to configure mailer")?;
  let _notifier = spawn_notifier(
    store.subscribe(),
    Arc::new(mailer),
    NotifierSettings {
      site_name: server_cfg.site_name.clone(),
      base_url:  server_cfg.public_base().to_owned(),
    },
  );

  let media_dir = expand_tilde(&server_cfg.media_dir);
  tokio::fs::create_dir_all(&media_dir)
    .await
    .with_context(|| format!("failed to create media directory {media_dir:?}"))?;
  let blobs = FsBlobStore::new(&media_dir, server_cfg.public_base());

  let state = AppState::new(
    store,
    blobs,
    AuthSettings { missing_role: server_cfg.missing_role },
  );
  let _audit = audit_auth_changes(&state.auth_events);

  let app = sadaka_server::app(state, &media_dir);
  let address = server_cfg.address();

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

async fn create_admin(store: &SqliteStore, email: String, role: Role) -> anyhow::Result<()> {
  let password = read_password()?;
  sadaka_core::validate::password(&password)
    .map_err(|e| anyhow::anyhow!("password {e}"))?;

  let identity = store
    .create_account(email.clone(), password)
    .await
    .context("failed to create account")?
    .with_context(|| format!("{email} is already registered"))?;
  store
    .assign_role(identity.user_id, role)
    .await
    .context("failed to assign role")?
    .context("account vanished before its role was assigned")?;

  println!("created {} ({}) with role {role}", identity.email, identity.user_id);
  Ok(())
}

/// Read a password line from stdin.
fn read_password() -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  let stdin = io::stdin();
  print!("Password: ");
  io::stdout().flush().ok();
  let mut line = String::new();
  stdin.lock().read_line(&mut line)?;
  Ok(
    line
      .trim_end_matches('\n')
      .trim_end_matches('\r')
      .to_string(),
  )
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
