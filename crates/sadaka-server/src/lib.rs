//! HTTP server for Sadaka.
//!
//! Mounts the JSON API under `/api`, serves uploaded media from disk under
//! `/media`, and runs the notifier that mails replies and reset links.

pub mod blob;
pub mod mail;
pub mod notifier;
pub mod settings;

use std::path::Path;

use axum::Router;
use sadaka_api::{AppState, Backend, api_router};
use sadaka_core::{
  auth_state::{AuthChange, AuthStateHub, Subscription},
  blob::BlobStore,
};
use tower_http::{services::ServeDir, trace::TraceLayer};

pub use blob::{FsBlobStore, MEDIA_ROUTE};
pub use settings::{MailerKind, ServerConfig};

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build the full application router.
pub fn app<S, B>(state: AppState<S, B>, media_dir: &Path) -> Router
where
  S: Backend,
  B: BlobStore + 'static,
{
  Router::new()
    .nest("/api", api_router(state))
    .nest_service(MEDIA_ROUTE, ServeDir::new(media_dir))
    .layer(TraceLayer::new_for_http())
}

// ─── Audit ───────────────────────────────────────────────────────────────────

/// Log every sign-in and sign-out. Keep the returned subscription alive for
/// as long as logging should continue.
#[must_use = "dropping the subscription stops the audit log"]
pub fn audit_auth_changes(hub: &AuthStateHub) -> Subscription {
  hub.on_auth_state_changed(|change| match change {
    AuthChange::SignedIn(identity) => {
      tracing::info!(target: "audit", user_id = %identity.user_id, email = %identity.email, "session started");
    }
    AuthChange::SignedOut(identity) => {
      tracing::info!(target: "audit", user_id = %identity.user_id, email = %identity.email, "session ended");
    }
  })
}
