//! JSON REST API for Sadaka.
//!
//! Exposes an axum [`Router`] for the public site (forms, published posts,
//! sign-in) and the admin panel (submissions, posts, media, users, roles).
//! Every admin route runs the access guard through the [`AdminSession`]
//! extractor. TLS and static file serving are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", sadaka_api::api_router(state.clone()))
//! ```

pub mod auth;
pub mod error;
pub mod forms;
pub mod media;
pub mod posts;
pub mod session;
pub mod submissions;
pub mod users;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use axum::{
  Router,
  extract::DefaultBodyLimit,
  routing::{get, post, put},
};
use sadaka_core::{
  auth_state::AuthStateHub,
  blob::BlobStore,
  directory::{MissingRolePolicy, RoleDirectory},
  identity::IdentityProvider,
  store::SiteStore,
};

pub use error::ApiError;
pub use session::AdminSession;

/// Largest request body accepted, sized for media uploads.
pub const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Everything the API needs from its backend: documents, accounts and roles.
pub trait Backend:
  SiteStore + IdentityProvider + RoleDirectory + Clone + Send + Sync + 'static
{
}

impl<T> Backend for T where
  T: SiteStore + IdentityProvider + RoleDirectory + Clone + Send + Sync + 'static
{
}

/// Access-control settings.
#[derive(Debug, Clone, Default)]
pub struct AuthSettings {
  pub missing_role: MissingRolePolicy,
}

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all API handlers.
pub struct AppState<S, B> {
  pub store:       Arc<S>,
  pub blobs:       Arc<B>,
  pub auth_events: AuthStateHub,
  pub auth:        Arc<AuthSettings>,
}

impl<S, B> Clone for AppState<S, B> {
  fn clone(&self) -> Self {
    Self {
      store:       Arc::clone(&self.store),
      blobs:       Arc::clone(&self.blobs),
      auth_events: self.auth_events.clone(),
      auth:        Arc::clone(&self.auth),
    }
  }
}

impl<S, B> AppState<S, B> {
  pub fn new(store: S, blobs: B, auth: AuthSettings) -> Self {
    Self {
      store:       Arc::new(store),
      blobs:       Arc::new(blobs),
      auth_events: AuthStateHub::new(),
      auth:        Arc::new(auth),
    }
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S, B>(state: AppState<S, B>) -> Router<()>
where
  S: Backend,
  B: BlobStore + 'static,
{
  Router::new()
    // Public forms
    .route("/contact", post(forms::contact::<S, B>))
    .route("/help-requests", post(forms::help_request::<S, B>))
    .route("/registrations/children", post(forms::child_registration::<S, B>))
    .route("/registrations/charity", post(forms::charity_registration::<S, B>))
    // Public posts
    .route("/posts", get(posts::list_published::<S, B>))
    .route("/posts/{id}", get(posts::get_published::<S, B>))
    // Auth
    .route("/auth/sign-in", post(auth::sign_in::<S, B>))
    .route("/auth/sign-out", post(auth::sign_out::<S, B>))
    .route("/auth/password-reset", post(auth::request_reset::<S, B>))
    .route("/auth/password-reset/confirm", post(auth::confirm_reset::<S, B>))
    // Admin
    .route("/admin/me", get(auth::me))
    .route("/admin/submissions/{collection}", get(submissions::list::<S, B>))
    .route(
      "/admin/submissions/{collection}/{id}",
      get(submissions::get_one::<S, B>).delete(submissions::delete_one::<S, B>),
    )
    .route("/admin/submissions/{collection}/{id}/replies", post(submissions::reply::<S, B>))
    .route("/admin/submissions/{collection}/{id}/status", put(submissions::set_status::<S, B>))
    .route("/admin/posts", get(posts::list_all::<S, B>).post(posts::create::<S, B>))
    .route(
      "/admin/posts/{id}",
      put(posts::update::<S, B>).delete(posts::delete_one::<S, B>),
    )
    .route("/admin/media", get(media::list::<S, B>).post(media::upload::<S, B>))
    .route("/admin/media/{id}", axum::routing::delete(media::delete_one::<S, B>))
    .route("/admin/users", post(users::create::<S, B>))
    .route(
      "/admin/roles/{user_id}",
      put(users::assign_role::<S, B>).delete(users::revoke_role::<S, B>),
    )
    .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
    .with_state(state)
}
