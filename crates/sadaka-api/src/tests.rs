//! Router tests: requests go through `api_router` against an in-memory store.

use std::{
  collections::HashMap,
  sync::{Arc, Mutex},
};

use axum::{
  Router,
  body::Body,
  http::{Request, StatusCode, header},
};
use sadaka_core::{
  auth_state::AuthChange,
  blob::{BlobStore, StoredBlob},
  directory::{MissingRolePolicy, RoleDirectory},
  identity::IdentityProvider,
  role::Role,
  store::{SiteStore, SubmissionQuery},
  submission::{Collection, HelpRequestForm, Status, SubmissionForm},
};
use sadaka_store_sqlite::SqliteStore;
use serde_json::{Value, json};
use tower::ServiceExt as _;

use crate::{AppState, AuthSettings, api_router};

// ─── Fixtures ────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
#[error("blob backend unavailable")]
struct Unavailable;

/// Blob store kept in a map; `failing` makes every call error.
#[derive(Default)]
struct MemoryBlobStore {
  blobs:   Mutex<HashMap<String, Vec<u8>>>,
  failing: bool,
}

impl BlobStore for MemoryBlobStore {
  type Error = Unavailable;

  async fn put(
    &self,
    file_name: String,
    _content_type: String,
    data: Vec<u8>,
  ) -> Result<StoredBlob, Unavailable> {
    if self.failing {
      return Err(Unavailable);
    }
    let key = format!("{}-{file_name}", uuid::Uuid::new_v4());
    self.blobs.lock().unwrap().insert(key.clone(), data);
    Ok(StoredBlob { url: format!("/media/{key}"), key })
  }

  async fn delete(&self, key: String) -> Result<bool, Unavailable> {
    if self.failing {
      return Err(Unavailable);
    }
    Ok(self.blobs.lock().unwrap().remove(&key).is_some())
  }
}

type State = AppState<SqliteStore, MemoryBlobStore>;

async fn state_with(blobs: MemoryBlobStore, missing_role: MissingRolePolicy) -> State {
  let store = SqliteStore::open_in_memory().await.expect("in-memory store");
  AppState::new(store, blobs, AuthSettings { missing_role })
}

async fn state() -> State { state_with(MemoryBlobStore::default(), MissingRolePolicy::Deny).await }

/// A store on a temp file plus a raw connection to the same database, for
/// putting it into states the store API never produces. Files are removed on
/// drop.
struct FileDb {
  path: std::path::PathBuf,
  raw:  rusqlite::Connection,
}

impl FileDb {
  async fn open() -> (Self, SqliteStore) {
    let path = std::env::temp_dir()
      .join(format!("sadaka-api-test-{}.db", uuid::Uuid::new_v4().simple()));
    let store = SqliteStore::open(&path).await.unwrap();
    let raw = rusqlite::Connection::open(&path).unwrap();
    (Self { path, raw }, store)
  }
}

impl Drop for FileDb {
  fn drop(&mut self) {
    for suffix in ["", "-wal", "-shm"] {
      let mut file = self.path.clone().into_os_string();
      file.push(suffix);
      let _ = std::fs::remove_file(file);
    }
  }
}

/// Create an account, optionally give it a role, and return a bearer token.
async fn token_for(state: &State, email: &str, role: Option<Role>) -> String {
  let user = state
    .store
    .create_account(email.into(), "password123".into())
    .await
    .unwrap()
    .unwrap();
  if let Some(role) = role {
    state.store.assign_role(user.user_id, role).await.unwrap();
  }
  state
    .store
    .sign_in(email.into(), "password123".into())
    .await
    .unwrap()
    .unwrap()
    .token
}

fn app(state: &State) -> Router { api_router(state.clone()) }

fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
  let mut req = Request::builder()
    .method(method)
    .uri(uri)
    .header(header::CONTENT_TYPE, "application/json");
  if let Some(token) = token {
    req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
  }
  req.body(Body::from(body.to_string())).unwrap()
}

fn bare_request(method: &str, uri: &str, token: Option<&str>) -> Request<Body> {
  let mut req = Request::builder().method(method).uri(uri);
  if let Some(token) = token {
    req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
  }
  req.body(Body::empty()).unwrap()
}

async fn send(state: &State, req: Request<Body>) -> (StatusCode, Value) {
  let res = app(state).oneshot(req).await.unwrap();
  let status = res.status();
  let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
  let body = if bytes.is_empty() {
    Value::Null
  } else {
    serde_json::from_slice(&bytes).unwrap_or(Value::Null)
  };
  (status, body)
}

fn contact_body(message: &str) -> Value {
  json!({
    "name": "Amina",
    "email": "a@x.com",
    "subject": "Hi",
    "message": message,
  })
}

async fn help_request(state: &State) -> uuid::Uuid {
  state
    .store
    .add_submission(SubmissionForm::HelpRequest(HelpRequestForm {
      name:        "Omar".into(),
      email:       "omar@example.org".into(),
      phone:       "0612345678".into(),
      city:        None,
      need:        "food".into(),
      description: "Our family needs food parcels this month.".into(),
    }))
    .await
    .unwrap()
    .id
}

// ─── Public forms ────────────────────────────────────────────────────────────

#[tokio::test]
async fn contact_form_creates_unread_document() {
  let s = state().await;
  let (status, body) = send(
    &s,
    json_request("POST", "/contact", None, contact_body("Please contact me about volunteering")),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(body["status"], "unread");

  let stored = s
    .store
    .list_submissions(Collection::Contacts, SubmissionQuery::default())
    .await
    .unwrap();
  assert_eq!(stored.len(), 1);
  assert_eq!(stored[0].status, Status::Unread);
  assert_eq!(stored[0].id.to_string(), body["id"].as_str().unwrap());
}

#[tokio::test]
async fn short_message_is_rejected_without_a_write() {
  let s = state().await;
  let (status, body) =
    send(&s, json_request("POST", "/contact", None, contact_body("short"))).await;
  assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
  let fields: Vec<&str> = body["fields"]
    .as_array()
    .unwrap()
    .iter()
    .map(|f| f["field"].as_str().unwrap())
    .collect();
  assert_eq!(fields, vec!["message"]);

  let stored = s
    .store
    .list_submissions(Collection::Contacts, SubmissionQuery::default())
    .await
    .unwrap();
  assert!(stored.is_empty());
}

#[tokio::test]
async fn child_age_out_of_range_is_rejected() {
  let s = state().await;
  let body = json!({
    "guardian_name": "Fatima",
    "email": "f@example.org",
    "phone": "+31 6 1234 5678",
    "child_name": "Yusuf",
    "child_age": 18,
  });
  let (status, _) = send(&s, json_request("POST", "/registrations/children", None, body)).await;
  assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

// ─── Guard ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn dawa_cannot_delete_help_requests() {
  let s = state().await;
  let id = help_request(&s).await;
  let token = token_for(&s, "dawa@sadaka.org", Some(Role::Dawa)).await;

  let (status, body) = send(
    &s,
    bare_request("DELETE", &format!("/admin/submissions/help_requests/{id}"), Some(&token)),
  )
  .await;
  assert_eq!(status, StatusCode::FORBIDDEN);
  assert_eq!(body["redirect"], "/unauthorized");
  assert!(s.store.get_submission(Collection::HelpRequests, id).await.unwrap().is_some());
}

#[tokio::test]
async fn missing_token_redirects_to_login() {
  let s = state().await;
  let (status, body) = send(&s, bare_request("GET", "/admin/submissions/contacts", None)).await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
  assert_eq!(body["redirect"], "/login");

  let (status, _) =
    send(&s, bare_request("GET", "/admin/submissions/contacts", Some("forged"))).await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn missing_role_is_denied_by_default() {
  let s = state().await;
  let token = token_for(&s, "new@sadaka.org", None).await;
  let (status, body) = send(&s, bare_request("GET", "/admin/me", Some(&token))).await;
  assert_eq!(status, StatusCode::FORBIDDEN);
  assert_eq!(body["redirect"], "/unauthorized");
}

#[tokio::test]
async fn permissive_policy_grants_super_to_roleless_users() {
  let s = state_with(MemoryBlobStore::default(), MissingRolePolicy::GrantSuper).await;
  let token = token_for(&s, "new@sadaka.org", None).await;
  let (status, body) = send(&s, bare_request("GET", "/admin/me", Some(&token))).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["role"], "super");
  assert_eq!(body["landing_route"], "/admin");
}

#[tokio::test]
async fn unknown_collection_is_not_found() {
  let s = state().await;
  let token = token_for(&s, "root@sadaka.org", Some(Role::Super)).await;
  let (status, _) =
    send(&s, bare_request("GET", "/admin/submissions/donations", Some(&token))).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn departmental_role_is_refused_unlisted_collections() {
  let s = state().await;
  let token = token_for(&s, "dawa@sadaka.org", Some(Role::Dawa)).await;
  let id = uuid::Uuid::new_v4();

  let (status, body) = send(
    &s,
    bare_request("DELETE", &format!("/admin/submissions/donations/{id}"), Some(&token)),
  )
  .await;
  assert_eq!(status, StatusCode::FORBIDDEN);
  assert_eq!(body["redirect"], "/unauthorized");

  let (status, _) =
    send(&s, bare_request("GET", "/admin/submissions/donations", Some(&token))).await;
  assert_eq!(status, StatusCode::FORBIDDEN);
}

// ─── Replies and status ──────────────────────────────────────────────────────

#[tokio::test]
async fn relief_reply_marks_submission_replied() {
  let s = state().await;
  let id = help_request(&s).await;
  let token = token_for(&s, "relief@sadaka.org", Some(Role::Relief)).await;

  let (status, body) = send(
    &s,
    json_request(
      "POST",
      &format!("/admin/submissions/help_requests/{id}/replies"),
      Some(&token),
      json!({ "message": "We received your request" }),
    ),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(body["status"], "replied");
  assert_eq!(body["replies"].as_array().unwrap().len(), 1);
  assert_eq!(body["replies"][0]["author"]["email"], "relief@sadaka.org");

  let (status, _) = send(
    &s,
    json_request(
      "POST",
      &format!("/admin/submissions/help_requests/{id}/replies"),
      Some(&token),
      json!({ "message": "   " }),
    ),
  )
  .await;
  assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn setting_the_same_status_twice_changes_once() {
  let s = state().await;
  let id = help_request(&s).await;
  let token = token_for(&s, "relief@sadaka.org", Some(Role::Relief)).await;
  let uri = format!("/admin/submissions/help_requests/{id}/status");

  let (status, first) =
    send(&s, json_request("PUT", &uri, Some(&token), json!({ "status": "verified" }))).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(first["changed"], true);

  let (_, second) =
    send(&s, json_request("PUT", &uri, Some(&token), json!({ "status": "verified" }))).await;
  assert_eq!(second["changed"], false);
  assert_eq!(second["submission"], first["submission"]);
}

// ─── Auth ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn sign_in_returns_landing_route_and_publishes() {
  let s = state().await;
  token_for(&s, "sponsor@sadaka.org", Some(Role::Sponsorship)).await;

  let seen = Arc::new(Mutex::new(Vec::new()));
  let sink = Arc::clone(&seen);
  let _sub = s.auth_events.on_auth_state_changed(move |change| {
    sink.lock().unwrap().push(change.clone());
  });

  let (status, body) = send(
    &s,
    json_request(
      "POST",
      "/auth/sign-in",
      None,
      json!({ "email": "sponsor@sadaka.org", "password": "password123" }),
    ),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["role"], "sponsorship");
  assert_eq!(body["landing_route"], "/admin/children");
  let token = body["token"].as_str().unwrap().to_owned();

  let (status, _) = send(&s, bare_request("POST", "/auth/sign-out", Some(&token))).await;
  assert_eq!(status, StatusCode::NO_CONTENT);

  let seen = seen.lock().unwrap();
  assert_eq!(seen.len(), 2);
  assert!(matches!(seen[0], AuthChange::SignedIn(_)));
  assert!(matches!(seen[1], AuthChange::SignedOut(_)));
}

#[tokio::test]
async fn wrong_password_is_unauthorized() {
  let s = state().await;
  token_for(&s, "a@sadaka.org", Some(Role::Dawa)).await;
  let (status, _) = send(
    &s,
    json_request(
      "POST",
      "/auth/sign-in",
      None,
      json!({ "email": "a@sadaka.org", "password": "nope-nope" }),
    ),
  )
  .await;
  assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn failed_role_lookup_leaves_no_session_behind() {
  let (db, store) = FileDb::open().await;
  let user = store
    .create_account("broken@sadaka.org".into(), "password123".into())
    .await
    .unwrap()
    .unwrap();

  // A role the directory cannot decode makes every lookup fail.
  db.raw
    .execute(
      "INSERT INTO roles (user_id, role, assigned_at) VALUES (?1, 'treasurer', ?2)",
      rusqlite::params![user.user_id.hyphenated().to_string(), "2026-01-01T00:00:00Z"],
    )
    .unwrap();

  let s = AppState::new(store, MemoryBlobStore::default(), AuthSettings::default());
  let (status, body) = send(
    &s,
    json_request(
      "POST",
      "/auth/sign-in",
      None,
      json!({ "email": "broken@sadaka.org", "password": "password123" }),
    ),
  )
  .await;
  assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
  assert!(body.get("token").is_none());

  let sessions: i64 = db
    .raw
    .query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))
    .unwrap();
  assert_eq!(sessions, 0);
}

#[tokio::test]
async fn password_reset_does_not_reveal_accounts() {
  let s = state().await;
  token_for(&s, "a@sadaka.org", Some(Role::Dawa)).await;
  for email in ["a@sadaka.org", "ghost@sadaka.org"] {
    let (status, _) =
      send(&s, json_request("POST", "/auth/password-reset", None, json!({ "email": email })))
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);
  }
}

// ─── Users and roles ─────────────────────────────────────────────────────────

#[tokio::test]
async fn super_creates_user_and_duplicate_conflicts() {
  let s = state().await;
  let token = token_for(&s, "root@sadaka.org", Some(Role::Super)).await;
  let body = json!({ "email": "dawa@sadaka.org", "password": "long-enough", "role": "dawa" });

  let (status, created) =
    send(&s, json_request("POST", "/admin/users", Some(&token), body.clone())).await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(created["role"], "dawa");

  let (status, _) = send(&s, json_request("POST", "/admin/users", Some(&token), body)).await;
  assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn departmental_roles_cannot_manage_roles() {
  let s = state().await;
  let token = token_for(&s, "relief@sadaka.org", Some(Role::Relief)).await;
  let target = uuid::Uuid::new_v4();
  let (status, _) = send(
    &s,
    json_request("PUT", &format!("/admin/roles/{target}"), Some(&token), json!({ "role": "super" })),
  )
  .await;
  assert_eq!(status, StatusCode::FORBIDDEN);
}

// ─── Posts and media ─────────────────────────────────────────────────────────

#[tokio::test]
async fn post_survives_a_failed_image_upload() {
  let s = state_with(MemoryBlobStore { failing: true, ..Default::default() }, MissingRolePolicy::Deny)
    .await;
  let token = token_for(&s, "dawa@sadaka.org", Some(Role::Dawa)).await;
  let body = json!({
    "title": "Eid food drive",
    "body": "Thank you to everyone who donated.",
    "published": true,
    "image": { "file_name": "eid.jpg", "content_type": "image/jpeg", "data": "aGVsbG8=" },
  });

  let (status, created) = send(&s, json_request("POST", "/admin/posts", Some(&token), body)).await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(created["post"]["image_url"], Value::Null);
  assert_eq!(created["warnings"].as_array().unwrap().len(), 1);

  let (status, public) = send(&s, bare_request("GET", "/posts", None)).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(public.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn unregistered_post_image_is_reported() {
  let (db, store) = FileDb::open().await;
  let s = AppState::new(store, MemoryBlobStore::default(), AuthSettings::default());
  let token = token_for(&s, "dawa@sadaka.org", Some(Role::Dawa)).await;

  // The blob is stored, but the media library cannot take the descriptor.
  db.raw.execute_batch("DROP TABLE media").unwrap();

  let body = json!({
    "title": "Eid food drive",
    "body": "Thank you to everyone who donated.",
    "image": { "file_name": "eid.jpg", "content_type": "image/jpeg", "data": "aGVsbG8=" },
  });
  let (status, created) = send(&s, json_request("POST", "/admin/posts", Some(&token), body)).await;
  assert_eq!(status, StatusCode::CREATED);
  assert!(created["post"]["image_url"].as_str().unwrap().starts_with("/media/"));
  let warnings = created["warnings"].as_array().unwrap();
  assert_eq!(warnings.len(), 1);
  assert!(warnings[0].as_str().unwrap().contains("media library"));
}

#[tokio::test]
async fn drafts_are_hidden_from_the_public() {
  let s = state().await;
  let token = token_for(&s, "dawa@sadaka.org", Some(Role::Dawa)).await;
  let (_, created) = send(
    &s,
    json_request("POST", "/admin/posts", Some(&token), json!({ "title": "Draft", "body": "..." })),
  )
  .await;
  let id = created["post"]["post_id"].as_str().unwrap().to_owned();

  let (status, _) = send(&s, bare_request("GET", &format!("/posts/{id}"), None)).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  let (_, public) = send(&s, bare_request("GET", "/posts", None)).await;
  assert!(public.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn media_upload_and_delete() {
  let s = state().await;
  let token = token_for(&s, "sponsor@sadaka.org", Some(Role::Sponsorship)).await;

  let req = Request::builder()
    .method("POST")
    .uri("/admin/media?category=events")
    .header(header::AUTHORIZATION, format!("Bearer {token}"))
    .header(header::CONTENT_TYPE, "image/png")
    .header("x-file-name", "../../group photo.png")
    .body(Body::from(vec![0x89, b'P', b'N', b'G']))
    .unwrap();
  let (status, asset) = send(&s, req).await;
  assert_eq!(status, StatusCode::CREATED);
  assert_eq!(asset["kind"], "image");
  assert_eq!(asset["file_name"], "group_photo.png");
  assert_eq!(asset["size"], 4);
  assert_eq!(s.blobs.blobs.lock().unwrap().len(), 1);

  let id = asset["media_id"].as_str().unwrap().to_owned();
  let (status, _) =
    send(&s, bare_request("DELETE", &format!("/admin/media/{id}"), Some(&token))).await;
  assert_eq!(status, StatusCode::NO_CONTENT);
  assert!(s.blobs.blobs.lock().unwrap().is_empty());
  assert!(s.store.list_media(None).await.unwrap().is_empty());
}

#[tokio::test]
async fn direct_upload_failure_is_bad_gateway() {
  let s = state_with(MemoryBlobStore { failing: true, ..Default::default() }, MissingRolePolicy::Deny)
    .await;
  let token = token_for(&s, "root@sadaka.org", Some(Role::Super)).await;
  let req = Request::builder()
    .method("POST")
    .uri("/admin/media")
    .header(header::AUTHORIZATION, format!("Bearer {token}"))
    .header(header::CONTENT_TYPE, "application/pdf")
    .body(Body::from("pdf bytes"))
    .unwrap();
  let (status, _) = send(&s, req).await;
  assert_eq!(status, StatusCode::BAD_GATEWAY);
  assert!(s.store.list_media(None).await.unwrap().is_empty());
}
