//! SQL schema for the Sadaka SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS users (
    user_id       TEXT PRIMARY KEY,
    email         TEXT NOT NULL UNIQUE,   -- normalised lowercase
    password_hash TEXT NOT NULL,          -- argon2 PHC string
    created_at    TEXT NOT NULL
);

-- Bearer sessions; only the SHA-256 of the token is stored.
CREATE TABLE IF NOT EXISTS sessions (
    token_hash TEXT PRIMARY KEY,
    user_id    TEXT NOT NULL REFERENCES users(user_id),
    created_at TEXT NOT NULL,
    expires_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS password_resets (
    token_hash TEXT PRIMARY KEY,
    user_id    TEXT NOT NULL REFERENCES users(user_id),
    expires_at TEXT NOT NULL,
    used_at    TEXT
);

-- One role document per user; absence means no role.
CREATE TABLE IF NOT EXISTS roles (
    user_id     TEXT PRIMARY KEY REFERENCES users(user_id),
    role        TEXT NOT NULL,            -- 'super' | 'dawa' | 'relief' | 'sponsorship'
    assigned_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS submissions (
    id         TEXT PRIMARY KEY,
    collection TEXT NOT NULL,
    status     TEXT NOT NULL,
    form_json  TEXT NOT NULL,             -- tagged SubmissionForm
    created_at TEXT NOT NULL
);

-- Reply log, append-only per submission.
-- Rows are only ever inserted, or removed with their parent.
CREATE TABLE IF NOT EXISTS replies (
    submission_id TEXT    NOT NULL REFERENCES submissions(id) ON DELETE CASCADE,
    seq           INTEGER NOT NULL,
    reply_id      TEXT    NOT NULL UNIQUE,
    message       TEXT    NOT NULL,
    author_id     TEXT    NOT NULL,
    author_email  TEXT    NOT NULL,
    created_at    TEXT    NOT NULL,
    PRIMARY KEY (submission_id, seq)
);

CREATE TABLE IF NOT EXISTS posts (
    post_id    TEXT PRIMARY KEY,
    title      TEXT NOT NULL,
    body       TEXT NOT NULL,
    category   TEXT NOT NULL,
    image_url  TEXT,
    published  INTEGER NOT NULL DEFAULT 0,
    author_id  TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- No foreign keys from posts: deleting media leaves image_url dangling.
CREATE TABLE IF NOT EXISTS media (
    media_id     TEXT PRIMARY KEY,
    url          TEXT NOT NULL,
    storage_key  TEXT NOT NULL,
    file_name    TEXT NOT NULL,
    content_type TEXT NOT NULL,
    kind         TEXT NOT NULL,
    size         INTEGER NOT NULL,
    category     TEXT NOT NULL,
    uploaded_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS submissions_collection_idx ON submissions(collection, created_at);
CREATE INDEX IF NOT EXISTS sessions_user_idx          ON sessions(user_id);
CREATE INDEX IF NOT EXISTS posts_created_idx          ON posts(created_at);
CREATE INDEX IF NOT EXISTS media_category_idx         ON media(category);

PRAGMA user_version = 1;
";
