//! SQLite backend for the Sadaka document store, role directory and identity
//! provider.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime.

mod directory;
mod encode;
mod identity;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
