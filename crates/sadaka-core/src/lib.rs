//! Core types and trait definitions for the Sadaka admin backend.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! Storage backends, the JSON API and the server binary all depend on it.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod auth_state;
pub mod blob;
pub mod directory;
pub mod error;
pub mod guard;
pub mod identity;
pub mod media;
pub mod notify;
pub mod post;
pub mod role;
pub mod store;
pub mod submission;
pub mod validate;

pub use error::{Error, Result};
