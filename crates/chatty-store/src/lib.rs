//! # chatty-store
//!
//! Local settings storage for the Chatty client, backed by SQLite.
//!
//! The crate exposes a synchronous `Database` handle that wraps a
//! `rusqlite::Connection`, runs schema migrations on open and offers a small
//! string key-value API for client preferences such as the UI theme.

pub mod database;
pub mod migrations;
pub mod settings;

mod error;

pub use database::Database;
pub use error::{Result, StoreError};
