//! # natter-store
//!
//! Account and contact storage for the natter chat server, backed by SQLite.
//!
//! [`Database`] wraps a `rusqlite::Connection` and provides typed helpers for
//! accounts, presence, contacts and pending contact requests. The server
//! talks to it only through the [`Directory`] trait, which [`SharedDatabase`]
//! implements by serialising calls over one connection.

pub mod accounts;
pub mod contacts;
pub mod database;
pub mod directory;
pub mod migrations;
pub mod models;
pub mod password;
pub mod validate;

mod error;

pub use database::Database;
pub use directory::{Directory, SharedDatabase};
pub use error::{Result, StoreError};
pub use models::*;
pub use validate::SignupError;
