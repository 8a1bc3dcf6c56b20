//! # parlor-store
//!
//! Relational storage for the messaging subsystem, backed by SQLite.
//!
//! The crate exposes a synchronous [`Database`] handle that wraps a
//! `rusqlite::Connection` and provides typed CRUD helpers for every domain
//! model, plus [`SharedDatabase`], a cloneable async handle that serializes
//! access and runs store closures on tokio's blocking pool.

pub mod contact_requests;
pub mod database;
pub mod groups;
pub mod handle;
pub mod members;
pub mod messages;
pub mod migrations;
pub mod models;
pub mod notifications;
pub mod reads;
pub mod unread;

mod convert;
mod error;

pub use convert::now;
pub use database::Database;
pub use error::{Result, StoreError};
pub use handle::SharedDatabase;
pub use models::*;
