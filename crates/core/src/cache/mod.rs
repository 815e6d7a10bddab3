//! Key-value cache for registered subscriptions.
//!
//! The resolver only sees the [`SubscriptionStore`] capability. Two backends
//! implement it:
//!
//! - [`CacheDb`]: SQLite via tokio-rusqlite, WAL mode, versioned migrations
//! - [`MemoryStore`]: an in-process map

pub mod connection;
pub mod entries;
pub mod migrations;
pub mod store;

pub use crate::Error;

pub use connection::CacheDb;
pub use entries::CacheEntry;
pub use store::{MemoryStore, SubscriptionStore};
