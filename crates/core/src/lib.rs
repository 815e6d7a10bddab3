//! Core types and shared functionality for subrelay.
//!
//! This crate provides:
//! - Subscription cache with SQLite and in-memory backends
//! - Unified error types
//! - Configuration structures
//! - Reference classification
//! - The YAML merge, cover and short-id passes

pub mod cache;
pub mod config;
pub mod error;
pub mod reference;
pub mod yaml;

pub use cache::{CacheDb, CacheEntry, MemoryStore, SubscriptionStore};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use reference::SubscriptionReference;
