//! Namespaced response cache with offline support.
//!
//! This module provides the storage and policy pieces the worker builds on:
//! - Named namespaces of request-key → response blobs, persisted in SQLite
//! - Cache-first lookups with detached background revalidation
//! - Network-first fetches that fall back to the stored copy when offline

mod layer;
mod storage;
mod traits;

pub use layer::CacheLayer;
pub use storage::{CacheStorage, SqliteStorage};
pub use traits::{CacheResult, CacheSource};
