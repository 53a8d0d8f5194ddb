//! Core types for the caching system.

use chrono::{DateTime, Utc};

use crate::net::Response;

/// A response as it was stored, with the time it was written.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedEntry {
  pub response: Response,
  pub cached_at: DateTime<Utc>,
}

/// Result from a cache operation, including data and metadata about the source.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: CacheSource,
  /// When the data was cached (if from cache)
  pub cached_at: Option<DateTime<Utc>>,
}

impl<T> CacheResult<T> {
  /// Create a new cache result from fresh network data.
  pub fn from_network(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Network,
      cached_at: None,
    }
  }

  /// Create a new cache result from a cache hit served ahead of the network.
  pub fn from_cache(data: T, cached_at: DateTime<Utc>) -> Self {
    Self {
      data,
      source: CacheSource::Cache,
      cached_at: Some(cached_at),
    }
  }

  /// Create a new cache result for offline mode.
  pub fn offline(data: T, cached_at: DateTime<Utc>) -> Self {
    Self {
      data,
      source: CacheSource::Offline,
      cached_at: Some(cached_at),
    }
  }

  /// Create a result built locally because neither network nor cache could answer.
  pub fn synthesized(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Synthesized,
      cached_at: None,
    }
  }
}

/// Indicates where a response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fresh data from network
  Network,
  /// Cache hit served first; a refresh may be running in the background
  Cache,
  /// Offline mode - network unavailable, serving cached data
  Offline,
  /// Offline mode with nothing cached; a structured failure body
  Synthesized,
}

impl CacheSource {
  /// Whether the response reflects degraded, offline operation.
  pub fn is_offline(self) -> bool {
    matches!(self, CacheSource::Offline | CacheSource::Synthesized)
  }
}
