//! Cache layer that orchestrates caching logic with network fetching.

use std::sync::{Arc, Mutex};
use tokio::task::JoinSet;
use tracing::{debug, warn};

use super::storage::CacheStorage;
use super::traits::{CacheResult, CachedEntry};
use crate::net::{FetchError, Fetcher, Request, Response};

/// Cache layer that manages caching policies and network fetching.
///
/// Store failures never reach the caller: a failed write is logged and the
/// live response is still returned, a failed read is treated as a miss.
///
/// Background refreshes are tracked in a set shared by every clone, so a
/// short-lived process can [`settle`](Self::settle) them before exiting.
pub struct CacheLayer {
  storage: Arc<dyn CacheStorage>,
  fetcher: Arc<dyn Fetcher>,
  refreshes: Arc<Mutex<JoinSet<()>>>,
}

impl CacheLayer {
  /// Create a new cache layer over the given storage and network.
  pub fn new(storage: Arc<dyn CacheStorage>, fetcher: Arc<dyn Fetcher>) -> Self {
    Self {
      storage,
      fetcher,
      refreshes: Arc::new(Mutex::new(JoinSet::new())),
    }
  }

  pub fn storage(&self) -> &Arc<dyn CacheStorage> {
    &self.storage
  }

  /// Plain network fetch with no cache involvement.
  pub async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
    self.fetcher.fetch(request).await
  }

  /// Read an entry, logging and swallowing store errors.
  pub fn lookup(&self, namespace: &str, key: &str) -> Option<CachedEntry> {
    match self.storage.get(namespace, key) {
      Ok(entry) => entry,
      Err(e) => {
        warn!(namespace = %namespace, key = %key, error = %e, "cache read failed");
        None
      }
    }
  }

  /// Write an entry, logging and swallowing store errors.
  pub fn store(&self, namespace: &str, key: &str, response: &Response) {
    if let Err(e) = self.storage.put(namespace, key, response) {
      warn!(namespace = %namespace, key = %key, error = %e, "cache write failed");
    }
  }

  /// Fetch with network-first strategy.
  ///
  /// 1. Fetch from network; a 2xx response is stored before it is returned
  /// 2. On network failure, return the stored copy (offline mode)
  /// 3. With nothing stored, hand the network error back to the caller
  pub async fn network_first(
    &self,
    namespace: &str,
    request: &Request,
  ) -> Result<CacheResult<Response>, FetchError> {
    let key = request.cache_key();

    match self.fetcher.fetch(request).await {
      Ok(response) => {
        if response.ok() {
          self.store(namespace, &key, &response);
        }
        Ok(CacheResult::from_network(response))
      }
      Err(e) => match self.lookup(namespace, &key) {
        Some(cached) => {
          debug!(namespace = %namespace, key = %key, error = %e, "network failed, serving cached copy");
          Ok(CacheResult::offline(cached.response, cached.cached_at))
        }
        None => Err(e),
      },
    }
  }

  /// Fetch with cache-first strategy.
  ///
  /// 1. Check cache - on a hit return immediately and refresh in the background
  /// 2. On a miss fetch from network, storing a 2xx response before returning it
  pub async fn cache_first(
    &self,
    namespace: &str,
    request: &Request,
  ) -> Result<CacheResult<Response>, FetchError> {
    let key = request.cache_key();

    if let Some(cached) = self.lookup(namespace, &key) {
      self.revalidate(namespace, request);
      return Ok(CacheResult::from_cache(cached.response, cached.cached_at));
    }

    let response = self.fetcher.fetch(request).await?;
    if response.ok() {
      self.store(namespace, &key, &response);
    }
    Ok(CacheResult::from_network(response))
  }

  /// Refresh an entry on a background task.
  ///
  /// The caller never awaits the task; its failures are logged and dropped here.
  pub fn revalidate(&self, namespace: &str, request: &Request) {
    let storage = Arc::clone(&self.storage);
    let fetcher = Arc::clone(&self.fetcher);
    let namespace = namespace.to_string();
    let request = request.clone();

    let mut refreshes = self.refreshes.lock().unwrap_or_else(|e| e.into_inner());
    // Reap finished refreshes so the set only holds running ones
    while refreshes.try_join_next().is_some() {}

    refreshes.spawn(async move {
      match fetcher.fetch(&request).await {
        Ok(response) if response.ok() => {
          if let Err(e) = storage.put(&namespace, &request.cache_key(), &response) {
            warn!(namespace = %namespace, url = %request.url, error = %e, "cache write failed");
          } else {
            debug!(namespace = %namespace, url = %request.url, "background refresh stored");
          }
        }
        Ok(response) => {
          debug!(namespace = %namespace, url = %request.url, status = response.status, "background refresh skipped");
        }
        Err(e) => {
          debug!(namespace = %namespace, url = %request.url, error = %e, "background refresh failed");
        }
      }
    });
  }

  /// Wait for every background refresh started so far.
  pub async fn settle(&self) {
    let mut pending = {
      let mut refreshes = self.refreshes.lock().unwrap_or_else(|e| e.into_inner());
      std::mem::take(&mut *refreshes)
    };

    while let Some(joined) = pending.join_next().await {
      if let Err(e) = joined {
        warn!(error = %e, "background refresh task failed");
      }
    }
  }
}

impl Clone for CacheLayer {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
      fetcher: Arc::clone(&self.fetcher),
      refreshes: Arc::clone(&self.refreshes),
    }
  }
}
