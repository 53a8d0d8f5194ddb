//! Cache-first serving for the application shell and its assets.

use std::sync::Arc;
use tracing::{debug, warn};

use crate::cache::{CacheLayer, CacheResult};
use crate::config::{WorkerConfig, OFFLINE_SHELL_PATH};
use crate::net::{Destination, FetchError, Request, Response};

pub struct StaticAssetCache {
  config: Arc<WorkerConfig>,
  layer: CacheLayer,
}

impl StaticAssetCache {
  pub fn new(config: Arc<WorkerConfig>, layer: CacheLayer) -> Self {
    Self { config, layer }
  }

  /// Serve from cache when possible, refreshing in the background.
  ///
  /// An offline navigation that misses the cache gets the cached shell
  /// document instead; any other offline miss is an error.
  pub async fn handle(&self, request: &Request) -> Result<CacheResult<Response>, FetchError> {
    let namespace = &self.config.namespaces.static_assets;

    match self.layer.cache_first(namespace, request).await {
      Ok(result) => Ok(result),
      Err(e) if request.destination == Destination::Document => {
        match self.offline_shell() {
          Some(result) => {
            debug!(url = %request.url, "offline navigation, serving shell");
            Ok(result)
          }
          None => {
            warn!(url = %request.url, "offline navigation and no cached shell");
            Err(e)
          }
        }
      }
      Err(e) => Err(e),
    }
  }

  fn offline_shell(&self) -> Option<CacheResult<Response>> {
    let url = self.config.resolve(OFFLINE_SHELL_PATH).ok()?;
    let shell = Request::get(url);
    self
      .layer
      .lookup(&self.config.namespaces.static_assets, &shell.cache_key())
      .map(|entry| CacheResult::offline(entry.response, entry.cached_at))
  }
}
