//! The offline caching worker.
//!
//! Every request from the page goes through [`ServiceWorker::handle_fetch`],
//! which routes it to one caching policy:
//! - static assets: cache-first with background revalidation
//! - allow-listed API paths: network-first with cache fallback
//! - the random question endpoint: network-first with offline resampling
//!
//! Install/activate and the page control channel live alongside.

mod api;
mod control;
mod lifecycle;
mod offline;
mod questions;
mod router;
mod static_assets;

pub use api::ApiResponseCache;
pub use control::ControlMessage;
pub use lifecycle::VersionManager;
pub use questions::{QuestionSetCache, ALL_SUBJECTS};
pub use router::{classify, Route};
pub use static_assets::StaticAssetCache;

use color_eyre::Result;
use std::sync::Arc;
use tracing::debug;

use crate::cache::{CacheLayer, CacheResult, CacheStorage};
use crate::clients::ClientHub;
use crate::config::WorkerConfig;
use crate::net::{FetchError, Fetcher, Request, Response};

pub struct ServiceWorker {
  config: Arc<WorkerConfig>,
  layer: CacheLayer,
  clients: ClientHub,
  static_assets: StaticAssetCache,
  api: ApiResponseCache,
  questions: QuestionSetCache,
  lifecycle: VersionManager,
}

impl ServiceWorker {
  pub fn new(
    config: Arc<WorkerConfig>,
    storage: Arc<dyn CacheStorage>,
    fetcher: Arc<dyn Fetcher>,
    clients: ClientHub,
  ) -> Self {
    let layer = CacheLayer::new(storage, fetcher);

    Self {
      static_assets: StaticAssetCache::new(config.clone(), layer.clone()),
      api: ApiResponseCache::new(config.clone(), layer.clone()),
      questions: QuestionSetCache::new(config.clone(), layer.clone(), clients.clone()),
      lifecycle: VersionManager::new(config.clone(), layer.clone(), clients.clone()),
      config,
      layer,
      clients,
    }
  }

  pub fn config(&self) -> &WorkerConfig {
    &self.config
  }

  pub fn clients(&self) -> &ClientHub {
    &self.clients
  }

  pub fn questions(&self) -> &QuestionSetCache {
    &self.questions
  }

  pub fn lifecycle(&self) -> &VersionManager {
    &self.lifecycle
  }

  fn storage(&self) -> &Arc<dyn CacheStorage> {
    self.layer.storage()
  }

  /// Install, then activate straight away (skip-waiting).
  pub async fn start(&self) -> Result<Vec<String>> {
    self.lifecycle.install().await?;
    self.lifecycle.activate().await
  }

  /// Wait for background cache refreshes to finish.
  pub async fn settle(&self) {
    self.layer.settle().await;
  }

  /// Serve an intercepted request.
  ///
  /// API and question requests always produce a response; only pass-through
  /// and static requests can surface a network failure.
  pub async fn handle_fetch(&self, request: &Request) -> Result<CacheResult<Response>, FetchError> {
    let route = classify(&self.config, request);
    debug!(method = %request.method, url = %request.url, ?route, "intercepted");

    match route {
      Route::Bypass | Route::Uncached => {
        let response = self.layer.fetch(request).await?;
        Ok(CacheResult::from_network(response))
      }
      Route::Questions => Ok(self.questions.handle(request).await),
      Route::Api => Ok(self.api.handle(request).await),
      Route::Static => self.static_assets.handle(request).await,
    }
  }
}
