//! Network-first caching for read-mostly API endpoints.

use std::sync::Arc;
use tracing::info;

use super::offline::{OfflinePayload, API_UNAVAILABLE};
use crate::cache::{CacheLayer, CacheResult};
use crate::config::WorkerConfig;
use crate::net::{Request, Response};

pub struct ApiResponseCache {
  config: Arc<WorkerConfig>,
  layer: CacheLayer,
}

impl ApiResponseCache {
  pub fn new(config: Arc<WorkerConfig>, layer: CacheLayer) -> Self {
    Self { config, layer }
  }

  /// Always yields a response: live, the stored copy, or an offline failure body.
  pub async fn handle(&self, request: &Request) -> CacheResult<Response> {
    match self
      .layer
      .network_first(&self.config.namespaces.api, request)
      .await
    {
      Ok(result) => {
        if result.source.is_offline() {
          info!(path = request.url.path(), "serving cached API response");
        }
        result
      }
      Err(e) => {
        info!(path = request.url.path(), error = %e, "API offline with no cached copy");
        CacheResult::synthesized(OfflinePayload::failure(API_UNAVAILABLE).into_response())
      }
    }
  }
}
