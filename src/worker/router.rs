//! Request classification.

use reqwest::Method;

use crate::config::{WorkerConfig, API_PREFIX, RANDOM_QUESTIONS_PATH};
use crate::net::Request;

/// Which policy serves a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
  /// Non-GET: straight to network, never cached
  Bypass,
  /// API path outside the allow-list: straight to network, never cached
  Uncached,
  /// Random question endpoint
  Questions,
  /// Allow-listed API path: network-first
  Api,
  /// Everything else: cache-first
  Static,
}

/// Pick exactly one route for a request. Never fails.
pub fn classify(config: &WorkerConfig, request: &Request) -> Route {
  if request.method != Method::GET {
    return Route::Bypass;
  }

  let path = request.url.path();
  if !path.starts_with(API_PREFIX) {
    return Route::Static;
  }

  if path == RANDOM_QUESTIONS_PATH {
    Route::Questions
  } else if config
    .cacheable_api
    .iter()
    .any(|prefix| path.starts_with(prefix.as_str()))
  {
    Route::Api
  } else {
    Route::Uncached
  }
}
