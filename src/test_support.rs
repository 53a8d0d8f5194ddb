//! Scripted network for tests.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::cache::SqliteStorage;
use crate::clients::ClientHub;
use crate::config::{Config, WorkerConfig};
use crate::net::{FetchError, Fetcher, Request, Response};
use crate::worker::ServiceWorker;

/// Fetcher answering from a fixed url → response table.
///
/// Unknown urls answer 404. `set_offline(true)` makes every fetch fail,
/// `fail_url` fails only one url. `set_delay` makes every fetch slow.
#[derive(Default)]
pub struct MockFetcher {
  responses: Mutex<HashMap<String, Response>>,
  failing: Mutex<HashSet<String>>,
  offline: AtomicBool,
  delay: Mutex<Option<Duration>>,
  calls: AtomicUsize,
}

impl MockFetcher {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn respond(&self, url: &str, response: Response) {
    self
      .responses
      .lock()
      .unwrap()
      .insert(url.to_string(), response);
  }

  pub fn respond_json(&self, url: &str, value: serde_json::Value) {
    self.respond(url, Response::json(&value).unwrap());
  }

  pub fn fail_url(&self, url: &str) {
    self.failing.lock().unwrap().insert(url.to_string());
  }

  pub fn set_offline(&self, offline: bool) {
    self.offline.store(offline, Ordering::SeqCst);
  }

  pub fn set_delay(&self, delay: Duration) {
    *self.delay.lock().unwrap() = Some(delay);
  }

  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl Fetcher for MockFetcher {
  async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    let url = request.url.as_str();

    let delay = *self.delay.lock().unwrap();
    if let Some(delay) = delay {
      tokio::time::sleep(delay).await;
    }

    if self.offline.load(Ordering::SeqCst) || self.failing.lock().unwrap().contains(url) {
      return Err(FetchError::Network(format!("connection refused: {}", url)));
    }

    Ok(
      self
        .responses
        .lock()
        .unwrap()
        .get(url)
        .cloned()
        .unwrap_or_else(|| Response::new(404, "not found")),
    )
  }
}

/// Worker over an in-memory store and a scripted network.
pub fn worker_with(config: Config) -> (Arc<ServiceWorker>, Arc<MockFetcher>, Arc<SqliteStorage>) {
  let worker_config = Arc::new(WorkerConfig::from_config(&config).unwrap());
  let fetcher = Arc::new(MockFetcher::new());
  let storage = Arc::new(SqliteStorage::open_in_memory().unwrap());
  let worker = Arc::new(ServiceWorker::new(
    worker_config,
    storage.clone(),
    fetcher.clone(),
    ClientHub::new(),
  ));
  (worker, fetcher, storage)
}

pub fn worker() -> (Arc<ServiceWorker>, Arc<MockFetcher>, Arc<SqliteStorage>) {
  worker_with(Config::default())
}

/// Absolute url on the default test origin.
pub fn origin_url(path: &str) -> String {
  format!("http://localhost:8080{}", path)
}
