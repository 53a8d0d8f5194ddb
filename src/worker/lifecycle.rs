//! Install and activation: generation-tagged namespace management.

use color_eyre::{eyre::eyre, Result};
use futures::future::try_join_all;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::info;

use crate::cache::CacheLayer;
use crate::clients::ClientHub;
use crate::config::WorkerConfig;
use crate::net::Request;

/// Worker lifecycle: `Installing → Installed → Activating → Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
  Installing,
  Installed,
  Activating,
  Active,
}

pub struct VersionManager {
  config: Arc<WorkerConfig>,
  layer: CacheLayer,
  clients: ClientHub,
  state: Mutex<LifecycleState>,
  skip_waiting: AtomicBool,
}

impl VersionManager {
  pub fn new(config: Arc<WorkerConfig>, layer: CacheLayer, clients: ClientHub) -> Self {
    Self {
      config,
      layer,
      clients,
      state: Mutex::new(LifecycleState::Installing),
      skip_waiting: AtomicBool::new(false),
    }
  }

  pub fn state(&self) -> LifecycleState {
    self
      .state
      .lock()
      .map(|s| *s)
      .unwrap_or(LifecycleState::Installing)
  }

  fn set_state(&self, next: LifecycleState) -> Result<()> {
    let mut state = self
      .state
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    *state = next;
    Ok(())
  }

  /// Whether install asked to activate without waiting for older instances.
  pub fn skip_waiting(&self) -> bool {
    self.skip_waiting.load(Ordering::SeqCst)
  }

  /// Prefetch the static manifest and create the install-time namespaces.
  ///
  /// All or nothing: every manifest url must answer 2xx before anything is
  /// written. On failure the state stays `Installing`.
  pub async fn install(&self) -> Result<()> {
    self.set_state(LifecycleState::Installing)?;

    let requests = self
      .config
      .static_manifest
      .iter()
      .map(|path| self.config.resolve(path).map(Request::get))
      .collect::<Result<Vec<_>>>()?;

    let fetches = requests.iter().map(|request| async move {
      let response = self
        .layer
        .fetch(request)
        .await
        .map_err(|e| eyre!("Failed to prefetch {}: {}", request.url, e))?;
      if !response.ok() {
        return Err(eyre!(
          "Failed to prefetch {}: status {}",
          request.url,
          response.status
        ));
      }
      Ok::<_, color_eyre::Report>((request.cache_key(), response))
    });
    let entries = try_join_all(fetches).await?;

    let storage = self.layer.storage();
    storage.put_all(&self.config.namespaces.static_assets, &entries)?;
    storage.open_namespace(&self.config.namespaces.quiz)?;
    info!(
      count = entries.len(),
      namespace = %self.config.namespaces.static_assets,
      "static assets cached"
    );

    self.set_state(LifecycleState::Installed)?;
    self.skip_waiting.store(true, Ordering::SeqCst);
    Ok(())
  }

  /// Delete other generations' namespaces and take control of open pages.
  ///
  /// Returns the names of the deleted namespaces.
  pub async fn activate(&self) -> Result<Vec<String>> {
    let current = self.state();
    if current != LifecycleState::Installed {
      return Err(eyre!("Cannot activate from state {:?}", current));
    }
    self.set_state(LifecycleState::Activating)?;

    let storage = self.layer.storage();
    let mut deleted = Vec::new();
    for name in storage.namespaces()? {
      if self.config.is_stale_namespace(&name) {
        storage.delete_namespace(&name)?;
        info!(namespace = %name, "removed stale cache");
        deleted.push(name);
      }
    }

    self.set_state(LifecycleState::Active)?;
    self.clients.claim();
    Ok(deleted)
  }
}
