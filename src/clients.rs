//! Channel between the worker and the pages it controls.
//!
//! Pages subscribe to a broadcast of [`ClientEvent`]s: worker messages,
//! navigation requests and notifications to display.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

/// Buffered events per subscriber before the slowest one starts lagging
const CHANNEL_CAPACITY: usize = 64;

/// Message posted from the worker to pages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkerMessage {
  PreloadComplete { subject: String },
}

/// A button on a displayed notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAction {
  pub action: String,
  pub title: String,
}

/// A system notification as handed to the host for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
  pub title: String,
  pub body: String,
  pub icon: String,
  pub badge: String,
  pub vibrate: Vec<u32>,
  /// Page opened when the notification is activated
  pub url: String,
  pub actions: Vec<NotificationAction>,
}

/// Everything the worker asks the host page context to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
  Message(WorkerMessage),
  ShowNotification(Notification),
  CloseNotification { title: String },
  OpenWindow { url: String },
  Claimed,
}

/// Handle to every connected page.
#[derive(Clone)]
pub struct ClientHub {
  tx: broadcast::Sender<ClientEvent>,
  claimed: Arc<AtomicBool>,
}

impl ClientHub {
  pub fn new() -> Self {
    let (tx, _rx) = broadcast::channel(CHANNEL_CAPACITY);
    Self {
      tx,
      claimed: Arc::new(AtomicBool::new(false)),
    }
  }

  /// Connect a page.
  pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
    self.tx.subscribe()
  }

  /// Post a message to every connected page. Returns how many received it.
  pub fn post_message_all(&self, message: WorkerMessage) -> usize {
    self.send(ClientEvent::Message(message))
  }

  pub fn show_notification(&self, notification: Notification) -> usize {
    self.send(ClientEvent::ShowNotification(notification))
  }

  pub fn close_notification(&self, title: &str) -> usize {
    self.send(ClientEvent::CloseNotification {
      title: title.to_string(),
    })
  }

  /// Navigate a page (existing or new) to `url`.
  pub fn open_window(&self, url: &str) -> usize {
    self.send(ClientEvent::OpenWindow {
      url: url.to_string(),
    })
  }

  /// Take control of all open pages without waiting for a reload.
  pub fn claim(&self) {
    self.claimed.store(true, Ordering::SeqCst);
    self.send(ClientEvent::Claimed);
  }

  pub fn is_claimed(&self) -> bool {
    self.claimed.load(Ordering::SeqCst)
  }

  fn send(&self, event: ClientEvent) -> usize {
    // No subscribers is not an error; there is simply nobody to tell
    match self.tx.send(event) {
      Ok(n) => n,
      Err(broadcast::error::SendError(event)) => {
        debug!(?event, "no connected pages");
        0
      }
    }
  }
}

impl Default for ClientHub {
  fn default() -> Self {
    Self::new()
  }
}
