//! Out-of-band commands and host events: page messages, push, notification
//! clicks and background sync.

use color_eyre::Result;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::questions::ALL_SUBJECTS;
use super::ServiceWorker;
use crate::clients::{Notification, NotificationAction};

/// Background sync tag for answers recorded while offline
pub const SYNC_ANSWERS_TAG: &str = "sync-answers";

pub const NOTIFICATION_ICON: &str = "/icons/icon-192.png";
pub const NOTIFICATION_BADGE: &str = "/icons/icon-72.png";
pub const ACTION_OPEN: &str = "open";
pub const ACTION_CLOSE: &str = "close";

/// Message sent from a page to the worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMessage {
  PreloadQuiz {
    #[serde(default)]
    subject: Option<String>,
  },
  ClearCache,
  GetCacheStatus,
}

/// Reply to `GET_CACHE_STATUS`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStatus {
  pub version: String,
  #[serde(rename = "static")]
  pub static_assets: usize,
  pub quiz: usize,
  pub api: usize,
  pub total: usize,
}

/// Payload delivered by a push message.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PushPayload {
  pub title: String,
  #[serde(default)]
  pub body: String,
  #[serde(default)]
  pub url: Option<String>,
}

impl PushPayload {
  pub fn into_notification(self) -> Notification {
    Notification {
      title: self.title,
      body: self.body,
      icon: NOTIFICATION_ICON.to_string(),
      badge: NOTIFICATION_BADGE.to_string(),
      vibrate: vec![100, 50, 100],
      url: self.url.unwrap_or_else(|| "/".to_string()),
      actions: vec![
        NotificationAction {
          action: ACTION_OPEN.to_string(),
          title: "Open".to_string(),
        },
        NotificationAction {
          action: ACTION_CLOSE.to_string(),
          title: "Close".to_string(),
        },
      ],
    }
  }
}

impl ServiceWorker {
  /// Handle a page message. `GET_CACHE_STATUS` answers on `reply`.
  pub async fn on_message(
    &self,
    message: ControlMessage,
    reply: Option<oneshot::Sender<CacheStatus>>,
  ) -> Result<()> {
    match message {
      ControlMessage::PreloadQuiz { subject } => {
        let subject = subject.unwrap_or_else(|| ALL_SUBJECTS.to_string());
        self.questions().preload(&subject).await;
      }
      ControlMessage::ClearCache => {
        self.clear_all()?;
      }
      ControlMessage::GetCacheStatus => {
        let status = self.status()?;
        match reply {
          Some(port) => {
            if port.send(status).is_err() {
              debug!("status requester went away");
            }
          }
          None => warn!("GET_CACHE_STATUS without a reply channel"),
        }
      }
    }
    Ok(())
  }

  /// Ask for the cache status over a one-shot reply channel.
  pub async fn request_status(&self) -> Result<CacheStatus> {
    let (tx, rx) = oneshot::channel();
    self
      .on_message(ControlMessage::GetCacheStatus, Some(tx))
      .await?;
    Ok(rx.await?)
  }

  /// Entry counts of the current generation's namespaces.
  pub fn status(&self) -> Result<CacheStatus> {
    let storage = self.storage();
    let namespaces = &self.config().namespaces;

    let static_assets = storage.count(&namespaces.static_assets)?;
    let quiz = storage.count(&namespaces.quiz)?;
    let api = storage.count(&namespaces.api)?;

    Ok(CacheStatus {
      version: self.config().generation.clone(),
      static_assets,
      quiz,
      api,
      total: static_assets + quiz + api,
    })
  }

  /// Delete every namespace, whatever its prefix or generation.
  pub fn clear_all(&self) -> Result<usize> {
    let storage = self.storage();
    let names = storage.namespaces()?;
    for name in &names {
      storage.delete_namespace(name)?;
    }
    info!(count = names.len(), "cleared all caches");
    Ok(names.len())
  }

  /// Handle raw push data. An empty or malformed payload shows nothing.
  pub fn on_push_data(&self, data: &[u8]) -> Option<Notification> {
    if data.is_empty() {
      debug!("push without data");
      return None;
    }
    match serde_json::from_slice::<PushPayload>(data) {
      Ok(payload) => Some(self.on_push(payload)),
      Err(e) => {
        warn!(error = %e, "ignoring malformed push payload");
        None
      }
    }
  }

  /// Display a notification for a push message.
  pub fn on_push(&self, payload: PushPayload) -> Notification {
    let notification = payload.into_notification();
    info!(title = %notification.title, url = %notification.url, "showing notification");
    self.clients().show_notification(notification.clone());
    notification
  }

  /// React to a notification click. `action` is `None` for a body click.
  ///
  /// The notification always closes; anything but `close` navigates to its url.
  pub fn on_notification_click(&self, notification: &Notification, action: Option<&str>) {
    self.clients().close_notification(&notification.title);

    if action == Some(ACTION_CLOSE) {
      return;
    }
    self.clients().open_window(&notification.url);
  }

  /// Background sync hook.
  pub async fn on_sync(&self, tag: &str) {
    if tag == SYNC_ANSWERS_TAG {
      self.sync_pending_answers().await;
    } else {
      debug!(tag, "ignoring unknown sync tag");
    }
  }

  // TODO: replay answers queued while offline once the backend exposes a batch submit endpoint
  async fn sync_pending_answers(&self) {
    info!("syncing offline answers (not implemented)");
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::CacheStorage;
  use crate::clients::ClientEvent;
  use crate::net::Response;
  use crate::test_support::{origin_url, worker, worker_with};
  use crate::config::Config;

  #[test]
  fn test_control_message_wire_format() {
    let preload: ControlMessage =
      serde_json::from_str(r#"{"type":"PRELOAD_QUIZ","subject":"math"}"#).unwrap();
    assert_eq!(
      preload,
      ControlMessage::PreloadQuiz {
        subject: Some("math".to_string())
      }
    );

    let bare: ControlMessage = serde_json::from_str(r#"{"type":"PRELOAD_QUIZ"}"#).unwrap();
    assert_eq!(bare, ControlMessage::PreloadQuiz { subject: None });

    let clear: ControlMessage = serde_json::from_str(r#"{"type":"CLEAR_CACHE"}"#).unwrap();
    assert_eq!(clear, ControlMessage::ClearCache);
  }

  #[tokio::test]
  async fn test_status_before_any_writes_is_zero() {
    let (worker, _fetcher, _storage) = worker();
    let status = worker.request_status().await.unwrap();

    assert_eq!(
      serde_json::to_value(&status).unwrap(),
      serde_json::json!({"version": "v2", "static": 0, "quiz": 0, "api": 0, "total": 0})
    );
  }

  #[tokio::test]
  async fn test_install_manifest_counts_in_status() {
    let config = Config {
      static_manifest: vec!["/".to_string(), "/index.html".to_string()],
      ..Config::default()
    };
    let (worker, fetcher, _storage) = worker_with(config);
    fetcher.respond(&origin_url("/"), Response::new(200, "root"));
    fetcher.respond(&origin_url("/index.html"), Response::new(200, "index"));

    worker.start().await.unwrap();
    let status = worker.request_status().await.unwrap();
    assert_eq!(status.static_assets, 2);
    assert_eq!(status.total, 2);
  }

  #[tokio::test]
  async fn test_preload_message_fills_quiz_namespace() {
    let config = Config {
      api_base: "http://backend".to_string(),
      preload_batch_size: 2,
      ..Config::default()
    };
    let (worker, fetcher, _storage) = worker_with(config);
    fetcher.respond_json(
      "http://backend/api/quiz/random?subject=math&limit=2",
      serde_json::json!({"success": true, "data": [{"id": 1}, {"id": 2}]}),
    );

    let message: ControlMessage =
      serde_json::from_str(r#"{"type":"PRELOAD_QUIZ","subject":"math"}"#).unwrap();
    worker.on_message(message, None).await.unwrap();

    assert_eq!(worker.request_status().await.unwrap().quiz, 1);
  }

  #[tokio::test]
  async fn test_clear_cache_is_idempotent() {
    let (worker, _fetcher, storage) = worker();
    storage.put("beidou-static-v2", "a", &Response::new(200, "a")).unwrap();
    storage.put("unrelated", "b", &Response::new(200, "b")).unwrap();

    worker.on_message(ControlMessage::ClearCache, None).await.unwrap();
    assert!(storage.namespaces().unwrap().is_empty());

    worker.on_message(ControlMessage::ClearCache, None).await.unwrap();
    assert!(storage.namespaces().unwrap().is_empty());
    assert_eq!(worker.status().unwrap().total, 0);
  }

  #[tokio::test]
  async fn test_push_then_open_navigates() {
    let (worker, _fetcher, _storage) = worker();
    let mut page = worker.clients().subscribe();

    let notification = worker.on_push(PushPayload {
      title: "T".to_string(),
      body: "B".to_string(),
      url: Some("/x".to_string()),
    });
    let actions: Vec<&str> = notification.actions.iter().map(|a| a.action.as_str()).collect();
    assert_eq!(actions, vec!["open", "close"]);

    worker.on_notification_click(&notification, Some(ACTION_OPEN));

    assert_eq!(
      page.recv().await.unwrap(),
      ClientEvent::ShowNotification(notification.clone())
    );
    assert_eq!(
      page.recv().await.unwrap(),
      ClientEvent::CloseNotification {
        title: "T".to_string()
      }
    );
    assert_eq!(
      page.recv().await.unwrap(),
      ClientEvent::OpenWindow {
        url: "/x".to_string()
      }
    );
  }

  #[tokio::test]
  async fn test_close_action_only_closes() {
    let (worker, _fetcher, _storage) = worker();
    let notification = worker.on_push(PushPayload {
      title: "T".to_string(),
      body: "B".to_string(),
      url: None,
    });
    assert_eq!(notification.url, "/");

    let mut page = worker.clients().subscribe();
    worker.on_notification_click(&notification, Some(ACTION_CLOSE));

    assert!(matches!(
      page.recv().await.unwrap(),
      ClientEvent::CloseNotification { .. }
    ));
    assert!(page.try_recv().is_err());
  }

  #[test]
  fn test_push_payload_wire_format() {
    let full: PushPayload =
      serde_json::from_str(r#"{"title":"New quiz","body":"Math is ready","url":"/quiz"}"#)
        .unwrap();
    assert_eq!(
      full,
      PushPayload {
        title: "New quiz".to_string(),
        body: "Math is ready".to_string(),
        url: Some("/quiz".to_string()),
      }
    );

    let bare: PushPayload = serde_json::from_str(r#"{"title":"T"}"#).unwrap();
    assert_eq!(bare.body, "");
    assert_eq!(bare.into_notification().url, "/");
  }

  #[tokio::test]
  async fn test_push_data_shows_notification() {
    let (worker, _fetcher, _storage) = worker();
    let mut page = worker.clients().subscribe();

    let notification = worker
      .on_push_data(br#"{"title":"T","body":"B","url":"/x"}"#)
      .unwrap();
    assert_eq!(notification.url, "/x");
    assert_eq!(notification.icon, NOTIFICATION_ICON);
    assert_eq!(notification.vibrate, vec![100, 50, 100]);
    assert_eq!(
      page.recv().await.unwrap(),
      ClientEvent::ShowNotification(notification)
    );
  }

  #[tokio::test]
  async fn test_empty_or_malformed_push_shows_nothing() {
    let (worker, _fetcher, _storage) = worker();
    let mut page = worker.clients().subscribe();

    assert!(worker.on_push_data(b"").is_none());
    assert!(worker.on_push_data(b"not json").is_none());
    assert!(worker.on_push_data(br#"{"body":"no title"}"#).is_none());
    assert!(page.try_recv().is_err());
  }

  #[tokio::test]
  async fn test_sync_is_a_no_op() {
    let (worker, fetcher, _storage) = worker();
    worker.on_sync(SYNC_ANSWERS_TAG).await;
    worker.on_sync("other").await;
    assert_eq!(fetcher.calls(), 0);
  }
}
