//! Question-set cache with offline resampling.
//!
//! Each subject's most recent full batch is kept under the synthetic key
//! `quiz-<subject>`, independent of how many records the page asked for.
//! Offline requests are answered by shuffling that batch and taking the
//! requested number of records.

use color_eyre::{eyre::eyre, Result};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::offline::{OfflinePayload, NO_CACHED_QUESTIONS};
use crate::cache::{CacheLayer, CacheResult};
use crate::clients::{ClientHub, WorkerMessage};
use crate::config::{WorkerConfig, RANDOM_QUESTIONS_PATH};
use crate::net::{Request, Response};

/// Subject used when a request names none; also the preload sentinel
pub const ALL_SUBJECTS: &str = "all";

/// One question, stored and replayed verbatim whatever its shape.
pub type QuestionRecord = Value;

/// The backend's `{success, data}` envelope.
#[derive(Debug, Deserialize)]
struct QuestionEnvelope {
  #[serde(default)]
  success: bool,
  #[serde(default)]
  data: Option<Vec<QuestionRecord>>,
}

impl QuestionEnvelope {
  /// Records of a successful, well-formed body.
  fn parse(body: &[u8]) -> Option<Vec<QuestionRecord>> {
    let envelope: QuestionEnvelope = serde_json::from_slice(body).ok()?;
    if envelope.success {
      envelope.data
    } else {
      None
    }
  }
}

/// Synthetic cache key for a subject's question batch.
pub fn cache_key(subject: &str) -> String {
  format!("quiz-{}", subject)
}

/// Shuffle `records` and keep the first `count`.
///
/// Only reorders and truncates, so the result is always drawn from the input.
pub fn sample<R: Rng + ?Sized>(
  mut records: Vec<QuestionRecord>,
  count: usize,
  rng: &mut R,
) -> Vec<QuestionRecord> {
  records.shuffle(rng);
  records.truncate(count);
  records
}

/// Outcome of a preload run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PreloadReport {
  pub subject: String,
  pub cached: Vec<String>,
  pub failed: Vec<String>,
}

pub struct QuestionSetCache {
  config: Arc<WorkerConfig>,
  layer: CacheLayer,
  clients: ClientHub,
}

impl QuestionSetCache {
  pub fn new(config: Arc<WorkerConfig>, layer: CacheLayer, clients: ClientHub) -> Self {
    Self {
      config,
      layer,
      clients,
    }
  }

  /// Network-first with resampling fallback. Never fails.
  pub async fn handle(&self, request: &Request) -> CacheResult<Response> {
    let subject = request
      .query_param("subject")
      .filter(|s| !s.is_empty())
      .unwrap_or_else(|| ALL_SUBJECTS.to_string());
    let count = request
      .query_param("limit")
      .and_then(|l| l.trim().parse::<usize>().ok())
      .unwrap_or(self.config.default_question_count);

    match self.layer.fetch(request).await {
      Ok(response) => {
        if response.ok() {
          match QuestionEnvelope::parse(&response.body) {
            Some(records) => self.store(&subject, &records),
            None => debug!(subject = %subject, "question response not cacheable"),
          }
        }
        CacheResult::from_network(response)
      }
      Err(e) => {
        info!(subject = %subject, error = %e, "offline, trying cached question set");
        self.offline_response(&subject, count)
      }
    }
  }

  fn offline_response(&self, subject: &str, count: usize) -> CacheResult<Response> {
    match self.cached(subject) {
      Some((records, cached_at)) => {
        let selected = sample(records, count, &mut rand::thread_rng());
        CacheResult::offline(OfflinePayload::questions(selected).into_response(), cached_at)
      }
      None => {
        CacheResult::synthesized(OfflinePayload::failure(NO_CACHED_QUESTIONS).into_response())
      }
    }
  }

  /// Replace the stored batch for a subject.
  pub fn store(&self, subject: &str, records: &[QuestionRecord]) {
    match Response::json(&records) {
      Ok(response) => {
        self
          .layer
          .store(&self.config.namespaces.quiz, &cache_key(subject), &response);
        debug!(subject = %subject, count = records.len(), "question set stored");
      }
      Err(e) => warn!(subject = %subject, error = %e, "failed to serialize question set"),
    }
  }

  /// Stored batch for a subject. A malformed entry counts as a miss.
  pub fn cached(&self, subject: &str) -> Option<(Vec<QuestionRecord>, chrono::DateTime<chrono::Utc>)> {
    let entry = self
      .layer
      .lookup(&self.config.namespaces.quiz, &cache_key(subject))?;

    match serde_json::from_slice::<Vec<QuestionRecord>>(&entry.response.body) {
      Ok(records) => Some((records, entry.cached_at)),
      Err(e) => {
        warn!(subject = %subject, error = %e, "malformed cached question set");
        None
      }
    }
  }

  /// Fetch and store a full batch for `subject`, or every known subject for `all`.
  ///
  /// A failing subject is logged and skipped. Connected pages are told when
  /// the run finishes regardless of how many subjects succeeded.
  pub async fn preload(&self, subject: &str) -> PreloadReport {
    let subjects: Vec<String> = if subject == ALL_SUBJECTS {
      self.config.subjects.clone()
    } else {
      vec![subject.to_string()]
    };

    let mut report = PreloadReport {
      subject: subject.to_string(),
      ..PreloadReport::default()
    };

    for subj in subjects {
      match self.preload_one(&subj).await {
        Ok(()) => {
          info!(subject = %subj, "question set preloaded");
          report.cached.push(subj);
        }
        Err(e) => {
          warn!(subject = %subj, error = %e, "question set preload failed");
          report.failed.push(subj);
        }
      }
    }

    self.clients.post_message_all(WorkerMessage::PreloadComplete {
      subject: subject.to_string(),
    });

    report
  }

  async fn preload_one(&self, subject: &str) -> Result<()> {
    let mut url = self.config.api_base.join(RANDOM_QUESTIONS_PATH)?;
    url
      .query_pairs_mut()
      .append_pair("subject", subject)
      .append_pair("limit", &self.config.preload_batch_size.to_string());

    let response = self.layer.fetch(&Request::get(url)).await?;
    if !response.ok() {
      return Err(eyre!("Question fetch returned status {}", response.status));
    }

    let records = QuestionEnvelope::parse(&response.body)
      .ok_or_else(|| eyre!("Unsuccessful or malformed question response"))?;
    self.store(subject, &records);
    Ok(())
  }
}
