//! JSON bodies synthesized when the network is unavailable.

use serde::{Deserialize, Serialize};
use tracing::error;

use super::questions::QuestionRecord;
use crate::net::Response;

pub const API_UNAVAILABLE: &str = "Offline mode: data unavailable";
pub const NO_CACHED_QUESTIONS: &str = "Offline mode and no cached questions";
pub const CACHED_QUESTIONS_NOTICE: &str = "Offline mode: using cached questions";

/// `{success, data?, error?, offline: true, message?}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfflinePayload {
  pub success: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub data: Option<Vec<QuestionRecord>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub error: Option<String>,
  pub offline: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub message: Option<String>,
}

impl OfflinePayload {
  pub fn failure(error: &str) -> Self {
    Self {
      success: false,
      data: None,
      error: Some(error.to_string()),
      offline: true,
      message: None,
    }
  }

  pub fn questions(data: Vec<QuestionRecord>) -> Self {
    Self {
      success: true,
      data: Some(data),
      error: None,
      offline: true,
      message: Some(CACHED_QUESTIONS_NOTICE.to_string()),
    }
  }

  pub fn into_response(self) -> Response {
    Response::json(&self).unwrap_or_else(|e| {
      error!(error = %e, "failed to serialize offline payload");
      Response {
        status: 200,
        headers: vec![("content-type".to_string(), "application/json".to_string())],
        body: br#"{"success":false,"offline":true}"#.to_vec(),
      }
    })
  }
}
