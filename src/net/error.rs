use thiserror::Error;

/// Failure to obtain any response from the network.
///
/// A non-2xx status is not a `FetchError`: the server answered, so callers
/// receive the response and decide what to do with it.
#[derive(Error, Debug)]
pub enum FetchError {
  #[error("Network error: {0}")]
  Network(String),

  #[error("Request timed out after {0:?}")]
  Timeout(std::time::Duration),

  #[error("Invalid request url: {0}")]
  InvalidUrl(String),

  #[error("Failed to read response body: {0}")]
  Body(String),
}

impl From<reqwest::Error> for FetchError {
  fn from(e: reqwest::Error) -> Self {
    if e.is_builder() {
      FetchError::InvalidUrl(e.to_string())
    } else if e.is_body() || e.is_decode() {
      FetchError::Body(e.to_string())
    } else {
      FetchError::Network(e.to_string())
    }
  }
}
