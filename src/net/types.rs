//! Request and response values passed through the worker.

use reqwest::Method;
use serde::{Deserialize, Serialize};
use url::Url;

/// What the page intends to do with a response.
///
/// Only `Document` changes behavior: offline navigations fall back to the
/// cached application shell.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Destination {
  Document,
  #[default]
  Other,
}

/// An intercepted outbound request.
#[derive(Debug, Clone)]
pub struct Request {
  pub method: Method,
  pub url: Url,
  pub destination: Destination,
  pub headers: Vec<(String, String)>,
  pub body: Option<Vec<u8>>,
}

impl Request {
  pub fn get(url: Url) -> Self {
    Self {
      method: Method::GET,
      url,
      destination: Destination::Other,
      headers: Vec::new(),
      body: None,
    }
  }

  pub fn with_method(mut self, method: Method) -> Self {
    self.method = method;
    self
  }

  pub fn with_destination(mut self, destination: Destination) -> Self {
    self.destination = destination;
    self
  }

  pub fn with_body(mut self, body: Vec<u8>) -> Self {
    self.body = Some(body);
    self
  }

  /// Cache key for this request: the url without its fragment.
  pub fn cache_key(&self) -> String {
    let mut url = self.url.clone();
    url.set_fragment(None);
    url.into()
  }

  /// First value of a query parameter.
  pub fn query_param(&self, name: &str) -> Option<String> {
    self
      .url
      .query_pairs()
      .find(|(k, _)| k == name)
      .map(|(_, v)| v.into_owned())
  }
}

/// A response body with the metadata needed to replay it later.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
  pub status: u16,
  pub headers: Vec<(String, String)>,
  pub body: Vec<u8>,
}

impl Response {
  #[cfg(test)]
  pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
    Self {
      status,
      headers: Vec::new(),
      body: body.into(),
    }
  }

  /// Build a 200 response carrying a JSON body.
  pub fn json<T: Serialize>(value: &T) -> serde_json::Result<Self> {
    Ok(Self {
      status: 200,
      headers: vec![("content-type".to_string(), "application/json".to_string())],
      body: serde_json::to_vec(value)?,
    })
  }

  /// Whether the status is in the 2xx range.
  pub fn ok(&self) -> bool {
    (200..300).contains(&self.status)
  }

  pub fn header(&self, name: &str) -> Option<&str> {
    self
      .headers
      .iter()
      .find(|(k, _)| k.eq_ignore_ascii_case(name))
      .map(|(_, v)| v.as_str())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_cache_key_drops_fragment() {
    let request = Request::get(Url::parse("http://host/page.html?a=1#top").unwrap());
    assert_eq!(request.cache_key(), "http://host/page.html?a=1");
  }

  #[test]
  fn test_query_param_decodes_value() {
    let request =
      Request::get(Url::parse("http://host/api/quiz/random?subject=%E6%95%B8%E5%AD%B8").unwrap());
    assert_eq!(request.query_param("subject").as_deref(), Some("數學"));
    assert_eq!(request.query_param("limit"), None);
  }

  #[test]
  fn test_ok_range() {
    assert!(Response::new(204, Vec::new()).ok());
    assert!(!Response::new(304, Vec::new()).ok());
    assert!(!Response::new(500, Vec::new()).ok());
  }

  #[test]
  fn test_json_sets_content_type() {
    let response = Response::json(&serde_json::json!({"success": true})).unwrap();
    assert_eq!(response.header("Content-Type"), Some("application/json"));
  }
}
