//! Core traits and types for the response cache.

use async_trait::async_trait;
use reqwest::Method;
use sha2::{Digest, Sha256};

use crate::error::{SyncError, SyncResult};

/// How a request was initiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
  /// Top-level page navigation; gets the offline page when unreachable
  Navigate,
  /// Any other read (API call, asset)
  Fetch,
}

/// An outbound network request as seen by the cache.
#[derive(Debug, Clone)]
pub struct Request {
  pub method: Method,
  pub url: String,
  pub mode: RequestMode,
}

impl Request {
  pub fn new(method: Method, url: impl Into<String>) -> Self {
    Self {
      method,
      url: url.into(),
      mode: RequestMode::Fetch,
    }
  }

  pub fn get(url: impl Into<String>) -> Self {
    Self::new(Method::GET, url)
  }

  pub fn navigate(url: impl Into<String>) -> Self {
    Self {
      mode: RequestMode::Navigate,
      ..Self::get(url)
    }
  }

  /// Stable, fixed-length key for this request (method + URL).
  pub fn cache_key(&self) -> String {
    let input = format!("{} {}", self.method.as_str(), self.url);

    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
  }
}

/// A fully buffered HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
  pub status: u16,
  pub headers: Vec<(String, String)>,
  pub body: Vec<u8>,
}

impl HttpResponse {
  pub fn is_success(&self) -> bool {
    (200..300).contains(&self.status)
  }

  /// Independent copy for storage; the caller keeps the original.
  pub fn duplicate(&self) -> Self {
    self.clone()
  }
}

/// Which tier of a generation an entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
  /// Precached from the manifest at install time
  Static,
  /// Stored after a successful network read
  Dynamic,
}

impl Tier {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Static => "static",
      Self::Dynamic => "dynamic",
    }
  }
}

/// The network the cache falls through to.
#[async_trait]
pub trait Network: Send + Sync {
  /// Perform the request. Any HTTP status is a completed fetch; only
  /// failures to get a response at all are errors.
  async fn fetch(&self, request: &Request) -> SyncResult<HttpResponse>;
}

/// Result of routing a request through the cache.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
  /// Served from the current generation without touching the network
  Cached(HttpResponse),
  /// Fetched from the network
  Network(HttpResponse),
  /// Navigation while unreachable: the offline page
  OfflineFallback(HttpResponse),
  /// Network failed and nothing could stand in for it
  Miss(SyncError),
}

impl FetchOutcome {
  pub fn response(&self) -> Option<&HttpResponse> {
    match self {
      Self::Cached(r) | Self::Network(r) | Self::OfflineFallback(r) => Some(r),
      Self::Miss(_) => None,
    }
  }

  /// The network was unreachable while serving this request.
  pub fn is_offline(&self) -> bool {
    matches!(self, Self::OfflineFallback(_) | Self::Miss(SyncError::Transport(_)))
  }
}

/// Entry counts of the current generation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
  pub static_entries: usize,
  pub dynamic_entries: usize,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_cache_key_depends_on_method_and_url() {
    let get = Request::get("https://example.com/stories");
    let nav = Request::navigate("https://example.com/stories");
    let post = Request::new(Method::POST, "https://example.com/stories");

    assert_eq!(get.cache_key().len(), 64);
    assert_eq!(get.cache_key(), nav.cache_key());
    assert_ne!(get.cache_key(), post.cache_key());
    assert_ne!(
      get.cache_key(),
      Request::get("https://example.com/stories?page=2").cache_key()
    );
  }

  #[test]
  fn test_outcome_offline_flag() {
    let ok = HttpResponse {
      status: 200,
      headers: vec![],
      body: b"hi".to_vec(),
    };
    assert!(!FetchOutcome::Cached(ok.clone()).is_offline());
    assert!(FetchOutcome::OfflineFallback(ok).is_offline());
    assert!(FetchOutcome::Miss(SyncError::Transport("down".into())).is_offline());
  }
}
