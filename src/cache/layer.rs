//! Cache layer that routes requests between the current generation and the network.

use futures::future::join_all;
use reqwest::Method;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::CacheConfig;
use crate::error::{CacheError, SyncResult};

use super::storage::CacheStorage;
use super::traits::{CacheStats, FetchOutcome, Network, Request, RequestMode, Tier};

/// Two-tier response cache bound to a single current generation.
///
/// The static tier is filled from the manifest by `install`; the dynamic
/// tier is filled by successful GETs passing through `handle`. Activating
/// retires every other generation wholesale.
pub struct ResponseCache<S: CacheStorage, N: Network> {
  storage: Arc<S>,
  network: Arc<N>,
  generation: String,
  origin: String,
  manifest: Vec<String>,
  offline_page: String,
}

impl<S: CacheStorage, N: Network> ResponseCache<S, N> {
  pub fn new(storage: S, network: Arc<N>, config: &CacheConfig) -> Self {
    Self {
      storage: Arc::new(storage),
      network,
      generation: config.generation(),
      origin: config.origin.trim_end_matches('/').to_string(),
      manifest: config.static_manifest.clone(),
      offline_page: config.offline_page.clone(),
    }
  }

  /// Name of the current generation.
  pub fn generation(&self) -> &str {
    &self.generation
  }

  /// Whether the current generation exists and holds every manifest asset.
  pub fn is_installed(&self) -> SyncResult<bool> {
    if !self.storage.generations()?.contains(&self.generation) {
      return Ok(false);
    }
    // Dynamic writes create the generation too, before install has run
    for path in &self.manifest {
      let request = Request::get(self.asset_url(path));
      if self.storage.get(&self.generation, &request)?.is_none() {
        return Ok(false);
      }
    }
    Ok(true)
  }

  /// Absolute URL of a manifest path.
  pub fn asset_url(&self, path: &str) -> String {
    format!("{}/{}", self.origin, path.trim_start_matches('/'))
  }

  /// Precache every manifest asset into the current generation.
  ///
  /// All-or-nothing: if any asset can't be fetched successfully, nothing
  /// is stored and the generation is not created.
  pub async fn install(&self) -> Result<usize, CacheError> {
    let requests: Vec<Request> = self
      .manifest
      .iter()
      .map(|path| Request::get(self.asset_url(path)))
      .collect();

    let responses = join_all(requests.iter().map(|r| self.network.fetch(r))).await;

    let mut entries = Vec::with_capacity(requests.len());
    for (request, response) in requests.into_iter().zip(responses) {
      match response {
        Ok(response) if response.is_success() => entries.push((request, response)),
        Ok(response) => {
          return Err(CacheError::Install {
            url: request.url,
            reason: format!("HTTP {}", response.status),
          })
        }
        Err(e) => {
          return Err(CacheError::Install {
            url: request.url,
            reason: e.to_string(),
          })
        }
      }
    }

    self.storage.put_all(&self.generation, &entries, Tier::Static)?;
    info!(generation = %self.generation, assets = entries.len(), "installed cache generation");
    Ok(entries.len())
  }

  /// Make this generation the only one: delete every other generation.
  ///
  /// Returns the names of the retired generations.
  pub fn activate(&self) -> Result<Vec<String>, CacheError> {
    let mut retired = Vec::new();
    for name in self.storage.generations()? {
      if name != self.generation && self.storage.delete_generation(&name)? {
        retired.push(name);
      }
    }

    if !retired.is_empty() {
      info!(generation = %self.generation, ?retired, "retired stale cache generations");
    }
    Ok(retired)
  }

  /// Install this generation unless it already is, then activate it.
  ///
  /// Activation runs even when nothing was installed, so generations left
  /// by a startup that stopped between the two steps are still retired.
  /// A failed install leaves every existing generation in place.
  pub async fn prepare(&self) -> Result<Vec<String>, CacheError> {
    if !self.is_installed()? {
      self.install().await?;
    }
    self.activate()
  }

  /// Route a request.
  ///
  /// - Non-GET requests go straight to the network and are never stored.
  /// - GET hits in the current generation are served without the network.
  /// - GET misses are fetched; a successful response is copied into the
  ///   dynamic tier before being returned.
  /// - When the network fails, navigations get the offline page and
  ///   everything else is a miss.
  ///
  /// Errors are limited to local storage failures on lookup.
  pub async fn handle(&self, request: &Request) -> SyncResult<FetchOutcome> {
    if request.method != Method::GET {
      return Ok(match self.network.fetch(request).await {
        Ok(response) => FetchOutcome::Network(response),
        Err(e) => FetchOutcome::Miss(e),
      });
    }

    if let Some(cached) = self.storage.get(&self.generation, request)? {
      debug!(url = %request.url, "cache hit");
      return Ok(FetchOutcome::Cached(cached));
    }

    match self.network.fetch(request).await {
      Ok(response) => {
        if response.is_success() {
          // The caller gets the original; the cache keeps its own copy
          let copy = response.duplicate();
          if let Err(e) = self
            .storage
            .put(&self.generation, request, &copy, Tier::Dynamic)
          {
            warn!(url = %request.url, error = %e, "failed to store response in cache");
          }
        }
        Ok(FetchOutcome::Network(response))
      }
      Err(e) => {
        debug!(url = %request.url, error = %e, "network unavailable");
        if request.mode == RequestMode::Navigate {
          let offline = Request::get(self.asset_url(&self.offline_page));
          if let Some(page) = self.storage.get(&self.generation, &offline)? {
            return Ok(FetchOutcome::OfflineFallback(page));
          }
        }
        Ok(FetchOutcome::Miss(e))
      }
    }
  }

  /// Entry counts of the current generation.
  pub fn stats(&self) -> SyncResult<CacheStats> {
    self.storage.stats(&self.generation)
  }
}

impl<S: CacheStorage, N: Network> Clone for ResponseCache<S, N> {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
      network: Arc::clone(&self.network),
      generation: self.generation.clone(),
      origin: self.origin.clone(),
      manifest: self.manifest.clone(),
      offline_page: self.offline_page.clone(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{HttpResponse, SqliteStorage};
  use crate::db::Database;
  use crate::error::SyncError;
  use async_trait::async_trait;
  use std::collections::HashMap;
  use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
  use std::sync::Mutex;

  /// Network double serving fixed pages, switchable offline.
  #[derive(Default)]
  struct FakeNetwork {
    pages: Mutex<HashMap<String, HttpResponse>>,
    offline: AtomicBool,
    calls: AtomicUsize,
  }

  impl FakeNetwork {
    fn serve(&self, url: &str, status: u16, body: &str) {
      self.pages.lock().unwrap().insert(
        url.to_string(),
        HttpResponse {
          status,
          headers: vec![],
          body: body.as_bytes().to_vec(),
        },
      );
    }

    fn set_offline(&self, offline: bool) {
      self.offline.store(offline, Ordering::SeqCst);
    }

    fn calls(&self) -> usize {
      self.calls.load(Ordering::SeqCst)
    }
  }

  #[async_trait]
  impl Network for FakeNetwork {
    async fn fetch(&self, request: &Request) -> SyncResult<HttpResponse> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      if self.offline.load(Ordering::SeqCst) {
        return Err(SyncError::Transport("offline".into()));
      }
      Ok(
        self
          .pages
          .lock()
          .unwrap()
          .get(&request.url)
          .cloned()
          .unwrap_or(HttpResponse {
            status: 404,
            headers: vec![],
            body: b"not found".to_vec(),
          }),
      )
    }
  }

  const ORIGIN: &str = "http://app.test";

  fn config(version: &str, manifest: &[&str]) -> CacheConfig {
    CacheConfig {
      name_prefix: "story-app-cache".into(),
      version: version.into(),
      origin: ORIGIN.into(),
      static_manifest: manifest.iter().map(|s| s.to_string()).collect(),
      offline_page: "/offline.html".into(),
    }
  }

  fn network_with_assets() -> Arc<FakeNetwork> {
    let network = Arc::new(FakeNetwork::default());
    network.serve("http://app.test/", 200, "<h1>home</h1>");
    network.serve("http://app.test/offline.html", 200, "<h1>offline</h1>");
    network.serve("http://app.test/app.js", 200, "console.log(1)");
    network
  }

  fn body(outcome: &FetchOutcome) -> &str {
    std::str::from_utf8(&outcome.response().unwrap().body).unwrap()
  }

  #[tokio::test]
  async fn test_install_precaches_manifest() {
    let network = network_with_assets();
    let storage = SqliteStorage::new(Database::open_in_memory().unwrap());
    let cache = ResponseCache::new(
      storage,
      network.clone(),
      &config("v1", &["/", "/offline.html", "/app.js"]),
    );

    assert!(!cache.is_installed().unwrap());
    assert_eq!(cache.install().await.unwrap(), 3);
    assert!(cache.is_installed().unwrap());
    assert_eq!(cache.stats().unwrap().static_entries, 3);

    network.set_offline(true);
    let outcome = cache.handle(&Request::get("http://app.test/app.js")).await.unwrap();
    assert!(matches!(outcome, FetchOutcome::Cached(_)));
    assert_eq!(body(&outcome), "console.log(1)");
  }

  #[tokio::test]
  async fn test_install_is_all_or_nothing() {
    let network = network_with_assets();
    let storage = SqliteStorage::new(Database::open_in_memory().unwrap());
    let cache = ResponseCache::new(
      storage.clone(),
      network,
      &config("v1", &["/", "/missing.css", "/app.js"]),
    );

    match cache.install().await {
      Err(CacheError::Install { url, reason }) => {
        assert_eq!(url, "http://app.test/missing.css");
        assert_eq!(reason, "HTTP 404");
      }
      other => panic!("expected install failure, got {:?}", other),
    }
    assert!(storage.generations().unwrap().is_empty());
    assert_eq!(cache.stats().unwrap(), CacheStats::default());
  }

  #[tokio::test]
  async fn test_activate_retires_other_generations() {
    let network = network_with_assets();
    let storage = SqliteStorage::new(Database::open_in_memory().unwrap());
    let manifest = ["/", "/offline.html"];
    let v1 = ResponseCache::new(storage.clone(), network.clone(), &config("v1", &manifest));
    let v2 = ResponseCache::new(storage.clone(), network.clone(), &config("v2", &manifest));
    let v3 = ResponseCache::new(storage.clone(), network.clone(), &config("v3", &manifest));
    v1.install().await.unwrap();
    v2.install().await.unwrap();
    v3.install().await.unwrap();

    let mut retired = v3.activate().unwrap();
    retired.sort();
    assert_eq!(retired, vec!["story-app-cache-v1", "story-app-cache-v2"]);
    assert_eq!(storage.generations().unwrap(), vec!["story-app-cache-v3"]);

    network.set_offline(true);
    let home = Request::get("http://app.test/");
    assert!(matches!(v3.handle(&home).await.unwrap(), FetchOutcome::Cached(_)));
    assert!(matches!(v1.handle(&home).await.unwrap(), FetchOutcome::Miss(_)));
    assert!(matches!(v2.handle(&home).await.unwrap(), FetchOutcome::Miss(_)));
  }

  #[tokio::test]
  async fn test_prepare_retires_stale_generation_when_already_installed() {
    let network = network_with_assets();
    let storage = SqliteStorage::new(Database::open_in_memory().unwrap());
    let manifest = ["/", "/offline.html"];
    let v1 = ResponseCache::new(storage.clone(), network.clone(), &config("v1", &manifest));
    let v2 = ResponseCache::new(storage.clone(), network.clone(), &config("v2", &manifest));
    v1.install().await.unwrap();
    // Installed but never activated
    v2.install().await.unwrap();
    let fetches = network.calls();

    assert_eq!(v2.prepare().await.unwrap(), vec!["story-app-cache-v1"]);
    assert_eq!(network.calls(), fetches);
    assert_eq!(storage.generations().unwrap(), vec!["story-app-cache-v2"]);

    // Nothing left to retire on the next start
    assert!(v2.prepare().await.unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_prepare_keeps_old_generation_when_install_fails() {
    let network = network_with_assets();
    let storage = SqliteStorage::new(Database::open_in_memory().unwrap());
    let v1 = ResponseCache::new(storage.clone(), network.clone(), &config("v1", &["/"]));
    let v2 = ResponseCache::new(storage.clone(), network, &config("v2", &["/", "/gone.css"]));
    v1.prepare().await.unwrap();

    assert!(matches!(v2.prepare().await, Err(CacheError::Install { .. })));
    assert_eq!(storage.generations().unwrap(), vec!["story-app-cache-v1"]);
  }

  #[tokio::test]
  async fn test_dynamic_tier_serves_later_offline_reads() {
    let network = network_with_assets();
    network.serve("http://api.test/stories", 200, r#"{"listStory":[]}"#);
    let storage = SqliteStorage::new(Database::open_in_memory().unwrap());
    let cache = ResponseCache::new(storage, network.clone(), &config("v1", &["/offline.html"]));
    let req = Request::get("http://api.test/stories");

    let first = cache.handle(&req).await.unwrap();
    assert!(matches!(first, FetchOutcome::Network(_)));
    assert_eq!(cache.stats().unwrap().dynamic_entries, 1);
    assert!(!cache.is_installed().unwrap());

    network.set_offline(true);
    let second = cache.handle(&req).await.unwrap();
    assert!(matches!(second, FetchOutcome::Cached(_)));
    assert_eq!(body(&second), r#"{"listStory":[]}"#);
  }

  #[tokio::test]
  async fn test_failed_status_is_not_cached() {
    let network = network_with_assets();
    let storage = SqliteStorage::new(Database::open_in_memory().unwrap());
    let cache = ResponseCache::new(storage, network, &config("v1", &[]));

    let outcome = cache.handle(&Request::get("http://api.test/nope")).await.unwrap();
    assert_eq!(outcome.response().unwrap().status, 404);
    assert_eq!(cache.stats().unwrap().dynamic_entries, 0);
  }

  #[tokio::test]
  async fn test_non_get_bypasses_cache() {
    let network = network_with_assets();
    network.serve("http://api.test/stories", 200, "created");
    let storage = SqliteStorage::new(Database::open_in_memory().unwrap());
    let cache = ResponseCache::new(storage, network.clone(), &config("v1", &[]));
    let post = Request::new(Method::POST, "http://api.test/stories");

    assert!(matches!(cache.handle(&post).await.unwrap(), FetchOutcome::Network(_)));
    assert!(matches!(cache.handle(&post).await.unwrap(), FetchOutcome::Network(_)));
    assert_eq!(network.calls(), 2);
    assert_eq!(cache.stats().unwrap(), CacheStats::default());

    network.set_offline(true);
    assert!(matches!(cache.handle(&post).await.unwrap(), FetchOutcome::Miss(_)));
  }

  #[tokio::test]
  async fn test_offline_navigation_gets_fallback_page() {
    let network = network_with_assets();
    let storage = SqliteStorage::new(Database::open_in_memory().unwrap());
    let cache = ResponseCache::new(storage, network.clone(), &config("v1", &["/offline.html"]));
    cache.install().await.unwrap();
    network.set_offline(true);

    let nav = cache.handle(&Request::navigate("http://app.test/stories/42")).await.unwrap();
    assert!(matches!(nav, FetchOutcome::OfflineFallback(_)));
    assert_eq!(body(&nav), "<h1>offline</h1>");

    let fetch = cache.handle(&Request::get("http://app.test/stories/42")).await.unwrap();
    assert!(matches!(fetch, FetchOutcome::Miss(SyncError::Transport(_))));
    assert!(fetch.response().is_none());
  }
}
