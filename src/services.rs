//! Owned instances of the sync components, built once at startup.

use color_eyre::Result;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::warn;

use crate::bookmarks::BookmarkReconciler;
use crate::cache::{FetchOutcome, ResponseCache, SqliteStorage};
use crate::config::Config;
use crate::db::Database;
use crate::error::{CacheError, SyncResult};
use crate::outbox::OutboxReplayer;
use crate::remote::api_types::decode_story_list;
use crate::remote::StoryClient;
use crate::store::{Collection, SqliteRecordStore, StoryRecord};

/// Stories shown per page of the remote list.
pub const PAGE_SIZE: u32 = 20;

/// One page of the remote story list.
#[derive(Debug)]
pub struct StoryPage {
  pub stories: Vec<StoryRecord>,
  /// The network was unreachable while loading it
  pub offline: bool,
}

/// Everything the UI and the commands drive.
///
/// The outbox and the bookmark set each have a single owner; the bookmark
/// reconciler sits behind an async mutex so its mutations never interleave.
#[derive(Clone)]
pub struct Services {
  pub client: Arc<StoryClient>,
  pub outbox: Arc<OutboxReplayer>,
  pub bookmarks: Arc<Mutex<BookmarkReconciler>>,
  pub cache: ResponseCache<SqliteStorage, StoryClient>,
}

impl Services {
  pub fn new(config: &Config) -> Result<Self> {
    let db = Database::open(config.storage.path.as_deref())?;
    let client = Arc::new(StoryClient::new(&config.api, Config::api_token())?);

    let outbox = OutboxReplayer::new(
      Arc::new(SqliteRecordStore::new(db.clone(), Collection::Outbox)),
      client.clone(),
    );
    let bookmarks = BookmarkReconciler::new(
      Arc::new(SqliteRecordStore::new(db.clone(), Collection::Bookmarks)),
      client.clone(),
    );
    let cache = ResponseCache::new(SqliteStorage::new(db), client.clone(), &config.cache);

    Ok(Self {
      client,
      outbox: Arc::new(outbox),
      bookmarks: Arc::new(Mutex::new(bookmarks)),
      cache,
    })
  }

  /// Make the configured cache generation installed and current.
  pub async fn prepare_cache(&self) -> Result<(), CacheError> {
    if let Err(e) = self.cache.prepare().await {
      warn!(generation = %self.cache.generation(), error = %e, "cache prepare failed");
      return Err(e);
    }
    Ok(())
  }

  /// Fetch a page of remote stories through the response cache.
  pub async fn stories(&self, page: u32) -> SyncResult<StoryPage> {
    let request = self.client.stories_request(page, PAGE_SIZE)?;
    let outcome = self.cache.handle(&request).await?;
    let offline = outcome.is_offline();

    match outcome {
      FetchOutcome::Cached(r) | FetchOutcome::Network(r) | FetchOutcome::OfflineFallback(r) => {
        Ok(StoryPage {
          stories: decode_story_list(r.status, &r.body)?,
          offline,
        })
      }
      FetchOutcome::Miss(e) => Err(e),
    }
  }
}
