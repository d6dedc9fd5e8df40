//! The remote authority: the story API that confirms and serves stories.

pub mod api_types;
pub mod client;

use async_trait::async_trait;

use crate::error::{SyncError, SyncResult};
use crate::store::StoryRecord;

pub use api_types::StoryLookup;
pub use client::StoryClient;

/// Operations the outbox and bookmark reconciler need from the remote authority.
#[async_trait]
pub trait StoryAuthority: Send + Sync {
  /// Check whether a story still exists.
  async fn lookup_story(&self, id: &str) -> SyncResult<StoryLookup>;

  /// Deliver a locally created story. Returns the server-assigned id if any.
  async fn submit_story(&self, record: &StoryRecord) -> SyncResult<Option<String>>;

  /// Best-effort broadcast that a new story was created.
  async fn notify_created(&self, story_id: &str) -> SyncResult<()>;
}

/// Normalized text fields of a story submission.
///
/// `description` is required; coordinates are only sent when known.
pub fn submission_fields(record: &StoryRecord) -> SyncResult<Vec<(&'static str, String)>> {
  let description = record.description.trim();
  if description.is_empty() {
    return Err(SyncError::malformed("description is required"));
  }

  let mut fields = vec![("description", description.to_string())];
  if let (Some(lat), Some(lon)) = (record.lat, record.lon) {
    fields.push(("lat", lat.to_string()));
    fields.push(("lon", lon.to_string()));
  }
  Ok(fields)
}
