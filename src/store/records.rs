//! Story records as kept in the local store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Whether the remote authority has acknowledged a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
  /// Created locally, never acknowledged
  Pending,
  /// Materialized from (or acknowledged by) the remote authority
  Confirmed,
}

impl SyncState {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Pending => "pending",
      Self::Confirmed => "confirmed",
    }
  }
}

/// An attached photo. The bytes live in their own column, not in the JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Photo {
  pub file_name: String,
  pub mime: String,
  #[serde(skip)]
  pub bytes: Vec<u8>,
}

impl Photo {
  /// Build a photo from a file name, guessing the MIME type from its extension.
  pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
    let file_name = file_name.into();
    let mime = guess_mime(&file_name).to_string();
    Self {
      file_name,
      mime,
      bytes,
    }
  }
}

fn guess_mime(file_name: &str) -> &'static str {
  let ext = file_name
    .rsplit_once('.')
    .map(|(_, ext)| ext.to_ascii_lowercase())
    .unwrap_or_default();
  match ext.as_str() {
    "jpg" | "jpeg" => "image/jpeg",
    "png" => "image/png",
    "gif" => "image/gif",
    "webp" => "image/webp",
    _ => "application/octet-stream",
  }
}

/// A story, either queued for delivery or cached for offline display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryRecord {
  pub id: String,
  /// Author name (only known for stories fetched from the remote authority)
  pub name: Option<String>,
  pub description: String,
  pub photo: Option<Photo>,
  /// Remote photo location for confirmed stories
  pub photo_url: Option<String>,
  pub lat: Option<f64>,
  pub lon: Option<f64>,
  pub created_at: DateTime<Utc>,
  pub sync_state: SyncState,
}

/// User input for a new story, before it gets an id.
#[derive(Debug, Clone, Default)]
pub struct StoryDraft {
  pub description: String,
  pub photo: Option<Photo>,
  pub lat: Option<f64>,
  pub lon: Option<f64>,
}

impl StoryRecord {
  /// Create a pending record from a draft with a fresh client-generated id.
  pub fn pending(draft: StoryDraft) -> Self {
    let now = Utc::now();
    Self {
      id: client_id(now),
      name: None,
      description: draft.description,
      photo: draft.photo,
      photo_url: None,
      lat: draft.lat,
      lon: draft.lon,
      created_at: now,
      sync_state: SyncState::Pending,
    }
  }

  pub fn is_pending(&self) -> bool {
    self.sync_state == SyncState::Pending
  }
}

/// Generate an id unique without server coordination: "{unix_millis}-{suffix}".
pub fn client_id(now: DateTime<Utc>) -> String {
  let suffix = uuid::Uuid::new_v4().simple().to_string();
  format!("{}-{}", now.timestamp_millis(), &suffix[..7])
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_client_id_shape() {
    let now = DateTime::from_timestamp_millis(1_700_000_000_000).unwrap();
    let id = client_id(now);
    let (millis, suffix) = id.split_once('-').unwrap();
    assert_eq!(millis, "1700000000000");
    assert_eq!(suffix.len(), 7);
    assert!(suffix.chars().all(|c| c.is_ascii_alphanumeric()));
  }

  #[test]
  fn test_client_ids_are_unique_within_a_millisecond() {
    let now = Utc::now();
    assert_ne!(client_id(now), client_id(now));
  }

  #[test]
  fn test_pending_record_from_draft() {
    let record = StoryRecord::pending(StoryDraft {
      description: "test".into(),
      ..Default::default()
    });
    assert!(record.is_pending());
    assert_eq!(record.description, "test");
    assert!(record.photo.is_none());
    assert!(record.name.is_none());
  }

  #[test]
  fn test_photo_mime_guess() {
    assert_eq!(Photo::new("cat.JPG", vec![]).mime, "image/jpeg");
    assert_eq!(Photo::new("cat.png", vec![]).mime, "image/png");
    assert_eq!(Photo::new("cat", vec![]).mime, "application/octet-stream");
  }
}
