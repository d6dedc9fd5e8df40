//! Serde-deserializable types matching story API responses.
//!
//! Every response shares an envelope with an explicit `error` flag. An HTTP
//! success carrying `error: true` is a domain rejection, not a transport
//! success.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::{SyncError, SyncResult};
use crate::store::{StoryRecord, SyncState};

/// Common response envelope with an endpoint-specific payload.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
  #[serde(default)]
  pub error: bool,
  #[serde(default)]
  pub message: String,
  #[serde(flatten)]
  pub payload: T,
}

/// Payload for endpoints that only acknowledge.
#[derive(Debug, Deserialize)]
pub struct NoPayload {}

#[derive(Debug, Deserialize)]
pub struct StoryPayload {
  pub story: Option<ApiStory>,
}

#[derive(Debug, Deserialize)]
pub struct StoryListPayload {
  #[serde(rename = "listStory", default)]
  pub list_story: Vec<ApiStory>,
}

#[derive(Debug, Deserialize)]
pub struct CreatedPayload {
  pub data: Option<ApiCreated>,
}

#[derive(Debug, Deserialize)]
pub struct ApiCreated {
  pub id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiStory {
  pub id: String,
  pub name: Option<String>,
  #[serde(default)]
  pub description: String,
  pub photo_url: Option<String>,
  pub created_at: Option<DateTime<Utc>>,
  pub lat: Option<f64>,
  pub lon: Option<f64>,
}

impl ApiStory {
  /// Materialize a confirmed local copy of a remote story.
  pub fn into_record(self) -> StoryRecord {
    StoryRecord {
      id: self.id,
      name: self.name,
      description: self.description,
      photo: None,
      photo_url: self.photo_url,
      lat: self.lat,
      lon: self.lon,
      created_at: self.created_at.unwrap_or_else(Utc::now),
      sync_state: SyncState::Confirmed,
    }
  }
}

/// Body for the subscribe endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct PushSubscription {
  pub endpoint: String,
  pub keys: PushKeys,
}

#[derive(Debug, Clone, Serialize)]
pub struct PushKeys {
  pub p256dh: String,
  pub auth: String,
}

/// Result of asking the remote authority whether a story exists.
#[derive(Debug, Clone, PartialEq)]
pub enum StoryLookup {
  Found(StoryRecord),
  NotFound,
}

/// Decode an enveloped response.
///
/// A body that can't be parsed is treated as a transport failure; a parsed
/// envelope with a failing status or `error: true` is a rejection.
pub fn decode<T: DeserializeOwned>(status: u16, body: &[u8]) -> SyncResult<T> {
  let parsed: ApiResponse<T> = serde_json::from_slice(body).map_err(|e| {
    SyncError::Transport(format!("unreadable response (HTTP {}): {}", status, e))
  })?;

  if !(200..300).contains(&status) || parsed.error {
    return Err(SyncError::Rejected {
      status: Some(status),
      message: parsed.message,
    });
  }

  Ok(parsed.payload)
}

/// Decode a story detail response into an existence answer.
///
/// Only an explicit 404 means the story is gone. Any other failure is
/// returned as an error so callers never act on it destructively.
pub fn decode_lookup(status: u16, body: &[u8]) -> SyncResult<StoryLookup> {
  if status == 404 {
    return Ok(StoryLookup::NotFound);
  }

  let payload: StoryPayload = decode(status, body)?;
  match payload.story {
    Some(story) => Ok(StoryLookup::Found(story.into_record())),
    None => Err(SyncError::Transport(
      "story detail response has no story".to_string(),
    )),
  }
}

/// Decode a story list response into confirmed records.
pub fn decode_story_list(status: u16, body: &[u8]) -> SyncResult<Vec<StoryRecord>> {
  let payload: StoryListPayload = decode(status, body)?;
  Ok(
    payload
      .list_story
      .into_iter()
      .map(ApiStory::into_record)
      .collect(),
  )
}
