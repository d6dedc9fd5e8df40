use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use reqwest::multipart::{Form, Part};
use reqwest::{header, RequestBuilder};
use std::time::Duration;
use url::Url;

use crate::cache::{HttpResponse, Network, Request};
use crate::config::ApiConfig;
use crate::error::{SyncError, SyncResult};
use crate::store::StoryRecord;

use super::api_types::{
  decode, decode_lookup, CreatedPayload, NoPayload, PushKeys, PushSubscription, StoryLookup,
};
use super::{submission_fields, StoryAuthority};

/// Story API client wrapper
#[derive(Clone)]
pub struct StoryClient {
  http: reqwest::Client,
  base_url: Url,
  token: Option<String>,
  notify_path: Option<String>,
}

impl StoryClient {
  pub fn new(config: &ApiConfig, token: Option<String>) -> Result<Self> {
    let http = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    // Url::join drops the last segment unless the base ends with a slash
    let base = format!("{}/", config.base_url.trim_end_matches('/'));
    let base_url =
      Url::parse(&base).map_err(|e| eyre!("Invalid API base URL {}: {}", config.base_url, e))?;

    Ok(Self {
      http,
      base_url,
      token,
      notify_path: config.notify_path.clone(),
    })
  }

  /// Resolve an API path against the base URL.
  pub fn endpoint(&self, path: &str) -> SyncResult<Url> {
    self
      .base_url
      .join(path.trim_start_matches('/'))
      .map_err(|e| SyncError::malformed(format!("invalid endpoint {}: {}", path, e)))
  }

  /// Request for one page of the story list, for routing through the cache.
  pub fn stories_request(&self, page: u32, size: u32) -> SyncResult<Request> {
    let mut url = self.endpoint("stories")?;
    url
      .query_pairs_mut()
      .append_pair("page", &page.to_string())
      .append_pair("size", &size.to_string())
      .append_pair("location", "1");
    Ok(Request::get(url.to_string()))
  }

  fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
    match &self.token {
      Some(token) => builder.bearer_auth(token),
      None => builder,
    }
  }

  /// Send a request and buffer the body.
  async fn send(&self, builder: RequestBuilder) -> SyncResult<(u16, Vec<u8>)> {
    let response = self.authorize(builder).send().await?;
    let status = response.status().as_u16();
    let body = response.bytes().await?.to_vec();
    Ok((status, body))
  }

  /// URL of one story, with the id escaped as a single path segment.
  pub fn story_url(&self, id: &str) -> SyncResult<Url> {
    let mut url = self.endpoint("stories")?;
    url
      .path_segments_mut()
      .map_err(|_| SyncError::malformed(format!("base URL {} cannot hold a path", self.base_url)))?
      .push(id);
    Ok(url)
  }

  /// Get a single story by id
  pub async fn get_story(&self, id: &str) -> SyncResult<StoryLookup> {
    let url = self.story_url(id)?;
    let (status, body) = self.send(self.http.get(url)).await?;
    decode_lookup(status, &body)
  }

  /// Submit a new story as multipart form data.
  ///
  /// Returns the id assigned by the server when it reports one.
  pub async fn store_story(&self, record: &StoryRecord) -> SyncResult<Option<String>> {
    let form = build_form(record)?;
    let url = self.endpoint("stories")?;
    let (status, body) = self.send(self.http.post(url).multipart(form)).await?;
    let payload: CreatedPayload = decode(status, &body)?;
    Ok(payload.data.map(|d| d.id))
  }

  /// Register a push subscription with the server
  pub async fn subscribe(&self, endpoint: &str, p256dh: &str, auth: &str) -> SyncResult<()> {
    let subscription = PushSubscription {
      endpoint: endpoint.to_string(),
      keys: PushKeys {
        p256dh: p256dh.to_string(),
        auth: auth.to_string(),
      },
    };
    let url = self.endpoint("notifications/subscribe")?;
    let (status, body) = self.send(self.http.post(url).json(&subscription)).await?;
    decode::<NoPayload>(status, &body)?;
    Ok(())
  }

  /// Remove a push subscription
  pub async fn unsubscribe(&self, endpoint: &str) -> SyncResult<()> {
    let url = self.endpoint("notifications/subscribe")?;
    let body = serde_json::json!({ "endpoint": endpoint });
    let (status, body) = self.send(self.http.delete(url).json(&body)).await?;
    decode::<NoPayload>(status, &body)?;
    Ok(())
  }

  /// Ask the server to notify other users about a new story.
  ///
  /// No-op unless a notify path is configured.
  pub async fn notify_story_created(&self, story_id: &str) -> SyncResult<()> {
    let Some(template) = &self.notify_path else {
      return Ok(());
    };
    let url = self.endpoint(&template.replace("{id}", story_id))?;
    let (status, body) = self.send(self.http.post(url)).await?;
    decode::<NoPayload>(status, &body)?;
    Ok(())
  }
}

/// Build the multipart body for a story submission.
fn build_form(record: &StoryRecord) -> SyncResult<Form> {
  let mut form = Form::new();
  for (name, value) in submission_fields(record)? {
    form = form.text(name, value);
  }

  if let Some(photo) = &record.photo {
    let part = Part::bytes(photo.bytes.clone())
      .file_name(photo.file_name.clone())
      .mime_str(&photo.mime)
      .map_err(|e| SyncError::malformed(format!("invalid photo type {}: {}", photo.mime, e)))?;
    form = form.part("photo", part);
  }

  Ok(form)
}

#[async_trait]
impl StoryAuthority for StoryClient {
  async fn lookup_story(&self, id: &str) -> SyncResult<StoryLookup> {
    self.get_story(id).await
  }

  async fn submit_story(&self, record: &StoryRecord) -> SyncResult<Option<String>> {
    self.store_story(record).await
  }

  async fn notify_created(&self, story_id: &str) -> SyncResult<()> {
    self.notify_story_created(story_id).await
  }
}

#[async_trait]
impl Network for StoryClient {
  async fn fetch(&self, request: &Request) -> SyncResult<HttpResponse> {
    let builder = self.http.request(request.method.clone(), &request.url);
    let response = self.authorize(builder).send().await?;

    let status = response.status().as_u16();
    let headers = response
      .headers()
      .iter()
      .filter(|(name, _)| **name == header::CONTENT_TYPE || **name == header::CACHE_CONTROL)
      .filter_map(|(name, value)| {
        value
          .to_str()
          .ok()
          .map(|v| (name.as_str().to_string(), v.to_string()))
      })
      .collect();
    let body = response.bytes().await?.to_vec();

    Ok(HttpResponse {
      status,
      headers,
      body,
    })
  }
}
