//! Error taxonomy shared by the local store, the outbox, the bookmark
//! reconciler and the response cache.

use thiserror::Error;

/// Failure of a core operation.
///
/// The three variants carry different recovery rules:
/// - `Transport` is always recoverable and never deletes local state.
/// - `Rejected` is an explicit refusal by the remote authority (or a
///   submission that is malformed before it is even sent). Local pending
///   state is kept so the user can edit or retry.
/// - `Persistence` means a durable write/read failed. Callers must propagate
///   it instead of assuming the write happened.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SyncError {
  #[error("network unavailable: {0}")]
  Transport(String),

  #[error("rejected by remote authority{}: {message}", status_suffix(.status))]
  Rejected {
    status: Option<u16>,
    message: String,
  },

  #[error("local store failure: {0}")]
  Persistence(String),
}

impl SyncError {
  /// Build a client-side rejection for a record that can't be submitted.
  pub fn malformed(message: impl Into<String>) -> Self {
    Self::Rejected {
      status: None,
      message: message.into(),
    }
  }

  /// Transient failures may succeed on a later attempt without any change.
  pub fn is_transient(&self) -> bool {
    matches!(self, Self::Transport(_))
  }

  #[cfg(test)]
  pub fn is_persistence(&self) -> bool {
    matches!(self, Self::Persistence(_))
  }
}

impl From<rusqlite::Error> for SyncError {
  fn from(e: rusqlite::Error) -> Self {
    Self::Persistence(e.to_string())
  }
}

impl From<reqwest::Error> for SyncError {
  fn from(e: reqwest::Error) -> Self {
    Self::Transport(e.to_string())
  }
}

fn status_suffix(status: &Option<u16>) -> String {
  status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default()
}

pub type SyncResult<T> = std::result::Result<T, SyncError>;

/// Failure to install or activate a cache generation.
#[derive(Debug, Error)]
pub enum CacheError {
  #[error("failed to cache {url}: {reason}")]
  Install { url: String, reason: String },

  #[error(transparent)]
  Storage(#[from] SyncError),
}

impl From<rusqlite::Error> for CacheError {
  fn from(e: rusqlite::Error) -> Self {
    Self::Storage(e.into())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_only_transport_is_transient() {
    assert!(SyncError::Transport("timeout".into()).is_transient());
    assert!(!SyncError::malformed("description is required").is_transient());
    assert!(!SyncError::Persistence("disk full".into()).is_transient());
  }

  #[test]
  fn test_rejection_message_includes_status() {
    let err = SyncError::Rejected {
      status: Some(400),
      message: "photo is too large".into(),
    };
    assert_eq!(
      err.to_string(),
      "rejected by remote authority (HTTP 400): photo is too large"
    );
    assert_eq!(
      SyncError::malformed("description is required").to_string(),
      "rejected by remote authority: description is required"
    );
  }
}
