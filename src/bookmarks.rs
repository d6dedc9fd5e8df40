//! Bookmark set kept consistent with the remote authority.
//!
//! Each bookmark is a full local copy of a story so the list stays
//! browsable offline. Reconciliation evicts a bookmark only when the remote
//! authority positively reports the story gone; any failed or ambiguous
//! check keeps the bookmark.

use futures::future::join_all;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{SyncError, SyncResult};
use crate::remote::{StoryAuthority, StoryLookup};
use crate::store::{RecordStore, StoryRecord, SyncState};

/// A saved story: the local copy used for offline display.
pub type BookmarkEntry = StoryRecord;

/// Receives the bookmark list whenever it changes.
pub trait BookmarkView: Send + Sync {
  fn render_bookmarks(&self, bookmarks: &[BookmarkEntry]);
}

/// Summary of one reconciliation run.
#[derive(Debug, Default)]
pub struct ReconcileReport {
  pub kept: usize,
  pub evicted: Vec<String>,
  /// Checks that failed; the affected bookmarks were kept
  pub failures: Vec<(String, SyncError)>,
}

/// Owner of the bookmark set and its persisted copy.
pub struct BookmarkReconciler {
  store: Arc<dyn RecordStore>,
  authority: Arc<dyn StoryAuthority>,
  bookmarks: Vec<BookmarkEntry>,
  view: Option<Box<dyn BookmarkView>>,
}

impl BookmarkReconciler {
  pub fn new(store: Arc<dyn RecordStore>, authority: Arc<dyn StoryAuthority>) -> Self {
    Self {
      store,
      authority,
      bookmarks: Vec::new(),
      view: None,
    }
  }

  /// Register the view that receives the list after every change.
  pub fn set_view(&mut self, view: Box<dyn BookmarkView>) {
    self.view = Some(view);
  }

  pub fn bookmarks(&self) -> &[BookmarkEntry] {
    &self.bookmarks
  }

  pub fn is_bookmarked(&self, id: &str) -> bool {
    self.bookmarks.iter().any(|b| b.id == id)
  }

  /// Load the stored bookmarks and verify each against the remote authority.
  ///
  /// Checks run concurrently and independently. Safe to re-run at any time.
  pub async fn load_bookmarks(&mut self) -> SyncResult<ReconcileReport> {
    let stored = self.store.get_all()?;
    let authority = Arc::clone(&self.authority);
    let lookups = join_all(stored.iter().map(|entry| authority.lookup_story(&entry.id))).await;

    let mut report = ReconcileReport::default();
    let mut kept = Vec::with_capacity(stored.len());
    let mut checked = stored.into_iter().zip(lookups);

    while let Some((entry, lookup)) = checked.next() {
      match lookup {
        Ok(StoryLookup::Found(_)) => kept.push(entry),
        Ok(StoryLookup::NotFound) => {
          if let Err(e) = self.store.delete(&entry.id) {
            // Memory must match the store: the entry and everything
            // unprocessed are still persisted
            kept.push(entry);
            kept.extend(checked.map(|(entry, _)| entry));
            self.bookmarks = kept;
            return Err(e);
          }
          info!(id = %entry.id, "evicted bookmark for deleted story");
          report.evicted.push(entry.id);
        }
        Err(e) => {
          warn!(id = %entry.id, error = %e, "could not verify bookmark, keeping it");
          report.failures.push((entry.id.clone(), e));
          kept.push(entry);
        }
      }
    }

    report.kept = kept.len();
    self.bookmarks = kept;
    self.publish();
    Ok(report)
  }

  /// Save a story. Fails without touching the in-memory set if it can't be persisted.
  pub fn add_bookmark(&mut self, mut story: StoryRecord) -> SyncResult<()> {
    story.sync_state = SyncState::Confirmed;
    self.store.put(&story)?;

    match self.bookmarks.iter_mut().find(|b| b.id == story.id) {
      Some(existing) => *existing = story,
      None => self.bookmarks.push(story),
    }
    self.publish();
    Ok(())
  }

  /// Remove a saved story. Fails without touching the in-memory set if the
  /// deletion can't be persisted.
  pub fn remove_bookmark(&mut self, id: &str) -> SyncResult<()> {
    self.store.delete(id)?;
    self.bookmarks.retain(|b| b.id != id);
    self.publish();
    Ok(())
  }

  fn publish(&self) {
    if let Some(view) = &self.view {
      view.render_bookmarks(&self.bookmarks);
    }
  }
}
