use crossterm::event::{self, Event as CrosstermEvent, KeyEvent};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::bookmarks::{BookmarkEntry, BookmarkView};
use crate::outbox::SyncReport;
use crate::store::StoryRecord;

/// Application events
#[derive(Debug)]
pub enum Event {
  /// Terminal key press
  Key(KeyEvent),
  /// Periodic tick for UI refresh
  Tick,
  /// Result of background work
  Sync(SyncEvent),
}

/// Results reported back by background tasks
#[derive(Debug)]
pub enum SyncEvent {
  StoriesLoaded {
    stories: Vec<StoryRecord>,
    offline: bool,
  },
  /// Remote story list unavailable (offline with nothing cached)
  StoriesUnavailable(String),
  OutboxChanged(Vec<StoryRecord>),
  SyncFinished(SyncReport),
  BookmarksChanged(Vec<BookmarkEntry>),
  /// Non-blocking message for the status bar
  Notice(String),
}

/// Event handler that produces events from terminal input and a tick timer
pub struct EventHandler {
  tx: mpsc::UnboundedSender<Event>,
  rx: mpsc::UnboundedReceiver<Event>,
}

impl EventHandler {
  /// Create a new event handler with the given tick rate
  pub fn new(tick_rate: Duration) -> Self {
    let (tx, rx) = mpsc::unbounded_channel();

    // Terminal polling blocks, so it gets its own thread
    let input_tx = tx.clone();
    tokio::task::spawn_blocking(move || loop {
      let event = if event::poll(tick_rate).unwrap_or(false) {
        match event::read() {
          Ok(CrosstermEvent::Key(key)) => Event::Key(key),
          _ => continue,
        }
      } else {
        Event::Tick
      };

      if input_tx.send(event).is_err() {
        break;
      }
    });

    Self { tx, rx }
  }

  /// Sender for background tasks
  pub fn sender(&self) -> mpsc::UnboundedSender<Event> {
    self.tx.clone()
  }

  /// Receive the next event
  pub async fn next(&mut self) -> Option<Event> {
    self.rx.recv().await
  }
}

/// Bookmark view that forwards every published list to the event loop.
pub struct ChannelView {
  tx: mpsc::UnboundedSender<Event>,
}

impl ChannelView {
  pub fn new(tx: mpsc::UnboundedSender<Event>) -> Self {
    Self { tx }
  }
}

impl BookmarkView for ChannelView {
  fn render_bookmarks(&self, bookmarks: &[BookmarkEntry]) {
    let _ = self
      .tx
      .send(Event::Sync(SyncEvent::BookmarksChanged(bookmarks.to_vec())));
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_channel_view_forwards_list() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let view = ChannelView::new(tx);
    view.render_bookmarks(&[]);

    match rx.try_recv().unwrap() {
      Event::Sync(SyncEvent::BookmarksChanged(list)) => assert!(list.is_empty()),
      other => panic!("unexpected event {:?}", other),
    }
  }
}
