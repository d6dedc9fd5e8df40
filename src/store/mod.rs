//! Durable local store for story records.
//!
//! Holds two logical collections in one SQLite table:
//! - the outbox of locally created records awaiting delivery
//! - the bookmark set, each entry a full copy of the story for offline display

mod records;
mod sqlite;

pub use records::{Photo, StoryDraft, StoryRecord, SyncState};
pub use sqlite::{Collection, RecordStore, SqliteRecordStore};
