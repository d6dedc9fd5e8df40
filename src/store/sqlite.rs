//! Record store trait and SQLite implementation.

use chrono::SecondsFormat;
use rusqlite::params;
use tracing::warn;

use crate::db::Database;
use crate::error::{SyncError, SyncResult};

use super::records::StoryRecord;

/// Logical collection a store handle reads and writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Collection {
  /// Locally created records awaiting delivery
  Outbox,
  /// Denormalized copies of saved stories for offline display
  Bookmarks,
}

impl Collection {
  fn as_str(&self) -> &'static str {
    match self {
      Self::Outbox => "outbox",
      Self::Bookmarks => "bookmarks",
    }
  }
}

/// Durable keyed record store.
///
/// Every method is durable before it returns.
pub trait RecordStore: Send + Sync {
  /// Insert or overwrite the record with the same id.
  fn put(&self, record: &StoryRecord) -> SyncResult<()>;

  /// Snapshot of every stored record, oldest first.
  fn get_all(&self) -> SyncResult<Vec<StoryRecord>>;

  /// Remove the record if present. Removing a missing id is not an error.
  fn delete(&self, id: &str) -> SyncResult<()>;
}

/// SQLite-backed record store for one collection.
#[derive(Clone)]
pub struct SqliteRecordStore {
  db: Database,
  collection: Collection,
}

impl SqliteRecordStore {
  pub fn new(db: Database, collection: Collection) -> Self {
    Self { db, collection }
  }
}

impl RecordStore for SqliteRecordStore {
  fn put(&self, record: &StoryRecord) -> SyncResult<()> {
    let conn = self.db.conn()?;
    let data = serde_json::to_vec(record)
      .map_err(|e| SyncError::Persistence(format!("Failed to serialize record: {}", e)))?;
    let photo = record.photo.as_ref().map(|p| p.bytes.as_slice());

    conn.execute(
      "INSERT OR REPLACE INTO stories (collection, id, data, photo, sync_state, created_at)
       VALUES (?, ?, ?, ?, ?, ?)",
      params![
        self.collection.as_str(),
        record.id,
        data,
        photo,
        record.sync_state.as_str(),
        // Fixed width so the text column sorts chronologically
        record.created_at.to_rfc3339_opts(SecondsFormat::Nanos, true),
      ],
    )?;

    Ok(())
  }

  fn get_all(&self) -> SyncResult<Vec<StoryRecord>> {
    let conn = self.db.conn()?;
    let mut stmt = conn.prepare(
      "SELECT id, data, photo FROM stories
       WHERE collection = ?
       ORDER BY created_at, id",
    )?;

    let rows = stmt
      .query_map(params![self.collection.as_str()], |row| {
        let id: String = row.get(0)?;
        let data: Vec<u8> = row.get(1)?;
        let photo: Option<Vec<u8>> = row.get(2)?;
        Ok((id, data, photo))
      })?
      .collect::<Result<Vec<_>, _>>()?;

    let records = rows
      .into_iter()
      .filter_map(|(id, data, photo)| match serde_json::from_slice::<StoryRecord>(&data) {
        Ok(mut record) => {
          if let (Some(p), Some(bytes)) = (record.photo.as_mut(), photo) {
            p.bytes = bytes;
          }
          Some(record)
        }
        Err(e) => {
          warn!(id, error = %e, "skipping unreadable story record");
          None
        }
      })
      .collect();

    Ok(records)
  }

  fn delete(&self, id: &str) -> SyncResult<()> {
    let conn = self.db.conn()?;
    conn.execute(
      "DELETE FROM stories WHERE collection = ? AND id = ?",
      params![self.collection.as_str(), id],
    )?;
    Ok(())
  }
}
