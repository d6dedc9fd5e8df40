//! Cache storage trait and SQLite implementation.

use rusqlite::{params, OptionalExtension};

use crate::db::Database;
use crate::error::{SyncError, SyncResult};

use super::traits::{CacheStats, HttpResponse, Request, Tier};

/// Trait for generation-aware cache storage backends.
pub trait CacheStorage: Send + Sync {
  /// Names of every generation that currently exists.
  fn generations(&self) -> SyncResult<Vec<String>>;

  /// Delete a generation and all of its entries. Returns false if it didn't exist.
  fn delete_generation(&self, generation: &str) -> SyncResult<bool>;

  /// Store a batch of entries atomically, creating the generation if needed.
  fn put_all(
    &self,
    generation: &str,
    entries: &[(Request, HttpResponse)],
    tier: Tier,
  ) -> SyncResult<()>;

  /// Store one entry, replacing any previous entry for the same request.
  fn put(
    &self,
    generation: &str,
    request: &Request,
    response: &HttpResponse,
    tier: Tier,
  ) -> SyncResult<()> {
    self.put_all(generation, &[(request.clone(), response.duplicate())], tier)
  }

  /// Look up a request within one generation.
  fn get(&self, generation: &str, request: &Request) -> SyncResult<Option<HttpResponse>>;

  /// Count entries of a generation per tier.
  fn stats(&self, generation: &str) -> SyncResult<CacheStats>;
}

/// SQLite-based cache storage implementation.
#[derive(Clone)]
pub struct SqliteStorage {
  db: Database,
}

impl SqliteStorage {
  pub fn new(db: Database) -> Self {
    Self { db }
  }
}

impl CacheStorage for SqliteStorage {
  fn generations(&self) -> SyncResult<Vec<String>> {
    let conn = self.db.conn()?;
    let mut stmt = conn.prepare("SELECT name FROM cache_generations ORDER BY name")?;
    let names = stmt
      .query_map([], |row| row.get(0))?
      .collect::<Result<Vec<String>, _>>()?;
    Ok(names)
  }

  fn delete_generation(&self, generation: &str) -> SyncResult<bool> {
    let conn = self.db.conn()?;
    // Entries go with the generation via ON DELETE CASCADE
    let deleted = conn.execute(
      "DELETE FROM cache_generations WHERE name = ?",
      params![generation],
    )?;
    Ok(deleted > 0)
  }

  fn put_all(
    &self,
    generation: &str,
    entries: &[(Request, HttpResponse)],
    tier: Tier,
  ) -> SyncResult<()> {
    let mut conn = self.db.conn()?;
    let tx = conn.transaction()?;

    tx.execute(
      "INSERT OR IGNORE INTO cache_generations (name) VALUES (?)",
      params![generation],
    )?;

    for (request, response) in entries {
      let headers = serde_json::to_string(&response.headers)
        .map_err(|e| SyncError::Persistence(format!("Failed to serialize headers: {}", e)))?;

      tx.execute(
        "INSERT OR REPLACE INTO cache_entries
           (generation, request_key, method, url, tier, status, headers, body, cached_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, datetime('now'))",
        params![
          generation,
          request.cache_key(),
          request.method.as_str(),
          request.url,
          tier.as_str(),
          response.status,
          headers,
          response.body,
        ],
      )?;
    }

    tx.commit()?;
    Ok(())
  }

  fn get(&self, generation: &str, request: &Request) -> SyncResult<Option<HttpResponse>> {
    let conn = self.db.conn()?;
    let row: Option<(u16, String, Vec<u8>)> = conn
      .query_row(
        "SELECT status, headers, body FROM cache_entries
         WHERE generation = ? AND request_key = ?",
        params![generation, request.cache_key()],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
      )
      .optional()?;

    match row {
      Some((status, headers, body)) => {
        let headers = serde_json::from_str(&headers)
          .map_err(|e| SyncError::Persistence(format!("Failed to parse cached headers: {}", e)))?;
        Ok(Some(HttpResponse {
          status,
          headers,
          body,
        }))
      }
      None => Ok(None),
    }
  }

  fn stats(&self, generation: &str) -> SyncResult<CacheStats> {
    let conn = self.db.conn()?;
    let mut stmt = conn.prepare(
      "SELECT tier, COUNT(*) FROM cache_entries WHERE generation = ? GROUP BY tier",
    )?;
    let counts = stmt
      .query_map(params![generation], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
      })?
      .collect::<Result<Vec<_>, _>>()?;

    let mut stats = CacheStats::default();
    for (tier, count) in counts {
      let count = count as usize;
      if tier == Tier::Static.as_str() {
        stats.static_entries = count;
      } else {
        stats.dynamic_entries = count;
      }
    }
    Ok(stats)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn storage() -> SqliteStorage {
    SqliteStorage::new(Database::open_in_memory().unwrap())
  }

  fn response(body: &str) -> HttpResponse {
    HttpResponse {
      status: 200,
      headers: vec![("content-type".into(), "text/html".into())],
      body: body.as_bytes().to_vec(),
    }
  }

  #[test]
  fn test_put_and_get_within_generation() {
    let storage = storage();
    let req = Request::get("http://localhost/index.html");
    storage.put("gen-v1", &req, &response("<h1>v1</h1>"), Tier::Static).unwrap();

    assert_eq!(
      storage.get("gen-v1", &req).unwrap(),
      Some(response("<h1>v1</h1>"))
    );
    assert_eq!(storage.get("gen-v2", &req).unwrap(), None);
  }

  #[test]
  fn test_last_write_wins() {
    let storage = storage();
    let req = Request::get("http://localhost/stories");
    storage.put("gen", &req, &response("old"), Tier::Dynamic).unwrap();
    storage.put("gen", &req, &response("new"), Tier::Dynamic).unwrap();

    assert_eq!(storage.get("gen", &req).unwrap(), Some(response("new")));
    assert_eq!(storage.stats("gen").unwrap().dynamic_entries, 1);
  }

  #[test]
  fn test_delete_generation_cascades() {
    let storage = storage();
    let req = Request::get("http://localhost/");
    storage.put("old", &req, &response("a"), Tier::Static).unwrap();
    storage.put("new", &req, &response("b"), Tier::Static).unwrap();

    assert!(storage.delete_generation("old").unwrap());
    assert!(!storage.delete_generation("old").unwrap());
    assert_eq!(storage.generations().unwrap(), vec!["new".to_string()]);
    assert_eq!(storage.get("old", &req).unwrap(), None);
    assert_eq!(storage.stats("old").unwrap(), CacheStats::default());
  }

  #[test]
  fn test_stats_per_tier() {
    let storage = storage();
    storage
      .put_all(
        "gen",
        &[
          (Request::get("http://localhost/"), response("index")),
          (Request::get("http://localhost/app.js"), response("js")),
        ],
        Tier::Static,
      )
      .unwrap();
    storage
      .put("gen", &Request::get("http://api/stories"), &response("[]"), Tier::Dynamic)
      .unwrap();

    assert_eq!(
      storage.stats("gen").unwrap(),
      CacheStats {
        static_entries: 2,
        dynamic_entries: 1
      }
    );
  }
}
