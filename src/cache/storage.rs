//! Cache storage trait and SQLite implementation.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use super::traits::CachedEntry;
use crate::net::Response;

/// Trait for cache storage backends.
///
/// Every value is written as a whole; there are no partial updates, so
/// concurrent writers to one key simply resolve last-write-wins.
pub trait CacheStorage: Send + Sync {
  /// Create a namespace if it does not exist yet.
  fn open_namespace(&self, namespace: &str) -> Result<()>;

  /// Names of all existing namespaces.
  fn namespaces(&self) -> Result<Vec<String>>;

  /// Delete a namespace with all its entries. Returns whether it existed.
  fn delete_namespace(&self, namespace: &str) -> Result<bool>;

  /// Store a response, creating the namespace on first write.
  fn put(&self, namespace: &str, key: &str, response: &Response) -> Result<()>;

  /// Store several responses in one transaction.
  fn put_all(&self, namespace: &str, entries: &[(String, Response)]) -> Result<()>;

  /// Look up a stored response.
  fn get(&self, namespace: &str, key: &str) -> Result<Option<CachedEntry>>;

  /// Number of entries in a namespace (0 if it does not exist).
  fn count(&self, namespace: &str) -> Result<usize>;
}

/// SQLite-based cache storage implementation.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Open (or create) the cache database at `path`.
  pub fn open(path: &Path) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    Self::with_connection(conn)
  }

  /// Open a private in-memory database.
  #[cfg(test)]
  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory cache database: {}", e))?;

    Self::with_connection(conn)
  }

  fn with_connection(conn: Connection) -> Result<Self> {
    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;

    Ok(storage)
  }

  fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
    self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))
  }

  /// Run database migrations for cache tables.
  fn run_migrations(&self) -> Result<()> {
    let conn = self.lock()?;

    conn
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(())
  }
}

/// Schema for cache tables.
const CACHE_SCHEMA: &str = r#"
-- Namespaces exist independently of their entries (install creates empty ones)
CREATE TABLE IF NOT EXISTS cache_namespaces (
    name TEXT PRIMARY KEY,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- One stored response per (namespace, request key)
CREATE TABLE IF NOT EXISTS cache_entries (
    namespace TEXT NOT NULL,
    request_key TEXT NOT NULL,
    status INTEGER NOT NULL,
    headers TEXT NOT NULL,
    body BLOB NOT NULL,
    cached_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (namespace, request_key)
);
"#;

fn insert_namespace(conn: &Connection, namespace: &str) -> Result<()> {
  conn
    .execute(
      "INSERT OR IGNORE INTO cache_namespaces (name) VALUES (?)",
      params![namespace],
    )
    .map_err(|e| eyre!("Failed to create namespace {}: {}", namespace, e))?;
  Ok(())
}

fn insert_entry(conn: &Connection, namespace: &str, key: &str, response: &Response) -> Result<()> {
  let headers = serde_json::to_string(&response.headers)
    .map_err(|e| eyre!("Failed to serialize headers: {}", e))?;

  conn
    .execute(
      "INSERT OR REPLACE INTO cache_entries (namespace, request_key, status, headers, body, cached_at)
       VALUES (?, ?, ?, ?, ?, datetime('now'))",
      params![namespace, key, response.status, headers, response.body],
    )
    .map_err(|e| eyre!("Failed to store entry {} in {}: {}", key, namespace, e))?;
  Ok(())
}

impl CacheStorage for SqliteStorage {
  fn open_namespace(&self, namespace: &str) -> Result<()> {
    let conn = self.lock()?;
    insert_namespace(&conn, namespace)
  }

  fn namespaces(&self) -> Result<Vec<String>> {
    let conn = self.lock()?;

    let mut stmt = conn
      .prepare("SELECT name FROM cache_namespaces ORDER BY name")
      .map_err(|e| eyre!("Failed to prepare query: {}", e))?;

    let names = stmt
      .query_map([], |row| row.get(0))
      .map_err(|e| eyre!("Failed to list namespaces: {}", e))?
      .collect::<rusqlite::Result<Vec<String>>>()
      .map_err(|e| eyre!("Failed to read namespace row: {}", e))?;

    Ok(names)
  }

  fn delete_namespace(&self, namespace: &str) -> Result<bool> {
    let mut conn = self.lock()?;
    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    tx.execute(
      "DELETE FROM cache_entries WHERE namespace = ?",
      params![namespace],
    )
    .map_err(|e| eyre!("Failed to delete entries of {}: {}", namespace, e))?;

    let removed = tx
      .execute(
        "DELETE FROM cache_namespaces WHERE name = ?",
        params![namespace],
      )
      .map_err(|e| eyre!("Failed to delete namespace {}: {}", namespace, e))?;

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    Ok(removed > 0)
  }

  fn put(&self, namespace: &str, key: &str, response: &Response) -> Result<()> {
    let mut conn = self.lock()?;
    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    insert_namespace(&tx, namespace)?;
    insert_entry(&tx, namespace, key, response)?;

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    Ok(())
  }

  fn put_all(&self, namespace: &str, entries: &[(String, Response)]) -> Result<()> {
    let mut conn = self.lock()?;
    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    insert_namespace(&tx, namespace)?;
    for (key, response) in entries {
      insert_entry(&tx, namespace, key, response)?;
    }

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    Ok(())
  }

  fn get(&self, namespace: &str, key: &str) -> Result<Option<CachedEntry>> {
    let conn = self.lock()?;

    let row: Option<(u16, String, Vec<u8>, String)> = conn
      .query_row(
        "SELECT status, headers, body, cached_at FROM cache_entries
         WHERE namespace = ? AND request_key = ?",
        params![namespace, key],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
      )
      .optional()
      .map_err(|e| eyre!("Failed to query entry {} in {}: {}", key, namespace, e))?;

    match row {
      Some((status, headers, body, cached_at_str)) => {
        let headers = serde_json::from_str(&headers)
          .map_err(|e| eyre!("Failed to deserialize headers of {}: {}", key, e))?;
        let cached_at = parse_datetime(&cached_at_str)?;
        Ok(Some(CachedEntry {
          response: Response {
            status,
            headers,
            body,
          },
          cached_at,
        }))
      }
      None => Ok(None),
    }
  }

  fn count(&self, namespace: &str) -> Result<usize> {
    let conn = self.lock()?;

    let count: i64 = conn
      .query_row(
        "SELECT COUNT(*) FROM cache_entries WHERE namespace = ?",
        params![namespace],
        |row| row.get(0),
      )
      .map_err(|e| eyre!("Failed to count entries of {}: {}", namespace, e))?;

    Ok(count as usize)
  }
}

/// Parse a datetime string from SQLite format.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  // SQLite stores as "YYYY-MM-DD HH:MM:SS"
  chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
    .map(|dt| dt.and_utc())
    .map_err(|e| eyre!("Failed to parse datetime '{}': {}", s, e))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn response(body: &str) -> Response {
    Response {
      status: 200,
      headers: vec![("content-type".to_string(), "text/html".to_string())],
      body: body.as_bytes().to_vec(),
    }
  }

  #[test]
  fn test_put_then_get_preserves_response() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    storage.put("ns", "http://h/a", &response("<a>")).unwrap();

    let entry = storage.get("ns", "http://h/a").unwrap().unwrap();
    assert_eq!(entry.response, response("<a>"));
  }

  #[test]
  fn test_put_overwrites_existing_key() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    storage.put("ns", "k", &response("old")).unwrap();
    storage.put("ns", "k", &response("new")).unwrap();

    assert_eq!(storage.count("ns").unwrap(), 1);
    let entry = storage.get("ns", "k").unwrap().unwrap();
    assert_eq!(entry.response.body, b"new");
  }

  #[test]
  fn test_namespaces_are_isolated() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    storage.put("one", "k", &response("1")).unwrap();
    storage.put("two", "k", &response("2")).unwrap();

    assert!(storage.delete_namespace("one").unwrap());
    assert!(storage.get("one", "k").unwrap().is_none());
    assert_eq!(storage.get("two", "k").unwrap().unwrap().response.body, b"2");
    assert_eq!(storage.namespaces().unwrap(), vec!["two".to_string()]);
  }

  #[test]
  fn test_open_namespace_creates_empty_namespace() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    storage.open_namespace("empty").unwrap();
    storage.open_namespace("empty").unwrap();

    assert_eq!(storage.namespaces().unwrap(), vec!["empty".to_string()]);
    assert_eq!(storage.count("empty").unwrap(), 0);
  }

  #[test]
  fn test_delete_missing_namespace_reports_false() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    assert!(!storage.delete_namespace("missing").unwrap());
    assert_eq!(storage.count("missing").unwrap(), 0);
  }

  #[test]
  fn test_put_all_writes_every_entry() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    let entries = vec![
      ("a".to_string(), response("a")),
      ("b".to_string(), response("b")),
    ];
    storage.put_all("ns", &entries).unwrap();
    assert_eq!(storage.count("ns").unwrap(), 2);
  }

  #[test]
  fn test_database_persists_across_reopen() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("nested").join("cache.db");

    {
      let storage = SqliteStorage::open(&path).unwrap();
      storage.put("ns", "k", &response("kept")).unwrap();
    }

    let storage = SqliteStorage::open(&path).unwrap();
    assert_eq!(storage.get("ns", "k").unwrap().unwrap().response.body, b"kept");
  }
}
