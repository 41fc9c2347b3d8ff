pub mod migrations;
pub mod models;
pub mod queries;

use anyhow::{Result, anyhow};
use rusqlite::Connection;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{info, warn};

pub struct Database {
    conn: Mutex<Connection>,
    force_rollback: bool,
}

impl Database {
    /// Open the database named by a `sqlite:///relative`, `sqlite:////absolute`
    /// or `:memory:` URL.
    ///
    /// With `force_rollback` every write made through this handle happens inside
    /// a single transaction that is rolled back when the handle is dropped.
    pub fn connect(url: &str, force_rollback: bool) -> Result<Self> {
        let conn = match parse_url(url)? {
            Some(path) => {
                let conn = Connection::open(&path)?;
                // WAL mode for concurrent reads
                conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
                    row.get::<_, String>(0)
                })?;
                info!("Database opened at {}", path.display());
                conn
            }
            None => {
                info!("Database opened in memory");
                Connection::open_in_memory()?
            }
        };
        Self::init(conn, force_rollback)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?, false)
    }

    fn init(conn: Connection, force_rollback: bool) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;

        migrations::run(&conn)?;

        if force_rollback {
            conn.execute_batch("BEGIN")?;
            info!("Database in force-rollback mode");
        }

        Ok(Self {
            conn: Mutex::new(conn),
            force_rollback,
        })
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock().map_err(|e| anyhow!("DB lock poisoned: {}", e))?;
        f(&conn)
    }
}

impl Drop for Database {
    fn drop(&mut self) {
        if !self.force_rollback {
            return;
        }
        let conn = match self.conn.get_mut() {
            Ok(conn) => conn,
            Err(poisoned) => poisoned.into_inner(),
        };
        match conn.execute_batch("ROLLBACK") {
            Ok(()) => info!("Database changes rolled back"),
            Err(e) => warn!("Rollback on close failed: {}", e),
        }
    }
}

/// `None` means an in-memory database.
fn parse_url(url: &str) -> Result<Option<PathBuf>> {
    if url == ":memory:" || url == "sqlite://" || url == "sqlite:///:memory:" {
        return Ok(None);
    }
    let path = url
        .strip_prefix("sqlite:///")
        .ok_or_else(|| anyhow!("Unsupported database URL: {}", url))?;
    if path.is_empty() {
        return Err(anyhow!("Database URL has no path: {}", url));
    }
    Ok(Some(PathBuf::from(path)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_relative_and_absolute_urls() {
        assert_eq!(parse_url("sqlite:///data.db").unwrap(), Some(PathBuf::from("data.db")));
        assert_eq!(
            parse_url("sqlite:////var/lib/store.db").unwrap(),
            Some(PathBuf::from("/var/lib/store.db"))
        );
        assert_eq!(parse_url(":memory:").unwrap(), None);
    }

    #[test]
    fn rejects_foreign_schemes() {
        assert!(parse_url("postgres://localhost/store").is_err());
        assert!(parse_url("sqlite:///").is_err());
    }

    #[test]
    fn force_rollback_discards_writes() {
        let dir = std::env::temp_dir().join(format!("storeapi-rollback-{}.db", std::process::id()));
        let url = format!("sqlite:///{}", dir.display());
        // dir.display() is absolute, so the url ends up with four slashes
        {
            let db = Database::connect(&url, true).unwrap();
            db.create_user("a@example.com", "hash").unwrap();
            assert!(db.get_user_by_email("a@example.com").unwrap().is_some());
        }
        {
            let db = Database::connect(&url, false).unwrap();
            assert!(db.get_user_by_email("a@example.com").unwrap().is_none());
        }
        let _ = std::fs::remove_file(&dir);
        let _ = std::fs::remove_file(dir.with_extension("db-wal"));
        let _ = std::fs::remove_file(dir.with_extension("db-shm"));
    }
}
