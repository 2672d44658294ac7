//! Database connection management.
//!
//! [`Database`] owns a [`rusqlite::Connection`] and guarantees that
//! migrations have run before anything else touches it.

use std::path::{Path, PathBuf};

use chatty_shared::constants::DB_FILE_NAME;
use directories::ProjectDirs;
use rusqlite::Connection;

use crate::error::{Result, StoreError};
use crate::migrations;

pub struct Database {
    conn: Connection,
}

impl Database {
    /// Platform data directory for the application
    /// (`~/.local/share/chatty` on Linux).
    pub fn default_dir() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("com", "chatty", "chatty").ok_or(StoreError::NoDataDir)?;
        Ok(dirs.data_dir().to_path_buf())
    }

    /// Open (or create) the settings database inside `dir`.
    pub fn open_in(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(DB_FILE_NAME);
        tracing::info!(path = %path.display(), "opening settings database");
        Self::open_at(&path)
    }

    /// Open (or create) a database at an explicit file path.
    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::init(conn)
    }

    /// Throwaway database, used when no data directory is available.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        migrations::run_migrations(&conn)?;
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Filesystem path of the open database; `None` for in-memory ones.
    pub fn path(&self) -> Option<PathBuf> {
        self.conn
            .path()
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
    }
}
