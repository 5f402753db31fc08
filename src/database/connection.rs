//! Connection handling for the backend store.
//!
//! A [`Database`] owns one `rusqlite::Connection` and brings its schema up to
//! date before handing it out.

use std::path::Path;
use std::time::Duration;

use rusqlite::Connection;

use super::migrations;
use crate::types::config::BackendUrl;

/// How long a writer waits on a lock held by another connection to the same file.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens or creates the database file at `path` and migrates it.
    ///
    /// # Errors
    /// Returns `rusqlite::Error` if the file cannot be opened or a migration fails.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, rusqlite::Error> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Self::migrated(conn)
    }

    /// Opens a private in-memory database, gone once dropped.
    pub fn open_in_memory() -> Result<Self, rusqlite::Error> {
        Self::migrated(Connection::open_in_memory()?)
    }

    /// Opens whichever database the configured backend URL points at.
    pub fn open_url(url: &BackendUrl) -> Result<Self, rusqlite::Error> {
        match url {
            BackendUrl::Memory => Self::open_in_memory(),
            BackendUrl::File(path) => Self::open(path),
        }
    }

    fn migrated(conn: Connection) -> Result<Self, rusqlite::Error> {
        migrations::run_all(&conn)?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}
