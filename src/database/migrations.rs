//! Schema migrations for the Concept Tracker SQLite backend.
//!
//! Uses a `schema_version` table to track which migrations have been applied.
//! Each migration runs exactly once and is recorded with a timestamp.

use rusqlite::Connection;

/// Current schema version. Bump this when adding a new migration.
pub const CURRENT_SCHEMA_VERSION: i32 = 2;

/// Returns the current schema version from the database (0 if table doesn't exist).
pub fn get_schema_version(conn: &Connection) -> i32 {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )
    .unwrap_or(0)
}

/// Runs all pending schema migrations against the provided connection.
///
/// Safe to call on every startup.
pub fn run_all(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA foreign_keys = ON;
         CREATE TABLE IF NOT EXISTS schema_version (
             version INTEGER PRIMARY KEY,
             applied_at INTEGER NOT NULL,
             description TEXT NOT NULL
         );",
    )?;

    let current = get_schema_version(conn);

    if current < 1 {
        migration_v1(conn)?;
        record_version(conn, 1, "Initial schema: auth, demos, favorites, folders, telemetry")?;
    }

    if current < 2 {
        migration_v2(conn)?;
        record_version(conn, 2, "Add status and created_by to demos")?;
    }

    Ok(())
}

fn record_version(conn: &Connection, version: i32, description: &str) -> Result<(), rusqlite::Error> {
    let now = chrono::Utc::now().timestamp_millis();
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version, applied_at, description) VALUES (?1, ?2, ?3)",
        rusqlite::params![version, now, description],
    )?;
    Ok(())
}

/// V1: Create all core tables. Timestamps are UNIX milliseconds.
fn migration_v1(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS backend_meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS auth_users (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            password_hash BLOB NOT NULL,
            salt BLOB NOT NULL,
            created_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS password_reset_tokens (
            token TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            expires_at INTEGER NOT NULL,
            used INTEGER NOT NULL DEFAULT 0,
            FOREIGN KEY (user_id) REFERENCES auth_users(id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS user_profiles (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL,
            display_name TEXT NOT NULL,
            role TEXT NOT NULL DEFAULT 'user',
            created_at INTEGER NOT NULL,
            last_login INTEGER,
            FOREIGN KEY (id) REFERENCES auth_users(id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS demos (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            tags TEXT NOT NULL DEFAULT '[]',
            owner TEXT NOT NULL,
            page_views INTEGER NOT NULL DEFAULT 0 CHECK (page_views >= 0),
            is_featured INTEGER NOT NULL DEFAULT 0,
            app_url TEXT,
            design_url TEXT,
            docs_url TEXT,
            resource_url TEXT,
            screenshot_url TEXT,
            video_url TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_demos_created_at ON demos(created_at);

        CREATE TABLE IF NOT EXISTS favorite_folders (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT,
            color TEXT NOT NULL,
            is_global INTEGER NOT NULL DEFAULT 0,
            created_by TEXT NOT NULL,
            user_id TEXT,
            sort_order INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_folders_user ON favorite_folders(user_id);

        CREATE TABLE IF NOT EXISTS user_favorites (
            user_id TEXT NOT NULL,
            demo_id TEXT NOT NULL,
            folder_id TEXT,
            created_at INTEGER NOT NULL,
            PRIMARY KEY (user_id, demo_id),
            FOREIGN KEY (demo_id) REFERENCES demos(id) ON DELETE CASCADE,
            FOREIGN KEY (folder_id) REFERENCES favorite_folders(id)
        );

        CREATE INDEX IF NOT EXISTS idx_favorites_folder ON user_favorites(folder_id);

        CREATE TABLE IF NOT EXISTS user_sessions (
            session_id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            start_time INTEGER NOT NULL,
            end_time INTEGER,
            user_agent TEXT NOT NULL,
            referrer TEXT
        );

        CREATE TABLE IF NOT EXISTS activity_logs (
            id TEXT PRIMARY KEY,
            session_id TEXT NOT NULL,
            user_id TEXT,
            activity_type TEXT NOT NULL,
            resource_type TEXT NOT NULL,
            resource_id TEXT,
            activity_data TEXT NOT NULL DEFAULT '{}',
            timestamp INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_activity_timestamp ON activity_logs(timestamp);
        CREATE INDEX IF NOT EXISTS idx_activity_session ON activity_logs(session_id);
        ",
    )
}

/// V2: Demo publication status and creator, added after the first catalog shipped.
fn migration_v2(conn: &Connection) -> Result<(), rusqlite::Error> {
    if conn.prepare("SELECT status FROM demos LIMIT 0").is_err() {
        conn.execute_batch(
            "ALTER TABLE demos ADD COLUMN status TEXT NOT NULL DEFAULT 'published';",
        )?;
    }
    if conn.prepare("SELECT created_by FROM demos LIMIT 0").is_err() {
        conn.execute_batch("ALTER TABLE demos ADD COLUMN created_by TEXT;")?;
    }
    Ok(())
}
