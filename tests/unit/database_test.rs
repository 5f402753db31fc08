//! Unit tests for the Concept Tracker database layer (connection + migrations).

use concept_tracker::database::migrations::{get_schema_version, CURRENT_SCHEMA_VERSION};
use concept_tracker::database::Database;
use concept_tracker::types::config::BackendUrl;

#[test]
fn test_open_in_memory_succeeds() {
    let db = Database::open_in_memory();
    assert!(db.is_ok(), "open_in_memory should succeed");
}

#[test]
fn test_migrations_create_all_tables() {
    let db = Database::open_in_memory().expect("open_in_memory failed");
    let conn = db.connection();

    let expected_tables = [
        "backend_meta",
        "auth_users",
        "password_reset_tokens",
        "user_profiles",
        "demos",
        "favorite_folders",
        "user_favorites",
        "user_sessions",
        "activity_logs",
    ];

    for table in &expected_tables {
        let exists: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name=?1",
                [table],
                |row| row.get(0),
            )
            .unwrap_or(false);
        assert!(exists, "Table '{}' should exist after migrations", table);
    }
}

#[test]
fn test_migrations_create_indexes() {
    let db = Database::open_in_memory().expect("open_in_memory failed");
    let conn = db.connection();

    for index in ["idx_demos_created_at", "idx_favorites_folder", "idx_activity_timestamp"] {
        let exists: bool = conn
            .query_row(
                "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='index' AND name=?1",
                [index],
                |row| row.get(0),
            )
            .unwrap_or(false);
        assert!(exists, "Index '{}' should exist after migrations", index);
    }
}

#[test]
fn test_schema_version_is_current() {
    let db = Database::open_in_memory().unwrap();
    assert_eq!(get_schema_version(db.connection()), CURRENT_SCHEMA_VERSION);
}

#[test]
fn test_reopening_a_file_database_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tracker.db");

    {
        let db = Database::open(&path).unwrap();
        db.connection()
            .execute(
                "INSERT INTO demos (id, title, owner, created_at, updated_at) VALUES ('d1', 'Demo', 'Ana', 0, 0)",
                [],
            )
            .unwrap();
    }

    let db = Database::open_url(&BackendUrl::File(path)).unwrap();
    let count: i64 = db
        .connection()
        .query_row("SELECT COUNT(*) FROM demos", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 1);
    assert_eq!(get_schema_version(db.connection()), CURRENT_SCHEMA_VERSION);
}

#[test]
fn test_demo_defaults_after_v2() {
    let db = Database::open_in_memory().unwrap();
    let conn = db.connection();
    conn.execute(
        "INSERT INTO demos (id, title, owner, created_at, updated_at) VALUES ('d1', 'Demo', 'Ana', 0, 0)",
        [],
    )
    .unwrap();

    let (status, views, tags): (String, i64, String) = conn
        .query_row("SELECT status, page_views, tags FROM demos WHERE id = 'd1'", [], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
        })
        .unwrap();
    assert_eq!(status, "published");
    assert_eq!(views, 0);
    assert_eq!(tags, "[]");
}

#[test]
fn test_page_views_cannot_go_negative() {
    let db = Database::open_in_memory().unwrap();
    let conn = db.connection();
    conn.execute(
        "INSERT INTO demos (id, title, owner, created_at, updated_at) VALUES ('d1', 'Demo', 'Ana', 0, 0)",
        [],
    )
    .unwrap();

    let result = conn.execute("UPDATE demos SET page_views = -1 WHERE id = 'd1'", []);
    assert!(result.is_err(), "CHECK constraint should reject negative views");
}

#[test]
fn test_deleting_a_demo_cascades_to_favorites() {
    let db = Database::open_in_memory().unwrap();
    let conn = db.connection();
    conn.execute_batch(
        "INSERT INTO demos (id, title, owner, created_at, updated_at) VALUES ('d1', 'Demo', 'Ana', 0, 0);
         INSERT INTO user_favorites (user_id, demo_id, folder_id, created_at) VALUES ('u1', 'd1', NULL, 0);
         DELETE FROM demos WHERE id = 'd1';",
    )
    .unwrap();

    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM user_favorites", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 0);
}

#[test]
fn test_folder_with_links_cannot_be_deleted_directly() {
    let db = Database::open_in_memory().unwrap();
    let conn = db.connection();
    conn.execute_batch(
        "INSERT INTO demos (id, title, owner, created_at, updated_at) VALUES ('d1', 'Demo', 'Ana', 0, 0);
         INSERT INTO favorite_folders (id, name, color, created_by, user_id, created_at) VALUES ('f1', 'Clients', '#6366f1', 'u1', 'u1', 0);
         INSERT INTO user_favorites (user_id, demo_id, folder_id, created_at) VALUES ('u1', 'd1', 'f1', 0);",
    )
    .unwrap();

    let result = conn.execute("DELETE FROM favorite_folders WHERE id = 'f1'", []);
    assert!(result.is_err(), "links must be detached before the folder row goes");
}
