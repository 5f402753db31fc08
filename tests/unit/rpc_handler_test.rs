//! Unit tests for the RPC handler: JSON-RPC methods dispatched by `handle_method`.
//!
//! These go through the same code path as the `concept-tracker-rpc` binary,
//! with an in-memory backend and a temporary screenshot store.

use std::sync::{Arc, Mutex};

use serde_json::{json, Value};
use tempfile::TempDir;

use concept_tracker::app::App;
use concept_tracker::managers::session_tracker::SessionTrackerTrait;
use concept_tracker::rpc_handler::{base64_decode, handle_method};
use concept_tracker::services::backend_gateway::BackendGateway;
use concept_tracker::services::sqlite_gateway::{GatewayOptions, SqliteGateway};
use concept_tracker::types::config::{AppConfig, BackendUrl};

fn open_backend(url: &BackendUrl, tmp: &TempDir) -> SqliteGateway {
    SqliteGateway::open(
        url,
        GatewayOptions {
            api_key: "test-key".to_string(),
            storage_dir: tmp.path().to_path_buf(),
            password_iterations: 1_000,
        },
    )
    .expect("Failed to open backend")
}

/// Fresh App over an empty in-memory backend. Nobody is signed in.
fn setup() -> (Mutex<App>, TempDir) {
    let tmp = TempDir::new().expect("Failed to create temp dir");
    let gateway = open_backend(&BackendUrl::Memory, &tmp);
    let config = AppConfig::in_memory("test-key", tmp.path().to_path_buf());
    let app = App::with_gateway(config, Arc::new(gateway));
    (Mutex::new(app), tmp)
}

/// App on its own client of `url`, plus a second signed-out client of the same
/// backend for checking rows from outside the app.
fn setup_with_observer(url: BackendUrl) -> (Mutex<App>, SqliteGateway, TempDir) {
    let tmp = TempDir::new().expect("Failed to create temp dir");
    let observer = open_backend(&url, &tmp);
    let config = AppConfig::in_memory("test-key", tmp.path().to_path_buf());
    let app = App::with_gateway(config, Arc::new(observer.client()));
    (Mutex::new(app), observer, tmp)
}

fn call(app: &Mutex<App>, method: &str, params: Value) -> Value {
    handle_method(app, method, &params)
        .unwrap_or_else(|e| panic!("{} failed: {}", method, e))
}

/// Signs up the first account, which becomes super-admin.
fn sign_up_admin(app: &Mutex<App>) -> Value {
    call(
        app,
        "auth.sign_up",
        json!({"email": "admin@example.com", "password": "adminpw1", "display_name": "Admin"}),
    )
}

fn add_demo(app: &Mutex<App>, title: &str, tags: &[&str]) -> String {
    let res = call(
        app,
        "demo.add",
        json!({
            "title": title,
            "description": format!("{} description", title),
            "tags": tags,
            "owner": "Ana",
            "app_url": "https://app.example.com"
        }),
    );
    res["id"].as_str().unwrap().to_string()
}

// ─── Ping ───

#[test]
fn test_ping() {
    let (app, _tmp) = setup();
    let res = call(&app, "ping", json!({}));
    assert_eq!(res["pong"], true);
}

// ─── Unknown method ───

#[test]
fn test_unknown_method_returns_error() {
    let (app, _tmp) = setup();
    let res = handle_method(&app, "nonexistent.method", &json!({}));
    assert!(res.unwrap_err().contains("unknown method"));
}

#[test]
fn test_missing_param_is_reported() {
    let (app, _tmp) = setup();
    let err = handle_method(&app, "demo.get", &json!({})).unwrap_err();
    assert_eq!(err, "missing id");
}

// ─── Auth ───

#[test]
fn test_sign_up_sign_out_sign_in() {
    let (app, _tmp) = setup();
    let user = sign_up_admin(&app);
    assert_eq!(user["email"], "admin@example.com");

    let profile = call(&app, "auth.profile", json!({}));
    assert_eq!(profile["role"], "super_admin");

    call(&app, "auth.sign_out", json!({}));
    assert_eq!(call(&app, "auth.current_user", json!({})), Value::Null);

    let err = handle_method(
        &app,
        "auth.sign_in",
        &json!({"email": "admin@example.com", "password": "nope-nope"}),
    )
    .unwrap_err();
    assert!(err.starts_with("Unauthorized"));

    call(
        &app,
        "auth.sign_in",
        json!({"email": "admin@example.com", "password": "adminpw1"}),
    );
    assert_eq!(call(&app, "auth.current_user", json!({}))["id"], user["id"]);
}

#[test]
fn test_sign_in_opens_a_session() {
    let (app, _tmp) = setup();
    sign_up_admin(&app);

    let a = app.lock().unwrap();
    assert!(a.tracker.active_session().is_some());
    assert!(a.favorites.is_some());
}

#[test]
fn test_switching_users_closes_the_previous_session() {
    let (app, observer, _tmp) = setup_with_observer(BackendUrl::Memory);
    let admin = sign_up_admin(&app);
    let viewer = call(
        &app,
        "auth.sign_up",
        json!({"email": "viewer@example.com", "password": "viewerpw"}),
    );

    {
        let a = app.lock().unwrap();
        let session = a.tracker.active_session().expect("viewer session");
        assert_eq!(session.user_id, viewer["id"].as_str().unwrap());
        assert_eq!(a.favorites.as_ref().unwrap().user_id(), viewer["id"].as_str().unwrap());
    }

    observer.sign_in("admin@example.com", "adminpw1").unwrap();
    let sessions = observer.list_sessions(None).unwrap();
    let admin_open = sessions
        .iter()
        .filter(|s| s.user_id == admin["id"].as_str().unwrap() && s.end_time.is_none())
        .count();
    assert_eq!(admin_open, 0);
    let viewer_open = sessions
        .iter()
        .filter(|s| s.user_id == viewer["id"].as_str().unwrap() && s.end_time.is_none())
        .count();
    assert_eq!(viewer_open, 1);
}

#[test]
fn test_password_reset_flow() {
    let (app, _tmp) = setup();
    sign_up_admin(&app);
    call(&app, "auth.sign_out", json!({}));

    let token = call(&app, "auth.request_password_reset", json!({"email": "admin@example.com"}));
    call(
        &app,
        "auth.reset_password",
        json!({"token": token["token"], "password": "brand-new-pw"}),
    );

    call(
        &app,
        "auth.sign_in",
        json!({"email": "admin@example.com", "password": "brand-new-pw"}),
    );
}

#[test]
fn test_role_management() {
    let (app, _tmp) = setup();
    sign_up_admin(&app);
    call(&app, "auth.sign_out", json!({}));
    let viewer = call(
        &app,
        "auth.sign_up",
        json!({"email": "viewer@example.com", "password": "viewerpw"}),
    );

    let err = handle_method(&app, "auth.list_users", &json!({})).unwrap_err();
    assert!(err.starts_with("Forbidden"));

    call(&app, "auth.sign_out", json!({}));
    call(
        &app,
        "auth.sign_in",
        json!({"email": "admin@example.com", "password": "adminpw1"}),
    );
    let users = call(&app, "auth.list_users", json!({}));
    assert_eq!(users.as_array().unwrap().len(), 2);

    let promoted = call(
        &app,
        "auth.set_role",
        json!({"user_id": viewer["id"], "role": "admin"}),
    );
    assert_eq!(promoted["role"], "admin");

    let err = handle_method(
        &app,
        "auth.set_role",
        &json!({"user_id": viewer["id"], "role": "owner"}),
    )
    .unwrap_err();
    assert_eq!(err, "invalid role");
}

// ─── Demos ───

#[test]
fn test_demo_add_get_and_list() {
    let (app, _tmp) = setup();
    sign_up_admin(&app);
    let id = add_demo(&app, "Invoice Agent", &["ai", "finance"]);

    let demo = call(&app, "demo.get", json!({"id": id}));
    assert_eq!(demo["title"], "Invoice Agent");
    assert_eq!(demo["app_url"], "https://app.example.com");
    assert_eq!(demo["page_views"], 0);

    let list = call(&app, "demo.list", json!({}));
    assert_eq!(list.as_array().unwrap().len(), 1);
    assert_eq!(call(&app, "demo.tags", json!({})), json!(["ai", "finance"]));
}

#[test]
fn test_demo_add_requires_admin() {
    let (app, _tmp) = setup();
    sign_up_admin(&app);
    call(&app, "auth.sign_out", json!({}));
    call(
        &app,
        "auth.sign_up",
        json!({"email": "viewer@example.com", "password": "viewerpw"}),
    );

    let err = handle_method(
        &app,
        "demo.add",
        &json!({"title": "Nope", "description": "", "owner": "Viewer"}),
    )
    .unwrap_err();
    assert!(err.starts_with("Forbidden"), "got {}", err);
}

#[test]
fn test_demo_update_and_toggle_featured() {
    let (app, _tmp) = setup();
    sign_up_admin(&app);
    let id = add_demo(&app, "Draft", &[]);

    let updated = call(
        &app,
        "demo.update",
        json!({"id": id, "update": {"title": "Final", "app_url": null}}),
    );
    assert_eq!(updated["title"], "Final");
    assert_eq!(updated["app_url"], Value::Null);

    let res = call(&app, "demo.toggle_featured", json!({"id": id}));
    assert_eq!(res["is_featured"], true);
}

#[test]
fn test_demo_view_counts_and_tracks() {
    let (app, _tmp) = setup();
    sign_up_admin(&app);
    let id = add_demo(&app, "Popular", &[]);

    call(&app, "demo.view", json!({"id": id}));
    let res = call(&app, "demo.view", json!({"id": id}));
    assert_eq!(res["page_views"], 2);

    let dashboard = call(&app, "analytics.dashboard", json!({}));
    assert_eq!(dashboard["activity"]["by_type"]["view"], 2);
}

#[test]
fn test_search_and_tag_filter() {
    let (app, _tmp) = setup();
    sign_up_admin(&app);
    add_demo(&app, "Voice Bot", &["speech"]);
    add_demo(&app, "Doc QA", &["rag"]);

    let hits = call(&app, "demo.search", json!({"query": "voice"}));
    assert_eq!(hits.as_array().unwrap().len(), 1);

    let tagged = call(&app, "demo.filter_tag", json!({"tag": "rag"}));
    assert_eq!(tagged[0]["title"], "Doc QA");

    let dashboard = call(&app, "analytics.dashboard", json!({}));
    assert_eq!(dashboard["activity"]["by_type"]["search"], 1);
    assert_eq!(dashboard["activity"]["by_type"]["filter"], 1);
}

#[test]
fn test_screenshot_upload_and_delete() {
    let (app, tmp) = setup();
    sign_up_admin(&app);
    let id = add_demo(&app, "Pictured", &[]);

    let demo = call(
        &app,
        "demo.upload_screenshot",
        json!({"id": id, "key": "pictured.png", "data": "iVBORw0KGgo="}),
    );
    assert_eq!(demo["screenshot_url"], "storage://screenshots/pictured.png");
    assert!(tmp.path().join("screenshots").join("pictured.png").exists());

    call(&app, "demo.delete", json!({"id": id}));
    assert!(!tmp.path().join("screenshots").join("pictured.png").exists());
    assert!(handle_method(&app, "demo.get", &json!({"id": id})).is_err());
}

#[test]
fn test_bad_base64_is_rejected() {
    let (app, _tmp) = setup();
    sign_up_admin(&app);
    let err = handle_method(
        &app,
        "demo.upload_screenshot",
        &json!({"id": "x", "key": "x.png", "data": "***"}),
    )
    .unwrap_err();
    assert!(err.starts_with("base64 decode error"));
    assert_eq!(base64_decode("aGk=").unwrap(), b"hi");
}

// ─── Favorites and folders ───

#[test]
fn test_favorites_require_sign_in() {
    let (app, _tmp) = setup();
    let err = handle_method(&app, "favorites.list", &json!({})).unwrap_err();
    assert!(err.starts_with("Unauthorized"));
}

#[test]
fn test_favorite_toggle_and_folders() {
    let (app, _tmp) = setup();
    sign_up_admin(&app);
    let id = add_demo(&app, "Keeper", &["ai"]);

    assert_eq!(call(&app, "favorites.toggle", json!({"demo_id": id}))["favorited"], true);
    assert_eq!(call(&app, "favorites.is_favorited", json!({"demo_id": id}))["favorited"], true);

    let folder = call(&app, "folder.create", json!({"name": "Clients", "color": "#f59e0b"}));
    let folder_id = folder["id"].as_str().unwrap().to_string();
    call(&app, "favorites.move", json!({"demo_id": id, "folder_id": folder_id}));

    let listing = call(&app, "folder.list", json!({}));
    let folders = listing["folders"].as_array().unwrap();
    assert_eq!(folders.len(), 2);
    assert_eq!(folders[0]["folder"]["name"], "Clients");
    assert_eq!(folders[0]["demos"][0]["id"], id.as_str());
    assert_eq!(folders[1]["folder"]["id"], "unorganized");

    call(&app, "folder.delete", json!({"id": folder_id}));
    let listing = call(&app, "folder.list", json!({}));
    assert_eq!(listing["folders"][0]["demos"][0]["id"], id.as_str());

    assert_eq!(call(&app, "favorites.toggle", json!({"demo_id": id}))["favorited"], false);
    assert_eq!(call(&app, "favorites.load", json!({}))["count"], 0);
}

#[test]
fn test_favorite_toggle_survives_activity_write_failure() {
    let tmp = TempDir::new().expect("Failed to create temp dir");
    let path = tmp.path().join("tracker.db");
    let (app, _observer, _tmp) = setup_with_observer(BackendUrl::File(path.clone()));
    sign_up_admin(&app);
    let id = add_demo(&app, "Resilient", &[]);
    assert!(app.lock().unwrap().tracker.active_session().is_some());

    let raw = rusqlite::Connection::open(&path).unwrap();
    raw.execute_batch("DROP TABLE activity_logs;").unwrap();

    assert_eq!(call(&app, "favorites.toggle", json!({"demo_id": id}))["favorited"], true);
    assert_eq!(call(&app, "favorites.is_favorited", json!({"demo_id": id}))["favorited"], true);
}

#[test]
fn test_folder_update_and_reorder() {
    let (app, _tmp) = setup();
    sign_up_admin(&app);
    let a = call(&app, "folder.create", json!({"name": "A"}));
    let b = call(&app, "folder.create", json!({"name": "B"}));

    let renamed = call(
        &app,
        "folder.update",
        json!({"id": a["id"], "update": {"name": "Alpha", "description": "first"}}),
    );
    assert_eq!(renamed["name"], "Alpha");
    assert_eq!(renamed["description"], "first");

    call(&app, "folder.reorder", json!({"ids": [b["id"], a["id"]]}));
    let listing = call(&app, "folder.list", json!({}));
    assert_eq!(listing["folders"][0]["folder"]["name"], "B");
    assert_eq!(listing["folders"][1]["folder"]["name"], "Alpha");
}

#[test]
fn test_global_folder_requires_super_admin() {
    let (app, _tmp) = setup();
    sign_up_admin(&app);
    let global = call(&app, "folder.create", json!({"name": "Showcase", "global": true}));
    assert_eq!(global["is_global"], true);

    call(&app, "auth.sign_out", json!({}));
    call(
        &app,
        "auth.sign_up",
        json!({"email": "viewer@example.com", "password": "viewerpw"}),
    );
    let err = handle_method(&app, "folder.create", &json!({"name": "Mine too", "global": true}))
        .unwrap_err();
    assert!(err.starts_with("Forbidden"));

    let listing = call(&app, "folder.list", json!({}));
    assert_eq!(listing["global_folders"].as_array().unwrap().len(), 1);
}

// ─── Analytics ───

#[test]
fn test_analytics_on_empty_catalog() {
    let (app, _tmp) = setup();
    let metrics = call(&app, "analytics.metrics", json!({}));
    assert_eq!(metrics["total_demos"], 0);
    assert_eq!(metrics["average_views"], 0);
    assert_eq!(call(&app, "analytics.top_demos", json!({})), json!([]));

    let dashboard = call(&app, "analytics.dashboard", json!({}));
    assert_eq!(dashboard["engagement"]["status"], "unavailable");
    assert_eq!(dashboard["tiers"].as_array().unwrap().len(), 5);
}

#[test]
fn test_top_and_recent_demos_respect_limit() {
    let (app, _tmp) = setup();
    sign_up_admin(&app);
    let first = add_demo(&app, "First", &[]);
    add_demo(&app, "Second", &[]);
    add_demo(&app, "Third", &[]);
    call(&app, "demo.view", json!({"id": first}));

    let top = call(&app, "analytics.top_demos", json!({"limit": 1}));
    assert_eq!(top.as_array().unwrap().len(), 1);
    assert_eq!(top[0]["id"], first.as_str());

    let recent = call(&app, "analytics.recent_demos", json!({"limit": 2}));
    assert_eq!(recent.as_array().unwrap().len(), 2);
}

// ─── Tracking ───

#[test]
fn test_tracking_methods_never_fail() {
    let (app, _tmp) = setup();
    // No session yet: events are dropped quietly.
    call(&app, "track.page_focus", json!({}));

    sign_up_admin(&app);
    call(&app, "track.try_app", json!({"demo_id": "d1", "url": "https://app.example.com"}));
    call(&app, "track.tab_change", json!({"from": "catalog", "to": "analytics"}));
    call(&app, "track.page_blur", json!({}));
    call(&app, "track.click", json!({"target": "cta", "context": {"pos": 1}}));

    let dashboard = call(&app, "analytics.dashboard", json!({}));
    assert_eq!(dashboard["activity"]["total_events"], 4);
    assert_eq!(dashboard["engagement"]["status"], "available");
}
