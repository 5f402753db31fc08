//! RPC method handler for the Concept Tracker JSON-RPC protocol.
//!
//! Extracted from `rpc_server.rs` so it can be unit-tested independently.
//! The `handle_method` function dispatches JSON-RPC method calls to the
//! stores and aggregators via the `App` struct.

use std::sync::Mutex;

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};

use crate::app::App;
use crate::managers::demo_catalog::DemoCatalogTrait;
use crate::managers::favorites_manager::FavoritesManagerTrait;
use crate::managers::session_tracker::SessionTrackerTrait;
use crate::services::analytics_engine;
use crate::types::demo::{Demo, DemoUpdate, NewDemo};
use crate::types::favorite::{FolderUpdate, NewFolder};
use crate::types::profile::UserRole;

/// Decode base64 string to bytes.
pub fn base64_decode(input: &str) -> Result<Vec<u8>, String> {
    BASE64.decode(input).map_err(|e| format!("base64 decode error: {}", e))
}

fn str_param<'a>(params: &'a Value, key: &str) -> Result<&'a str, String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| format!("missing {}", key))
}

fn opt_str_param<'a>(params: &'a Value, key: &str) -> Option<&'a str> {
    params.get(key).and_then(|v| v.as_str())
}

fn limit_param(params: &Value, default: usize) -> usize {
    params
        .get("limit")
        .and_then(|v| v.as_u64())
        .map(|n| n as usize)
        .unwrap_or(default)
}

fn from_params<T: DeserializeOwned>(value: &Value) -> Result<T, String> {
    serde_json::from_value(value.clone()).map_err(|e| format!("invalid params: {}", e))
}

fn to_json<T: Serialize>(value: &T) -> Result<Value, String> {
    serde_json::to_value(value).map_err(|e| e.to_string())
}

fn published_demos(app: &Mutex<App>) -> Result<Vec<Demo>, String> {
    let a = app.lock().map_err(|e| e.to_string())?;
    Ok(analytics_engine::published(a.catalog.demos()))
}

/// Dispatch a JSON-RPC method call to the appropriate handler.
///
/// Returns `Ok(Value)` on success or `Err(String)` with an error message.
/// Capability rejections from the backend surface as messages starting with `Forbidden`.
pub fn handle_method(app: &Mutex<App>, method: &str, params: &Value) -> Result<Value, String> {
    match method {
        "ping" => Ok(json!({"pong": true, "version": env!("CARGO_PKG_VERSION")})),

        // ─── Auth ───
        "auth.sign_up" => {
            let email = str_param(params, "email")?;
            let password = str_param(params, "password")?;
            let display_name = opt_str_param(params, "display_name").unwrap_or("");
            let mut a = app.lock().map_err(|e| e.to_string())?;
            let user = a.sign_up(email, password, display_name).map_err(|e| e.to_string())?;
            to_json(&user)
        }
        "auth.sign_in" => {
            let email = str_param(params, "email")?;
            let password = str_param(params, "password")?;
            let mut a = app.lock().map_err(|e| e.to_string())?;
            let user = a.sign_in(email, password).map_err(|e| e.to_string())?;
            to_json(&user)
        }
        "auth.sign_out" => {
            let mut a = app.lock().map_err(|e| e.to_string())?;
            a.sign_out().map_err(|e| e.to_string())?;
            Ok(json!({"ok": true}))
        }
        "auth.current_user" => {
            let a = app.lock().map_err(|e| e.to_string())?;
            to_json(&a.gateway.current_user())
        }
        "auth.profile" => {
            let a = app.lock().map_err(|e| e.to_string())?;
            let user_id = match opt_str_param(params, "user_id") {
                Some(id) => id.to_string(),
                None => a.gateway.current_user().map(|u| u.id).ok_or("not signed in")?,
            };
            let profile = a.gateway.get_profile(&user_id).map_err(|e| e.to_string())?;
            to_json(&profile)
        }
        "auth.list_users" => {
            let a = app.lock().map_err(|e| e.to_string())?;
            let profiles = a.gateway.list_profiles().map_err(|e| e.to_string())?;
            to_json(&profiles)
        }
        "auth.set_role" => {
            let user_id = str_param(params, "user_id")?;
            let role = UserRole::parse(str_param(params, "role")?).ok_or("invalid role")?;
            let a = app.lock().map_err(|e| e.to_string())?;
            let profile = a.gateway.set_user_role(user_id, role).map_err(|e| e.to_string())?;
            to_json(&profile)
        }
        "auth.request_password_reset" => {
            let email = str_param(params, "email")?;
            let a = app.lock().map_err(|e| e.to_string())?;
            let token = a.gateway.request_password_reset(email).map_err(|e| e.to_string())?;
            Ok(json!({"token": token}))
        }
        "auth.reset_password" => {
            let token = str_param(params, "token")?;
            let password = str_param(params, "password")?;
            let a = app.lock().map_err(|e| e.to_string())?;
            a.gateway.reset_password(token, password).map_err(|e| e.to_string())?;
            Ok(json!({"ok": true}))
        }

        // ─── Demos ───
        "demo.list" => {
            let a = app.lock().map_err(|e| e.to_string())?;
            to_json(&a.catalog.demos())
        }
        "demo.reload" => {
            let mut a = app.lock().map_err(|e| e.to_string())?;
            let count = a.catalog.load().map_err(|e| e.to_string())?;
            Ok(json!({"count": count}))
        }
        "demo.get" => {
            let id = str_param(params, "id")?;
            let a = app.lock().map_err(|e| e.to_string())?;
            let demo = a.catalog.get(id).ok_or_else(|| format!("Demo not found: {}", id))?;
            to_json(demo)
        }
        "demo.search" => {
            let query = str_param(params, "query")?;
            let a = app.lock().map_err(|e| e.to_string())?;
            let results = a.catalog.search(query);
            a.tracker.track_search(query, results.len());
            to_json(&results)
        }
        "demo.filter_tag" => {
            let tag = str_param(params, "tag")?;
            let a = app.lock().map_err(|e| e.to_string())?;
            let results = a.catalog.filter_by_tag(tag);
            a.tracker.track_filter("tag", tag);
            to_json(&results)
        }
        "demo.tags" => {
            let a = app.lock().map_err(|e| e.to_string())?;
            to_json(&a.catalog.all_tags())
        }
        "demo.add" => {
            let new_demo: NewDemo = from_params(params)?;
            let mut a = app.lock().map_err(|e| e.to_string())?;
            let demo = a.catalog.add_demo(&new_demo).map_err(|e| e.to_string())?;
            to_json(&demo)
        }
        "demo.update" => {
            let id = str_param(params, "id")?;
            let update: DemoUpdate = from_params(params.get("update").unwrap_or(&json!({})))?;
            let mut a = app.lock().map_err(|e| e.to_string())?;
            let demo = a.catalog.update_demo(id, &update).map_err(|e| e.to_string())?;
            to_json(&demo)
        }
        "demo.delete" => {
            let id = str_param(params, "id")?;
            let mut a = app.lock().map_err(|e| e.to_string())?;
            a.catalog.delete_demo(id).map_err(|e| e.to_string())?;
            Ok(json!({"ok": true}))
        }
        "demo.toggle_featured" => {
            let id = str_param(params, "id")?;
            let mut a = app.lock().map_err(|e| e.to_string())?;
            let featured = a.catalog.toggle_featured(id).map_err(|e| e.to_string())?;
            Ok(json!({"is_featured": featured}))
        }
        "demo.view" => {
            let id = str_param(params, "id")?;
            let mut a = app.lock().map_err(|e| e.to_string())?;
            let views = a.view_demo(id).map_err(|e| e.to_string())?;
            Ok(json!({"page_views": views}))
        }
        "demo.upload_screenshot" => {
            let id = str_param(params, "id")?;
            let key = str_param(params, "key")?;
            let bytes = base64_decode(str_param(params, "data")?)?;
            let mut a = app.lock().map_err(|e| e.to_string())?;
            let demo = a.catalog.attach_screenshot(id, key, &bytes).map_err(|e| e.to_string())?;
            to_json(&demo)
        }

        // ─── Favorites ───
        "favorites.load" => {
            let mut a = app.lock().map_err(|e| e.to_string())?;
            let favorites = a.favorites_mut().map_err(|e| e.to_string())?;
            let user_id = favorites.user_id().to_string();
            favorites.load_favorites_and_folders(&user_id).map_err(|e| e.to_string())?;
            Ok(json!({"count": favorites.favorites().len()}))
        }
        "favorites.list" => {
            let mut a = app.lock().map_err(|e| e.to_string())?;
            let favorites = a.favorites_mut().map_err(|e| e.to_string())?;
            to_json(&favorites.favorites())
        }
        "favorites.toggle" => {
            let demo_id = str_param(params, "demo_id")?;
            let mut a = app.lock().map_err(|e| e.to_string())?;
            let favorited = a.toggle_favorite(demo_id).map_err(|e| e.to_string())?;
            Ok(json!({"favorited": favorited}))
        }
        "favorites.is_favorited" => {
            let demo_id = str_param(params, "demo_id")?;
            let mut a = app.lock().map_err(|e| e.to_string())?;
            let favorites = a.favorites_mut().map_err(|e| e.to_string())?;
            Ok(json!({"favorited": favorites.is_favorited(demo_id)}))
        }
        "favorites.move" => {
            let demo_id = str_param(params, "demo_id")?;
            let folder_id = opt_str_param(params, "folder_id");
            let mut a = app.lock().map_err(|e| e.to_string())?;
            let favorites = a.favorites_mut().map_err(|e| e.to_string())?;
            favorites.move_to_folder(demo_id, folder_id).map_err(|e| e.to_string())?;
            Ok(json!({"ok": true}))
        }

        // ─── Folders ───
        "folder.list" => {
            let mut a = app.lock().map_err(|e| e.to_string())?;
            let favorites = a.favorites_mut().map_err(|e| e.to_string())?;
            Ok(json!({
                "folders": to_json(&favorites.folders())?,
                "global_folders": to_json(&favorites.global_folders())?,
            }))
        }
        "folder.create" => {
            let folder: NewFolder = from_params(params)?;
            let global = params.get("global").and_then(|v| v.as_bool()).unwrap_or(false);
            let mut a = app.lock().map_err(|e| e.to_string())?;
            let favorites = a.favorites_mut().map_err(|e| e.to_string())?;
            let created = if global {
                favorites.create_global_folder(&folder)
            } else {
                favorites.create_folder(&folder)
            }
            .map_err(|e| e.to_string())?;
            to_json(&created)
        }
        "folder.update" => {
            let id = str_param(params, "id")?;
            let update: FolderUpdate = from_params(params.get("update").unwrap_or(&json!({})))?;
            let mut a = app.lock().map_err(|e| e.to_string())?;
            let favorites = a.favorites_mut().map_err(|e| e.to_string())?;
            let folder = favorites.update_folder(id, &update).map_err(|e| e.to_string())?;
            to_json(&folder)
        }
        "folder.delete" => {
            let id = str_param(params, "id")?;
            let mut a = app.lock().map_err(|e| e.to_string())?;
            let favorites = a.favorites_mut().map_err(|e| e.to_string())?;
            favorites.delete_folder(id).map_err(|e| e.to_string())?;
            Ok(json!({"ok": true}))
        }
        "folder.reorder" => {
            let ids: Vec<String> = from_params(params.get("ids").unwrap_or(&json!([])))?;
            let mut a = app.lock().map_err(|e| e.to_string())?;
            let favorites = a.favorites_mut().map_err(|e| e.to_string())?;
            favorites.reorder_folders(&ids).map_err(|e| e.to_string())?;
            Ok(json!({"ok": true}))
        }

        // ─── Analytics ───
        "analytics.dashboard" => {
            let a = app.lock().map_err(|e| e.to_string())?;
            to_json(&a.dashboard())
        }
        "analytics.metrics" => {
            let demos = published_demos(app)?;
            to_json(&analytics_engine::dashboard_metrics(&demos, Utc::now()))
        }
        "analytics.top_demos" => {
            let limit = limit_param(params, 5);
            let demos = published_demos(app)?;
            let top = analytics_engine::top_demos(&demos, limit);
            to_json(&top)
        }
        "analytics.recent_demos" => {
            let limit = limit_param(params, 5);
            let demos = published_demos(app)?;
            let recent = analytics_engine::recent_demos(&demos, limit);
            to_json(&recent)
        }

        // ─── Tracking ───
        "track.try_app" => {
            let demo_id = str_param(params, "demo_id")?;
            let url = str_param(params, "url")?;
            let a = app.lock().map_err(|e| e.to_string())?;
            a.tracker.track_try_app(demo_id, url);
            Ok(json!({"ok": true}))
        }
        "track.tab_change" => {
            let from = str_param(params, "from")?;
            let to = str_param(params, "to")?;
            let a = app.lock().map_err(|e| e.to_string())?;
            a.tracker.track_tab_change(from, to);
            Ok(json!({"ok": true}))
        }
        "track.page_focus" => {
            let a = app.lock().map_err(|e| e.to_string())?;
            a.tracker.track_page_focus();
            Ok(json!({"ok": true}))
        }
        "track.page_blur" => {
            let a = app.lock().map_err(|e| e.to_string())?;
            a.tracker.track_page_blur();
            Ok(json!({"ok": true}))
        }
        "track.click" => {
            let target = str_param(params, "target")?;
            let context = params.get("context").cloned().unwrap_or_else(|| json!({}));
            let a = app.lock().map_err(|e| e.to_string())?;
            a.tracker.track_click(target, context);
            Ok(json!({"ok": true}))
        }

        _ => Err(format!("unknown method: {}", method)),
    }
}
