//! Unit tests for DemoCatalog against a real SQLite backend.

use std::sync::Arc;

use concept_tracker::managers::demo_catalog::{DemoCatalog, DemoCatalogTrait};
use concept_tracker::services::backend_gateway::BackendGateway;
use concept_tracker::services::sqlite_gateway::{GatewayOptions, SqliteGateway};
use concept_tracker::types::config::BackendUrl;
use concept_tracker::types::demo::{DemoUpdate, NewDemo};
use concept_tracker::types::errors::{CatalogError, GatewayError};
use concept_tracker::types::mutation::MutationState;
use tempfile::TempDir;

fn open(url: &BackendUrl, dir: &TempDir) -> Arc<SqliteGateway> {
    let options = GatewayOptions {
        api_key: "test-key".to_string(),
        storage_dir: dir.path().to_path_buf(),
        password_iterations: 1_000,
    };
    let gw = SqliteGateway::open(url, options).unwrap();
    gw.sign_up("admin@example.com", "adminpw1", "Admin").unwrap();
    Arc::new(gw)
}

/// Catalog on a signed-in super-admin over an in-memory backend.
fn setup() -> (TempDir, Arc<SqliteGateway>, DemoCatalog) {
    let dir = tempfile::tempdir().unwrap();
    let gw = open(&BackendUrl::Memory, &dir);
    let catalog = DemoCatalog::new(gw.clone());
    (dir, gw, catalog)
}

fn demo(title: &str, tags: &[&str]) -> NewDemo {
    NewDemo {
        title: title.to_string(),
        description: format!("All about {}", title.to_lowercase()),
        tags: tags.iter().map(|t| t.to_string()).collect(),
        owner: "Priya".to_string(),
        ..NewDemo::default()
    }
}

#[test]
fn test_new_catalog_is_empty() {
    let (_dir, _gw, catalog) = setup();
    assert!(catalog.demos().is_empty());
    assert!(catalog.all_tags().is_empty());
}

#[test]
fn test_add_demo_prepends_to_local_list() {
    let (_dir, _gw, mut catalog) = setup();
    catalog.add_demo(&demo("First", &["ai"])).unwrap();
    let second = catalog.add_demo(&demo("Second", &["voice"])).unwrap();

    assert_eq!(catalog.demos().len(), 2);
    assert_eq!(catalog.demos()[0].id, second.id);
    assert_eq!(second.page_views, 0);
}

#[test]
fn test_load_replaces_local_state_with_backend_rows() {
    let (_dir, gw, mut catalog) = setup();
    gw.insert_demo(&demo("Seeded", &["ai"])).unwrap();
    gw.insert_demo(&demo("Seeded too", &["ml"])).unwrap();

    assert_eq!(catalog.load().unwrap(), 2);
    assert_eq!(catalog.demos().len(), 2);
}

#[test]
fn test_failed_load_keeps_previous_catalog() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("tracker.db");
    let gw = open(&BackendUrl::File(path.clone()), &dir);
    let mut catalog = DemoCatalog::new(gw.clone());
    catalog.add_demo(&demo("Survivor", &["ai"])).unwrap();

    let raw = rusqlite::Connection::open(&path).unwrap();
    raw.execute_batch("DROP TABLE demos;").unwrap();

    assert!(catalog.load().is_err());
    assert_eq!(catalog.demos().len(), 1);
    assert_eq!(catalog.demos()[0].title, "Survivor");
}

#[rstest::rstest]
#[case("", "Priya")]
#[case("   ", "Priya")]
#[case("Title", "")]
fn test_add_demo_requires_title_and_owner(#[case] title: &str, #[case] owner: &str) {
    let (_dir, gw, mut catalog) = setup();
    let payload = NewDemo {
        title: title.to_string(),
        owner: owner.to_string(),
        ..NewDemo::default()
    };

    assert!(matches!(catalog.add_demo(&payload), Err(CatalogError::Validation(_))));
    assert!(gw.list_demos().unwrap().is_empty());
}

#[test]
fn test_plain_user_cannot_add_demos() {
    let (_dir, gw, _catalog) = setup();
    let user = gw.client();
    user.sign_up("viewer@example.com", "viewerpw", "Viewer").unwrap();
    let mut catalog = DemoCatalog::new(Arc::new(user));

    let err = catalog.add_demo(&demo("Sneaky", &[])).unwrap_err();
    assert!(err.is_forbidden());
    assert!(catalog.demos().is_empty());
}

#[test]
fn test_update_demo_replaces_local_copy() {
    let (_dir, _gw, mut catalog) = setup();
    let created = catalog.add_demo(&demo("Draft name", &["ai"])).unwrap();

    let update = DemoUpdate {
        title: Some("Final name".to_string()),
        tags: Some(vec!["ai".to_string(), "rag".to_string()]),
        ..DemoUpdate::default()
    };
    catalog.update_demo(&created.id, &update).unwrap();

    let local = catalog.get(&created.id).unwrap();
    assert_eq!(local.title, "Final name");
    assert_eq!(local.tags, vec!["ai".to_string(), "rag".to_string()]);
}

#[test]
fn test_update_with_blank_title_is_rejected_locally() {
    let (_dir, _gw, mut catalog) = setup();
    let created = catalog.add_demo(&demo("Keep me", &[])).unwrap();
    let update = DemoUpdate {
        title: Some(" ".to_string()),
        ..DemoUpdate::default()
    };

    assert!(matches!(
        catalog.update_demo(&created.id, &update),
        Err(CatalogError::Validation(_))
    ));
    assert_eq!(catalog.get(&created.id).unwrap().title, "Keep me");
}

#[test]
fn test_toggle_featured_flips_flag() {
    let (_dir, gw, mut catalog) = setup();
    let created = catalog.add_demo(&demo("Star", &[])).unwrap();

    assert!(catalog.toggle_featured(&created.id).unwrap());
    assert!(gw.get_demo(&created.id).unwrap().is_featured);
    assert!(!catalog.toggle_featured(&created.id).unwrap());
    assert!(matches!(catalog.toggle_featured("missing"), Err(CatalogError::NotFound(_))));
}

#[test]
fn test_delete_demo_removes_it_everywhere() {
    let (_dir, gw, mut catalog) = setup();
    let created = catalog.add_demo(&demo("Gone soon", &[])).unwrap();

    catalog.delete_demo(&created.id).unwrap();
    assert!(catalog.get(&created.id).is_none());
    assert!(matches!(gw.get_demo(&created.id), Err(GatewayError::NotFound(_))));
}

#[test]
fn test_delete_demo_removes_its_screenshot() {
    let (dir, _gw, mut catalog) = setup();
    let created = catalog.add_demo(&demo("Pictured", &[])).unwrap();
    catalog
        .attach_screenshot(&created.id, "pictured.png", b"\x89PNG")
        .unwrap();
    let object = dir.path().join("screenshots").join("pictured.png");
    assert!(object.exists());

    catalog.delete_demo(&created.id).unwrap();
    assert!(!object.exists());
}

#[test]
fn test_attach_screenshot_sets_public_url() {
    let (_dir, _gw, mut catalog) = setup();
    let created = catalog.add_demo(&demo("Shot", &[])).unwrap();

    let updated = catalog
        .attach_screenshot(&created.id, "shot.png", b"bytes")
        .unwrap();
    assert_eq!(
        updated.links.screenshot_url.as_deref(),
        Some("storage://screenshots/shot.png")
    );
}

#[test]
fn test_attach_screenshot_to_missing_demo_cleans_up() {
    let (dir, _gw, mut catalog) = setup();

    assert!(catalog.attach_screenshot("missing", "orphan.png", b"bytes").is_err());
    assert!(!dir.path().join("screenshots").join("orphan.png").exists());
}

#[test]
fn test_increment_views_confirms_with_backend_count() {
    let (_dir, gw, mut catalog) = setup();
    let created = catalog.add_demo(&demo("Popular", &[])).unwrap();
    // Another client bumps the counter behind the catalog's back.
    gw.increment_page_views(&created.id).unwrap();

    let count = catalog.increment_views(&created.id).unwrap();
    assert_eq!(count, 2);
    assert_eq!(catalog.get(&created.id).unwrap().page_views, 2);
    assert_eq!(
        catalog.mutation_state(&DemoCatalog::views_key(&created.id)),
        Some(&MutationState::Confirmed)
    );
}

#[test]
fn test_increment_views_reverts_on_failure() {
    let (_dir, gw, mut catalog) = setup();
    let created = catalog.add_demo(&demo("Fragile", &[])).unwrap();
    catalog.increment_views(&created.id).unwrap();
    gw.delete_demo(&created.id).unwrap();

    let err = catalog.increment_views(&created.id).unwrap_err();
    assert!(matches!(err, CatalogError::Gateway(GatewayError::NotFound(_))));
    assert_eq!(catalog.get(&created.id).unwrap().page_views, 1);
    assert!(catalog
        .mutation_state(&DemoCatalog::views_key(&created.id))
        .unwrap()
        .is_failed());
}

#[test]
fn test_search_matches_title_description_owner_and_tags() {
    let (_dir, _gw, mut catalog) = setup();
    catalog.add_demo(&demo("Voice Agent", &["speech"])).unwrap();
    catalog.add_demo(&demo("Doc Parser", &["rag"])).unwrap();

    assert_eq!(catalog.search("voice").len(), 1);
    assert_eq!(catalog.search("PARSER").len(), 1);
    assert_eq!(catalog.search("all about").len(), 2);
    assert_eq!(catalog.search("priya").len(), 2);
    assert_eq!(catalog.search("rag")[0].title, "Doc Parser");
    assert_eq!(catalog.search("  ").len(), 2);
    assert!(catalog.search("nothing like this").is_empty());
}

#[test]
fn test_tag_filter_and_tag_listing() {
    let (_dir, _gw, mut catalog) = setup();
    catalog.add_demo(&demo("A", &["ai", "voice"])).unwrap();
    catalog.add_demo(&demo("B", &["ai"])).unwrap();

    assert_eq!(catalog.filter_by_tag("AI").len(), 2);
    assert_eq!(catalog.filter_by_tag("voice").len(), 1);
    assert_eq!(catalog.all_tags(), vec!["ai".to_string(), "voice".to_string()]);
}
