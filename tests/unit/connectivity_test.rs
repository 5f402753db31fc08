//! Unit tests for startup backend verification.

use std::sync::Arc;
use std::time::Duration;

use concept_tracker::services::backend_gateway::BackendStatus;
use concept_tracker::services::connectivity::{verify_backend, verify_with};
use concept_tracker::services::sqlite_gateway::{GatewayOptions, SqliteGateway};
use concept_tracker::types::config::BackendUrl;
use concept_tracker::types::errors::{ConnectivityError, GatewayError};

fn status() -> BackendStatus {
    BackendStatus {
        schema_version: 2,
        demo_count: 0,
    }
}

#[tokio::test]
async fn test_healthy_backend_is_verified() {
    let dir = tempfile::tempdir().unwrap();
    let gw = SqliteGateway::open(
        &BackendUrl::Memory,
        GatewayOptions {
            api_key: "test-key".to_string(),
            storage_dir: dir.path().to_path_buf(),
            password_iterations: 1_000,
        },
    )
    .unwrap();

    let report = verify_backend(Arc::new(gw), Duration::from_secs(5)).await.unwrap();
    assert_eq!(report.status.demo_count, 0);
    assert!(report.status.schema_version >= 2);
}

#[tokio::test]
async fn test_slow_probe_times_out() {
    let result = verify_with(
        || {
            std::thread::sleep(Duration::from_millis(1500));
            Ok(status())
        },
        Duration::from_millis(100),
    )
    .await;

    assert!(matches!(result, Err(ConnectivityError::Timeout(_))));
}

#[tokio::test]
async fn test_backend_error_is_reported() {
    let result = verify_with(
        || Err(GatewayError::Unauthorized("API key rejected".to_string())),
        Duration::from_secs(1),
    )
    .await;

    match result {
        Err(ConnectivityError::Backend(GatewayError::Unauthorized(msg))) => {
            assert_eq!(msg, "API key rejected")
        }
        other => panic!("unexpected result: {:?}", other),
    }
}

#[tokio::test]
async fn test_panicking_probe_is_a_task_error() {
    let result = verify_with(|| panic!("probe exploded"), Duration::from_secs(1)).await;
    assert!(matches!(result, Err(ConnectivityError::Task(_))));
}
