//! Startup verification of the backend.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::services::backend_gateway::{BackendGateway, BackendStatus};
use crate::types::errors::{ConnectivityError, GatewayError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectivityReport {
    pub status: BackendStatus,
    pub latency_ms: u128,
}

/// Runs the gateway health check, giving up after `timeout`.
pub async fn verify_backend(
    gateway: Arc<dyn BackendGateway>,
    timeout: Duration,
) -> Result<ConnectivityReport, ConnectivityError> {
    verify_with(move || gateway.health_check(), timeout).await
}

/// Runs a blocking probe off the async runtime under a timeout.
///
/// A probe still running at the deadline is abandoned, not cancelled.
pub async fn verify_with<F>(probe: F, timeout: Duration) -> Result<ConnectivityReport, ConnectivityError>
where
    F: FnOnce() -> Result<BackendStatus, GatewayError> + Send + 'static,
{
    let started = Instant::now();
    let task = tokio::task::spawn_blocking(probe);

    let status = match tokio::time::timeout(timeout, task).await {
        Err(_) => {
            warn!(timeout_ms = timeout.as_millis() as u64, "backend verification timed out");
            return Err(ConnectivityError::Timeout(timeout.as_secs()));
        }
        Ok(Err(join)) => return Err(ConnectivityError::Task(join.to_string())),
        Ok(Ok(result)) => result?,
    };

    let report = ConnectivityReport {
        status,
        latency_ms: started.elapsed().as_millis(),
    };
    info!(
        schema_version = report.status.schema_version,
        demos = report.status.demo_count,
        latency_ms = report.latency_ms as u64,
        "backend verified"
    );
    Ok(report)
}
