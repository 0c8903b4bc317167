//! Deferred startup work.
//!
//! Startup tasks run inside the HTTP server so they see the same context as
//! every request handler. The supervisor triggers them by calling its own
//! API once the server is ready.

use std::net::SocketAddr;
use std::time::Duration;

use vtuner_core::{Result, TunerError};

use crate::http::StartupReport;

/// Path of the startup task endpoint.
pub const PATH: &str = "/api/startup_tasks";

/// Upper bound on the startup request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Asks the server at `endpoint` to run its startup tasks.
///
/// # Errors
/// Returns [`TunerError::Startup`] if there is no endpoint, the request
/// fails or times out, or the server answers with an error status.
pub async fn trigger(endpoint: Option<SocketAddr>, timeout: Duration) -> Result<StartupReport> {
    let endpoint =
        endpoint.ok_or_else(|| TunerError::startup("HTTP server has no bound endpoint"))?;
    let url = format!("http://{endpoint}{PATH}");

    let client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| TunerError::startup(format!("failed to build HTTP client: {e}")))?;

    let response = client
        .get(&url)
        .send()
        .await
        .map_err(|e| TunerError::startup(format!("GET {url} failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(TunerError::startup(format!("GET {url} returned {status}")));
    }

    let report = response
        .json::<StartupReport>()
        .await
        .map_err(|e| TunerError::startup(format!("bad startup report from {url}: {e}")))?;
    tracing::debug!(url = %url, runs = report.runs, "startup tasks triggered");
    Ok(report)
}
