//! HTTP API server, the primary worker.
//!
//! The server is the liveness oracle of the whole process: when it stops,
//! the supervisor restarts everything. `POST /api/restart` relies on that and
//! simply shuts the server down.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::{Arc, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use vtuner_core::{CoreContext, PluginKind, Result, Service, TunerError};

/// Name the HTTP worker reports.
pub const NAME: &str = "http";

/// Store key counting startup task runs.
pub const STARTUP_RUNS: &str = "startup.runs";
/// Store key holding the last startup run as unix seconds.
pub const STARTUP_LAST_RUN: &str = "startup.last_run";
/// Store key holding the number of channel origins known.
pub const LINEUP_ORIGINS: &str = "lineup.origins";

/// The tuner's HTTP API.
#[derive(Debug, Default)]
pub struct HttpService {
    bound: OnceLock<SocketAddr>,
}

impl HttpService {
    /// Creates a server that binds on `serve`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Service for HttpService {
    fn name(&self) -> &str {
        NAME
    }

    async fn serve(&self, ctx: Arc<CoreContext>, shutdown: CancellationToken) -> Result<()> {
        let http = &ctx.settings().http;
        let addr = format!("{}:{}", http.address, http.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| TunerError::worker(NAME, format!("failed to bind {addr}: {e}")))?;
        let local = listener.local_addr()?;
        let _ = self.bound.set(local);
        tracing::info!(cycle = %ctx.id(), addr = %local, "HTTP API listening");

        let app = router(ApiState {
            base_url: format!("http://{}", reachable(local)),
            ctx: Arc::clone(&ctx),
            restart: shutdown.clone(),
        });

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown.cancelled_owned())
            .await
            .map_err(|e| TunerError::worker(NAME, e.to_string()))?;

        tracing::info!(cycle = %ctx.id(), "HTTP API stopped");
        Ok(())
    }

    async fn ready(&self) -> bool {
        match self.endpoint() {
            Some(addr) => match TcpStream::connect(addr).await {
                Ok(_) => true,
                Err(e) => {
                    tracing::debug!(addr = %addr, error = %e, "HTTP readiness probe failed");
                    false
                }
            },
            None => false,
        }
    }

    fn endpoint(&self) -> Option<SocketAddr> {
        self.bound.get().copied().map(reachable)
    }
}

/// Maps a wildcard bind address to the loopback address of the same family.
fn reachable(addr: SocketAddr) -> SocketAddr {
    match addr.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => {
            SocketAddr::new(Ipv4Addr::LOCALHOST.into(), addr.port())
        }
        IpAddr::V6(ip) if ip.is_unspecified() => {
            SocketAddr::new(Ipv6Addr::LOCALHOST.into(), addr.port())
        }
        _ => addr,
    }
}

#[derive(Clone)]
struct ApiState {
    ctx: Arc<CoreContext>,
    base_url: String,
    restart: CancellationToken,
}

fn router(state: ApiState) -> Router {
    Router::new()
        .route("/discover.json", get(discover))
        .route("/api/health", get(health))
        .route("/api/startup_tasks", get(startup_tasks))
        .route("/api/restart", post(restart))
        .with_state(state)
}

/// Device descriptor served at `/discover.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Discover {
    /// Display name.
    pub friendly_name: String,
    /// Emulated device id.
    #[serde(rename = "DeviceID")]
    pub device_id: String,
    /// Number of tuners offered.
    pub tuner_count: u32,
    /// Firmware name.
    pub firmware_name: String,
    /// Firmware version.
    pub firmware_version: String,
    /// Base URL of this API.
    #[serde(rename = "BaseURL")]
    pub base_url: String,
    /// Channel lineup URL.
    #[serde(rename = "LineupURL")]
    pub lineup_url: String,
}

async fn discover(State(state): State<ApiState>) -> Json<Discover> {
    let device = &state.ctx.settings().device;
    Json(Discover {
        friendly_name: device.friendly_name.clone(),
        device_id: device.device_id.clone(),
        tuner_count: device.tuner_count,
        firmware_name: "vtuner".to_string(),
        firmware_version: env!("CARGO_PKG_VERSION").to_string(),
        lineup_url: format!("{}/lineup.json", state.base_url),
        base_url: state.base_url.clone(),
    })
}

/// Body of `/api/health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Health {
    /// Always `"up"` while the server answers.
    pub status: String,
    /// Cycle this server belongs to.
    pub cycle: String,
    /// Startup task runs recorded in the store.
    pub startup_runs: u64,
}

async fn health(State(state): State<ApiState>) -> Json<Health> {
    let startup_runs = state
        .ctx
        .store()
        .get::<u64>(STARTUP_RUNS)
        .ok()
        .flatten()
        .unwrap_or(0);
    Json(Health {
        status: "up".to_string(),
        cycle: state.ctx.id().to_string(),
        startup_runs,
    })
}

/// Body of `/api/startup_tasks`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartupReport {
    /// How many times startup tasks ran in this cycle's store.
    pub runs: u64,
    /// Number of channel origins found in the plugin registry.
    pub origins: usize,
}

async fn startup_tasks(State(state): State<ApiState>) -> impl IntoResponse {
    let ctx = &state.ctx;
    let store = ctx.store();
    let runs = store.increment(STARTUP_RUNS);
    let origins = ctx.plugins().of_kind(PluginKind::Origin).count();

    let recorded = store
        .set(STARTUP_LAST_RUN, &unix_now())
        .and_then(|()| store.set(LINEUP_ORIGINS, &origins));
    if let Err(e) = recorded {
        tracing::error!(cycle = %ctx.id(), error = %e, "failed to record startup tasks");
        return (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response();
    }

    tracing::info!(cycle = %ctx.id(), runs, origins, "startup tasks complete");
    Json(StartupReport { runs, origins }).into_response()
}

async fn restart(State(state): State<ApiState>) -> impl IntoResponse {
    tracing::info!(cycle = %state.ctx.id(), "restart requested over HTTP");
    state.restart.cancel();
    (
        StatusCode::ACCEPTED,
        Json(serde_json::json!({ "status": "restarting" })),
    )
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}
