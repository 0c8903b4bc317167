//! SSDP discovery announcer.
//!
//! Multicasts `NOTIFY * HTTP/1.1` with `NTS: ssdp:alive` every
//! `discovery.announce_interval`, and one `ssdp:byebye` when stopped. Send
//! failures are logged and retried on the next tick; only a socket that
//! cannot be bound ends the worker.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;
use vtuner_core::{CoreContext, Result, Service, Settings, TunerError};

/// Name the discovery worker reports.
pub const NAME: &str = "discovery";

/// SSDP multicast group and port.
pub const SSDP_MULTICAST: SocketAddr =
    SocketAddr::new(IpAddr::V4(Ipv4Addr::new(239, 255, 255, 250)), 1900);

/// Device type announced.
pub const DEVICE_TYPE: &str = "urn:schemas-upnp-org:device:MediaServer:1";

/// `NTS` value of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notify {
    /// The device is available.
    Alive,
    /// The device is going away.
    ByeBye,
}

impl Notify {
    /// Returns the `NTS` header value.
    #[must_use]
    pub const fn nts(self) -> &'static str {
        match self {
            Self::Alive => "ssdp:alive",
            Self::ByeBye => "ssdp:byebye",
        }
    }
}

/// What a notification says about the device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    /// Unique service name, `uuid:<id>::<device type>`.
    pub usn: String,
    /// URL of the device descriptor.
    pub location: String,
    /// Seconds a client may cache the announcement.
    pub max_age: u64,
}

impl Announcement {
    /// Derives the announcement from settings.
    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        let host = settings
            .discovery
            .address
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty() && *a != "0.0.0.0")
            .unwrap_or(settings.http.address.as_str());
        Self {
            usn: format!("uuid:{}::{DEVICE_TYPE}", settings.device.device_id),
            location: format!("http://{host}:{}/discover.json", settings.http.port),
            max_age: settings
                .discovery
                .announce_interval
                .as_secs()
                .saturating_mul(3)
                .max(60),
        }
    }

    /// Renders the datagram for `kind`.
    #[must_use]
    pub fn render(&self, kind: Notify) -> String {
        let mut msg = String::from("NOTIFY * HTTP/1.1\r\n");
        msg.push_str(&format!("HOST: {SSDP_MULTICAST}\r\n"));
        if kind == Notify::Alive {
            msg.push_str(&format!("CACHE-CONTROL: max-age={}\r\n", self.max_age));
            msg.push_str(&format!("LOCATION: {}\r\n", self.location));
            msg.push_str(&format!(
                "SERVER: vtuner/{} UPnP/1.0\r\n",
                env!("CARGO_PKG_VERSION")
            ));
        }
        msg.push_str(&format!("NT: {DEVICE_TYPE}\r\n"));
        msg.push_str(&format!("NTS: {}\r\n", kind.nts()));
        msg.push_str(&format!("USN: {}\r\n", self.usn));
        msg.push_str("\r\n");
        msg
    }
}

/// Periodic SSDP announcer.
#[derive(Debug, Clone)]
pub struct SsdpService {
    target: SocketAddr,
}

impl Default for SsdpService {
    fn default() -> Self {
        Self {
            target: SSDP_MULTICAST,
        }
    }
}

impl SsdpService {
    /// Creates an announcer sending to the SSDP multicast group.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sends announcements to `target` instead of the multicast group.
    #[must_use]
    pub const fn with_target(mut self, target: SocketAddr) -> Self {
        self.target = target;
        self
    }

    async fn send(&self, socket: &UdpSocket, payload: &str) {
        if let Err(e) = socket.send_to(payload.as_bytes(), self.target).await {
            tracing::warn!(target_addr = %self.target, error = %e, "SSDP send failed");
        }
    }
}

#[async_trait]
impl Service for SsdpService {
    fn name(&self) -> &str {
        NAME
    }

    async fn serve(&self, ctx: Arc<CoreContext>, shutdown: CancellationToken) -> Result<()> {
        let settings = ctx.settings();
        let address = settings
            .discovery
            .address
            .as_deref()
            .map(str::trim)
            .unwrap_or_default();
        let socket = UdpSocket::bind((address, 0))
            .await
            .map_err(|e| TunerError::worker(NAME, format!("failed to bind {address}: {e}")))?;
        if let Err(e) = socket.set_multicast_ttl_v4(2) {
            tracing::debug!(error = %e, "could not set multicast TTL");
        }

        let announcement = Announcement::from_settings(settings);
        let interval = settings.discovery.announce_interval;
        tracing::info!(
            cycle = %ctx.id(),
            location = %announcement.location,
            interval = ?interval,
            "SSDP announcer running"
        );

        let alive = announcement.render(Notify::Alive);
        loop {
            self.send(&socket, &alive).await;
            tokio::select! {
                () = shutdown.cancelled() => break,
                () = tokio::time::sleep(interval) => {}
            }
        }

        self.send(&socket, &announcement.render(Notify::ByeBye)).await;
        tracing::info!(cycle = %ctx.id(), "SSDP announcer stopped");
        Ok(())
    }
}
