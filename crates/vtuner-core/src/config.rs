//! Tuner settings.
//!
//! Per Iron Lotus Framework: Configuration is validated at load time (Poka-Yoke),
//! with sensible defaults and clear error messages.
//!
//! Settings are immutable once loaded. A restart reloads the file and builds
//! a new value; nothing mutates the old one.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

/// Complete tuner settings, loaded once per supervision cycle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Emulated device identity.
    #[serde(default)]
    pub device: DeviceConfig,

    /// HTTP API server.
    #[serde(default)]
    pub http: HttpConfig,

    /// SSDP discovery announcer.
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    /// EPG refresher.
    #[serde(default)]
    pub epg: EpgConfig,

    /// Log filtering.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Persistent store.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Plugin discovery.
    #[serde(default)]
    pub plugins: PluginsConfig,

    /// Supervision loop tuning.
    #[serde(default)]
    pub supervisor: SupervisorConfig,

    /// File these settings were read from, if any.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

impl Settings {
    /// Loads settings from a TOML file.
    ///
    /// # Errors
    /// Returns [`ConfigError::NotFound`] if `path` is not an existing file and
    /// [`ConfigError::Invalid`] if it cannot be read, parsed, or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(ConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::invalid(path, format!("failed to read config: {e}")))?;
        let mut settings = Self::parse(&content, path)?;
        settings.source = Some(path.to_path_buf());
        Ok(settings)
    }

    /// Parses settings from TOML text that did not come from a file.
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] on parse or validation failure.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Self::parse(content, Path::new("<inline>"))
    }

    fn parse(content: &str, origin: &Path) -> Result<Self, ConfigError> {
        let settings: Self = toml::from_str(content)
            .map_err(|e| ConfigError::invalid(origin, format!("failed to parse config: {e}")))?;
        settings
            .validate()
            .map_err(|reason| ConfigError::invalid(origin, reason))?;
        Ok(settings)
    }

    /// Validates cross-field constraints that serde cannot express.
    ///
    /// # Errors
    /// Returns the reason the settings are unusable.
    pub fn validate(&self) -> Result<(), String> {
        if self.device.friendly_name.trim().is_empty() {
            return Err("device.friendly_name cannot be empty".to_string());
        }
        if self.device.tuner_count == 0 {
            return Err("device.tuner_count must be at least 1".to_string());
        }
        if self.http.address.trim().is_empty() {
            return Err("http.address cannot be empty".to_string());
        }
        if self.supervisor.poll_interval.is_zero() {
            return Err("supervisor.poll_interval must be positive".to_string());
        }
        if self.supervisor.readiness_attempts == 0 {
            return Err("supervisor.readiness_attempts must be at least 1".to_string());
        }
        if self.epg_enabled() && self.epg.update_frequency.is_zero() {
            return Err("epg.update_frequency must be positive".to_string());
        }
        if self.discovery_enabled() && self.discovery.announce_interval.is_zero() {
            return Err("discovery.announce_interval must be positive".to_string());
        }
        tracing_subscriber::EnvFilter::try_new(&self.logging.level)
            .map_err(|e| format!("logging.level is not a valid filter: {e}"))?;
        Ok(())
    }

    /// Returns true if the discovery announcer should run this cycle.
    #[must_use]
    pub fn discovery_enabled(&self) -> bool {
        truthy(self.discovery.address.as_deref())
    }

    /// Returns true if the EPG refresher should run this cycle.
    #[must_use]
    pub fn epg_enabled(&self) -> bool {
        truthy(self.epg.method.as_deref())
    }
}

fn truthy(value: Option<&str>) -> bool {
    value.is_some_and(|v| !v.trim().is_empty())
}

/// Emulated device identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Name advertised to clients.
    #[serde(default = "default_friendly_name")]
    pub friendly_name: String,

    /// Eight hex digit device id advertised to clients.
    #[serde(default = "default_device_id")]
    pub device_id: String,

    /// Number of virtual tuners.
    #[serde(default = "default_tuner_count")]
    pub tuner_count: u32,
}

fn default_friendly_name() -> String {
    "vtuner".to_string()
}

fn default_device_id() -> String {
    "12345678".to_string()
}

fn default_tuner_count() -> u32 {
    4
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            friendly_name: default_friendly_name(),
            device_id: default_device_id(),
            tuner_count: default_tuner_count(),
        }
    }
}

/// HTTP API server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Listen address.
    #[serde(default = "default_http_address")]
    pub address: String,

    /// Listen port (0 picks an ephemeral port).
    #[serde(default = "default_http_port")]
    pub port: u16,
}

fn default_http_address() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    5004
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            address: default_http_address(),
            port: default_http_port(),
        }
    }
}

/// SSDP discovery configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Address to announce from. Absent or empty disables discovery.
    #[serde(default)]
    pub address: Option<String>,

    /// Interval between `ssdp:alive` announcements.
    #[serde(default = "default_announce_interval")]
    #[serde(with = "humantime_serde")]
    pub announce_interval: Duration,
}

fn default_announce_interval() -> Duration {
    Duration::from_secs(30)
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            address: None,
            announce_interval: default_announce_interval(),
        }
    }
}

/// EPG refresher configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpgConfig {
    /// EPG plugin name. Absent or empty disables the refresher.
    #[serde(default)]
    pub method: Option<String>,

    /// Interval between refreshes.
    #[serde(default = "default_update_frequency")]
    #[serde(with = "humantime_serde")]
    pub update_frequency: Duration,
}

fn default_update_frequency() -> Duration {
    Duration::from_secs(12 * 60 * 60)
}

impl Default for EpgConfig {
    fn default() -> Self {
        Self {
            method: None,
            update_frequency: default_update_frequency(),
        }
    }
}

/// Log filtering configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive, e.g. `info` or `vtuner_core=debug`.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Persistent store configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// JSON file backing the store. Absent keeps the store in memory.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Plugin discovery configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PluginsConfig {
    /// Directory scanned for `*/plugin.json` manifests.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

/// Supervision loop tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// Liveness polling cadence for the primary worker.
    #[serde(default = "default_poll_interval")]
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,

    /// Maximum readiness probes before the cycle is declared failed.
    #[serde(default = "default_readiness_attempts")]
    pub readiness_attempts: u32,

    /// Delay after the first failed readiness probe.
    #[serde(default = "default_readiness_initial_delay")]
    #[serde(with = "humantime_serde")]
    pub readiness_initial_delay: Duration,

    /// Upper bound on the delay between readiness probes.
    #[serde(default = "default_readiness_max_delay")]
    #[serde(with = "humantime_serde")]
    pub readiness_max_delay: Duration,

    /// Time each worker gets to stop during teardown.
    #[serde(default = "default_shutdown_timeout")]
    #[serde(with = "humantime_serde")]
    pub shutdown_timeout: Duration,
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_readiness_attempts() -> u32 {
    10
}

fn default_readiness_initial_delay() -> Duration {
    Duration::from_millis(100)
}

fn default_readiness_max_delay() -> Duration {
    Duration::from_secs(2)
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(10)
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            readiness_attempts: default_readiness_attempts(),
            readiness_initial_delay: default_readiness_initial_delay(),
            readiness_max_delay: default_readiness_max_delay(),
            shutdown_timeout: default_shutdown_timeout(),
        }
    }
}

/// Serde helper for humantime durations.
mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.device.friendly_name, "vtuner");
        assert_eq!(settings.device.tuner_count, 4);
        assert_eq!(settings.http.address, "0.0.0.0");
        assert_eq!(settings.http.port, 5004);
        assert_eq!(settings.supervisor.poll_interval, Duration::from_secs(1));
        assert_eq!(settings.supervisor.readiness_attempts, 10);
        assert!(settings.database.path.is_none());
        assert!(settings.source.is_none());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_empty_document_is_valid() {
        let settings = Settings::from_toml_str("").unwrap();
        assert!(!settings.discovery_enabled());
        assert!(!settings.epg_enabled());
    }

    #[test]
    fn test_feature_gates() {
        let settings = Settings::from_toml_str(
            r#"
            [discovery]
            address = "192.168.1.10"

            [epg]
            method = "blocks"
            update_frequency = "30m"
            "#,
        )
        .unwrap();
        assert!(settings.discovery_enabled());
        assert!(settings.epg_enabled());
        assert_eq!(settings.epg.update_frequency, Duration::from_secs(1800));
    }

    #[test]
    fn test_empty_strings_disable_workers() {
        let settings = Settings::from_toml_str(
            r#"
            [discovery]
            address = ""

            [epg]
            method = "  "
            "#,
        )
        .unwrap();
        assert!(!settings.discovery_enabled());
        assert!(!settings.epg_enabled());
    }

    #[test]
    fn test_humantime_durations() {
        let settings = Settings::from_toml_str(
            r#"
            [supervisor]
            poll_interval = "250ms"
            shutdown_timeout = "1m"
            "#,
        )
        .unwrap();
        assert_eq!(settings.supervisor.poll_interval, Duration::from_millis(250));
        assert_eq!(settings.supervisor.shutdown_timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_parse_error_is_invalid() {
        let err = Settings::from_toml_str("[http\nport = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_unknown_section_is_invalid() {
        let err = Settings::from_toml_str("[nonsense]\nx = 1").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_validation_failures() {
        for doc in [
            "[device]\nfriendly_name = \"\"",
            "[device]\ntuner_count = 0",
            "[http]\naddress = \" \"",
            "[supervisor]\npoll_interval = \"0s\"",
            "[supervisor]\nreadiness_attempts = 0",
            "[logging]\nlevel = \"vtuner=loud\"",
        ] {
            let err = Settings::from_toml_str(doc).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid { .. }), "{doc}");
        }
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.toml");
        let err = Settings::load(&path).unwrap_err();
        assert_eq!(err, ConfigError::NotFound { path });
    }

    #[test]
    fn test_load_directory_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = Settings::load(dir.path()).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_load_records_source() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[http]\nport = 5005").unwrap();
        let settings = Settings::load(file.path()).unwrap();
        assert_eq!(settings.http.port, 5005);
        assert_eq!(settings.source.as_deref(), Some(file.path()));
    }

    #[test]
    fn test_serialize_roundtrip() {
        let settings = Settings::default();
        let text = toml::to_string(&settings).unwrap();
        let parsed = Settings::from_toml_str(&text).unwrap();
        assert_eq!(parsed.supervisor.poll_interval, settings.supervisor.poll_interval);
        assert_eq!(parsed.device.device_id, settings.device.device_id);
    }
}
