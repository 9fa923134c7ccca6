//! Daemon configuration.
//!
//! Hierarchy, lowest precedence first:
//! 1. Built-in defaults
//! 2. The YAML file given by `--config` (default `config.yaml`). If missing, defaults are used.
//! 3. `CHAOSNTPD_*` environment variables, with `__` separating sections
//!    (e.g. `CHAOSNTPD_NTP__STRATUM=2`)
//! 4. Command-line flags
//!
//! Unknown keys are ignored, so files carrying extra sections still load.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use chaos_server::protocol::{ReferenceId, Stratum};
use chaos_server::server_common::{DriftPolicy, ServerConfig};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};

use crate::cli::Cli;
use crate::error::SettingsError;

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "CHAOSNTPD_";

/// Top-level configuration for the daemon.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSection,
    pub ntp: NtpSection,
    pub time_manipulation: TimeManipulationSection,
    pub logging: LoggingSection,
}

/// Where to listen.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ServerSection {
    pub host: String,
    pub port: u16,
    pub name: String,
}

impl Default for ServerSection {
    fn default() -> Self {
        ServerSection {
            host: "0.0.0.0".into(),
            port: 123,
            name: "ChaosNTPd".into(),
        }
    }
}

/// What the server claims about itself.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct NtpSection {
    pub stratum: u8,
    pub reference_id: String,
    pub precision: i8,
}

impl Default for NtpSection {
    fn default() -> Self {
        NtpSection {
            stratum: 1,
            reference_id: "CHAO".into(),
            precision: -20,
        }
    }
}

/// How wrong the served time is.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TimeManipulationSection {
    pub initial_offset_minutes: u32,
    pub jitter_seconds: u32,
    /// Only `uniform` is supported.
    pub distribution: String,
    pub client_tracking: ClientTrackingSection,
}

impl Default for TimeManipulationSection {
    fn default() -> Self {
        TimeManipulationSection {
            initial_offset_minutes: 30,
            jitter_seconds: 5,
            distribution: "uniform".into(),
            client_tracking: ClientTrackingSection::default(),
        }
    }
}

/// Bounds on per-client state.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ClientTrackingSection {
    pub cleanup_interval_seconds: u64,
    pub max_client_age_seconds: u64,
    pub max_tracked_clients: usize,
}

impl Default for ClientTrackingSection {
    fn default() -> Self {
        ClientTrackingSection {
            cleanup_interval_seconds: 300,
            max_client_age_seconds: 3600,
            max_tracked_clients: 10_000,
        }
    }
}

/// Transaction-log output format.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Text,
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormat::Json => "json",
            LogFormat::Text => "text",
        }
    }
}

/// Diagnostics and transaction logging.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LoggingSection {
    /// Diagnostic level. `RUST_LOG` takes precedence when set.
    pub level: String,
    pub format: LogFormat,
    pub log_transactions: bool,
    /// `stdout`, `stderr` or a file path (appended to).
    pub output: String,
    pub stats_interval_seconds: u64,
}

impl Default for LoggingSection {
    fn default() -> Self {
        LoggingSection {
            level: "info".into(),
            format: LogFormat::Json,
            log_transactions: true,
            output: "stdout".into(),
            stats_interval_seconds: 60,
        }
    }
}

const LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "warning", "error"];

impl Settings {
    /// Load settings for the given command line.
    pub fn load(cli: &Cli) -> Result<Self, SettingsError> {
        Self::from_figment(Self::figment(cli))
    }

    /// The layered provider chain for `cli`, before extraction.
    pub fn figment(cli: &Cli) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Settings::default()));
        if cli.config.exists() {
            figment = figment.merge(Yaml::file(&cli.config));
        }
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        cli.merge_into(figment)
    }

    /// Extract and validate.
    pub fn from_figment(figment: Figment) -> Result<Self, SettingsError> {
        let settings: Settings = figment.extract()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if !Stratum(self.ntp.stratum).is_claimable() {
            return Err(SettingsError::Invalid(format!(
                "invalid stratum value: {} (must be 0-15)",
                self.ntp.stratum
            )));
        }
        if self.server.host.parse::<IpAddr>().is_err() {
            return Err(SettingsError::Invalid(format!(
                "server.host must be an IP address, got {:?}",
                self.server.host
            )));
        }
        if self.ntp.reference_id.is_empty() {
            return Err(SettingsError::Invalid(
                "ntp.reference_id must not be empty".into(),
            ));
        }
        if self.time_manipulation.distribution != "uniform" {
            return Err(SettingsError::Invalid(format!(
                "unsupported distribution {:?} (only \"uniform\")",
                self.time_manipulation.distribution
            )));
        }
        if self.time_manipulation.client_tracking.cleanup_interval_seconds == 0 {
            return Err(SettingsError::Invalid(
                "cleanup_interval_seconds must be greater than zero".into(),
            ));
        }
        if self.logging.stats_interval_seconds == 0 {
            return Err(SettingsError::Invalid(
                "stats_interval_seconds must be greater than zero".into(),
            ));
        }
        if !LEVELS.contains(&self.logging.level.to_ascii_lowercase().as_str()) {
            return Err(SettingsError::Invalid(format!(
                "unknown log level {:?}",
                self.logging.level
            )));
        }
        Ok(())
    }

    /// The socket address to bind.
    pub fn listen_addr(&self) -> Result<SocketAddr, SettingsError> {
        let ip: IpAddr = self.server.host.parse().map_err(|_| {
            SettingsError::Invalid(format!("invalid host {:?}", self.server.host))
        })?;
        Ok(SocketAddr::new(ip, self.server.port))
    }

    /// The runtime configuration handed to the server.
    pub fn server_config(&self) -> ServerConfig {
        let tm = &self.time_manipulation;
        ServerConfig {
            stratum: Stratum(self.ntp.stratum),
            reference_id: ReferenceId::from_ascii(&self.ntp.reference_id),
            precision: self.ntp.precision,
            policy: DriftPolicy {
                initial_offset_minutes: tm.initial_offset_minutes,
                jitter_seconds: tm.jitter_seconds,
                max_client_age: Duration::from_secs(tm.client_tracking.max_client_age_seconds),
                max_tracked_clients: tm.client_tracking.max_tracked_clients,
            },
            cleanup_interval: Duration::from_secs(tm.client_tracking.cleanup_interval_seconds),
            stats_interval: Duration::from_secs(self.logging.stats_interval_seconds),
            log_transactions: self.logging.log_transactions,
        }
    }

    /// Diagnostic level in the form `EnvFilter` expects.
    pub fn filter_directive(&self) -> String {
        match self.logging.level.to_ascii_lowercase().as_str() {
            "warning" => "warn".to_owned(),
            other => other.to_owned(),
        }
    }
}
