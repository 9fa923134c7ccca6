//! Command-line interface.
//!
//! Every flag is optional and, when given, overrides the configuration file and environment.

use std::path::PathBuf;

use clap::Parser;
use figment::Figment;
use figment::providers::Serialized;

#[derive(Parser, Debug, Clone, PartialEq)]
#[command(
    name = "chaosntpd",
    version,
    about = "Adversarial NTP daemon that serves deliberately wrong time for testing"
)]
pub struct Cli {
    /// Path to the configuration YAML file
    #[arg(short, long, default_value = "config.yaml")]
    pub config: PathBuf,

    /// Initial offset bound in minutes
    #[arg(short = 'N', long = "initial-offset", value_name = "MINUTES")]
    pub initial_offset: Option<u32>,

    /// Jitter bound in seconds
    #[arg(short = 'X', long, value_name = "SECONDS")]
    pub jitter: Option<u32>,

    /// Stratum to claim (0-15)
    #[arg(short, long)]
    pub stratum: Option<u8>,

    /// UDP port to listen on
    #[arg(short, long, value_parser = clap::value_parser!(u16).range(1..))]
    pub port: Option<u16>,

    /// Bind address
    #[arg(long)]
    pub host: Option<String>,

    /// Logging level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Seconds between statistics reports
    #[arg(long, value_name = "SECONDS")]
    pub stats_interval: Option<u64>,
}

impl Cli {
    /// Layer the flags that were given on top of `figment`.
    pub fn merge_into(&self, mut figment: Figment) -> Figment {
        if let Some(minutes) = self.initial_offset {
            figment = figment.merge(Serialized::default(
                "time_manipulation.initial_offset_minutes",
                minutes,
            ));
        }
        if let Some(seconds) = self.jitter {
            figment = figment.merge(Serialized::default(
                "time_manipulation.jitter_seconds",
                seconds,
            ));
        }
        if let Some(stratum) = self.stratum {
            figment = figment.merge(Serialized::default("ntp.stratum", stratum));
        }
        if let Some(port) = self.port {
            figment = figment.merge(Serialized::default("server.port", port));
        }
        if let Some(host) = &self.host {
            figment = figment.merge(Serialized::default("server.host", host.clone()));
        }
        if let Some(level) = &self.log_level {
            figment = figment.merge(Serialized::default("logging.level", level.clone()));
        }
        if let Some(seconds) = self.stats_interval {
            figment = figment.merge(Serialized::default(
                "logging.stats_interval_seconds",
                seconds,
            ));
        }
        figment
    }
}
