// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Fully-resolved server configuration.
//!
//! [`ServerConfig`] is produced by the builder (or handed over whole by an external loader)
//! and is read-only once the server starts. It is shared behind an `Arc` by the request
//! handlers and the periodic tasks.

use std::time::Duration;

use crate::error::ConfigError;
use crate::protocol::{ReferenceId, Stratum};

/// Default stratum claimed in responses.
pub const DEFAULT_STRATUM: Stratum = Stratum::PRIMARY;
/// Default reference identifier.
pub const DEFAULT_REFERENCE_ID: &str = "CHAO";
/// Default clock precision in log2 seconds.
pub const DEFAULT_PRECISION: i8 = -20;
/// Default bound on the first-contact offset, in minutes.
pub const DEFAULT_INITIAL_OFFSET_MINUTES: u32 = 30;
/// Default bound on per-request jitter, in seconds.
pub const DEFAULT_JITTER_SECONDS: u32 = 5;
/// Default period between eviction passes.
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(300);
/// Default idle time after which a client is forgotten.
pub const DEFAULT_MAX_CLIENT_AGE: Duration = Duration::from_secs(3600);
/// Default bound on tracked clients after each eviction pass.
pub const DEFAULT_MAX_TRACKED_CLIENTS: usize = 10_000;
/// Default period between statistics reports.
pub const DEFAULT_STATS_INTERVAL: Duration = Duration::from_secs(60);

/// How each client's fake clock is seeded and perturbed, and how long its state is kept.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct DriftPolicy {
    /// First contact offsets are drawn uniformly from `±initial_offset_minutes * 60` seconds.
    pub initial_offset_minutes: u32,
    /// Subsequent contacts add jitter drawn uniformly from `±jitter_seconds`.
    pub jitter_seconds: u32,
    /// Clients idle for longer than this are removed by the next eviction pass.
    pub max_client_age: Duration,
    /// Upper bound on tracked clients immediately after an eviction pass.
    pub max_tracked_clients: usize,
}

impl DriftPolicy {
    /// Half-width of the first-contact offset range, in seconds.
    pub fn initial_offset_span(&self) -> f64 {
        self.initial_offset_minutes as f64 * 60.0
    }

    /// Half-width of the jitter range, in seconds.
    pub fn jitter_span(&self) -> f64 {
        self.jitter_seconds as f64
    }
}

impl Default for DriftPolicy {
    fn default() -> Self {
        DriftPolicy {
            initial_offset_minutes: DEFAULT_INITIAL_OFFSET_MINUTES,
            jitter_seconds: DEFAULT_JITTER_SECONDS,
            max_client_age: DEFAULT_MAX_CLIENT_AGE,
            max_tracked_clients: DEFAULT_MAX_TRACKED_CLIENTS,
        }
    }
}

/// Everything the server core reads at runtime.
#[derive(Clone, Debug, PartialEq)]
pub struct ServerConfig {
    /// Stratum placed in every response (0 through 15).
    pub stratum: Stratum,
    /// Reference identifier placed in every response.
    pub reference_id: ReferenceId,
    /// Precision placed in every response, in log2 seconds.
    pub precision: i8,
    /// Per-client drift and retention policy.
    pub policy: DriftPolicy,
    /// Period between eviction passes.
    pub cleanup_interval: Duration,
    /// Period between statistics reports.
    pub stats_interval: Duration,
    /// Emit a transaction event for every answered request.
    pub log_transactions: bool,
}

impl ServerConfig {
    /// Check the invariants the server relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.stratum.is_claimable() {
            return Err(ConfigError::InvalidStratum {
                stratum: self.stratum.0,
            });
        }
        if self.cleanup_interval.is_zero() {
            return Err(ConfigError::ZeroInterval {
                name: "cleanup interval",
            });
        }
        if self.stats_interval.is_zero() {
            return Err(ConfigError::ZeroInterval {
                name: "statistics interval",
            });
        }
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            stratum: DEFAULT_STRATUM,
            reference_id: ReferenceId::from_ascii(DEFAULT_REFERENCE_ID),
            precision: DEFAULT_PRECISION,
            policy: DriftPolicy::default(),
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
            stats_interval: DEFAULT_STATS_INTERVAL,
            log_transactions: true,
        }
    }
}
