// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Chainable configuration for [`ChaosServer`](crate::server::ChaosServer).
//!
//! Every setter consumes and returns the builder. The async `build()` method lives next to the
//! server in [`crate::server`], since it is the only step that touches the runtime.

use std::sync::Arc;
use std::time::Duration;

use crate::events::EventSink;
use crate::protocol::{ReferenceId, Stratum};

use super::{ServerConfig, ServerMetrics};

/// Default listen address: all IPv4 interfaces on the standard port.
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:123";

/// Builder for configuring and creating a [`ChaosServer`](crate::server::ChaosServer).
pub struct ChaosServerBuilder {
    pub(crate) listen_addr: String,
    pub(crate) config: ServerConfig,
    pub(crate) sink: Option<Arc<dyn EventSink>>,
    pub(crate) metrics: Option<Arc<ServerMetrics>>,
    pub(crate) seed: Option<u64>,
}

impl ChaosServerBuilder {
    pub(crate) fn new() -> Self {
        ChaosServerBuilder {
            listen_addr: DEFAULT_LISTEN_ADDR.to_owned(),
            config: ServerConfig::default(),
            sink: None,
            metrics: None,
            seed: None,
        }
    }

    /// Set the listen address as `IP:port` (default: `"0.0.0.0:123"`).
    pub fn listen(mut self, addr: impl Into<String>) -> Self {
        self.listen_addr = addr.into();
        self
    }

    /// Replace the whole runtime configuration at once.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the stratum claimed in responses (0 through 15).
    pub fn stratum(mut self, stratum: Stratum) -> Self {
        self.config.stratum = stratum;
        self
    }

    /// Set the reference identifier. Longer strings are truncated to 4 bytes, shorter ones
    /// zero-padded.
    pub fn reference_id(mut self, id: &str) -> Self {
        self.config.reference_id = ReferenceId::from_ascii(id);
        self
    }

    /// Set the precision claimed in responses, in log2 seconds (e.g., -20 ≈ 1μs).
    pub fn precision(mut self, precision: i8) -> Self {
        self.config.precision = precision;
        self
    }

    /// Bound the first-contact offset to `±minutes`.
    pub fn initial_offset_minutes(mut self, minutes: u32) -> Self {
        self.config.policy.initial_offset_minutes = minutes;
        self
    }

    /// Bound the per-request jitter to `±seconds`.
    pub fn jitter_seconds(mut self, seconds: u32) -> Self {
        self.config.policy.jitter_seconds = seconds;
        self
    }

    /// Set the period between eviction passes (default: 300 s).
    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.config.cleanup_interval = interval;
        self
    }

    /// Set the idle time after which a client is forgotten (default: 3600 s).
    pub fn max_client_age(mut self, age: Duration) -> Self {
        self.config.policy.max_client_age = age;
        self
    }

    /// Set the bound on tracked clients enforced by each eviction pass (default: 10,000).
    pub fn max_tracked_clients(mut self, max: usize) -> Self {
        self.config.policy.max_tracked_clients = max;
        self
    }

    /// Emit a transaction event for every answered request (default: `true`).
    pub fn log_transactions(mut self, enable: bool) -> Self {
        self.config.log_transactions = enable;
        self
    }

    /// Set the period between statistics reports (default: 60 s).
    pub fn stats_interval(mut self, interval: Duration) -> Self {
        self.config.stats_interval = interval;
        self
    }

    /// Install the sink that receives transaction, statistics and eviction events.
    ///
    /// Without one, events go to [`TracingSink`](crate::events::TracingSink).
    pub fn event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Attach a shared metrics instance for runtime counter tracking.
    ///
    /// The server will increment atomic counters on every datagram. Pass the
    /// same `Arc<ServerMetrics>` to other tasks to read snapshots via
    /// [`ServerMetrics::snapshot()`].
    pub fn metrics(mut self, metrics: Arc<ServerMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Seed the tracker's random source for reproducible offsets.
    pub fn rng_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

impl Default for ChaosServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
