// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Structured events emitted by the server.
//!
//! The server never formats or prints transaction records itself. It hands a
//! [`TransactionEvent`] to an injected [`EventSink`] after every answered request (when
//! transaction logging is enabled), a [`StatsEvent`] at every statistics tick and an
//! [`EvictionReport`] after every eviction pass.
//!
//! [`TracingSink`] is the default sink: it forwards everything to `tracing`. Tests install a
//! recording sink; the daemon installs one that writes JSON lines or text.

use std::net::SocketAddr;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::protocol;
use crate::server_common::{Answer, MetricsSnapshot, ServerConfig};
use crate::tracker::{EvictionReport, TrackerStats};
use crate::unix_time::{self, Instant};

/// Receives structured events from a running server.
///
/// Implementations are called from request-handling tasks and from the periodic tasks, so they
/// must be cheap and must not block for long.
pub trait EventSink: Send + Sync {
    /// A request was answered.
    fn transaction(&self, event: &TransactionEvent);

    /// Periodic aggregate statistics.
    fn statistics(&self, event: &StatsEvent);

    /// An eviction pass finished.
    fn eviction(&self, _report: &EvictionReport) {}
}

/// Whether a transaction was the client's first contact.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestType {
    /// First contact: the large initial offset was applied.
    Initial,
    /// A tracked client: elapsed time plus jitter was applied.
    Subsequent,
}

impl RequestType {
    /// The lowercase name used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestType::Initial => "initial",
            RequestType::Subsequent => "subsequent",
        }
    }
}

/// Who asked.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ClientInfo {
    /// Source IP address.
    pub ip: String,
    /// Source UDP port.
    pub port: u16,
    /// `true` on first contact.
    pub is_new: bool,
}

/// What was asked.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RequestInfo {
    /// Request version number.
    pub version: u8,
    /// Request mode (always 3 for answered requests).
    pub mode: u8,
    /// The client's transmit timestamp as RFC 3339.
    pub transmit_timestamp: String,
}

/// What was answered.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ResponseInfo {
    /// Stratum claimed in the response.
    pub stratum: u8,
    /// Reference identifier claimed in the response.
    pub reference_id: String,
    /// The real time the manipulation was computed against, as RFC 3339.
    pub actual_time: String,
    /// `manipulated - actual`, in seconds.
    pub offset_seconds: f64,
    /// `offset_seconds / 60`.
    pub offset_minutes: f64,
    /// The fake time served, as RFC 3339.
    pub manipulated_time: String,
    /// Real seconds since the previous contact (subsequent requests only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_seconds: Option<f64>,
    /// Jitter applied on this contact (subsequent requests only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jitter_applied: Option<f64>,
}

/// The drift policy in force when the request was answered.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct PolicySnapshot {
    /// Initial offset bound in minutes.
    #[serde(rename = "N_minutes")]
    pub n_minutes: u32,
    /// Jitter bound in seconds.
    #[serde(rename = "X_seconds")]
    pub x_seconds: u32,
    /// Configured stratum.
    pub stratum: u8,
}

/// One answered request, in the transaction-log schema.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TransactionEvent {
    /// When the event was recorded, as RFC 3339.
    pub timestamp: String,
    /// Always `"ntp_request"`.
    pub event: &'static str,
    /// `initial` or `subsequent`.
    pub request_type: RequestType,
    /// Who asked.
    pub client: ClientInfo,
    /// What was asked.
    pub request: RequestInfo,
    /// What was answered.
    pub response: ResponseInfo,
    /// The policy in force.
    pub config: PolicySnapshot,
    /// Time from receipt to successful send, in milliseconds (microsecond resolution).
    pub processing_time_ms: f64,
}

impl TransactionEvent {
    /// Describe an answered request.
    pub fn new(
        answer: &Answer,
        peer: SocketAddr,
        config: &ServerConfig,
        processing_time: Duration,
    ) -> Self {
        let m = &answer.manipulation;
        let request_type = if m.is_initial {
            RequestType::Initial
        } else {
            RequestType::Subsequent
        };

        TransactionEvent {
            timestamp: rfc3339(Instant::now()),
            event: "ntp_request",
            request_type,
            client: ClientInfo {
                ip: peer.ip().to_string(),
                port: peer.port(),
                is_new: m.is_initial,
            },
            request: RequestInfo {
                version: answer.request.version.value(),
                mode: answer.request.mode.value(),
                transmit_timestamp: rfc3339(request_transmit_instant(
                    answer.request.transmit_timestamp,
                    &m.actual,
                )),
            },
            response: ResponseInfo {
                stratum: answer.response.stratum.0,
                reference_id: answer.response.reference_id.to_string(),
                actual_time: rfc3339(m.actual),
                offset_seconds: m.offset_seconds,
                offset_minutes: m.offset_seconds / 60.0,
                manipulated_time: rfc3339(m.manipulated),
                elapsed_seconds: m.elapsed_seconds,
                jitter_applied: m.jitter_seconds,
            },
            config: PolicySnapshot {
                n_minutes: config.policy.initial_offset_minutes,
                x_seconds: config.policy.jitter_seconds,
                stratum: config.stratum.0,
            },
            processing_time_ms: processing_time.as_micros() as f64 / 1000.0,
        }
    }
}

/// Periodic aggregate statistics.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StatsEvent {
    /// When the statistics were sampled, as RFC 3339.
    pub timestamp: String,
    /// Clients currently tracked.
    pub clients: usize,
    /// Requests served to currently tracked clients.
    pub total_requests: u64,
    /// Server counters, if a metrics instance is attached.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<MetricsSnapshot>,
}

impl StatsEvent {
    /// Build a statistics event stamped with the current time.
    pub fn new(stats: TrackerStats, metrics: Option<MetricsSnapshot>) -> Self {
        StatsEvent {
            timestamp: rfc3339(Instant::now()),
            clients: stats.clients,
            total_requests: stats.total_requests,
            metrics,
        }
    }
}

/// Forwards every event to `tracing`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn transaction(&self, event: &TransactionEvent) {
        info!(
            client = %event.client.ip,
            port = event.client.port,
            request_type = event.request_type.as_str(),
            offset_seconds = event.response.offset_seconds,
            "answered request"
        );
    }

    fn statistics(&self, event: &StatsEvent) {
        info!(
            "Statistics: {} active clients, {} total requests served",
            event.clients, event.total_requests
        );
    }

    fn eviction(&self, report: &EvictionReport) {
        if report.stale_removed > 0 {
            info!(
                "Cleaned up {} stale clients, {} remaining",
                report.stale_removed, report.remaining
            );
        }
        if report.overflow_removed > 0 {
            warn!(
                "Enforced max clients limit, removed {} oldest clients",
                report.overflow_removed
            );
        }
    }
}

/// Format an instant as RFC 3339 in UTC with as many fractional digits as needed.
pub fn rfc3339(instant: Instant) -> String {
    let nanos = instant.as_unix_nanos();
    let secs = nanos.div_euclid(1_000_000_000) as i64;
    let subsec = nanos.rem_euclid(1_000_000_000) as u32;
    DateTime::<Utc>::from_timestamp(secs, subsec)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::AutoSi, true))
        .unwrap_or_default()
}

// An all-zero transmit timestamp means "unset" and is reported as the protocol epoch. Anything
// else is placed in the era nearest the real time of the request.
fn request_transmit_instant(ts: protocol::TimestampFormat, actual: &Instant) -> Instant {
    if ts.is_zero() {
        Instant::new(-unix_time::EPOCH_DELTA, 0)
    } else {
        unix_time::timestamp_to_instant(ts, actual)
    }
}
