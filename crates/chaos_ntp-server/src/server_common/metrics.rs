// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Lock-free server metrics using atomic counters.
//!
//! All counters use relaxed ordering for maximum performance on the hot path.
//! Consumers that need a consistent snapshot should accept that individual
//! values are approximate when read concurrently.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Runtime server metrics, updated atomically on every datagram.
///
/// Create an instance with [`ServerMetrics::new()`], wrap in `Arc`, and pass
/// to [`ChaosServerBuilder::metrics()`](crate::server_common::ChaosServerBuilder::metrics).
/// A snapshot is attached to every statistics event.
///
/// # Examples
///
/// ```no_run
/// # async fn example() -> std::io::Result<()> {
/// use std::sync::Arc;
/// use chaos_server::server::ChaosServer;
/// use chaos_server::server_common::ServerMetrics;
///
/// let metrics = Arc::new(ServerMetrics::new());
/// let server = ChaosServer::builder()
///     .listen("127.0.0.1:1234")
///     .metrics(metrics.clone())
///     .build()
///     .await?;
///
/// // Read metrics from another task
/// let snap = metrics.snapshot();
/// println!("requests: {}", snap.requests_received);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct ServerMetrics {
    /// Datagrams received (valid + invalid).
    pub requests_received: AtomicU64,
    /// Responses written to the socket.
    pub responses_sent: AtomicU64,
    /// Datagrams dropped for being shorter than the header.
    pub malformed_dropped: AtomicU64,
    /// Datagrams dropped for carrying a mode other than client.
    pub unsupported_mode_dropped: AtomicU64,
    /// Responses that could not be written.
    pub send_failures: AtomicU64,
    /// Socket read errors.
    pub receive_failures: AtomicU64,
    /// Clients removed by eviction passes.
    pub clients_evicted: AtomicU64,
    /// Clients tracked as of the last eviction pass or statistics report.
    pub active_clients: AtomicU64,
}

impl ServerMetrics {
    /// Create a new metrics instance with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return a point-in-time snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_received: self.requests_received.load(Ordering::Relaxed),
            responses_sent: self.responses_sent.load(Ordering::Relaxed),
            malformed_dropped: self.malformed_dropped.load(Ordering::Relaxed),
            unsupported_mode_dropped: self.unsupported_mode_dropped.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
            receive_failures: self.receive_failures.load(Ordering::Relaxed),
            clients_evicted: self.clients_evicted.load(Ordering::Relaxed),
            active_clients: self.active_clients.load(Ordering::Relaxed),
        }
    }

    #[inline]
    pub(crate) fn inc_requests_received(&self) {
        self.requests_received.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn inc_responses_sent(&self) {
        self.responses_sent.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn inc_malformed_dropped(&self) {
        self.malformed_dropped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn inc_unsupported_mode_dropped(&self) {
        self.unsupported_mode_dropped.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn inc_send_failures(&self) {
        self.send_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn inc_receive_failures(&self) {
        self.receive_failures.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn add_clients_evicted(&self, count: u64) {
        self.clients_evicted.fetch_add(count, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn set_active_clients(&self, count: u64) {
        self.active_clients.store(count, Ordering::Relaxed);
    }
}

/// A point-in-time snapshot of server metrics (non-atomic, copyable).
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    /// Datagrams received (valid + invalid).
    pub requests_received: u64,
    /// Responses written to the socket.
    pub responses_sent: u64,
    /// Datagrams dropped for being shorter than the header.
    pub malformed_dropped: u64,
    /// Datagrams dropped for carrying a mode other than client.
    pub unsupported_mode_dropped: u64,
    /// Responses that could not be written.
    pub send_failures: u64,
    /// Socket read errors.
    pub receive_failures: u64,
    /// Clients removed by eviction passes.
    pub clients_evicted: u64,
    /// Clients tracked as of the last report.
    pub active_clients: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_default_is_zero() {
        let m = ServerMetrics::new();
        assert_eq!(m.snapshot(), MetricsSnapshot::default());
    }

    #[test]
    fn test_metrics_increment() {
        let m = ServerMetrics::new();
        m.inc_requests_received();
        m.inc_requests_received();
        m.inc_responses_sent();
        m.inc_unsupported_mode_dropped();
        m.add_clients_evicted(3);
        m.set_active_clients(42);
        let s = m.snapshot();
        assert_eq!(s.requests_received, 2);
        assert_eq!(s.responses_sent, 1);
        assert_eq!(s.unsupported_mode_dropped, 1);
        assert_eq!(s.malformed_dropped, 0);
        assert_eq!(s.clients_evicted, 3);
        assert_eq!(s.active_clients, 42);
    }
}
