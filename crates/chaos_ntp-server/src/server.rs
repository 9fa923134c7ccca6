// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Adversarial NTP server using the Tokio runtime.
//!
//! Answers client-mode requests with deliberately wrong time. Each client address gets its own
//! drifting fake clock (see [`crate::tracker`]), so a client polling repeatedly sees a coherent
//! but wrong clock rather than noise.
//!
//! # Architecture
//!
//! One receive loop reads datagrams and spawns an independent task per datagram, so the loop
//! never waits on a slow client. There is no queue and no admission control: request volume
//! directly drives the number of in-flight tasks. Two periodic tasks run alongside: eviction
//! of idle clients and a statistics reporter.
//!
//! Shutdown stops the receive loop and the periodic tasks and drops the socket. Handler tasks
//! already spawned are not awaited.
//!
//! # Examples
//!
//! ```no_run
//! # async fn example() -> std::io::Result<()> {
//! use chaos_server::server::ChaosServer;
//!
//! let server = ChaosServer::builder()
//!     .listen("0.0.0.0:123")
//!     .stratum(chaos_server::protocol::Stratum(2))
//!     .reference_id("CHAO")
//!     .initial_offset_minutes(30)
//!     .jitter_seconds(5)
//!     .build()
//!     .await?;
//!
//! server.run().await?;
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio::time::{Instant, interval_at};
use tracing::{debug, error};

use crate::error::{ChaosServerError, ConfigError};
use crate::events::{EventSink, StatsEvent, TracingSink, TransactionEvent};
use crate::server_common::{
    ChaosServerBuilder, HandleResult, ServerConfig, ServerMetrics, handle_request,
};
use crate::tracker::TimeTracker;

/// Receive buffer size. Requests longer than the 48-byte header are truncated, which is harmless
/// since trailing bytes are ignored.
const RECV_BUF_SIZE: usize = 1024;

impl ChaosServerBuilder {
    /// Build the server. Validates the configuration and binds to the listen address.
    ///
    /// A bind failure is fatal and reported as [`ChaosServerError::Bind`].
    pub async fn build(self) -> Result<ChaosServer, ChaosServerError> {
        self.config.validate()?;

        let addr: SocketAddr =
            self.listen_addr
                .parse()
                .map_err(|e: std::net::AddrParseError| ConfigError::InvalidListenAddress {
                    address: self.listen_addr.clone(),
                    detail: e.to_string(),
                })?;

        let sock = UdpSocket::bind(addr)
            .await
            .map_err(|source| ChaosServerError::Bind {
                address: self.listen_addr.clone(),
                source,
            })?;
        debug!("ChaosNTPd listening on {}", addr);

        let tracker = match self.seed {
            Some(seed) => TimeTracker::with_seed(self.config.policy, seed),
            None => TimeTracker::new(self.config.policy),
        };
        let sink = self
            .sink
            .unwrap_or_else(|| Arc::new(TracingSink) as Arc<dyn EventSink>);

        Ok(ChaosServer {
            shared: Arc::new(Shared {
                sock,
                config: self.config,
                tracker: Arc::new(tracker),
                sink,
                metrics: self.metrics,
            }),
        })
    }
}

/// An adversarial NTP server.
///
/// Created via [`ChaosServer::builder()`]. Call [`run()`](ChaosServer::run) or
/// [`run_until()`](ChaosServer::run_until) to start serving requests.
pub struct ChaosServer {
    shared: Arc<Shared>,
}

struct Shared {
    sock: UdpSocket,
    config: ServerConfig,
    tracker: Arc<TimeTracker>,
    sink: Arc<dyn EventSink>,
    metrics: Option<Arc<ServerMetrics>>,
}

impl ChaosServer {
    /// Create a builder for configuring the server.
    pub fn builder() -> ChaosServerBuilder {
        ChaosServerBuilder::new()
    }

    /// Get the local address the server is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.shared.sock.local_addr()
    }

    /// The per-client drift tracker. Clone the `Arc` to inspect state from another task.
    pub fn tracker(&self) -> &Arc<TimeTracker> {
        &self.shared.tracker
    }

    /// The configuration the server was built with.
    pub fn config(&self) -> &ServerConfig {
        &self.shared.config
    }

    /// Get the attached metrics instance, if any.
    pub fn metrics(&self) -> Option<&Arc<ServerMetrics>> {
        self.shared.metrics.as_ref()
    }

    /// Run the server indefinitely.
    ///
    /// Socket read errors are logged and the loop keeps going, so in practice this only ends
    /// when the future is dropped. Use [`run_until`](ChaosServer::run_until) for a clean stop.
    pub async fn run(self) -> Result<(), ChaosServerError> {
        self.run_until(std::future::pending::<()>()).await
    }

    /// Run the server until `shutdown` completes.
    ///
    /// On shutdown the receive loop and the periodic tasks stop and the socket is closed once
    /// the last in-flight handler finishes with it.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), ChaosServerError>
    where
        F: Future<Output = ()>,
    {
        let cleanup = tokio::spawn(cleanup_loop(self.shared.clone()));
        let stats = tokio::spawn(stats_loop(self.shared.clone()));

        let result = receive_loop(&self.shared, shutdown).await;

        cleanup.abort();
        stats.abort();
        debug!("ChaosNTPd stopped");
        result
    }
}

impl std::fmt::Debug for ChaosServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChaosServer")
            .field("local_addr", &self.shared.sock.local_addr().ok())
            .field("config", &self.shared.config)
            .field("tracker", &self.shared.tracker)
            .finish_non_exhaustive()
    }
}

async fn receive_loop<F>(shared: &Arc<Shared>, shutdown: F) -> Result<(), ChaosServerError>
where
    F: Future<Output = ()>,
{
    let mut recv_buf = [0u8; RECV_BUF_SIZE];
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            biased;

            _ = &mut shutdown => {
                debug!("shutdown requested");
                return Ok(());
            }

            received = shared.sock.recv_from(&mut recv_buf) => match received {
                Ok((recv_len, peer)) => {
                    let received_at = Instant::now();
                    let datagram = recv_buf[..recv_len].to_vec();
                    let shared = shared.clone();
                    tokio::spawn(async move {
                        shared.handle_datagram(&datagram, peer, received_at).await;
                    });
                }
                Err(e) => {
                    if let Some(m) = &shared.metrics {
                        m.inc_receive_failures();
                    }
                    error!("{}", ChaosServerError::Receive(e));
                }
            }
        }
    }
}

impl Shared {
    async fn handle_datagram(&self, datagram: &[u8], peer: SocketAddr, received_at: Instant) {
        let answer = match handle_request(
            datagram,
            peer.ip(),
            &self.config,
            &self.tracker,
            self.metrics.as_deref(),
        ) {
            HandleResult::Response(answer) => answer,
            HandleResult::Drop(_) => return,
        };

        if let Err(source) = self.sock.send_to(&answer.wire, peer).await {
            if let Some(m) = &self.metrics {
                m.inc_send_failures();
            }
            error!("{}", ChaosServerError::Send { peer, source });
            return;
        }
        if let Some(m) = &self.metrics {
            m.inc_responses_sent();
        }

        if self.config.log_transactions {
            let event = TransactionEvent::new(&answer, peer, &self.config, received_at.elapsed());
            self.sink.transaction(&event);
        }
    }
}

async fn cleanup_loop(shared: Arc<Shared>) {
    let period = shared.config.cleanup_interval;
    let mut ticker = interval_at(Instant::now() + period, period);
    loop {
        ticker.tick().await;
        let report = shared.tracker.evict();
        if let Some(m) = &shared.metrics {
            m.add_clients_evicted(report.total_removed() as u64);
            m.set_active_clients(report.remaining as u64);
        }
        shared.sink.eviction(&report);
    }
}

async fn stats_loop(shared: Arc<Shared>) {
    let period = shared.config.stats_interval;
    let mut ticker = interval_at(Instant::now() + period, period);
    loop {
        ticker.tick().await;
        let stats = shared.tracker.stats();
        let snapshot = shared.metrics.as_ref().map(|m| {
            m.set_active_clients(stats.clients as u64);
            m.snapshot()
        });
        shared.sink.statistics(&StatsEvent::new(stats, snapshot));
    }
}
