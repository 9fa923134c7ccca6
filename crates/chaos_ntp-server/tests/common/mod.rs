// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Shared test helpers for server integration tests.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chaos_server::events::{EventSink, StatsEvent, TransactionEvent};
use chaos_server::protocol::{self, Mode, Packet, PACKET_SIZE, TimestampFormat};
use chaos_server::server_common::ChaosServerBuilder;
use chaos_server::tracker::{EvictionReport, TimeTracker};
use tokio::net::UdpSocket;
use tokio::sync::oneshot;

/// A running test server.
pub(crate) struct TestServer {
    pub(crate) addr: SocketAddr,
    pub(crate) tracker: Arc<TimeTracker>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl TestServer {
    /// Stop the server's receive loop.
    #[allow(dead_code)]
    pub(crate) fn stop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

/// Spawn a test server on an ephemeral loopback port.
///
/// The server runs in a background tokio task until [`TestServer::stop`] is called or the
/// runtime is dropped.
pub(crate) async fn spawn_test_server(builder: ChaosServerBuilder) -> TestServer {
    let server = builder
        .listen("127.0.0.1:0")
        .build()
        .await
        .expect("failed to bind test server");
    let addr = server.local_addr().expect("failed to get local addr");
    let tracker = server.tracker().clone();
    let (tx, rx) = oneshot::channel::<()>();
    tokio::spawn(async move {
        let _ = server
            .run_until(async move {
                let _ = rx.await;
            })
            .await;
    });
    // Small yield to ensure the server task is running.
    tokio::time::sleep(Duration::from_millis(10)).await;
    TestServer {
        addr,
        tracker,
        shutdown: Some(tx),
    }
}

/// Build a minimal client-mode request (48 bytes).
pub(crate) fn build_client_packet() -> [u8; PACKET_SIZE] {
    build_packet_with_mode(Mode::Client)
}

/// Build a request carrying an arbitrary mode.
pub(crate) fn build_packet_with_mode(mode: Mode) -> [u8; PACKET_SIZE] {
    let packet = Packet {
        mode,
        transmit_timestamp: TimestampFormat {
            seconds: 0xE000_0000,
            fraction: 0x1234_5678,
        },
        ..Packet::default()
    };
    protocol::serialize(&packet)
}

/// Send `packet` from `sock` to `addr` and wait for one reply.
///
/// Returns `None` if the server doesn't respond within the timeout.
pub(crate) async fn exchange(
    sock: &UdpSocket,
    addr: SocketAddr,
    packet: &[u8],
    timeout: Duration,
) -> Option<Vec<u8>> {
    sock.send_to(packet, addr).await.expect("send failed");

    let mut buf = vec![0u8; 2048];
    match tokio::time::timeout(timeout, sock.recv_from(&mut buf)).await {
        Ok(Ok((len, _))) => {
            buf.truncate(len);
            Some(buf)
        }
        _ => None,
    }
}

/// Send a raw UDP packet from a fresh socket and receive the response with a timeout.
pub(crate) async fn send_receive_raw(
    addr: SocketAddr,
    packet: &[u8],
    timeout: Duration,
) -> Option<Vec<u8>> {
    let sock = UdpSocket::bind("127.0.0.1:0").await.expect("bind failed");
    exchange(&sock, addr, packet, timeout).await
}

/// Parse a response buffer into a Packet.
pub(crate) fn parse_response(buf: &[u8]) -> Packet {
    protocol::parse(buf).expect("failed to parse response")
}

/// Event sink that keeps everything it receives.
#[derive(Default)]
pub(crate) struct RecordingSink {
    pub(crate) transactions: Mutex<Vec<TransactionEvent>>,
    pub(crate) statistics: Mutex<Vec<StatsEvent>>,
    pub(crate) evictions: Mutex<Vec<EvictionReport>>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub(crate) fn transactions(&self) -> Vec<TransactionEvent> {
        self.transactions.lock().unwrap().clone()
    }

    pub(crate) fn statistics(&self) -> Vec<StatsEvent> {
        self.statistics.lock().unwrap().clone()
    }

    pub(crate) fn evictions(&self) -> Vec<EvictionReport> {
        self.evictions.lock().unwrap().clone()
    }
}

impl EventSink for RecordingSink {
    fn transaction(&self, event: &TransactionEvent) {
        self.transactions.lock().unwrap().push(event.clone());
    }

    fn statistics(&self, event: &StatsEvent) {
        self.statistics.lock().unwrap().push(event.clone());
    }

    fn eviction(&self, report: &EvictionReport) {
        self.evictions.lock().unwrap().push(*report);
    }
}

/// Poll `condition` until it holds or `timeout` elapses.
#[allow(dead_code)]
pub(crate) async fn wait_for(mut condition: impl FnMut() -> bool, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
