// Benchmarks for request handling throughput.

use std::hint::black_box;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use chaos_proto::protocol::{self, Mode, Packet, TimestampFormat, Version};
use chaos_proto::unix_time::Instant;
use chaos_server::server_common::{DriftPolicy, ServerConfig, ServerMetrics, handle_request};
use chaos_server::tracker::TimeTracker;
use criterion::{BatchSize, Criterion, criterion_group, criterion_main};

fn make_client_request_buf() -> [u8; protocol::PACKET_SIZE] {
    let pkt = Packet {
        version: Version::V4,
        mode: Mode::Client,
        poll: 6,
        transmit_timestamp: TimestampFormat {
            seconds: 3_913_056_000,
            fraction: 0xABCD_1234,
        },
        ..Packet::default()
    };
    protocol::serialize(&pkt)
}

fn bench_handle_request_repeat_client(c: &mut Criterion) {
    let buf = make_client_request_buf();
    let config = ServerConfig::default();
    let tracker = TimeTracker::with_seed(config.policy, 1);
    let metrics = ServerMetrics::default();
    let src_ip: IpAddr = "192.168.1.100".parse().unwrap();

    c.bench_function("handle_request_repeat_client", |b| {
        b.iter(|| {
            handle_request(
                black_box(&buf),
                black_box(src_ip),
                &config,
                &tracker,
                Some(&metrics),
            )
        })
    });
}

fn bench_handle_request_new_clients(c: &mut Criterion) {
    let buf = make_client_request_buf();
    let config = ServerConfig::default();
    let tracker = TimeTracker::with_seed(config.policy, 1);
    let mut next: u32 = 0;

    c.bench_function("handle_request_new_clients", |b| {
        b.iter(|| {
            next = next.wrapping_add(1);
            handle_request(
                black_box(&buf),
                IpAddr::V4(Ipv4Addr::from(next)),
                &config,
                &tracker,
                None,
            )
        })
    });
}

fn bench_handle_request_dropped(c: &mut Criterion) {
    let mut buf = make_client_request_buf();
    buf[0] = (buf[0] & !0b111) | Mode::SymmetricPassive.value();
    let config = ServerConfig::default();
    let tracker = TimeTracker::with_seed(config.policy, 1);
    let src_ip: IpAddr = "192.168.1.100".parse().unwrap();

    c.bench_function("handle_request_dropped", |b| {
        b.iter(|| handle_request(black_box(&buf), src_ip, &config, &tracker, None))
    });
}

fn bench_eviction_pass(c: &mut Criterion) {
    let policy = DriftPolicy {
        max_client_age: Duration::from_secs(3600),
        max_tracked_clients: 5_000,
        ..DriftPolicy::default()
    };

    c.bench_function("evict_10k_clients", |b| {
        b.iter_batched(
            || {
                let tracker = TimeTracker::with_seed(policy, 1);
                for i in 0..10_000u32 {
                    let now = Instant::new(1_700_000_000 + i as i64, 0);
                    tracker.manipulated_time_at(IpAddr::V4(Ipv4Addr::from(i)), now);
                }
                tracker
            },
            |tracker| tracker.evict_at(Instant::new(1_700_010_000, 0)),
            BatchSize::LargeInput,
        )
    });
}

criterion_group!(
    benches,
    bench_handle_request_repeat_client,
    bench_handle_request_new_clients,
    bench_handle_request_dropped,
    bench_eviction_pass,
);
criterion_main!(benches);
