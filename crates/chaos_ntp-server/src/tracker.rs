// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Per-client fake clocks.
//!
//! Every client address gets its own manipulated clock. The first contact places the clock a
//! random distance (up to `initial_offset_minutes`) away from real time; every later contact
//! advances the clock by the real time elapsed since the previous contact plus a small random
//! jitter. A client polling repeatedly therefore sees a coherent clock that wanders, rather than
//! an unrelated random value each time.
//!
//! All read-modify-write sequences run under one exclusive lock, so two near-simultaneous
//! first contacts from the same address cannot both be treated as initial.
//!
//! # Examples
//!
//! ```
//! use std::net::IpAddr;
//! use chaos_server::server_common::DriftPolicy;
//! use chaos_server::tracker::TimeTracker;
//! use chaos_server::unix_time::Instant;
//!
//! let tracker = TimeTracker::with_seed(DriftPolicy::default(), 7);
//! let client: IpAddr = "192.0.2.1".parse().unwrap();
//!
//! let first = tracker.manipulated_time_at(client, Instant::new(1_700_000_000, 0));
//! assert!(first.is_initial);
//! assert!(first.offset_seconds.abs() <= 1800.0);
//!
//! let second = tracker.manipulated_time_at(client, Instant::new(1_700_000_010, 0));
//! assert!(!second.is_initial);
//! let advance = second.manipulated.seconds_since(&first.manipulated);
//! assert!((5.0..=15.0).contains(&advance));
//! ```

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::net::IpAddr;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::server_common::DriftPolicy;
use crate::unix_time::Instant;

/// Drift state remembered for one client address.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ClientState {
    /// The fake time most recently reported to this client.
    pub last_manipulated: Instant,
    /// The real time at which that report was computed.
    pub last_actual: Instant,
    /// The real time of the first contact.
    pub first_seen: Instant,
    /// Number of requests answered for this client.
    pub request_count: u64,
}

/// The outcome of one tracker transition.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Manipulation {
    /// The fake time to report.
    pub manipulated: Instant,
    /// The real time used for the transition.
    pub actual: Instant,
    /// `manipulated - actual`, in seconds.
    pub offset_seconds: f64,
    /// `true` if this was the client's first contact.
    pub is_initial: bool,
    /// Real seconds since the client's previous contact (subsequent contacts only).
    pub elapsed_seconds: Option<f64>,
    /// Jitter added on this contact (subsequent contacts only).
    pub jitter_seconds: Option<f64>,
}

/// What an eviction pass removed.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct EvictionReport {
    /// Clients removed for being idle longer than the maximum age.
    pub stale_removed: usize,
    /// Clients removed, oldest first, to get back under the tracked-client bound.
    pub overflow_removed: usize,
    /// Clients still tracked after the pass.
    pub remaining: usize,
}

impl EvictionReport {
    /// Total clients removed by the pass.
    pub fn total_removed(&self) -> usize {
        self.stale_removed + self.overflow_removed
    }
}

/// Aggregate tracker statistics.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct TrackerStats {
    /// Clients currently tracked.
    pub clients: usize,
    /// Sum of request counts across currently tracked clients. Evicted clients do not count.
    pub total_requests: u64,
}

struct Inner {
    clients: HashMap<IpAddr, ClientState>,
    rng: StdRng,
}

/// Owns every client's drift state.
///
/// The tracker is `Sync`; share it behind an `Arc`.
pub struct TimeTracker {
    policy: DriftPolicy,
    inner: RwLock<Inner>,
}

impl TimeTracker {
    /// Create a tracker whose random source is seeded from the operating system.
    pub fn new(policy: DriftPolicy) -> Self {
        Self::with_rng(policy, StdRng::from_os_rng())
    }

    /// Create a tracker with a deterministic random source.
    pub fn with_seed(policy: DriftPolicy, seed: u64) -> Self {
        Self::with_rng(policy, StdRng::seed_from_u64(seed))
    }

    fn with_rng(policy: DriftPolicy, rng: StdRng) -> Self {
        TimeTracker {
            policy,
            inner: RwLock::new(Inner {
                clients: HashMap::new(),
                rng,
            }),
        }
    }

    /// The policy this tracker applies.
    pub fn policy(&self) -> DriftPolicy {
        self.policy
    }

    /// Compute the fake time for `key`, reading the system clock after taking the lock.
    pub fn manipulated_time(&self, key: IpAddr) -> Manipulation {
        let mut inner = self.write();
        let now = Instant::now();
        self.transition(&mut inner, key, now)
    }

    /// Compute the fake time for `key` as of `now`.
    pub fn manipulated_time_at(&self, key: IpAddr, now: Instant) -> Manipulation {
        let mut inner = self.write();
        self.transition(&mut inner, key, now)
    }

    fn transition(&self, inner: &mut Inner, key: IpAddr, now: Instant) -> Manipulation {
        let Inner { clients, rng } = inner;
        match clients.entry(key) {
            Entry::Vacant(slot) => {
                let offset = sample_symmetric(rng, self.policy.initial_offset_span());
                let manipulated = now.add_seconds_f64(offset);
                slot.insert(ClientState {
                    last_manipulated: manipulated,
                    last_actual: now,
                    first_seen: now,
                    request_count: 1,
                });
                debug!("new client {}: initial offset {:.3}s", key, offset);
                Manipulation {
                    manipulated,
                    actual: now,
                    offset_seconds: offset,
                    is_initial: true,
                    elapsed_seconds: None,
                    jitter_seconds: None,
                }
            }
            Entry::Occupied(mut slot) => {
                let state = slot.get_mut();
                let elapsed_nanos = now.as_unix_nanos() - state.last_actual.as_unix_nanos();
                let expected =
                    Instant::from_unix_nanos(state.last_manipulated.as_unix_nanos() + elapsed_nanos);
                let jitter = sample_symmetric(rng, self.policy.jitter_span());
                let manipulated = expected.add_seconds_f64(jitter);

                state.last_manipulated = manipulated;
                state.last_actual = now;
                state.request_count += 1;

                Manipulation {
                    manipulated,
                    actual: now,
                    offset_seconds: manipulated.seconds_since(&now),
                    is_initial: false,
                    elapsed_seconds: Some(elapsed_nanos as f64 / 1e9),
                    jitter_seconds: Some(jitter),
                }
            }
        }
    }

    /// Run an eviction pass against the system clock.
    pub fn evict(&self) -> EvictionReport {
        let mut inner = self.write();
        let now = Instant::now();
        self.evict_locked(&mut inner, now)
    }

    /// Run an eviction pass as of `now`.
    ///
    /// Removes every client idle for longer than the maximum age, then, if more than
    /// `max_tracked_clients` remain, removes the oldest by first contact (ties broken by
    /// address order) until the bound holds.
    pub fn evict_at(&self, now: Instant) -> EvictionReport {
        let mut inner = self.write();
        self.evict_locked(&mut inner, now)
    }

    fn evict_locked(&self, inner: &mut Inner, now: Instant) -> EvictionReport {
        let clients = &mut inner.clients;
        let max_age_nanos = self.policy.max_client_age.as_nanos() as i128;
        let now_nanos = now.as_unix_nanos();

        let before = clients.len();
        clients.retain(|_, state| now_nanos - state.last_actual.as_unix_nanos() <= max_age_nanos);
        let stale_removed = before - clients.len();

        let max = self.policy.max_tracked_clients;
        let mut overflow_removed = 0;
        if clients.len() > max {
            let mut by_age: Vec<(Instant, IpAddr)> = clients
                .iter()
                .map(|(key, state)| (state.first_seen, *key))
                .collect();
            by_age.sort_unstable();
            overflow_removed = clients.len() - max;
            for (_, key) in by_age.into_iter().take(overflow_removed) {
                clients.remove(&key);
            }
        }

        let report = EvictionReport {
            stale_removed,
            overflow_removed,
            remaining: clients.len(),
        };
        debug!(
            "eviction pass: {} stale, {} over limit, {} remaining",
            report.stale_removed, report.overflow_removed, report.remaining
        );
        report
    }

    /// Client count and total requests served to currently tracked clients.
    pub fn stats(&self) -> TrackerStats {
        let inner = self.read();
        TrackerStats {
            clients: inner.clients.len(),
            total_requests: inner.clients.values().map(|s| s.request_count).sum(),
        }
    }

    /// A copy of the state tracked for `key`, if any.
    pub fn client(&self, key: &IpAddr) -> Option<ClientState> {
        self.read().clients.get(key).copied()
    }

    /// Number of clients currently tracked.
    pub fn len(&self) -> usize {
        self.read().clients.len()
    }

    /// Whether no clients are tracked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // A panic while holding the lock cannot leave a half-written entry, so poisoning is ignored.
    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for TimeTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeTracker")
            .field("policy", &self.policy)
            .field("clients", &self.len())
            .finish()
    }
}

/// Uniform sample from `[-span, span]`.
fn sample_symmetric(rng: &mut StdRng, span: f64) -> f64 {
    if span <= 0.0 {
        return 0.0;
    }
    rng.random_range(-span..=span)
}
