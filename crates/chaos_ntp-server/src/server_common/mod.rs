// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Runtime-independent server logic used by [`crate::server`].
//!
//! Provides the resolved configuration, the builder, request validation, response building,
//! the pure request pipeline and the metrics counters.

mod builder;
mod config;
mod metrics;
mod pipeline;
mod response;
mod validation;

pub use self::builder::{ChaosServerBuilder, DEFAULT_LISTEN_ADDR};
pub use self::config::{
    DEFAULT_CLEANUP_INTERVAL, DEFAULT_INITIAL_OFFSET_MINUTES, DEFAULT_JITTER_SECONDS,
    DEFAULT_MAX_CLIENT_AGE, DEFAULT_MAX_TRACKED_CLIENTS, DEFAULT_PRECISION,
    DEFAULT_REFERENCE_ID, DEFAULT_STATS_INTERVAL, DEFAULT_STRATUM, DriftPolicy, ServerConfig,
};
pub use self::metrics::{MetricsSnapshot, ServerMetrics};
pub use self::pipeline::{Answer, HandleResult, handle_request};
pub use self::response::build_response;

pub(crate) use self::validation::validate_client_request;
