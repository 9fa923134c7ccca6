// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Adversarial NTP server library built on tokio.
//!
//! The server answers NTP client requests with plausible but deliberately wrong time. Each
//! client address sees its own fake clock: a random initial offset on first contact, then real
//! elapsed time plus a small jitter on every later request. It is meant for exercising the
//! resilience of clock-synchronisation clients, never for keeping time.
//!
//! # Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`protocol`], [`unix_time`] | Packet codec and time conversion, re-exported from `chaos_proto`. |
//! | [`tracker`] | Per-client drift state and eviction. |
//! | [`server_common`] | Configuration, builder, validation, response building, request pipeline, metrics. |
//! | [`server`] | The tokio receive loop and periodic tasks. |
//! | [`events`] | Transaction and statistics events and the sink they are delivered to. |
//! | [`error`] | Error types. |

#![warn(missing_docs)]

// Re-export protocol types from chaos_proto for convenience.
pub use chaos_proto::{protocol, unix_time};

/// Error types for server operations.
pub mod error;

/// Structured transaction, statistics and eviction events.
pub mod events;

/// Per-client fake clocks with bounded memory.
pub mod tracker;

/// Shared types and logic for the server.
///
/// Provides configuration, request validation, response building and the request pipeline.
pub mod server_common;

/// Adversarial NTP server using the Tokio runtime.
pub mod server;
