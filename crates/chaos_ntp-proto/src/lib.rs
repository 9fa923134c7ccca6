// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Wire types and codec for the 48-byte time-protocol packet.
//!
//! This crate provides the packet layout, lenient byte-exact parsing and serialization, and
//! conversion between Unix instants and 64-bit protocol timestamps.

#![cfg_attr(not(feature = "std"), no_std)]
#![warn(missing_docs)]

/// Error type for buffer-based packet parsing and serialization.
pub mod error;

/// Packet types, codec traits and constants.
pub mod protocol;

/// Unix time conversion utilities for protocol timestamps.
pub mod unix_time;
