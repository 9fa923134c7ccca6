//! Types and constants for the 48-byte time-protocol frame.
//!
//! Provides `FromBytes`/`ToBytes` implementations over plain byte slices. Multi-byte fields are
//! read and written with the byteorder crate's `ByteOrder` in network (big-endian) order, which
//! keeps the codec usable without `std`.
//!
//! The frame is shaped like an NTPv4 header but the codec is deliberately lenient: every
//! 48-byte input parses, and re-serializing a parsed packet reproduces the input exactly.

/// Default UDP port for the time service.
pub const PORT: u16 = 123;

/// Size in bytes of the fixed packet header.
pub const PACKET_SIZE: usize = 48;

/// One second expressed in 64-bit protocol fixed-point units.
pub const ONE_SECOND_FIXED: u64 = 1 << 32;

mod bytes;
mod traits;
mod types;

pub use self::traits::*;
pub use self::types::*;

use crate::error::ParseError;

/// Parse the first 48 bytes of `buf` into a [`Packet`].
///
/// Fails with [`ParseError::BufferTooShort`] if fewer than 48 bytes are available. Bytes past
/// the header are ignored.
pub fn parse(buf: &[u8]) -> Result<Packet, ParseError> {
    Packet::from_bytes(buf).map(|(packet, _)| packet)
}

/// Serialize a [`Packet`] into its exact 48-byte wire form.
pub fn serialize(packet: &Packet) -> [u8; PACKET_SIZE] {
    let mut buf = [0u8; PACKET_SIZE];
    packet.write_fixed(&mut buf);
    buf
}
