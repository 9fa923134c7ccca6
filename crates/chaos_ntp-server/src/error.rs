// Copyright 2026 U.S. Federal Government (in countries where recognized)
// SPDX-License-Identifier: Apache-2.0

//! Error types for the chaos time server.
//!
//! Only [`ChaosServerError::Bind`] and [`ChaosServerError::Config`] escape to the caller. `Send`
//! and `Receive` are only formatted into log lines; the receive loop absorbs them.
//! The request pipeline still produces typed [`ProtocolError`] values so drops can be counted
//! and logged precisely.
//!
//! Callers that prefer `io::Result` can convert with `?`; the typed error can be recovered by
//! downcasting:
//!
//! ```no_run
//! use chaos_server::error::ChaosServerError;
//!
//! # fn example(result: std::io::Result<()>) {
//! if let Err(e) = result {
//!     if let Some(srv_err) = e.get_ref()
//!         .and_then(|inner| inner.downcast_ref::<ChaosServerError>())
//!     {
//!         match srv_err {
//!             ChaosServerError::Bind { address, .. } => eprintln!("cannot bind {address}"),
//!             _ => eprintln!("server error: {srv_err}"),
//!         }
//!     }
//! }
//! # }
//! ```

pub use chaos_proto::error::ParseError;

use std::fmt;
use std::io;
use std::net::SocketAddr;

/// Errors that can occur during server operations.
#[derive(Debug)]
pub enum ChaosServerError {
    /// Invalid configuration supplied to the builder.
    Config(ConfigError),
    /// The listening socket could not be bound. Fatal at startup.
    Bind {
        /// The address that was requested.
        address: String,
        /// The underlying socket error.
        source: io::Error,
    },
    /// Writing a response to a client failed. The response is dropped.
    Send {
        /// The client the response was addressed to.
        peer: SocketAddr,
        /// The underlying socket error.
        source: io::Error,
    },
    /// A transient socket read error. The receive loop keeps running.
    Receive(io::Error),
}

/// Validation failures for incoming requests.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ProtocolError {
    /// Datagram shorter than the 48-byte header.
    MalformedPacket {
        /// Number of bytes received.
        received: usize,
    },
    /// Request mode other than client (3).
    UnsupportedMode {
        /// The mode value received.
        mode: u8,
    },
}

/// Server configuration errors.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ConfigError {
    /// Invalid listen address.
    InvalidListenAddress {
        /// The address that was invalid.
        address: String,
        /// Detail about why it is invalid.
        detail: String,
    },
    /// Stratum outside 0 through 15.
    InvalidStratum {
        /// The rejected value.
        stratum: u8,
    },
    /// A periodic interval of zero.
    ZeroInterval {
        /// Which interval was zero.
        name: &'static str,
    },
}

// ── Display implementations ─────────────────────────────────────────

impl fmt::Display for ChaosServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChaosServerError::Config(e) => write!(f, "config error: {e}"),
            ChaosServerError::Bind { address, source } => {
                write!(f, "failed to bind {address}: {source}")
            }
            ChaosServerError::Send { peer, source } => {
                write!(f, "failed to send response to {peer}: {source}")
            }
            ChaosServerError::Receive(e) => write!(f, "failed to receive datagram: {e}"),
        }
    }
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::MalformedPacket { received } => {
                write!(f, "malformed request ({received} bytes)")
            }
            ProtocolError::UnsupportedMode { mode } => {
                write!(f, "unsupported request mode: {mode}")
            }
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidListenAddress { address, detail } => {
                write!(f, "invalid listen address '{address}': {detail}")
            }
            ConfigError::InvalidStratum { stratum } => {
                write!(f, "stratum must be between 0 and 15, got {stratum}")
            }
            ConfigError::ZeroInterval { name } => {
                write!(f, "{name} must be greater than zero")
            }
        }
    }
}

// ── Error trait implementations ─────────────────────────────────────

impl std::error::Error for ChaosServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ChaosServerError::Config(e) => Some(e),
            ChaosServerError::Bind { source, .. } | ChaosServerError::Send { source, .. } => {
                Some(source)
            }
            ChaosServerError::Receive(e) => Some(e),
        }
    }
}

impl std::error::Error for ProtocolError {}
impl std::error::Error for ConfigError {}

// ── From conversions ────────────────────────────────────────────────

impl From<ChaosServerError> for io::Error {
    fn from(err: ChaosServerError) -> io::Error {
        let kind = match &err {
            ChaosServerError::Config(_) => io::ErrorKind::InvalidInput,
            ChaosServerError::Bind { source, .. }
            | ChaosServerError::Send { source, .. }
            | ChaosServerError::Receive(source) => source.kind(),
        };
        io::Error::new(kind, err)
    }
}

impl From<ConfigError> for ChaosServerError {
    fn from(err: ConfigError) -> ChaosServerError {
        ChaosServerError::Config(err)
    }
}

impl From<ParseError> for ProtocolError {
    fn from(err: ParseError) -> ProtocolError {
        match err {
            ParseError::BufferTooShort { available, .. } => ProtocolError::MalformedPacket {
                received: available,
            },
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_error_display() {
        let e = ProtocolError::MalformedPacket { received: 10 };
        assert_eq!(e.to_string(), "malformed request (10 bytes)");
        let e = ProtocolError::UnsupportedMode { mode: 2 };
        assert_eq!(e.to_string(), "unsupported request mode: 2");
    }

    #[test]
    fn test_config_error_display() {
        let e = ConfigError::InvalidListenAddress {
            address: "bad:addr".to_string(),
            detail: "not a valid socket address".to_string(),
        };
        assert_eq!(
            e.to_string(),
            "invalid listen address 'bad:addr': not a valid socket address"
        );
        let e = ConfigError::InvalidStratum { stratum: 16 };
        assert_eq!(e.to_string(), "stratum must be between 0 and 15, got 16");
        let e = ConfigError::ZeroInterval {
            name: "cleanup interval",
        };
        assert_eq!(e.to_string(), "cleanup interval must be greater than zero");
    }

    #[test]
    fn test_bind_error_display_and_kind() {
        let err = ChaosServerError::Bind {
            address: "0.0.0.0:123".to_string(),
            source: io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(err.to_string(), "failed to bind 0.0.0.0:123: denied");
        let io_err: io::Error = err.into();
        assert_eq!(io_err.kind(), io::ErrorKind::PermissionDenied);
    }

    #[test]
    fn test_server_error_to_io_error_kind() {
        let cases: Vec<(ChaosServerError, io::ErrorKind)> = vec![
            (
                ChaosServerError::Config(ConfigError::InvalidStratum { stratum: 16 }),
                io::ErrorKind::InvalidInput,
            ),
            (
                ChaosServerError::Send {
                    peer: "127.0.0.1:5000".parse().unwrap(),
                    source: io::Error::new(io::ErrorKind::BrokenPipe, "broken"),
                },
                io::ErrorKind::BrokenPipe,
            ),
            (
                ChaosServerError::Receive(io::Error::new(io::ErrorKind::WouldBlock, "again")),
                io::ErrorKind::WouldBlock,
            ),
        ];
        for (srv_err, expected_kind) in cases {
            let io_err: io::Error = srv_err.into();
            assert_eq!(io_err.kind(), expected_kind);
        }
    }

    #[test]
    fn test_server_error_downcast_roundtrip() {
        let err = ChaosServerError::Config(ConfigError::ZeroInterval {
            name: "stats interval",
        });
        let io_err: io::Error = err.into();
        let inner = io_err
            .get_ref()
            .unwrap()
            .downcast_ref::<ChaosServerError>()
            .unwrap();
        assert!(matches!(
            inner,
            ChaosServerError::Config(ConfigError::ZeroInterval {
                name: "stats interval"
            })
        ));
    }

    #[test]
    fn test_parse_error_maps_to_malformed() {
        let err: ProtocolError = ParseError::BufferTooShort {
            needed: 48,
            available: 12,
        }
        .into();
        assert_eq!(err, ProtocolError::MalformedPacket { received: 12 });
    }

    #[test]
    fn test_error_source_chain() {
        let err = ChaosServerError::Send {
            peer: "127.0.0.1:5000".parse().unwrap(),
            source: io::Error::new(io::ErrorKind::BrokenPipe, "broken"),
        };
        assert!(std::error::Error::source(&err).is_some());
    }
}
