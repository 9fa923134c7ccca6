use crate::protocol;
use crate::unix_time;

use super::ServerConfig;

/// Build a server response carrying `manipulated` as the server's notion of now.
///
/// - `version` and `poll` echo the request
/// - `mode` is `Server`, leap indicator is "no warning"
/// - stratum, precision and reference id come from `config`; root delay and dispersion are zero
/// - receive and transmit timestamps are both `manipulated`
/// - the reference timestamp is one second before `manipulated`
/// - `origin_timestamp` echoes the client's transmit timestamp verbatim
///
/// The request is never modified; the response is a fresh packet.
pub fn build_response(
    request: &protocol::Packet,
    config: &ServerConfig,
    manipulated: unix_time::Instant,
) -> protocol::Packet {
    let now: protocol::TimestampFormat = manipulated.into();
    protocol::Packet {
        leap_indicator: protocol::LeapIndicator::NoWarning,
        version: request.version,
        mode: protocol::Mode::Server,
        stratum: config.stratum,
        poll: request.poll,
        precision: config.precision,
        root_delay: protocol::ShortFormat::default(),
        root_dispersion: protocol::ShortFormat::default(),
        reference_id: config.reference_id,
        reference_timestamp: now.wrapping_sub_seconds(1),
        origin_timestamp: request.transmit_timestamp,
        receive_timestamp: now,
        transmit_timestamp: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{ReferenceId, Stratum, TimestampFormat, Version};

    fn client_request() -> protocol::Packet {
        protocol::Packet {
            version: Version::V3,
            poll: 6,
            precision: -6,
            stratum: Stratum(3),
            reference_id: ReferenceId(*b"XXXX"),
            transmit_timestamp: TimestampFormat {
                seconds: 3_913_056_000,
                fraction: 12345,
            },
            ..protocol::Packet::default()
        }
    }

    fn chao_config() -> ServerConfig {
        ServerConfig {
            stratum: Stratum(1),
            reference_id: ReferenceId::from_ascii("CHAO"),
            precision: -20,
            ..ServerConfig::default()
        }
    }

    #[test]
    fn test_response_header_fields() {
        let request = client_request();
        let response = build_response(&request, &chao_config(), unix_time::Instant::new(0, 0));
        assert_eq!(response.mode, protocol::Mode::Server);
        assert_eq!(response.version, Version::V3);
        assert_eq!(response.poll, 6);
        assert_eq!(response.precision, -20);
        assert_eq!(response.stratum, Stratum(1));
        assert_eq!(response.reference_id.as_bytes(), *b"CHAO");
        assert_eq!(response.leap_indicator, protocol::LeapIndicator::NoWarning);
        assert_eq!(response.root_delay, protocol::ShortFormat::default());
        assert_eq!(response.root_dispersion, protocol::ShortFormat::default());
    }

    #[test]
    fn test_response_timestamps() {
        let request = client_request();
        let manipulated = unix_time::Instant::new(1_704_067_200, 500_000_000);
        let response = build_response(&request, &chao_config(), manipulated);

        let expected: TimestampFormat = manipulated.into();
        assert_eq!(response.transmit_timestamp, expected);
        assert_eq!(response.receive_timestamp, expected);
        assert_eq!(response.origin_timestamp, request.transmit_timestamp);
        assert_eq!(
            response.reference_timestamp.to_u64(),
            expected.to_u64() - protocol::ONE_SECOND_FIXED
        );
        assert_eq!(response.transmit_timestamp.fraction, 0x8000_0000);
    }

    #[test]
    fn test_short_reference_id_is_zero_padded() {
        let config = ServerConfig {
            reference_id: ReferenceId::from_ascii("GP"),
            ..chao_config()
        };
        let response = build_response(&client_request(), &config, unix_time::Instant::new(0, 0));
        let wire = protocol::serialize(&response);
        assert_eq!(&wire[12..16], b"GP\0\0");
    }

    #[test]
    fn test_request_is_untouched() {
        let request = client_request();
        let copy = request;
        let _ = build_response(&request, &chao_config(), unix_time::Instant::new(5, 0));
        assert_eq!(request, copy);
    }
}
