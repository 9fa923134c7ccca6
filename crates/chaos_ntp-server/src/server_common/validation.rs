use crate::error::ProtocolError;
use crate::protocol;

/// Validate an incoming request datagram.
///
/// Only two checks are made:
/// - at least 48 bytes (anything after the header is ignored)
/// - mode is Client (3)
///
/// Version, stratum and timestamps are not inspected. Returns the parsed packet on success.
pub(crate) fn validate_client_request(recv_buf: &[u8]) -> Result<protocol::Packet, ProtocolError> {
    let request = protocol::parse(recv_buf)?;

    if request.mode != protocol::Mode::Client {
        return Err(ProtocolError::UnsupportedMode {
            mode: request.mode.value(),
        });
    }

    Ok(request)
}
