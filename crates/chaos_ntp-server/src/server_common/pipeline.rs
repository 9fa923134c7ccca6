use std::net::IpAddr;

use log::{debug, warn};

use crate::error::ProtocolError;
use crate::protocol;
use crate::tracker::{Manipulation, TimeTracker};

use super::{ServerConfig, ServerMetrics, build_response, validate_client_request};

/// A request that passed validation, together with everything needed to answer and report it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Answer {
    /// The serialized response, ready to be written to the socket.
    pub wire: [u8; protocol::PACKET_SIZE],
    /// The request as parsed.
    pub request: protocol::Packet,
    /// The response as built.
    pub response: protocol::Packet,
    /// The tracker transition that produced the response time.
    pub manipulation: Manipulation,
}

/// The complete result of handling a datagram.
#[derive(Clone, Debug, PartialEq)]
pub enum HandleResult {
    /// Send `answer.wire` back to the client.
    Response(Box<Answer>),
    /// Drop the datagram. The tracker was not touched.
    Drop(ProtocolError),
}

/// Handle a single incoming datagram (pure logic, no I/O).
///
/// Validation failures are logged at `warn` and never reach the tracker, so a non-client
/// request leaves that client's state exactly as it was.
pub fn handle_request(
    recv_buf: &[u8],
    src_ip: IpAddr,
    config: &ServerConfig,
    tracker: &TimeTracker,
    metrics: Option<&ServerMetrics>,
) -> HandleResult {
    if let Some(m) = metrics {
        m.inc_requests_received();
    }

    // 1. Validate the request.
    let request = match validate_client_request(recv_buf) {
        Ok(req) => req,
        Err(e) => {
            warn!("dropping request from {}: {}", src_ip, e);
            if let Some(m) = metrics {
                match e {
                    ProtocolError::MalformedPacket { .. } => m.inc_malformed_dropped(),
                    ProtocolError::UnsupportedMode { .. } => m.inc_unsupported_mode_dropped(),
                }
            }
            return HandleResult::Drop(e);
        }
    };

    // 2. Advance this client's fake clock.
    let manipulation = tracker.manipulated_time(src_ip);

    // 3. Build and serialize the response.
    let response = build_response(&request, config, manipulation.manipulated);
    let wire = protocol::serialize(&response);

    debug!(
        "answering {} ({}): offset {:.3}s",
        src_ip,
        if manipulation.is_initial {
            "initial"
        } else {
            "subsequent"
        },
        manipulation.offset_seconds
    );

    HandleResult::Response(Box::new(Answer {
        wire,
        request,
        response,
        manipulation,
    }))
}
