//! RTP packet validation
//!
//! DESCRIBE -> SETUP (UDP client port) -> PLAY, then count packets carrying
//! RTP version 2. TEARDOWN is always attempted once the session is open.

use std::time::Duration;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tokio::time::timeout;

use super::sdp::{resolve_control, validate_sdp};
use super::session::RtspSession;
use super::types::{StreamTarget, ValidationMethod, ValidationOutcome};
use super::validator::{status_rejection, StreamValidator};
use crate::transport::{bind_ephemeral, recv_until};

/// Packets needed inside the window
pub const MIN_RTP_PACKETS: usize = 5;
/// Packet collection window after PLAY
pub const RTP_WINDOW: Duration = Duration::from_secs(2);
const TEARDOWN_TIMEOUT: Duration = Duration::from_secs(1);

/// Version bits (top two bits of byte 0) must be `10`; 12-byte fixed header
pub fn is_rtp_packet(packet: &[u8]) -> bool {
    packet.len() >= 12 && packet[0] >> 6 == 2
}

pub async fn count_rtp_packets(socket: &UdpSocket, window: Duration, wanted: usize) -> usize {
    let mut count = 0usize;
    let result = recv_until(socket, window, |packet, _| {
        if is_rtp_packet(packet) {
            count += 1;
        }
        count < wanted
    })
    .await;
    if let Err(e) = result {
        tracing::debug!(error = %e, "RTP receive failed");
    }
    count
}

pub struct RtpValidator {
    timeout: Duration,
    window: Duration,
    min_packets: usize,
}

impl RtpValidator {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            window: RTP_WINDOW,
            min_packets: MIN_RTP_PACKETS,
        }
    }

    async fn run(&self, target: &StreamTarget) -> ValidationOutcome {
        let url = target.url();
        let mut session = match RtspSession::open(target.addr(), target.credential.as_ref(), self.timeout).await {
            Ok(s) => s,
            Err(e) => return ValidationOutcome::from_error(&e),
        };

        // The deadline covers DESCRIBE through packet counting; TEARDOWN
        // still goes out on expiry
        let deadline = self.timeout + self.window;
        let outcome = match timeout(deadline, self.play_and_count(&mut session, &url)).await {
            Ok(outcome) => outcome,
            Err(_) => ValidationOutcome::NetworkError(format!("RTP validation timeout ({}ms)", deadline.as_millis())),
        };

        let _ = timeout(TEARDOWN_TIMEOUT, session.teardown(&url)).await;
        outcome
    }

    async fn play_and_count(&self, session: &mut RtspSession, url: &str) -> ValidationOutcome {
        let describe = match session
            .request("DESCRIBE", url, &[("Accept", "application/sdp".to_string())])
            .await
        {
            Ok(r) => r,
            Err(e) => return ValidationOutcome::from_error(&e),
        };
        if !describe.is_success() {
            return status_rejection("DESCRIBE", &describe);
        }
        let sdp = match validate_sdp(&describe.body) {
            Ok(info) => info,
            Err(reason) => return ValidationOutcome::Rejected(reason),
        };

        let base = describe
            .header("Content-Base")
            .map(str::to_string)
            .unwrap_or_else(|| url.to_string());
        let control = resolve_control(&base, sdp.video_control.as_deref());

        let socket = match bind_ephemeral().await {
            Ok(s) => s,
            Err(e) => return ValidationOutcome::NetworkError(format!("RTP socket: {}", e)),
        };
        let rtp_port = match socket.local_addr() {
            Ok(a) => a.port(),
            Err(e) => return ValidationOutcome::NetworkError(format!("RTP socket: {}", e)),
        };

        let transport = format!(
            "RTP/AVP;unicast;client_port={}-{}",
            rtp_port,
            rtp_port.wrapping_add(1)
        );
        let setup = match session.request("SETUP", &control, &[("Transport", transport)]).await {
            Ok(r) => r,
            Err(e) => return ValidationOutcome::from_error(&e),
        };
        if !setup.is_success() {
            return status_rejection("SETUP", &setup);
        }
        let Some(session_id) = setup.session_id() else {
            return ValidationOutcome::Rejected("SETUP response without Session header".to_string());
        };
        session.set_session_id(session_id.clone());

        let play = match session
            .request(
                "PLAY",
                &base,
                &[("Session", session_id), ("Range", "npt=0.000-".to_string())],
            )
            .await
        {
            Ok(r) => r,
            Err(e) => return ValidationOutcome::from_error(&e),
        };
        if !play.is_success() {
            return status_rejection("PLAY", &play);
        }

        let count = count_rtp_packets(&socket, self.window, self.min_packets).await;
        if count >= self.min_packets {
            tracing::debug!(url = %url, packets = count, "RTP flow confirmed");
            ValidationOutcome::Confirmed
        } else {
            ValidationOutcome::NetworkError(format!(
                "{} RTP packets in {}ms (need {})",
                count,
                self.window.as_millis(),
                self.min_packets
            ))
        }
    }
}

#[async_trait]
impl StreamValidator for RtpValidator {
    fn method(&self) -> ValidationMethod {
        ValidationMethod::RtpPacket
    }

    async fn validate(&self, target: &StreamTarget) -> ValidationOutcome {
        self.run(target).await
    }
}
