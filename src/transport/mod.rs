//! Transport primitives
//!
//! TCP connect probing, the RTSP text-protocol client and UDP sockets
//! (WS-Discovery multicast, RTP receive).

mod rtsp;
mod tcp;
mod udp;

pub use rtsp::{read_response, RtspConnection, RtspRequest, RtspResponse, USER_AGENT};
pub use tcp::{connect_with_timeout, probe_port, PortProbe, PortScanResult};
pub use udp::{bind_ephemeral, bind_multicast_sender, recv_until, WS_DISCOVERY_ADDR};
