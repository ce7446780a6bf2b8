use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::{timeout_at, Instant};

use crate::error::Result;

/// WS-Discovery multicast group
pub const WS_DISCOVERY_ADDR: SocketAddrV4 = SocketAddrV4::new(Ipv4Addr::new(239, 255, 255, 250), 3702);

/// Socket for sending one multicast probe and receiving unicast replies on it
pub async fn bind_multicast_sender() -> Result<UdpSocket> {
    let socket = UdpSocket::bind(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0)).await?;
    socket.set_multicast_ttl_v4(4)?;
    Ok(socket)
}

/// Ephemeral local UDP socket (RTP client port)
pub async fn bind_ephemeral() -> Result<UdpSocket> {
    Ok(UdpSocket::bind(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0)).await?)
}

/// Receive datagrams until `window` elapses or `on_datagram` returns false
pub async fn recv_until<F>(socket: &UdpSocket, window: Duration, mut on_datagram: F) -> Result<()>
where
    F: FnMut(&[u8], SocketAddr) -> bool,
{
    let deadline = Instant::now() + window;
    let mut buf = vec![0u8; 65_535];

    loop {
        match timeout_at(deadline, socket.recv_from(&mut buf)).await {
            Ok(Ok((n, from))) => {
                if !on_datagram(&buf[..n], from) {
                    return Ok(());
                }
            }
            // ICMP port unreachable etc. surfaces as a recv error on some platforms
            Ok(Err(e)) => {
                tracing::debug!(error = %e, "UDP recv error ignored");
            }
            Err(_) => return Ok(()),
        }
    }
}
