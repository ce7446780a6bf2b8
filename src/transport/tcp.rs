use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};

use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::error::{Error, Result};

/// Outcome of a single connect attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortProbe {
    Open,
    Refused,
    Timeout,
}

/// Port scan result
#[derive(Debug, Clone)]
pub struct PortScanResult {
    pub ip: IpAddr,
    pub port: u16,
    pub probe: PortProbe,
    pub latency_ms: Option<u64>,
}

impl PortScanResult {
    pub fn is_open(&self) -> bool {
        self.probe == PortProbe::Open
    }
}

/// TCP connect probe; the socket is dropped immediately
pub async fn probe_port(ip: IpAddr, port: u16, connect_timeout: Duration) -> PortScanResult {
    let addr = SocketAddr::new(ip, port);
    let start = Instant::now();

    let (probe, latency_ms) = match timeout(connect_timeout, TcpStream::connect(addr)).await {
        Ok(Ok(_)) => (PortProbe::Open, Some(start.elapsed().as_millis() as u64)),
        Ok(Err(_)) => (PortProbe::Refused, None),
        Err(_) => (PortProbe::Timeout, None),
    };

    PortScanResult {
        ip,
        port,
        probe,
        latency_ms,
    }
}

pub async fn connect_with_timeout(addr: SocketAddr, connect_timeout: Duration) -> Result<TcpStream> {
    match timeout(connect_timeout, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => {
            // RTSP requests are small; don't wait on Nagle
            let _ = stream.set_nodelay(true);
            Ok(stream)
        }
        Ok(Err(e)) => Err(Error::Network(format!("connect {} failed: {}", addr, e))),
        Err(_) => Err(Error::Timeout(format!(
            "connect {} ({}ms)",
            addr,
            connect_timeout.as_millis()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_probe_open_and_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let ip: IpAddr = "127.0.0.1".parse().unwrap();

        let open = probe_port(ip, port, Duration::from_millis(500)).await;
        assert!(open.is_open());
        assert!(open.latency_ms.is_some());

        drop(listener);
        let closed = probe_port(ip, port, Duration::from_millis(500)).await;
        assert!(!closed.is_open());
    }
}
