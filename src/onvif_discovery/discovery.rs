//! WS-Discovery probe round

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use tracing::{debug, info};

use super::envelope::{parse_probe_matches, ProbeMessage};
use crate::error::Result;
use crate::models::Device;
use crate::transport::{bind_multicast_sender, recv_until, WS_DISCOVERY_ADDR};

pub const DEFAULT_DISCOVERY_WINDOW: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryState {
    Idle,
    ProbeSent,
    Listening,
    Done,
}

/// One probe/listen cycle. A finished round can be run again.
pub struct OnvifDiscovery {
    window: Duration,
    target: SocketAddr,
    state: DiscoveryState,
}

impl OnvifDiscovery {
    pub fn new(window: Duration) -> Self {
        Self::with_target(window, SocketAddr::V4(WS_DISCOVERY_ADDR))
    }

    /// Probe a specific address instead of the multicast group
    pub fn with_target(window: Duration, target: SocketAddr) -> Self {
        Self {
            window,
            target,
            state: DiscoveryState::Idle,
        }
    }

    pub fn state(&self) -> DiscoveryState {
        self.state
    }

    /// Send one probe and collect replies for the listen window.
    ///
    /// Devices are deduplicated by IP (first reply wins). Malformed or
    /// unrelated datagrams are dropped.
    pub async fn run(&mut self) -> Result<Vec<Device>> {
        self.state = DiscoveryState::Idle;
        let socket = bind_multicast_sender().await?;
        let probe = ProbeMessage::new();

        socket.send_to(probe.to_xml().as_bytes(), self.target).await?;
        self.state = DiscoveryState::ProbeSent;
        debug!(target = %self.target, message_id = %probe.message_id, "WS-Discovery probe sent");

        self.state = DiscoveryState::Listening;
        let mut devices: HashMap<IpAddr, Device> = HashMap::new();
        let mut order: Vec<IpAddr> = Vec::new();

        let listened = recv_until(&socket, self.window, |datagram, from| {
            let Ok(text) = std::str::from_utf8(datagram) else {
                debug!(from = %from, "Non UTF-8 discovery datagram dropped");
                return true;
            };
            for m in parse_probe_matches(text, Some(&probe.message_id)) {
                let Some(device) = m.to_device() else {
                    continue;
                };
                if !devices.contains_key(&device.ip) {
                    debug!(ip = %device.ip, service_url = ?device.service_url, "ONVIF device answered");
                    order.push(device.ip);
                    devices.insert(device.ip, device);
                }
            }
            true
        })
        .await;
        self.state = DiscoveryState::Done;
        listened?;

        let found: Vec<Device> = order.into_iter().filter_map(|ip| devices.remove(&ip)).collect();
        info!(devices = found.len(), window_ms = self.window.as_millis() as u64, "WS-Discovery finished");
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::onvif_discovery::xml::extract_xml_value;
    use tokio::net::UdpSocket;

    fn reply(relates_to: &str, ip: &str, uuid: &str) -> String {
        format!(
            "<e:Envelope><e:Header><a:RelatesTo>{}</a:RelatesTo></e:Header><e:Body><d:ProbeMatches><d:ProbeMatch>\
             <a:EndpointReference><a:Address>urn:uuid:{}</a:Address></a:EndpointReference>\
             <d:Scopes>onvif://www.onvif.org/mfr/Reolink</d:Scopes>\
             <d:XAddrs>http://{}:8000/onvif/device_service</d:XAddrs></d:ProbeMatch></d:ProbeMatches></e:Body></e:Envelope>",
            relates_to, uuid, ip
        )
    }

    /// Loopback responder answering the probe with a fixed set of datagrams
    async fn responder() -> SocketAddr {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        tokio::spawn(async move {
            let mut buf = vec![0u8; 8192];
            let (n, from) = socket.recv_from(&mut buf).await.unwrap();
            let probe = String::from_utf8_lossy(&buf[..n]).to_string();
            let id = extract_xml_value(&probe, "MessageID").unwrap();

            let datagrams = [
                reply(&id, "192.168.1.108", "00000000-0000-0000-0000-ec71db000001"),
                reply(&id, "192.168.1.108", "00000000-0000-0000-0000-ec71db000001"),
                reply("urn:uuid:someone-else", "192.168.1.200", "00000000-0000-0000-0000-000000000002"),
                "garbage".to_string(),
                reply(&id, "192.168.1.109", "00000000-0000-0000-0000-000000000000"),
            ];
            for d in datagrams {
                socket.send_to(d.as_bytes(), from).await.unwrap();
            }
            socket.send_to(&[0xff, 0xfe, 0x00], from).await.unwrap();
        });
        addr
    }

    #[tokio::test]
    async fn test_round_against_loopback() {
        let target = responder().await;
        let mut discovery = OnvifDiscovery::with_target(Duration::from_millis(500), target);
        assert_eq!(discovery.state(), DiscoveryState::Idle);

        let devices = discovery.run().await.unwrap();
        assert_eq!(discovery.state(), DiscoveryState::Done);

        let ips: Vec<String> = devices.iter().map(|d| d.ip.to_string()).collect();
        assert_eq!(ips, vec!["192.168.1.108", "192.168.1.109"]);

        assert_eq!(devices[0].mac.as_deref(), Some("EC:71:DB:00:00:01"));
        assert_eq!(devices[0].manufacturer.as_deref(), Some("Reolink"));
        assert!(devices[0].onvif_ports.contains(&8000));
        assert_eq!(devices[1].mac, None);
    }

    #[tokio::test]
    async fn test_silent_network() {
        let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let target = silent.local_addr().unwrap();
        let mut discovery = OnvifDiscovery::with_target(Duration::from_millis(150), target);
        let devices = discovery.run().await.unwrap();
        assert!(devices.is_empty());
        assert_eq!(discovery.state(), DiscoveryState::Done);
        drop(silent);
    }
}
