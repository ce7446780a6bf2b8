//! WS-Discovery probe/response envelopes and device-service SOAP bodies

use std::net::IpAddr;

use url::Url;
use uuid::Uuid;

use super::xml::{extract_section, extract_sections, extract_xml_value};
use crate::auth_codec::UsernameToken;
use crate::models::Device;
use crate::network_scanner::{classify_port, record_open_port, PortRole};

pub const PROBE_ACTION: &str = "http://schemas.xmlsoap.org/ws/2005/04/discovery/Probe";
pub const DISCOVERY_TO: &str = "urn:schemas-xmlsoap-org:ws:2005:04:discovery";
pub const DEVICE_WSDL: &str = "http://www.onvif.org/ver10/device/wsdl";
pub const MEDIA_WSDL: &str = "http://www.onvif.org/ver10/media/wsdl";

// ============================================================================
// Probe
// ============================================================================

/// One outgoing multicast probe
#[derive(Debug, Clone)]
pub struct ProbeMessage {
    pub message_id: String,
}

impl ProbeMessage {
    pub fn new() -> Self {
        Self {
            message_id: format!("urn:uuid:{}", Uuid::new_v4()),
        }
    }

    pub fn to_xml(&self) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<s:Envelope xmlns:s="http://www.w3.org/2003/05/soap-envelope" xmlns:a="http://schemas.xmlsoap.org/ws/2004/08/addressing" xmlns:d="http://schemas.xmlsoap.org/ws/2005/04/discovery" xmlns:dn="http://www.onvif.org/ver10/network/wsdl">
  <s:Header>
    <a:Action s:mustUnderstand="1">{action}</a:Action>
    <a:MessageID>{id}</a:MessageID>
    <a:ReplyTo><a:Address>http://schemas.xmlsoap.org/ws/2004/08/addressing/role/anonymous</a:Address></a:ReplyTo>
    <a:To s:mustUnderstand="1">{to}</a:To>
  </s:Header>
  <s:Body>
    <d:Probe><d:Types>dn:NetworkVideoTransmitter</d:Types></d:Probe>
  </s:Body>
</s:Envelope>"#,
            action = PROBE_ACTION,
            id = self.message_id,
            to = DISCOVERY_TO,
        )
    }
}

impl Default for ProbeMessage {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// ProbeMatch
// ============================================================================

/// One `ProbeMatch` from a discovery reply
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProbeMatch {
    /// `EndpointReference/Address`, usually `urn:uuid:...`
    pub endpoint: Option<String>,
    pub types: Option<String>,
    pub scopes: Vec<String>,
    pub xaddrs: Vec<String>,
}

/// Parse a discovery datagram.
///
/// Replies whose `RelatesTo` names a different probe are dropped, as are
/// matches without any service address. Anything unparseable yields an
/// empty list.
pub fn parse_probe_matches(xml: &str, message_id: Option<&str>) -> Vec<ProbeMatch> {
    if let (Some(expected), Some(relates)) = (message_id, extract_xml_value(xml, "RelatesTo")) {
        if relates != expected {
            return Vec::new();
        }
    }

    extract_sections(xml, "ProbeMatch")
        .into_iter()
        .filter_map(|section| {
            let xaddrs: Vec<String> = extract_xml_value(section, "XAddrs")
                .map(|v| v.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default();
            if xaddrs.is_empty() {
                return None;
            }
            let endpoint = extract_section(section, "EndpointReference")
                .and_then(|epr| extract_xml_value(epr, "Address"));
            let scopes = extract_xml_value(section, "Scopes")
                .map(|v| v.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default();
            Some(ProbeMatch {
                endpoint,
                types: extract_xml_value(section, "Types"),
                scopes,
                xaddrs,
            })
        })
        .collect()
}

impl ProbeMatch {
    /// First advertised service address
    pub fn service_url(&self) -> Option<&str> {
        self.xaddrs.first().map(String::as_str)
    }

    /// Host of the first service address
    pub fn ip(&self) -> Option<IpAddr> {
        let url = Url::parse(self.service_url()?).ok()?;
        match url.host()? {
            url::Host::Ipv4(v4) => Some(IpAddr::V4(v4)),
            url::Host::Ipv6(v6) => Some(IpAddr::V6(v6)),
            url::Host::Domain(d) => d.parse().ok(),
        }
    }

    /// Port of the first service address (scheme default when absent)
    pub fn service_port(&self) -> Option<u16> {
        Url::parse(self.service_url()?).ok()?.port_or_known_default()
    }

    /// Best-effort MAC from the endpoint UUID's trailing 12 hex digits
    pub fn mac_from_endpoint(&self) -> Option<String> {
        let endpoint = self.endpoint.as_deref()?;
        let hex: Vec<char> = endpoint.chars().filter(|c| c.is_ascii_hexdigit()).collect();
        if hex.len() < 12 {
            return None;
        }
        let tail: String = hex[hex.len() - 12..].iter().collect::<String>().to_uppercase();
        if tail.chars().all(|c| c == '0') {
            return None;
        }
        let octets: Vec<&str> = (0..6).map(|i| &tail[i * 2..i * 2 + 2]).collect();
        Some(octets.join(":"))
    }

    pub fn scope_info(&self) -> ScopeInfo {
        ScopeInfo::parse(&self.scopes)
    }

    /// Device seeded from this match
    pub fn to_device(&self) -> Option<Device> {
        let ip = self.ip()?;
        let mut device = Device::new(ip);
        device.service_url = self.service_url().map(str::to_string);
        device.mac = self.mac_from_endpoint();
        device.scopes = self.scopes.clone();
        if let Some(port) = self.service_port() {
            // ONVIF on a vendor-signal port (Hikvision 8000) still flags an NVR
            match classify_port(port) {
                Some(PortRole::Web) | None => {
                    device.onvif_ports.insert(port);
                }
                Some(_) => record_open_port(&mut device, port),
            }
        }

        let scope = self.scope_info();
        device.manufacturer = scope.manufacturer.or(scope.name);
        device.model = scope.hardware;
        Some(device)
    }
}

// ============================================================================
// Scopes
// ============================================================================

/// Values from `onvif://www.onvif.org/<kind>/<value>` scopes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScopeInfo {
    pub name: Option<String>,
    pub hardware: Option<String>,
    pub manufacturer: Option<String>,
}

impl ScopeInfo {
    pub fn parse(scopes: &[String]) -> Self {
        let mut info = Self::default();
        for scope in scopes {
            let Some(rest) = scope.strip_prefix("onvif://www.onvif.org/") else {
                continue;
            };
            let Some((kind, value)) = rest.split_once('/') else {
                continue;
            };
            let value = percent_decode(value);
            if value.is_empty() {
                continue;
            }
            let slot = match kind {
                "name" => &mut info.name,
                "hardware" => &mut info.hardware,
                "mfr" | "manufacturer" => &mut info.manufacturer,
                _ => continue,
            };
            slot.get_or_insert(value);
        }
        info
    }
}

fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            if let Some(b) = s.get(i + 1..i + 3).and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(b);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).trim().to_string()
}

// ============================================================================
// Device service requests
// ============================================================================

/// SOAP 1.2 envelope with an optional WS-Security header
pub fn soap_envelope(security: Option<&UsernameToken>, body: &str) -> String {
    let header = security
        .map(|t| format!("<s:Header>{}</s:Header>", t.to_xml()))
        .unwrap_or_default();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<s:Envelope xmlns:s="http://www.w3.org/2003/05/soap-envelope">{}<s:Body>{}</s:Body></s:Envelope>"#,
        header, body
    )
}

/// Device/media service operations used for enrichment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SoapOperation {
    GetDeviceInformation,
    GetHostname,
    GetNetworkInterfaces,
    GetCapabilities,
    GetVideoSources,
}

impl SoapOperation {
    pub fn name(self) -> &'static str {
        match self {
            SoapOperation::GetDeviceInformation => "GetDeviceInformation",
            SoapOperation::GetHostname => "GetHostname",
            SoapOperation::GetNetworkInterfaces => "GetNetworkInterfaces",
            SoapOperation::GetCapabilities => "GetCapabilities",
            SoapOperation::GetVideoSources => "GetVideoSources",
        }
    }

    fn namespace(self) -> &'static str {
        match self {
            SoapOperation::GetVideoSources => MEDIA_WSDL,
            _ => DEVICE_WSDL,
        }
    }

    pub fn body(self) -> String {
        match self {
            SoapOperation::GetCapabilities => format!(
                r#"<GetCapabilities xmlns="{}"><Category>All</Category></GetCapabilities>"#,
                self.namespace()
            ),
            _ => format!(r#"<{} xmlns="{}"/>"#, self.name(), self.namespace()),
        }
    }

    /// SOAP 1.2 action for the `Content-Type` header
    pub fn action(self) -> String {
        format!("{}/{}", self.namespace(), self.name())
    }
}
