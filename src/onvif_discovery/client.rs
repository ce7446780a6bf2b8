//! Authenticated ONVIF device/media service calls over SOAP
//!
//! The HTTP client here accepts any certificate and host name; it is built
//! for this client only and never shared with other components.

use std::net::IpAddr;
use std::time::Duration;

use tracing::{debug, info};

use super::envelope::{soap_envelope, SoapOperation};
use super::xml::{
    extract_capability_xaddr, extract_elements, extract_section, extract_sections, extract_xml_attribute,
    extract_xml_value, is_auth_fault,
};
use crate::auth_codec::UsernameToken;
use crate::error::{Error, Result};
use crate::models::{Credential, Device, VideoSource};
use crate::transport::USER_AGENT;

/// Fields from GetDeviceInformation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceInformation {
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub firmware_version: Option<String>,
    pub serial_number: Option<String>,
    pub hardware_id: Option<String>,
}

impl DeviceInformation {
    fn is_empty(&self) -> bool {
        self.manufacturer.is_none() && self.model.is_none()
    }
}

pub struct OnvifClient {
    http: reqwest::Client,
}

impl OnvifClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .danger_accept_invalid_certs(true)
            .danger_accept_invalid_hostnames(true)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self { http })
    }

    /// POST one SOAP operation. A fresh UsernameToken is built per call.
    pub async fn call(&self, url: &str, op: SoapOperation, credential: Option<&Credential>) -> Result<String> {
        let token = credential.map(UsernameToken::generate);
        let envelope = soap_envelope(token.as_ref(), &op.body());

        let response = self
            .http
            .post(url)
            .header(
                reqwest::header::CONTENT_TYPE,
                format!(r#"application/soap+xml; charset=utf-8; action="{}""#, op.action()),
            )
            .body(envelope)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN || is_auth_fault(&body)
        {
            return Err(Error::Auth(format!("{} refused ({})", op.name(), status)));
        }
        if !status.is_success() {
            return Err(Error::Protocol(format!("{} returned HTTP {}", op.name(), status)));
        }
        Ok(body)
    }

    pub async fn device_information(&self, url: &str, credential: Option<&Credential>) -> Result<DeviceInformation> {
        let body = self.call(url, SoapOperation::GetDeviceInformation, credential).await?;
        let info = parse_device_information(&body);
        if info.is_empty() {
            return Err(Error::Parse("GetDeviceInformation without manufacturer or model".to_string()));
        }
        Ok(info)
    }

    pub async fn hostname(&self, url: &str, credential: Option<&Credential>) -> Result<Option<String>> {
        let body = self.call(url, SoapOperation::GetHostname, credential).await?;
        Ok(parse_hostname(&body))
    }

    pub async fn hardware_mac(&self, url: &str, credential: Option<&Credential>) -> Result<Option<String>> {
        let body = self.call(url, SoapOperation::GetNetworkInterfaces, credential).await?;
        Ok(parse_hw_address(&body))
    }

    /// Media service XAddr from GetCapabilities
    pub async fn media_xaddr(&self, url: &str, credential: Option<&Credential>) -> Result<Option<String>> {
        let body = self.call(url, SoapOperation::GetCapabilities, credential).await?;
        Ok(extract_capability_xaddr(&body, "Media"))
    }

    pub async fn video_sources(&self, media_url: &str, credential: Option<&Credential>) -> Result<Vec<VideoSource>> {
        let body = self.call(media_url, SoapOperation::GetVideoSources, credential).await?;
        Ok(parse_video_sources(&body))
    }

    /// Fill identity fields of `device` from its device service.
    ///
    /// Credentials are tried in order; the first one that yields device
    /// information is returned as a hint for the RTSP trial order. When
    /// none works an anonymous query is attempted. Every failure is logged
    /// and swallowed.
    pub async fn enrich(&self, device: &mut Device, credentials: &[Credential]) -> Option<Credential> {
        let endpoints = service_endpoints(device);
        if endpoints.is_empty() {
            return None;
        }

        let mut attempts: Vec<Option<&Credential>> = credentials.iter().map(Some).collect();
        attempts.push(None);

        for url in &endpoints {
            for credential in &attempts {
                match self.device_information(url, *credential).await {
                    Ok(info) => {
                        info!(
                            ip = %device.ip,
                            url = %url,
                            manufacturer = info.manufacturer.as_deref().unwrap_or(""),
                            model = info.model.as_deref().unwrap_or(""),
                            "ONVIF device information"
                        );
                        apply_information(device, info);
                        device.service_url = Some(url.clone());
                        self.enrich_details(device, url, *credential).await;
                        return credential.cloned();
                    }
                    Err(e) if e.is_transient() => {
                        debug!(ip = %device.ip, url = %url, error = %e, "ONVIF endpoint unreachable");
                        break;
                    }
                    Err(e) => {
                        debug!(
                            ip = %device.ip,
                            url = %url,
                            username = credential.map(|c| c.username.as_str()).unwrap_or(""),
                            error = %e,
                            "ONVIF query failed"
                        );
                    }
                }
            }
        }
        None
    }

    async fn enrich_details(&self, device: &mut Device, url: &str, credential: Option<&Credential>) {
        match self.hostname(url, credential).await {
            Ok(Some(h)) => device.hostname = Some(h),
            Ok(None) => {}
            Err(e) => debug!(ip = %device.ip, error = %e, "GetHostname failed"),
        }

        match self.hardware_mac(url, credential).await {
            Ok(Some(mac)) => device.mac = Some(mac),
            Ok(None) => {}
            Err(e) => debug!(ip = %device.ip, error = %e, "GetNetworkInterfaces failed"),
        }

        let media_url = match self.media_xaddr(url, credential).await {
            Ok(Some(m)) => m,
            Ok(None) => url.to_string(),
            Err(e) => {
                debug!(ip = %device.ip, error = %e, "GetCapabilities failed");
                url.to_string()
            }
        };

        match self.video_sources(&media_url, credential).await {
            Ok(sources) => device.video_sources = sources,
            Err(e) => debug!(ip = %device.ip, error = %e, "GetVideoSources failed"),
        }
    }
}

/// Known service URL first, then the conventional path on each web port
pub fn service_endpoints(device: &Device) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    if let Some(url) = &device.service_url {
        out.push(url.clone());
    }
    for &port in &device.onvif_ports {
        let url = default_service_url(device.ip, port);
        if !out.contains(&url) {
            out.push(url);
        }
    }
    out
}

fn default_service_url(ip: IpAddr, port: u16) -> String {
    let scheme = if matches!(port, 443 | 8443) { "https" } else { "http" };
    let host = match ip {
        IpAddr::V4(v4) => v4.to_string(),
        IpAddr::V6(v6) => format!("[{}]", v6),
    };
    format!("{}://{}:{}/onvif/device_service", scheme, host, port)
}

fn apply_information(device: &mut Device, info: DeviceInformation) {
    if info.manufacturer.is_some() {
        device.manufacturer = info.manufacturer;
    }
    if info.model.is_some() {
        device.model = info.model;
    }
    if info.firmware_version.is_some() {
        device.firmware_version = info.firmware_version;
    }
    if info.serial_number.is_some() {
        device.serial_number = info.serial_number;
    }
}

pub fn parse_device_information(xml: &str) -> DeviceInformation {
    DeviceInformation {
        manufacturer: extract_xml_value(xml, "Manufacturer"),
        model: extract_xml_value(xml, "Model"),
        firmware_version: extract_xml_value(xml, "FirmwareVersion"),
        serial_number: extract_xml_value(xml, "SerialNumber"),
        hardware_id: extract_xml_value(xml, "HardwareId"),
    }
}

pub fn parse_hostname(xml: &str) -> Option<String> {
    let info = extract_section(xml, "HostnameInformation")?;
    extract_xml_value(info, "Name")
}

/// First non-zero `HwAddress`, normalised to `AA:BB:CC:DD:EE:FF`
pub fn parse_hw_address(xml: &str) -> Option<String> {
    extract_sections(xml, "HwAddress").into_iter().find_map(|raw| {
        let hex: String = raw.chars().filter(|c| c.is_ascii_hexdigit()).collect::<String>().to_uppercase();
        if hex.len() != 12 || hex.chars().all(|c| c == '0') {
            return None;
        }
        Some((0..6).map(|i| &hex[i * 2..i * 2 + 2]).collect::<Vec<_>>().join(":"))
    })
}

pub fn parse_video_sources(xml: &str) -> Vec<VideoSource> {
    extract_elements(xml, "VideoSources")
        .into_iter()
        .map(|(head, section)| {
            let resolution = extract_section(section, "Resolution");
            VideoSource {
                token: extract_xml_attribute(head, "VideoSources", "token").unwrap_or_default(),
                width: resolution.and_then(|r| extract_xml_value(r, "Width")).and_then(|v| v.parse().ok()),
                height: resolution.and_then(|r| extract_xml_value(r, "Height")).and_then(|v| v.parse().ok()),
                frame_rate: extract_xml_value(section, "Framerate").and_then(|v| v.parse().ok()),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use base64::Engine;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;
    use crate::auth_codec::password_digest;

    const VIDEO_SOURCES: &str = r#"<env:Envelope><env:Body><trt:GetVideoSourcesResponse>
<trt:VideoSources token="VideoSource_1"><tt:Framerate>25</tt:Framerate><tt:Resolution><tt:Width>2560</tt:Width><tt:Height>1440</tt:Height></tt:Resolution></trt:VideoSources>
<trt:VideoSources token="VideoSource_2"><tt:Framerate>12.5</tt:Framerate><tt:Resolution><tt:Width>640</tt:Width><tt:Height>360</tt:Height></tt:Resolution></trt:VideoSources>
</trt:GetVideoSourcesResponse></env:Body></env:Envelope>"#;

    #[test]
    fn test_parse_video_sources() {
        let sources = parse_video_sources(VIDEO_SOURCES);
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].token, "VideoSource_1");
        assert_eq!(sources[0].width, Some(2560));
        assert_eq!(sources[0].height, Some(1440));
        assert_eq!(sources[0].frame_rate, Some(25.0));
        assert_eq!(sources[1].token, "VideoSource_2");
        assert_eq!(sources[1].frame_rate, Some(12.5));
    }

    #[test]
    fn test_parse_hostname_and_mac() {
        let xml = "<tds:HostnameInformation><tt:FromDHCP>false</tt:FromDHCP><tt:Name>cam-lobby</tt:Name></tds:HostnameInformation>";
        assert_eq!(parse_hostname(xml).as_deref(), Some("cam-lobby"));

        let xml = "<tt:Info><tt:Name>eth0</tt:Name><tt:HwAddress>44-19-b6-a1-b2-c3</tt:HwAddress></tt:Info>";
        assert_eq!(parse_hw_address(xml).as_deref(), Some("44:19:B6:A1:B2:C3"));
        assert_eq!(parse_hw_address("<HwAddress>00:00:00:00:00:00</HwAddress>"), None);
    }

    #[test]
    fn test_service_endpoints() {
        let mut d = Device::new("10.0.0.5".parse().unwrap());
        d.service_url = Some("http://10.0.0.5:2020/onvif/device_service".to_string());
        d.onvif_ports.extend([80, 443, 2020]);
        assert_eq!(
            service_endpoints(&d),
            vec![
                "http://10.0.0.5:2020/onvif/device_service",
                "http://10.0.0.5:80/onvif/device_service",
                "https://10.0.0.5:443/onvif/device_service",
            ]
        );
    }

    // ------------------------------------------------------------------
    // Loopback device service
    // ------------------------------------------------------------------

    fn token_valid(body: &str, cred: &Credential) -> bool {
        let (Some(user), Some(digest), Some(nonce), Some(created)) = (
            extract_xml_value(body, "Username"),
            extract_xml_value(body, "Password"),
            extract_xml_value(body, "Nonce"),
            extract_xml_value(body, "Created"),
        ) else {
            return false;
        };
        let Ok(nonce) = base64::engine::general_purpose::STANDARD.decode(nonce) else {
            return false;
        };
        user == cred.username && digest == password_digest(&nonce, &created, &cred.password)
    }

    fn reply_for(body: &str, port: u16) -> String {
        if body.contains("GetDeviceInformation") {
            "<s:Envelope><s:Body><tds:GetDeviceInformationResponse><tds:Manufacturer>Dahua</tds:Manufacturer>\
             <tds:Model>IPC-HDW2431T</tds:Model><tds:FirmwareVersion>2.800</tds:FirmwareVersion>\
             <tds:SerialNumber>7F0001</tds:SerialNumber></tds:GetDeviceInformationResponse></s:Body></s:Envelope>"
                .to_string()
        } else if body.contains("GetHostname") {
            "<tds:HostnameInformation><tt:Name>dahua-01</tt:Name></tds:HostnameInformation>".to_string()
        } else if body.contains("GetNetworkInterfaces") {
            "<tt:HwAddress>e0:50:8b:11:22:33</tt:HwAddress>".to_string()
        } else if body.contains("GetCapabilities") {
            format!(
                "<tt:Media><tt:XAddr>http://127.0.0.1:{}/onvif/media_service</tt:XAddr></tt:Media>",
                port
            )
        } else {
            VIDEO_SOURCES.to_string()
        }
    }

    async fn fake_device_service(cred: Credential) -> (u16, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let paths = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&paths);

        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let cred = cred.clone();
                let seen = Arc::clone(&seen);
                tokio::spawn(async move {
                    let mut buf = Vec::new();
                    let mut chunk = [0u8; 4096];
                    let (head_end, content_length) = loop {
                        let n = socket.read(&mut chunk).await.unwrap_or(0);
                        if n == 0 {
                            return;
                        }
                        buf.extend_from_slice(&chunk[..n]);
                        let text = String::from_utf8_lossy(&buf).to_string();
                        if let Some(idx) = text.find("\r\n\r\n") {
                            let len = text[..idx]
                                .lines()
                                .find_map(|l| {
                                    let (k, v) = l.split_once(':')?;
                                    k.eq_ignore_ascii_case("content-length").then(|| v.trim().parse::<usize>().ok())?
                                })
                                .unwrap_or(0);
                            break (idx + 4, len);
                        }
                    };
                    while buf.len() < head_end + content_length {
                        let n = socket.read(&mut chunk).await.unwrap_or(0);
                        if n == 0 {
                            break;
                        }
                        buf.extend_from_slice(&chunk[..n]);
                    }
                    let text = String::from_utf8_lossy(&buf).to_string();
                    let path = text.split_whitespace().nth(1).unwrap_or("").to_string();
                    let body = &text[head_end.min(text.len())..];
                    seen.lock().unwrap().push(path);

                    let (status, reply) = if token_valid(body, &cred) {
                        ("200 OK", reply_for(body, port))
                    } else {
                        (
                            "400 Bad Request",
                            "<s:Fault><s:Code><s:Subcode><s:Value>ter:NotAuthorized</s:Value></s:Subcode></s:Code></s:Fault>"
                                .to_string(),
                        )
                    };
                    let response = format!(
                        "HTTP/1.1 {}\r\nContent-Type: application/soap+xml\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        status,
                        reply.len(),
                        reply
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                    let _ = socket.shutdown().await;
                });
            }
        });

        (port, paths)
    }

    #[tokio::test]
    async fn test_enrich_with_second_credential() {
        let good = Credential::new("admin", "secret");
        let (port, paths) = fake_device_service(good.clone()).await;

        let mut device = Device::new("127.0.0.1".parse().unwrap());
        device.service_url = Some(format!("http://127.0.0.1:{}/onvif/device_service", port));

        let client = OnvifClient::new(Duration::from_secs(2)).unwrap();
        let creds = vec![Credential::new("admin", "wrong"), good.clone()];
        let hint = client.enrich(&mut device, &creds).await;

        assert_eq!(hint, Some(good));
        assert_eq!(device.manufacturer.as_deref(), Some("Dahua"));
        assert_eq!(device.model.as_deref(), Some("IPC-HDW2431T"));
        assert_eq!(device.serial_number.as_deref(), Some("7F0001"));
        assert_eq!(device.hostname.as_deref(), Some("dahua-01"));
        assert_eq!(device.mac.as_deref(), Some("E0:50:8B:11:22:33"));
        assert_eq!(device.video_sources.len(), 2);
        assert!(paths.lock().unwrap().iter().any(|p| p == "/onvif/media_service"));
    }

    #[tokio::test]
    async fn test_enrich_all_refused() {
        let (port, _) = fake_device_service(Credential::new("admin", "secret")).await;
        let mut device = Device::new("127.0.0.1".parse().unwrap());
        device.service_url = Some(format!("http://127.0.0.1:{}/onvif/device_service", port));

        let client = OnvifClient::new(Duration::from_secs(2)).unwrap();
        let hint = client.enrich(&mut device, &[Credential::new("admin", "nope")]).await;

        assert_eq!(hint, None);
        assert!(device.manufacturer.is_none());
    }

    #[tokio::test]
    async fn test_enrich_without_endpoint() {
        let mut device = Device::new("127.0.0.1".parse().unwrap());
        let client = OnvifClient::new(Duration::from_millis(200)).unwrap();
        assert_eq!(client.enrich(&mut device, &[Credential::new("a", "b")]).await, None);
    }
}
