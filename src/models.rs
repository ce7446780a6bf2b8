//! Shared models and types for camscan
//!
//! This module contains types shared across multiple modules
//! to avoid circular dependencies.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::net::IpAddr;

/// Username/password pair. Trial order is the order of the caller's list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Credential {
    pub username: String,
    #[serde(skip_serializing, default)]
    pub password: String,
}

impl Credential {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Parse `user:pass` (password may itself contain ':')
    pub fn parse(raw: &str) -> Option<Self> {
        let (user, pass) = raw.split_once(':')?;
        if user.is_empty() {
            return None;
        }
        Some(Self::new(user, pass))
    }
}

/// Device lifecycle during one discovery run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceStatus {
    #[default]
    Pending,
    Authenticating,
    Completed,
    AuthFailed,
}

/// Video source reported by ONVIF GetVideoSources
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct VideoSource {
    pub token: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub frame_rate: Option<f64>,
}

/// One confirmed media stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stream {
    /// "Main", "Sub", "CH3 Main", ...
    pub name: String,
    /// Stream URL without embedded credentials
    pub url: String,
    pub resolution: Option<String>,
    pub codec: Option<String>,
    pub bitrate_kbps: Option<u32>,
    pub frame_rate: Option<f64>,
    pub profile: Option<String>,
    #[serde(default)]
    pub issues: Vec<String>,
}

impl Stream {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            resolution: None,
            codec: None,
            bitrate_kbps: None,
            frame_rate: None,
            profile: None,
            issues: Vec::new(),
        }
    }

    /// Whether the logical name marks this as a sub (secondary) stream
    pub fn is_sub(&self) -> bool {
        self.name.to_lowercase().contains("sub")
    }
}

/// A camera or recorder found on the network
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub ip: IpAddr,
    pub mac: Option<String>,
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub serial_number: Option<String>,
    pub firmware_version: Option<String>,
    pub hostname: Option<String>,
    /// ONVIF device service endpoint
    pub service_url: Option<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
    /// Web-management ports (ONVIF candidates)
    #[serde(default)]
    pub onvif_ports: BTreeSet<u16>,
    /// RTSP candidate ports
    #[serde(default)]
    pub rtsp_ports: BTreeSet<u16>,
    /// Vendor-signal and unclassified ports
    #[serde(default)]
    pub other_ports: BTreeSet<u16>,
    pub is_nvr: bool,
    pub credential: Option<Credential>,
    #[serde(default)]
    pub streams: Vec<Stream>,
    #[serde(default)]
    pub video_sources: Vec<VideoSource>,
    pub status: DeviceStatus,
    pub error: Option<String>,
}

impl Device {
    pub fn new(ip: IpAddr) -> Self {
        Self {
            ip,
            mac: None,
            manufacturer: None,
            model: None,
            serial_number: None,
            firmware_version: None,
            hostname: None,
            service_url: None,
            scopes: Vec::new(),
            onvif_ports: BTreeSet::new(),
            rtsp_ports: BTreeSet::new(),
            other_ports: BTreeSet::new(),
            is_nvr: false,
            credential: None,
            streams: Vec::new(),
            video_sources: Vec::new(),
            status: DeviceStatus::Pending,
            error: None,
        }
    }

    /// MAC prefix (first three octets) used as the smart-cache key
    pub fn mac_prefix(&self) -> Option<String> {
        self.mac.as_deref().and_then(oui_prefix)
    }

    pub fn has_stream_url(&self, url: &str) -> bool {
        self.streams.iter().any(|s| s.url == url)
    }

    /// Append a confirmed stream; duplicates by URL are ignored
    pub fn push_stream(&mut self, stream: Stream) -> bool {
        if self.has_stream_url(&stream.url) {
            return false;
        }
        self.streams.push(stream);
        true
    }

    /// All open ports across the three buckets
    pub fn all_ports(&self) -> BTreeSet<u16> {
        self.onvif_ports
            .iter()
            .chain(self.rtsp_ports.iter())
            .chain(self.other_ports.iter())
            .copied()
            .collect()
    }
}

/// Normalize a MAC address (any separator, any case) to "XX:XX:XX"
pub fn oui_prefix(mac: &str) -> Option<String> {
    let cleaned: String = mac
        .to_uppercase()
        .chars()
        .filter(|c| c.is_ascii_hexdigit())
        .collect();

    if cleaned.len() >= 6 {
        Some(format!(
            "{}:{}:{}",
            &cleaned[0..2],
            &cleaned[2..4],
            &cleaned[4..6]
        ))
    } else {
        None
    }
}
