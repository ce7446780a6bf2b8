//! Port role table

use crate::models::Device;

/// Role of a probed port
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortRole {
    /// Web management (ONVIF candidates)
    Web,
    /// RTSP candidates
    Rtsp,
    /// Vendor SDK ports typical of recorders
    VendorSignal,
}

/// (port, role). Unlisted ports land in `Device::other_ports`.
pub const PORT_ROLES: &[(u16, PortRole)] = &[
    (80, PortRole::Web),
    (443, PortRole::Web),
    (2020, PortRole::Web),
    (8080, PortRole::Web),
    (8443, PortRole::Web),
    (8899, PortRole::Web),
    (554, PortRole::Rtsp),
    (8554, PortRole::Rtsp),
    (10554, PortRole::Rtsp),
    // Hikvision SDK
    (8000, PortRole::VendorSignal),
    // Dahua SDK
    (37777, PortRole::VendorSignal),
];

pub fn default_ports() -> Vec<u16> {
    PORT_ROLES.iter().map(|(p, _)| *p).collect()
}

pub fn classify_port(port: u16) -> Option<PortRole> {
    PORT_ROLES.iter().find(|(p, _)| *p == port).map(|(_, role)| *role)
}

/// File an open port into the device's buckets; vendor-signal ports set the
/// NVR flag
pub fn record_open_port(device: &mut Device, port: u16) {
    match classify_port(port) {
        Some(PortRole::Web) => {
            device.onvif_ports.insert(port);
        }
        Some(PortRole::Rtsp) => {
            device.rtsp_ports.insert(port);
        }
        Some(PortRole::VendorSignal) => {
            device.other_ports.insert(port);
            device.is_nvr = true;
        }
        None => {
            device.other_ports.insert(port);
        }
    }
}
