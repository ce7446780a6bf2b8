//! OnvifDiscovery - WS-Discovery and device-service enrichment
//!
//! ## Responsibilities
//!
//! - Multicast probe to 239.255.255.250:3702 and reply collection
//! - Device seeding from ProbeMatch (IP, service URL, MAC hint, scopes)
//! - WS-Security authenticated SOAP queries (device info, hostname,
//!   network interfaces, capabilities, video sources)
//!
//! All failures are non-fatal for the caller.

mod client;
mod discovery;
mod envelope;
pub(crate) mod xml;

pub use client::{
    parse_device_information, parse_hostname, parse_hw_address, parse_video_sources, service_endpoints,
    DeviceInformation, OnvifClient,
};
pub use discovery::{DiscoveryState, OnvifDiscovery, DEFAULT_DISCOVERY_WINDOW};
pub use envelope::{parse_probe_matches, soap_envelope, ProbeMatch, ProbeMessage, ScopeInfo, SoapOperation};
