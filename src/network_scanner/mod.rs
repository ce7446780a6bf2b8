//! NetworkScanner - TCP port scan and device list merge
//!
//! ## Responsibilities
//!
//! - Expand targets (single IP or CIDR)
//! - Concurrent TCP connect probes on a bounded pool
//! - Port role classification and NVR/DVR flagging
//! - Merge with multicast-discovered devices
//! - MAC enrichment from the neighbour table, OUI vendor seeding

mod neighbours;
mod ports;
mod scanner;
mod targets;

pub use neighbours::{enrich_devices, lookup_oui, parse_arp_table, read_arp_table, ARP_TABLE_PATH, OUI_CAMERA_VENDORS};
pub use ports::{classify_port, default_ports, record_open_port, PortRole, PORT_ROLES};
pub use scanner::{merge_device_lists, scan_host, NetworkScanner, ProgressFn, DEFAULT_CONNECT_TIMEOUT};
pub use targets::{expand_targets, parse_cidr};
