//! camscan
//!
//! IP camera / NVR discovery, authentication and RTSP stream resolution
//!
//! ## Architecture (leaves first)
//!
//! 1. AuthCodec - Digest / Basic / WS-Security headers (no I/O)
//! 2. Transport - TCP probing, RTSP text client, UDP multicast
//! 3. OnvifDiscovery - WS-Discovery probe and device-service queries
//! 4. NetworkScanner - Concurrent port scan and device list merge
//! 5. PathCatalog - Vendor paths, NVR templates, generic fallbacks
//! 6. RtspDiscovery - URL waterfall, validation strategies, NVR channels
//! 7. StreamAnalyzer - Stream properties and compliance
//! 8. DiscoveryPipeline - End-to-end run over a target set
//!
//! ## Design Principles
//!
//! - Per device the result is the confirmed streams plus an optional reason
//! - Every network operation is time-bounded
//! - Lookup tables are built once at startup and shared read-only

pub mod auth_codec;
pub mod error;
pub mod models;
pub mod network_scanner;
pub mod onvif_discovery;
pub mod path_catalog;
pub mod pipeline;
pub mod rtsp_discovery;
pub mod state;
pub mod stream_analyzer;
pub mod transport;
pub mod worker_pool;

pub use error::{Error, Result};
pub use state::AppState;
