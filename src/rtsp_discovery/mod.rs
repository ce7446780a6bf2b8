//! RtspDiscovery - Stream URL resolution
//!
//! ## Responsibilities
//!
//! - Waterfall: smart cache → vendor paths → custom pairs → generic paths
//! - Stop once two streams (main + sub) are confirmed
//! - Sub-stream path guessing from a confirmed main path
//! - Three validation strategies: SDP, RTP packets, frame capture
//! - RTSP auth negotiation (Digest preferred, one authenticated retry)
//! - NVR/DVR channel enumeration with early stop
//!
//! Nothing here returns an error to the caller: per device the result is the
//! confirmed streams plus an optional failure reason on the device.

mod engine;
mod frame;
mod rtp;
mod sdp;
mod session;
mod smart_cache;
mod sub_path;
mod types;
mod validator;

pub use engine::{
    EngineConfig, RtspDiscoveryEngine, DEFAULT_NVR_MAX_CHANNELS, MAX_WATERFALL_STREAMS, NVR_MISS_LIMIT,
};
pub use frame::FrameValidator;
pub use rtp::{is_rtp_packet, RtpValidator, MIN_RTP_PACKETS, RTP_WINDOW};
pub use sdp::{resolve_control, validate_sdp, SdpInfo};
pub use session::RtspSession;
pub use smart_cache::SmartCache;
pub use sub_path::guess_sub_path;
pub use types::{StreamTarget, ValidationMethod, ValidationOutcome};
pub use validator::{build_validator, SdpValidator, StreamValidator};
