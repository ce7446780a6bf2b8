//! StreamAnalyzer - ffprobe-based stream measurement
//!
//! ## Responsibilities
//!
//! - Resolution, codec, profile, frame rate and bitrate per confirmed stream
//! - Packet sampling when the stream reports no bitrate
//! - Compliance issues (High profile, sub stream limits)
//!
//! Analysis failures are recorded on the stream and never abort discovery.

mod analyzer;
mod compliance;
mod probe;
mod sampler;

pub use analyzer::{
    embed_credentials, AnalyzerConfig, StreamAnalyzer, DEFAULT_PROBE_TIMEOUT, DEFAULT_SAMPLE_DURATION,
    DEFAULT_SAMPLE_PACKETS,
};
pub use compliance::ComplianceRules;
pub use probe::{parse_frame_rate, parse_probe_output, StreamProperties};
pub use sampler::{parse_packet_line, BitrateSampler, PacketSample};
