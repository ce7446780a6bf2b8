use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::Credential;

// ============================================================================
// Validation result
// ============================================================================

/// Outcome of validating one candidate URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// The URL serves a real stream
    Confirmed,
    /// The device answered but the candidate is not a stream (404, no video, 401 after retry, ...)
    Rejected(String),
    /// Timeout, reset, unreachable, or not enough evidence arrived in time
    NetworkError(String),
}

impl ValidationOutcome {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, ValidationOutcome::Confirmed)
    }

    pub fn from_error(error: &Error) -> Self {
        if error.is_transient() {
            ValidationOutcome::NetworkError(error.to_string())
        } else {
            ValidationOutcome::Rejected(error.to_string())
        }
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            ValidationOutcome::Confirmed => None,
            ValidationOutcome::Rejected(r) | ValidationOutcome::NetworkError(r) => Some(r),
        }
    }
}

// ============================================================================
// Validation method
// ============================================================================

/// How a candidate URL is proven to be a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationMethod {
    /// DESCRIBE and check the SDP
    #[default]
    Sdp,
    /// DESCRIBE/SETUP/PLAY and count RTP packets
    RtpPacket,
    /// Decode one frame with ffmpeg
    FrameCapture,
}

impl ValidationMethod {
    pub fn default_timeout(self) -> Duration {
        match self {
            ValidationMethod::Sdp => Duration::from_secs(3),
            ValidationMethod::RtpPacket => Duration::from_secs(5),
            ValidationMethod::FrameCapture => Duration::from_secs(10),
        }
    }
}

impl FromStr for ValidationMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "sdp" | "describe" => Ok(ValidationMethod::Sdp),
            "rtp" | "rtp_packet" | "rtp-packet" | "packet" => Ok(ValidationMethod::RtpPacket),
            "frame" | "frame_capture" | "frame-capture" | "ffmpeg" => Ok(ValidationMethod::FrameCapture),
            other => Err(Error::Config(format!("unknown validation method: {}", other))),
        }
    }
}

impl fmt::Display for ValidationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationMethod::Sdp => write!(f, "sdp"),
            ValidationMethod::RtpPacket => write!(f, "rtp"),
            ValidationMethod::FrameCapture => write!(f, "frame"),
        }
    }
}

// ============================================================================
// Candidate
// ============================================================================

/// One (host, port, path, credential) candidate
#[derive(Debug, Clone)]
pub struct StreamTarget {
    pub ip: IpAddr,
    pub port: u16,
    pub path: String,
    pub credential: Option<Credential>,
}

impl StreamTarget {
    pub fn new(ip: IpAddr, port: u16, path: &str, credential: Option<&Credential>) -> Self {
        Self {
            ip,
            port,
            path: crate::path_catalog::normalize_path(path),
            credential: credential.cloned(),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.ip, self.port)
    }

    /// `rtsp://host:port/path`, never with credentials
    pub fn url(&self) -> String {
        format!("rtsp://{}{}", self.addr(), self.path)
    }

    /// URL with percent-encoded userinfo, for tools that take credentials in the URL
    pub fn url_with_credentials(&self) -> String {
        let plain = self.url();
        let Some(cred) = &self.credential else {
            return plain;
        };
        match url::Url::parse(&plain) {
            Ok(mut url) => {
                if url.set_username(&cred.username).is_err() || url.set_password(Some(&cred.password)).is_err() {
                    return plain;
                }
                url.to_string()
            }
            Err(_) => plain,
        }
    }
}
