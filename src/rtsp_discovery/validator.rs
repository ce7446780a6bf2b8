use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::timeout;

use super::frame::FrameValidator;
use super::rtp::RtpValidator;
use super::sdp::validate_sdp;
use super::session::RtspSession;
use super::types::{StreamTarget, ValidationMethod, ValidationOutcome};
use crate::transport::RtspResponse;

/// Proves (or disproves) that a candidate URL is a live stream
#[async_trait]
pub trait StreamValidator: Send + Sync {
    fn method(&self) -> ValidationMethod;

    async fn validate(&self, target: &StreamTarget) -> ValidationOutcome;
}

/// Validator for the configured method
pub fn build_validator(
    method: ValidationMethod,
    validation_timeout: Option<Duration>,
    ffmpeg_path: &str,
) -> Arc<dyn StreamValidator> {
    let t = validation_timeout.unwrap_or_else(|| method.default_timeout());
    match method {
        ValidationMethod::Sdp => Arc::new(SdpValidator::new(t)),
        ValidationMethod::RtpPacket => Arc::new(RtpValidator::new(t)),
        ValidationMethod::FrameCapture => Arc::new(FrameValidator::new(ffmpeg_path, t)),
    }
}

/// Non-2xx response -> rejection reason
pub(crate) fn status_rejection(method: &str, response: &RtspResponse) -> ValidationOutcome {
    if response.status == 401 {
        ValidationOutcome::Rejected(format!("{} unauthorized (401)", method))
    } else {
        ValidationOutcome::Rejected(format!("{} {} {}", method, response.status, response.reason))
    }
}

/// DESCRIBE-only validation
pub struct SdpValidator {
    timeout: Duration,
}

impl SdpValidator {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn describe(&self, target: &StreamTarget) -> ValidationOutcome {
        let url = target.url();
        let mut session = match RtspSession::open(target.addr(), target.credential.as_ref(), self.timeout).await {
            Ok(s) => s,
            Err(e) => return ValidationOutcome::from_error(&e),
        };

        let response = match session
            .request("DESCRIBE", &url, &[("Accept", "application/sdp".to_string())])
            .await
        {
            Ok(r) => r,
            Err(e) => return ValidationOutcome::from_error(&e),
        };

        if !response.is_success() {
            return status_rejection("DESCRIBE", &response);
        }

        match validate_sdp(&response.body) {
            Ok(info) => {
                tracing::debug!(
                    url = %url,
                    codec = ?info.video_codec,
                    "SDP validated"
                );
                ValidationOutcome::Confirmed
            }
            Err(reason) => ValidationOutcome::Rejected(reason),
        }
    }
}

#[async_trait]
impl StreamValidator for SdpValidator {
    fn method(&self) -> ValidationMethod {
        ValidationMethod::Sdp
    }

    async fn validate(&self, target: &StreamTarget) -> ValidationOutcome {
        match timeout(self.timeout, self.describe(target)).await {
            Ok(outcome) => outcome,
            Err(_) => ValidationOutcome::NetworkError(format!(
                "DESCRIBE timeout ({}ms)",
                self.timeout.as_millis()
            )),
        }
    }
}
