//! Frame-capture validation via ffmpeg
//!
//! The stream is confirmed when ffmpeg decodes at least one video frame.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use super::types::{StreamTarget, ValidationMethod, ValidationOutcome};
use super::validator::StreamValidator;

pub struct FrameValidator {
    ffmpeg_path: String,
    timeout: Duration,
}

impl FrameValidator {
    pub fn new(ffmpeg_path: &str, timeout: Duration) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.to_string(),
            timeout,
        }
    }

    fn command(&self, url: &str) -> Command {
        // -timeout is the RTSP socket timeout in microseconds
        let socket_timeout_us = self.timeout.as_micros().to_string();
        let mut cmd = Command::new(&self.ffmpeg_path);
        cmd.args([
            "-rtsp_transport", "tcp",
            "-fflags", "nobuffer",
            "-flags", "low_delay",
            "-reorder_queue_size", "0",
            "-timeout", socket_timeout_us.as_str(),
            "-i", url,
            "-frames:v", "1",
            "-f", "image2pipe",
            "-vcodec", "mjpeg",
            "-loglevel", "error",
            "-y",
            "-",
        ])
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl StreamValidator for FrameValidator {
    fn method(&self) -> ValidationMethod {
        ValidationMethod::FrameCapture
    }

    async fn validate(&self, target: &StreamTarget) -> ValidationOutcome {
        let child = match self.command(&target.url_with_credentials()).spawn() {
            Ok(c) => c,
            Err(e) => {
                return ValidationOutcome::NetworkError(format!("ffmpeg spawn failed: {}", e));
            }
        };

        // On timeout the child is dropped and kill_on_drop sends SIGKILL
        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                if output.status.success() && !output.stdout.is_empty() {
                    tracing::debug!(url = %target.url(), bytes = output.stdout.len(), "Frame decoded");
                    return ValidationOutcome::Confirmed;
                }
                let stderr = String::from_utf8_lossy(&output.stderr);
                let reason = stderr.lines().last().unwrap_or("no frame decoded").trim().to_string();
                ValidationOutcome::Rejected(format!("ffmpeg: {}", reason))
            }
            Ok(Err(e)) => ValidationOutcome::NetworkError(format!("ffmpeg execution failed: {}", e)),
            Err(_) => {
                tracing::debug!(
                    url = %target.url(),
                    timeout_ms = self.timeout.as_millis() as u64,
                    "ffmpeg timeout, process killed via kill_on_drop"
                );
                ValidationOutcome::NetworkError(format!("ffmpeg timeout ({}ms)", self.timeout.as_millis()))
            }
        }
    }
}
