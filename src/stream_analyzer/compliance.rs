//! Stream compliance rules

use crate::models::Stream;

/// Thresholds for compliance checks. Sub streams are expected to be light
/// H.264 streams suitable for grid views.
#[derive(Debug, Clone)]
pub struct ComplianceRules {
    pub flag_high_profile: bool,
    pub sub_min_width: u32,
    pub sub_min_height: u32,
    pub sub_max_width: u32,
    pub sub_max_height: u32,
    pub sub_required_codec: String,
    pub sub_max_bitrate_kbps: u32,
}

impl Default for ComplianceRules {
    fn default() -> Self {
        Self {
            flag_high_profile: true,
            sub_min_width: 320,
            sub_min_height: 180,
            sub_max_width: 1280,
            sub_max_height: 720,
            sub_required_codec: "h264".to_string(),
            sub_max_bitrate_kbps: 1024,
        }
    }
}

fn parse_resolution(resolution: &str) -> Option<(u32, u32)> {
    let (w, h) = resolution.split_once('x')?;
    Some((w.trim().parse().ok()?, h.trim().parse().ok()?))
}

impl ComplianceRules {
    /// Issues for one analysed stream; unknown properties are not flagged
    pub fn check(&self, stream: &Stream) -> Vec<String> {
        let mut issues = Vec::new();

        if self.flag_high_profile {
            if let Some(profile) = &stream.profile {
                if profile.to_lowercase().contains("high") {
                    issues.push(format!("encoder profile '{}' is a High profile", profile));
                }
            }
        }

        if !stream.is_sub() {
            return issues;
        }

        if let Some((w, h)) = stream.resolution.as_deref().and_then(parse_resolution) {
            if w < self.sub_min_width || h < self.sub_min_height || w > self.sub_max_width || h > self.sub_max_height {
                issues.push(format!(
                    "sub stream resolution {}x{} outside {}x{}..{}x{}",
                    w, h, self.sub_min_width, self.sub_min_height, self.sub_max_width, self.sub_max_height
                ));
            }
        }

        if let Some(codec) = &stream.codec {
            if !codec.eq_ignore_ascii_case(&self.sub_required_codec) {
                issues.push(format!(
                    "sub stream codec {} (expected {})",
                    codec, self.sub_required_codec
                ));
            }
        }

        if let Some(kbps) = stream.bitrate_kbps {
            if kbps > self.sub_max_bitrate_kbps {
                issues.push(format!(
                    "sub stream bitrate {} kbps above {} kbps",
                    kbps, self.sub_max_bitrate_kbps
                ));
            }
        }

        issues
    }
}
