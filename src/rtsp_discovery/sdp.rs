//! Minimal SDP inspection
//!
//! A DESCRIBE body counts as a stream only if it has a `v=` line and at least
//! one `m=video` section.

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SdpInfo {
    /// Encoding name from the first video `a=rtpmap` (H264, H265, ...)
    pub video_codec: Option<String>,
    /// `a=control` of the first video section
    pub video_control: Option<String>,
}

pub fn validate_sdp(body: &str) -> Result<SdpInfo, String> {
    let mut has_version = false;
    let mut has_video = false;
    let mut in_video = false;
    let mut info = SdpInfo::default();

    for line in body.lines().map(str::trim) {
        if line.starts_with("v=") {
            has_version = true;
        } else if let Some(media) = line.strip_prefix("m=") {
            // Only the first video section is inspected
            in_video = !has_video && media.starts_with("video");
            has_video |= in_video;
        } else if in_video {
            if let Some(map) = line.strip_prefix("a=rtpmap:") {
                if info.video_codec.is_none() {
                    info.video_codec = map
                        .split_whitespace()
                        .nth(1)
                        .and_then(|enc| enc.split('/').next())
                        .map(|c| c.to_uppercase());
                }
            } else if let Some(control) = line.strip_prefix("a=control:") {
                info.video_control = Some(control.trim().to_string());
            }
        }
    }

    if !has_version {
        return Err("SDP missing v= line".to_string());
    }
    if !has_video {
        return Err("SDP has no video media".to_string());
    }
    Ok(info)
}

/// Resolve a media `a=control` against the presentation base URL
pub fn resolve_control(base: &str, control: Option<&str>) -> String {
    match control {
        None | Some("") | Some("*") => base.to_string(),
        Some(c) if c.starts_with("rtsp://") || c.starts_with("rtsps://") => c.to_string(),
        Some(c) => format!(
            "{}/{}",
            base.trim_end_matches('/'),
            c.trim_start_matches('/')
        ),
    }
}
