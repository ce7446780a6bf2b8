//! ffprobe stream metadata

use serde::Deserialize;

use crate::error::{Error, Result};

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    profile: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
    /// ffprobe reports this as a decimal string
    bit_rate: Option<String>,
}

/// Measured properties of one video stream
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamProperties {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub codec: Option<String>,
    pub profile: Option<String>,
    pub frame_rate: Option<f64>,
    pub bitrate_kbps: Option<u32>,
}

impl StreamProperties {
    pub fn resolution(&self) -> Option<String> {
        match (self.width, self.height) {
            (Some(w), Some(h)) if w > 0 && h > 0 => Some(format!("{}x{}", w, h)),
            _ => None,
        }
    }
}

/// First video stream of `ffprobe -of json -show_entries stream=...` output
pub fn parse_probe_output(json: &[u8]) -> Result<StreamProperties> {
    let output: FfprobeOutput = serde_json::from_slice(json)?;
    let stream = output
        .streams
        .into_iter()
        .find(|s| s.codec_type.as_deref().map(|t| t == "video").unwrap_or(true))
        .ok_or_else(|| Error::Validation("ffprobe reported no video stream".to_string()))?;

    let frame_rate = stream
        .avg_frame_rate
        .as_deref()
        .and_then(parse_frame_rate)
        .or_else(|| stream.r_frame_rate.as_deref().and_then(parse_frame_rate));

    Ok(StreamProperties {
        width: stream.width,
        height: stream.height,
        codec: stream.codec_name,
        profile: stream.profile.filter(|p| !p.is_empty() && p != "unknown"),
        frame_rate,
        bitrate_kbps: stream
            .bit_rate
            .and_then(|b| b.parse::<u64>().ok())
            .filter(|b| *b > 0)
            .map(|b| (b / 1000) as u32),
    })
}

/// "25/1", "30000/1001" or "25"; zero and "0/0" are unknown
pub fn parse_frame_rate(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    let fps = match raw.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.parse().ok()?;
            let den: f64 = den.parse().ok()?;
            if den <= 0.0 {
                return None;
            }
            num / den
        }
        None => raw.parse().ok()?,
    };
    (fps > 0.0).then(|| (fps * 100.0).round() / 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PROBE: &str = r#"{
        "programs": [],
        "streams": [
            {"codec_type": "audio", "codec_name": "pcm_alaw"},
            {
                "codec_type": "video",
                "codec_name": "h264",
                "profile": "High",
                "width": 2560,
                "height": 1440,
                "r_frame_rate": "25/1",
                "avg_frame_rate": "0/0",
                "bit_rate": "4096000"
            }
        ]
    }"#;

    #[test]
    fn test_parse_probe_output() {
        let props = parse_probe_output(PROBE.as_bytes()).unwrap();
        assert_eq!(props.codec.as_deref(), Some("h264"));
        assert_eq!(props.profile.as_deref(), Some("High"));
        assert_eq!(props.resolution().as_deref(), Some("2560x1440"));
        assert_eq!(props.frame_rate, Some(25.0));
        assert_eq!(props.bitrate_kbps, Some(4096));
    }

    #[test]
    fn test_no_video_stream() {
        let json = r#"{"streams":[{"codec_type":"audio","codec_name":"aac"}]}"#;
        assert!(matches!(parse_probe_output(json.as_bytes()), Err(Error::Validation(_))));
        assert!(parse_probe_output(b"not json").is_err());
    }

    #[test]
    fn test_missing_bitrate() {
        let json = r#"{"streams":[{"codec_type":"video","codec_name":"hevc","width":640,"height":360,"bit_rate":"N/A"}]}"#;
        let props = parse_probe_output(json.as_bytes()).unwrap();
        assert_eq!(props.bitrate_kbps, None);
        assert_eq!(props.frame_rate, None);
        assert_eq!(props.profile, None);
    }

    #[test]
    fn test_parse_frame_rate() {
        assert_eq!(parse_frame_rate("30000/1001"), Some(29.97));
        assert_eq!(parse_frame_rate("15"), Some(15.0));
        assert_eq!(parse_frame_rate("0/0"), None);
        assert_eq!(parse_frame_rate("abc"), None);
    }
}
