//! Built-in path tables, used when no catalog resource is configured or it
//! cannot be used

/// Vendor key -> ordered stream paths
pub const VENDOR_PATHS: &[(&str, &[&str])] = &[
    (
        "HIKVISION",
        &[
            "/Streaming/Channels/101",
            "/Streaming/Channels/102",
            "/h264/ch1/main/av_stream",
        ],
    ),
    (
        "DAHUA",
        &[
            "/cam/realmonitor?channel=1&subtype=0",
            "/cam/realmonitor?channel=1&subtype=1",
        ],
    ),
    ("AMCREST", &["/cam/realmonitor?channel=1&subtype=0"]),
    ("AXIS", &["/axis-media/media.amp"]),
    ("TP-LINK", &["/stream1", "/stream2"]),
    ("TAPO", &["/stream1", "/stream2"]),
    ("REOLINK", &["/h264Preview_01_main", "/h264Preview_01_sub"]),
    ("UNIVIEW", &["/unicast/c1/s0/live", "/unicast/c1/s1/live"]),
    ("HANWHA", &["/profile2/media.smp", "/profile3/media.smp"]),
    ("FOSCAM", &["/videoMain", "/videoSub"]),
];

/// (key, aliases, main, sub)
pub const NVR_TEMPLATES: &[(&str, &[&str], &str, Option<&str>)] = &[
    (
        "HIKVISION",
        &["HIKVISION", "HIKVISION_DIGITAL_TECHNOLOGY", "HIK", "HIKVISION_NVR"],
        "/Streaming/Channels/{channel*100+1}",
        Some("/Streaming/Channels/{channel*100+2}"),
    ),
    (
        "DAHUA",
        &["DAHUA", "DAHUA_TECHNOLOGY", "AMCREST"],
        "/cam/realmonitor?channel={channel}&subtype=0",
        Some("/cam/realmonitor?channel={channel}&subtype=1"),
    ),
    (
        "UNIVIEW",
        &["UNIVIEW", "UNV"],
        "/unicast/c{channel}/s0/live",
        Some("/unicast/c{channel}/s1/live"),
    ),
    (
        "REOLINK",
        &["REOLINK"],
        "/h264Preview_{channel01}_main",
        Some("/h264Preview_{channel01}_sub"),
    ),
];

/// Template used when no alias matches the manufacturer
pub const FALLBACK_NVR_TEMPLATE: (&str, &str, Option<&str>) = (
    "GENERIC",
    "/Streaming/Channels/{channel*100+1}",
    Some("/Streaming/Channels/{channel*100+2}"),
);

/// Generic paths, tried against every RTSP port when nothing else worked
pub const GENERIC_PATHS: &[&str] = &[
    "/live",
    "/stream1",
    "/h264",
    "/live/ch0",
    "/ch0_0.h264",
    "/video1",
    "/media/video1",
    "/11",
    "/onvif1",
    "/",
];
