//! Application state
//!
//! Configuration from the environment and the shared components built from it

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::network_scanner::{default_ports, NetworkScanner, ARP_TABLE_PATH};
use crate::onvif_discovery::OnvifClient;
use crate::path_catalog::PathCatalog;
use crate::pipeline::DiscoveryPipeline;
use crate::rtsp_discovery::{build_validator, EngineConfig, RtspDiscoveryEngine, ValidationMethod};
use crate::stream_analyzer::{AnalyzerConfig, StreamAnalyzer};
use crate::worker_pool::{default_scan_workers, WorkerPool, MAX_SCAN_WORKERS};

/// Analysis pool upper bound
pub const MAX_ANALYSIS_WORKERS: usize = 8;

/// Read `key` and parse it; malformed values fall back to `default` with a warning
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => match raw.trim().parse() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!(key = key, value = %raw, "Malformed setting, using default");
                default
            }
        },
        _ => default,
    }
}

fn env_millis(key: &str, default: Duration) -> Duration {
    Duration::from_millis(env_or(key, default.as_millis() as u64))
}

/// Comma separated port list; entries that do not parse are skipped
fn parse_port_list(raw: &str) -> Vec<u16> {
    let mut ports: Vec<u16> = raw
        .split(',')
        .filter_map(|p| p.trim().parse::<u16>().ok())
        .filter(|p| *p > 0)
        .collect();
    ports.sort_unstable();
    ports.dedup();
    ports
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Ports probed on every target
    pub ports: Vec<u16>,
    /// TCP connect timeout per port
    pub connect_timeout: Duration,
    pub scan_workers: usize,
    pub analysis_workers: usize,
    pub background_workers: usize,
    /// WS-Discovery listen window
    pub onvif_window: Duration,
    /// Per-request timeout for ONVIF SOAP calls
    pub onvif_timeout: Duration,
    pub validation_method: ValidationMethod,
    /// None means the method's default
    pub validation_timeout: Option<Duration>,
    pub nvr_max_channels: u32,
    /// Optional JSON path catalog
    pub path_catalog: Option<PathBuf>,
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
    pub sample_duration: Duration,
    pub sample_frames: usize,
    /// Kernel neighbour table used for MAC enrichment
    pub arp_table: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        let ports = match std::env::var("CAMSCAN_PORTS") {
            Ok(raw) => {
                let parsed = parse_port_list(&raw);
                if parsed.is_empty() {
                    tracing::warn!(value = %raw, "CAMSCAN_PORTS has no valid port, using defaults");
                    default_ports()
                } else {
                    parsed
                }
            }
            Err(_) => default_ports(),
        };

        let validation_method = env_or("CAMSCAN_VALIDATION", ValidationMethod::default());

        Self {
            ports,
            connect_timeout: env_millis("CAMSCAN_CONNECT_TIMEOUT_MS", Duration::from_millis(2000)),
            scan_workers: env_or("CAMSCAN_SCAN_POOL", default_scan_workers()).clamp(1, MAX_SCAN_WORKERS),
            analysis_workers: env_or("CAMSCAN_ANALYSIS_POOL", MAX_ANALYSIS_WORKERS).clamp(1, MAX_ANALYSIS_WORKERS),
            background_workers: env_or("CAMSCAN_BACKGROUND_POOL", 4usize).max(1),
            onvif_window: env_millis("CAMSCAN_ONVIF_WINDOW_MS", Duration::from_millis(5000)),
            onvif_timeout: env_millis("CAMSCAN_ONVIF_TIMEOUT_MS", Duration::from_millis(5000)),
            validation_method,
            validation_timeout: std::env::var("CAMSCAN_VALIDATION_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.trim().parse::<u64>().ok())
                .filter(|ms| *ms > 0)
                .map(Duration::from_millis),
            nvr_max_channels: env_or("CAMSCAN_NVR_MAX_CHANNELS", 64u32).max(1),
            path_catalog: std::env::var("CAMSCAN_PATH_CATALOG")
                .ok()
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
            ffmpeg_path: std::env::var("CAMSCAN_FFMPEG").unwrap_or_else(|_| "ffmpeg".to_string()),
            ffprobe_path: std::env::var("CAMSCAN_FFPROBE").unwrap_or_else(|_| "ffprobe".to_string()),
            sample_duration: Duration::from_secs(env_or("CAMSCAN_SAMPLE_SECS", 10u64)),
            sample_frames: env_or("CAMSCAN_SAMPLE_FRAMES", 30usize),
            arp_table: PathBuf::from(ARP_TABLE_PATH),
        }
    }
}

impl AppConfig {
    pub fn effective_validation_timeout(&self) -> Duration {
        self.validation_timeout
            .unwrap_or_else(|| self.validation_method.default_timeout())
    }
}

/// Shared components
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub catalog: Arc<PathCatalog>,
    pub engine: Arc<RtspDiscoveryEngine>,
    pub pipeline: Arc<DiscoveryPipeline>,
}

impl AppState {
    /// Build every component from `config`. The path catalog is loaded once;
    /// a missing or malformed resource falls back to the built-in tables.
    pub async fn build(config: AppConfig) -> Result<Self> {
        let catalog = Arc::new(PathCatalog::load_or_default(config.path_catalog.as_deref()).await?);

        let validator = build_validator(
            config.validation_method,
            config.validation_timeout,
            &config.ffmpeg_path,
        );
        let engine = Arc::new(RtspDiscoveryEngine::new(
            Arc::clone(&catalog),
            validator,
            &EngineConfig {
                nvr_max_channels: config.nvr_max_channels,
                background_workers: config.background_workers,
            },
        ));

        let scan_pool = Arc::new(WorkerPool::new("scan", config.scan_workers));
        let scanner = NetworkScanner::new(scan_pool, config.ports.clone(), config.connect_timeout);
        let onvif = OnvifClient::new(config.onvif_timeout)?;
        let analyzer = Arc::new(StreamAnalyzer::new(AnalyzerConfig {
            ffprobe_path: config.ffprobe_path.clone(),
            sample_duration: config.sample_duration,
            sample_packets: config.sample_frames,
            ..AnalyzerConfig::default()
        }));
        let analysis_pool = Arc::new(WorkerPool::new("analysis", config.analysis_workers));

        let pipeline = Arc::new(DiscoveryPipeline::new(
            scanner,
            onvif,
            Arc::clone(&engine),
            analyzer,
            analysis_pool,
            config.onvif_window,
            config.arp_table.clone(),
        ));

        tracing::info!(
            ports = ?config.ports,
            scan_workers = config.scan_workers,
            analysis_workers = config.analysis_workers,
            validation = %config.validation_method,
            validation_timeout_ms = config.effective_validation_timeout().as_millis() as u64,
            nvr_max_channels = config.nvr_max_channels,
            "Components initialized"
        );

        Ok(Self {
            config,
            catalog,
            engine,
            pipeline,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_port_list() {
        assert_eq!(parse_port_list("554, 80,abc,554,0,8554"), vec![80, 554, 8554]);
        assert!(parse_port_list("x,y").is_empty());
    }

    #[test]
    fn test_env_or_fallback() {
        std::env::set_var("CAMSCAN_TEST_ENV_OR_BAD", "not-a-number");
        assert_eq!(env_or("CAMSCAN_TEST_ENV_OR_BAD", 7u32), 7);
        std::env::set_var("CAMSCAN_TEST_ENV_OR_GOOD", " 12 ");
        assert_eq!(env_or("CAMSCAN_TEST_ENV_OR_GOOD", 7u32), 12);
        assert_eq!(env_or("CAMSCAN_TEST_ENV_OR_UNSET", 7u32), 7);
    }

    #[test]
    fn test_validation_method_from_env_value() {
        std::env::set_var("CAMSCAN_TEST_METHOD", "rtp");
        assert_eq!(
            env_or("CAMSCAN_TEST_METHOD", ValidationMethod::Sdp),
            ValidationMethod::RtpPacket
        );
    }

    #[test]
    fn test_effective_validation_timeout() {
        let mut config = AppConfig::default();
        config.validation_method = ValidationMethod::FrameCapture;
        config.validation_timeout = None;
        assert_eq!(config.effective_validation_timeout(), Duration::from_secs(10));
        config.validation_timeout = Some(Duration::from_millis(1500));
        assert_eq!(config.effective_validation_timeout(), Duration::from_millis(1500));
    }
}
