use std::collections::HashSet;
use std::future::Future;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use super::smart_cache::SmartCache;
use super::sub_path::guess_sub_path;
use super::types::{StreamTarget, ValidationOutcome};
use super::validator::StreamValidator;
use crate::error::Result;
use crate::models::{Credential, Device, DeviceStatus, Stream};
use crate::path_catalog::{CustomPathPair, PathCatalog};
use crate::worker_pool::WorkerPool;

/// A waterfall pass stops once this many streams are confirmed
pub const MAX_WATERFALL_STREAMS: usize = 2;
/// NVR iteration stops after this many consecutive main-path failures
pub const NVR_MISS_LIMIT: u32 = 3;
pub const DEFAULT_NVR_MAX_CHANNELS: u32 = 64;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub nvr_max_channels: u32,
    pub background_workers: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            nvr_max_channels: DEFAULT_NVR_MAX_CHANNELS,
            background_workers: 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    SmartCache,
    Vendor,
    Custom,
    Generic,
}

impl Phase {
    fn as_str(self) -> &'static str {
        match self {
            Phase::SmartCache => "smart_cache",
            Phase::Vendor => "vendor",
            Phase::Custom => "custom",
            Phase::Generic => "generic",
        }
    }
}

/// Stream URL discovery for one device at a time
pub struct RtspDiscoveryEngine {
    catalog: Arc<PathCatalog>,
    validator: Arc<dyn StreamValidator>,
    cache: SmartCache,
    background: WorkerPool,
    nvr_max_channels: u32,
}

impl RtspDiscoveryEngine {
    pub fn new(catalog: Arc<PathCatalog>, validator: Arc<dyn StreamValidator>, config: &EngineConfig) -> Self {
        Self {
            catalog,
            validator,
            cache: SmartCache::new(),
            background: WorkerPool::new("background", config.background_workers),
            nvr_max_channels: config.nvr_max_channels,
        }
    }

    pub fn smart_cache(&self) -> &SmartCache {
        &self.cache
    }

    pub fn catalog(&self) -> &PathCatalog {
        &self.catalog
    }

    /// Run a one-off task on the engine's background pool
    pub async fn spawn_background<F>(&self, fut: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.background.spawn(fut).await
    }

    pub async fn shutdown(&self, grace: Duration) {
        self.background.shutdown(grace).await;
    }

    /// Resolve stream URLs for `device`.
    ///
    /// Credentials are tried strictly in order (a credential already on the
    /// device goes first). The first credential whose waterfall confirms a
    /// stream is kept; NVR channels are enumerated with it afterwards.
    pub async fn discover(&self, device: &mut Device, credentials: &[Credential], custom_pairs: &[CustomPathPair]) {
        if device.rtsp_ports.is_empty() {
            debug!(ip = %device.ip, "No RTSP ports, stream discovery skipped");
            device.status = DeviceStatus::Completed;
            device.error = Some("no RTSP port open".to_string());
            return;
        }

        device.status = DeviceStatus::Authenticating;
        let ports: Vec<u16> = device.rtsp_ports.iter().copied().collect();
        let mac_prefix = device.mac_prefix();
        let manufacturer = device.manufacturer.clone();
        let candidates = ordered_credentials(device.credential.as_ref(), credentials);
        let mut last_failure: Option<String> = None;

        for credential in &candidates {
            let mut pass = Waterfall::new(self, device.ip, &ports, credential.as_ref(), mac_prefix.clone());
            pass.run(manufacturer.as_deref(), custom_pairs).await;
            let (found, failure) = pass.finish();

            if found.is_empty() {
                debug!(
                    ip = %device.ip,
                    username = credential.as_ref().map(|c| c.username.as_str()).unwrap_or(""),
                    "No stream confirmed with this credential"
                );
                if failure.is_some() {
                    last_failure = failure;
                }
                continue;
            }

            device.credential = credential.clone();
            let primary_port = found[0].port;
            for (i, f) in found.into_iter().enumerate() {
                let name = if i == 0 { "Main" } else { "Sub" };
                device.push_stream(Stream::new(name, f.url));
            }

            info!(
                ip = %device.ip,
                streams = device.streams.len(),
                username = credential.as_ref().map(|c| c.username.as_str()).unwrap_or(""),
                "Streams confirmed"
            );

            if device.is_nvr {
                self.iterate_channels(device, credential.as_ref(), primary_port).await;
            }

            device.status = DeviceStatus::Completed;
            device.error = None;
            return;
        }

        device.status = DeviceStatus::AuthFailed;
        device.error = Some(format!(
            "no working stream after {} credential(s) on ports {:?}{}",
            candidates.len(),
            ports,
            last_failure.map(|r| format!(": {}", r)).unwrap_or_default()
        ));
        info!(ip = %device.ip, error = ?device.error, "Stream discovery failed");
    }

    /// Walk NVR/DVR channels 1..=max with the resolved template
    async fn iterate_channels(&self, device: &mut Device, credential: Option<&Credential>, port: u16) {
        let template = self.catalog.resolve_template(device.manufacturer.as_deref());
        info!(
            ip = %device.ip,
            template = %template.key,
            max_channels = self.nvr_max_channels,
            "NVR channel iteration"
        );

        let mut misses = 0u32;
        let mut channels_found = 0u32;

        for channel in 1..=self.nvr_max_channels {
            let (main, sub) = template.resolve(channel);
            let main_target = StreamTarget::new(device.ip, port, &main, credential);

            if !self.known_or_confirmed(device, &main_target).await {
                misses += 1;
                if misses >= NVR_MISS_LIMIT {
                    debug!(ip = %device.ip, channel = channel, "Consecutive channel misses, stopping");
                    break;
                }
                continue;
            }

            misses = 0;
            channels_found += 1;
            device.push_stream(Stream::new(format!("CH{} Main", channel), main_target.url()));

            if let Some(sub) = sub {
                let sub_target = StreamTarget::new(device.ip, port, &sub, credential);
                if self.known_or_confirmed(device, &sub_target).await {
                    device.push_stream(Stream::new(format!("CH{} Sub", channel), sub_target.url()));
                }
            }
        }

        info!(ip = %device.ip, channels = channels_found, streams = device.streams.len(), "NVR channels resolved");
    }

    async fn known_or_confirmed(&self, device: &Device, target: &StreamTarget) -> bool {
        device.has_stream_url(&target.url()) || self.validator.validate(target).await.is_confirmed()
    }
}

/// Existing device credential first, then the caller's list in order.
/// An empty list means one anonymous attempt.
fn ordered_credentials(existing: Option<&Credential>, credentials: &[Credential]) -> Vec<Option<Credential>> {
    let mut out: Vec<Option<Credential>> = Vec::with_capacity(credentials.len() + 1);
    if let Some(c) = existing {
        out.push(Some(c.clone()));
    }
    for c in credentials {
        if existing != Some(c) {
            out.push(Some(c.clone()));
        }
    }
    if out.is_empty() {
        out.push(None);
    }
    out
}

struct Found {
    port: u16,
    url: String,
}

/// One waterfall pass for one credential
struct Waterfall<'a> {
    engine: &'a RtspDiscoveryEngine,
    ip: IpAddr,
    ports: &'a [u16],
    credential: Option<&'a Credential>,
    mac_prefix: Option<String>,
    tried: HashSet<(u16, String)>,
    found: Vec<Found>,
    last_failure: Option<String>,
}

impl<'a> Waterfall<'a> {
    fn new(
        engine: &'a RtspDiscoveryEngine,
        ip: IpAddr,
        ports: &'a [u16],
        credential: Option<&'a Credential>,
        mac_prefix: Option<String>,
    ) -> Self {
        Self {
            engine,
            ip,
            ports,
            credential,
            mac_prefix,
            tried: HashSet::new(),
            found: Vec::new(),
            last_failure: None,
        }
    }

    fn done(&self) -> bool {
        self.found.len() >= MAX_WATERFALL_STREAMS
    }

    fn finish(self) -> (Vec<Found>, Option<String>) {
        (self.found, self.last_failure)
    }

    async fn run(&mut self, manufacturer: Option<&str>, custom_pairs: &[CustomPathPair]) {
        let engine = self.engine;

        if let Some(prefix) = self.mac_prefix.clone() {
            let cached = engine.cache.paths_for(&prefix).await;
            self.try_paths(Phase::SmartCache, &cached).await;
        }

        if let Some(m) = manufacturer {
            self.try_paths(Phase::Vendor, engine.catalog.vendor_paths(m)).await;
        }

        for pair in custom_pairs {
            if self.done() {
                break;
            }
            self.try_pair(pair).await;
        }

        self.try_paths(Phase::Generic, engine.catalog.generic_paths()).await;
    }

    /// Each path on each port; a confirmed path is followed by its guessed sub
    async fn try_paths(&mut self, phase: Phase, paths: &[String]) {
        let ports = self.ports;
        for path in paths {
            for &port in ports {
                if self.done() {
                    return;
                }
                if self.attempt(phase, port, path).await {
                    if !self.done() {
                        if let Some(sub) = guess_sub_path(path) {
                            self.attempt(phase, port, &sub).await;
                        }
                    }
                    break;
                }
            }
        }
    }

    /// Custom pair: the paired sub is tried right away on the port the main worked on
    async fn try_pair(&mut self, pair: &CustomPathPair) {
        let ports = self.ports;
        for &port in ports {
            if self.done() {
                return;
            }
            if self.attempt(Phase::Custom, port, &pair.main).await {
                if let Some(sub) = &pair.sub {
                    if !self.done() {
                        self.attempt(Phase::Custom, port, sub).await;
                    }
                }
                return;
            }
        }
    }

    async fn attempt(&mut self, phase: Phase, port: u16, path: &str) -> bool {
        if self.done() {
            return false;
        }
        let target = StreamTarget::new(self.ip, port, path, self.credential);
        if !self.tried.insert((port, target.path.clone())) {
            return false;
        }

        let outcome = self.engine.validator.validate(&target).await;
        match outcome {
            ValidationOutcome::Confirmed => {
                let url = target.url();
                debug!(ip = %self.ip, phase = phase.as_str(), url = %url, "Stream confirmed");
                if let Some(prefix) = &self.mac_prefix {
                    self.engine.cache.record(prefix, &target.path).await;
                }
                self.found.push(Found { port, url });
                true
            }
            other => {
                debug!(
                    ip = %self.ip,
                    phase = phase.as_str(),
                    port = port,
                    path = %target.path,
                    reason = other.reason().unwrap_or_default(),
                    "Candidate failed"
                );
                self.last_failure = other.reason().map(str::to_string);
                false
            }
        }
    }
}
