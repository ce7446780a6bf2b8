//! DiscoveryPipeline - End-to-end discovery run
//!
//! ## Responsibilities
//!
//! - WS-Discovery and port scan side by side, then merge by IP
//! - MAC / vendor enrichment from the neighbour and OUI tables
//! - ONVIF device-service enrichment (credential hint per device)
//! - Stream discovery and analysis per device on the analysis pool
//! - Orderly shutdown of every pool

use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::models::{Credential, Device, DeviceStatus};
use crate::network_scanner::{enrich_devices, merge_device_lists, read_arp_table, NetworkScanner, ProgressFn};
use crate::onvif_discovery::{OnvifClient, OnvifDiscovery};
use crate::path_catalog::CustomPathPair;
use crate::rtsp_discovery::RtspDiscoveryEngine;
use crate::stream_analyzer::StreamAnalyzer;
use crate::worker_pool::WorkerPool;

/// Per-run switches and inputs
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Trial order is preserved
    pub credentials: Vec<Credential>,
    pub custom_pairs: Vec<CustomPathPair>,
    /// Send a WS-Discovery probe and query device services
    pub onvif: bool,
    /// Measure confirmed streams with ffprobe
    pub analyze: bool,
}

pub struct DiscoveryPipeline {
    scanner: NetworkScanner,
    onvif: OnvifClient,
    engine: Arc<RtspDiscoveryEngine>,
    analyzer: Arc<StreamAnalyzer>,
    analysis_pool: Arc<WorkerPool>,
    onvif_window: Duration,
    arp_table: PathBuf,
}

impl DiscoveryPipeline {
    pub fn new(
        scanner: NetworkScanner,
        onvif: OnvifClient,
        engine: Arc<RtspDiscoveryEngine>,
        analyzer: Arc<StreamAnalyzer>,
        analysis_pool: Arc<WorkerPool>,
        onvif_window: Duration,
        arp_table: PathBuf,
    ) -> Self {
        Self {
            scanner,
            onvif,
            engine,
            analyzer,
            analysis_pool,
            onvif_window,
            arp_table,
        }
    }

    pub fn engine(&self) -> &RtspDiscoveryEngine {
        &self.engine
    }

    /// Full run over `targets`; the result is sorted by IP
    pub async fn run(&self, targets: Vec<IpAddr>, options: &RunOptions) -> Result<Vec<Device>> {
        let mut devices = self.collect_devices(targets, options.onvif).await?;

        let hints = if options.onvif {
            self.enrich_onvif(&mut devices, &options.credentials).await
        } else {
            HashMap::new()
        };

        self.discover_all(devices, options, &hints).await
    }

    /// Candidate devices from multicast discovery and the port scan
    pub async fn collect_devices(&self, targets: Vec<IpAddr>, onvif: bool) -> Result<Vec<Device>> {
        let target_set: HashSet<IpAddr> = targets.iter().copied().collect();
        let progress: ProgressFn = Arc::new(|current: usize, total: usize| {
            if current == total || current % 32 == 0 {
                debug!(current = current, total = total, "Scan progress");
            }
        });

        let discovery = async {
            if !onvif {
                return Vec::new();
            }
            let mut discovery = OnvifDiscovery::new(self.onvif_window);
            match discovery.run().await {
                Ok(found) => found,
                Err(e) => {
                    warn!(error = %e, "WS-Discovery failed, continuing with the port scan only");
                    Vec::new()
                }
            }
        };

        let (multicast, scanned) = tokio::join!(discovery, self.scanner.scan(targets, Some(progress)));
        let mut scanned = scanned?;

        // Devices that answered the probe from outside the target set still
        // need their RTSP ports
        let extra: Vec<IpAddr> = multicast
            .iter()
            .map(|d| d.ip)
            .filter(|ip| !target_set.contains(ip))
            .collect();
        if !extra.is_empty() {
            debug!(hosts = extra.len(), "Scanning multicast-only devices");
            scanned.extend(self.scanner.scan(extra, None).await?);
        }

        let mut devices = merge_device_lists(multicast, scanned);

        let arp = read_arp_table(&self.arp_table).await;
        let enriched = enrich_devices(&mut devices, &arp);
        info!(
            devices = devices.len(),
            neighbours = arp.len(),
            enriched = enriched,
            "Device list merged"
        );
        Ok(devices)
    }

    /// Query device services; returns the working credential per IP
    pub async fn enrich_onvif(&self, devices: &mut [Device], credentials: &[Credential]) -> HashMap<IpAddr, Credential> {
        let queries = devices
            .iter_mut()
            .filter(|d| d.service_url.is_some() || !d.onvif_ports.is_empty())
            .map(|device| async move {
                let ip = device.ip;
                (ip, self.onvif.enrich(device, credentials).await)
            });

        join_all(queries)
            .await
            .into_iter()
            .filter_map(|(ip, hint)| hint.map(|c| (ip, c)))
            .collect()
    }

    /// Resolve streams (and optionally analyse them) for every device on the
    /// analysis pool. Devices are independent; the result is sorted by IP.
    pub async fn discover_all(
        &self,
        devices: Vec<Device>,
        options: &RunOptions,
        hints: &HashMap<IpAddr, Credential>,
    ) -> Result<Vec<Device>> {
        let total = devices.len();
        let done = Arc::new(AtomicUsize::new(0));
        info!(devices = total, workers = self.analysis_pool.size(), "Stream discovery started");

        let credentials = Arc::new(options.credentials.clone());
        let custom_pairs = Arc::new(options.custom_pairs.clone());
        let hints = Arc::new(hints.clone());
        let analyze = options.analyze;

        let mut results = self
            .analysis_pool
            .run_batch(devices, |mut device| {
                let engine = Arc::clone(&self.engine);
                let analyzer = Arc::clone(&self.analyzer);
                let credentials = Arc::clone(&credentials);
                let custom_pairs = Arc::clone(&custom_pairs);
                let hints = Arc::clone(&hints);
                let done = Arc::clone(&done);
                async move {
                    let ordered = prioritize(hints.get(&device.ip), &credentials);
                    engine.discover(&mut device, &ordered, &custom_pairs).await;
                    if analyze && !device.streams.is_empty() {
                        analyzer.analyze_device(&mut device).await;
                    }

                    let current = done.fetch_add(1, Ordering::SeqCst) + 1;
                    info!(
                        current = current,
                        total = total,
                        ip = %device.ip,
                        status = ?device.status,
                        streams = device.streams.len(),
                        "Device processed"
                    );
                    device
                }
            })
            .await?;

        results.sort_by_key(|d| d.ip);
        let completed = results
            .iter()
            .filter(|d| d.status == DeviceStatus::Completed && !d.streams.is_empty())
            .count();
        info!(devices = results.len(), with_streams = completed, "Stream discovery finished");
        Ok(results)
    }

    /// Stop every pool: dispatch first, then background work with `grace`
    pub async fn shutdown(&self, grace: Duration) {
        self.scanner.cancel();
        self.analysis_pool.shutdown(grace).await;
        self.engine.shutdown(grace).await;
        info!("Pipeline shut down");
    }
}

/// Move the hinted credential to the front, keeping the rest in order
pub fn prioritize(hint: Option<&Credential>, credentials: &[Credential]) -> Vec<Credential> {
    let mut ordered = Vec::with_capacity(credentials.len() + 1);
    if let Some(h) = hint {
        ordered.push(h.clone());
    }
    ordered.extend(credentials.iter().filter(|c| Some(*c) != hint).cloned());
    ordered
}
