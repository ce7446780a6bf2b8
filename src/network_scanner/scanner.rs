use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, info};

use super::ports::record_open_port;
use crate::error::Result;
use crate::models::Device;
use crate::transport::probe_port;
use crate::worker_pool::WorkerPool;

/// Progress callback: (completed IPs, total IPs)
pub type ProgressFn = Arc<dyn Fn(usize, usize) + Send + Sync>;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

pub struct NetworkScanner {
    pool: Arc<WorkerPool>,
    ports: Arc<Vec<u16>>,
    connect_timeout: Duration,
}

impl NetworkScanner {
    pub fn new(pool: Arc<WorkerPool>, ports: Vec<u16>, connect_timeout: Duration) -> Self {
        Self {
            pool,
            ports: Arc::new(ports),
            connect_timeout,
        }
    }

    pub fn ports(&self) -> &[u16] {
        &self.ports
    }

    /// Stop dispatching further IPs; probes already running finish
    pub fn cancel(&self) {
        self.pool.close();
    }

    /// Probe every port on every IP. Only IPs with at least one open port
    /// produce a device; the result is sorted by IP.
    pub async fn scan(&self, ips: Vec<IpAddr>, progress: Option<ProgressFn>) -> Result<Vec<Device>> {
        let total = ips.len();
        let done = Arc::new(AtomicUsize::new(0));
        info!(hosts = total, ports = self.ports.len(), workers = self.pool.size(), "Port scan started");

        let ports = Arc::clone(&self.ports);
        let connect_timeout = self.connect_timeout;
        let results = self
            .pool
            .run_batch(ips, |ip| {
                let ports = Arc::clone(&ports);
                let done = Arc::clone(&done);
                let progress = progress.clone();
                async move {
                    let device = scan_host(ip, &ports, connect_timeout).await;
                    let current = done.fetch_add(1, Ordering::SeqCst) + 1;
                    if let Some(cb) = &progress {
                        cb(current, total);
                    }
                    device
                }
            })
            .await?;

        let mut devices: Vec<Device> = results.into_iter().flatten().collect();
        devices.sort_by_key(|d| d.ip);
        info!(
            hosts = total,
            scanned = done.load(Ordering::SeqCst),
            found = devices.len(),
            "Port scan finished"
        );
        Ok(devices)
    }
}

/// All ports of one host concurrently
pub async fn scan_host(ip: IpAddr, ports: &[u16], connect_timeout: Duration) -> Option<Device> {
    let probes = join_all(ports.iter().map(|&port| probe_port(ip, port, connect_timeout))).await;

    let mut device = Device::new(ip);
    let mut open = 0;
    for result in probes.iter().filter(|r| r.is_open()) {
        record_open_port(&mut device, result.port);
        open += 1;
    }
    if open == 0 {
        return None;
    }
    debug!(ip = %ip, ports = ?device.all_ports(), nvr = device.is_nvr, "Host answered");
    Some(device)
}

/// Combine multicast-discovered and port-scanned devices by IP.
///
/// Multicast entries keep their identity and service URL; a scanned entry
/// for the same IP only contributes ports not already present (and the NVR
/// flag, which follows from those ports). Scanned-only devices are appended.
pub fn merge_device_lists(multicast: Vec<Device>, scanned: Vec<Device>) -> Vec<Device> {
    let mut merged: Vec<Device> = Vec::with_capacity(multicast.len() + scanned.len());
    let mut index: HashMap<IpAddr, usize> = HashMap::new();

    for device in multicast {
        match index.get(&device.ip) {
            Some(_) => continue,
            None => {
                index.insert(device.ip, merged.len());
                merged.push(device);
            }
        }
    }

    for scanned_device in scanned {
        match index.get(&scanned_device.ip) {
            Some(&i) => {
                let target = &mut merged[i];
                let known = target.all_ports();
                for port in scanned_device.all_ports().difference(&known) {
                    record_open_port(target, *port);
                }
                target.is_nvr |= scanned_device.is_nvr;
                if target.mac.is_none() {
                    target.mac = scanned_device.mac;
                }
            }
            None => {
                index.insert(scanned_device.ip, merged.len());
                merged.push(scanned_device);
            }
        }
    }

    merged
}
