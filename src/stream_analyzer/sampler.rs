//! Packet sampling for an observed bitrate when the stream reports none

use std::time::{Duration, Instant};

/// One `packet=pts_time,size` entry
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PacketSample {
    pub pts_time: Option<f64>,
    pub size: u64,
}

/// Parse one line of `-of compact=p=0` packet output
/// (`pts_time=0.040000|size=1834`). Field order does not matter.
pub fn parse_packet_line(line: &str) -> Option<PacketSample> {
    let mut pts_time = None;
    let mut size = None;
    for field in line.trim().split('|') {
        match field.split_once('=') {
            Some(("pts_time", v)) => pts_time = v.parse().ok(),
            Some(("size", v)) => size = v.parse().ok(),
            _ => {}
        }
    }
    Some(PacketSample {
        pts_time,
        size: size?,
    })
}

/// Accumulates packet sizes until either limit is reached
#[derive(Debug)]
pub struct BitrateSampler {
    max_packets: usize,
    max_duration: Duration,
    started: Instant,
    packets: usize,
    bytes: u64,
    first_pts: Option<f64>,
    last_pts: Option<f64>,
}

impl BitrateSampler {
    pub fn new(max_packets: usize, max_duration: Duration) -> Self {
        Self {
            max_packets: max_packets.max(2),
            max_duration,
            started: Instant::now(),
            packets: 0,
            bytes: 0,
            first_pts: None,
            last_pts: None,
        }
    }

    /// Record a packet; returns false once sampling should stop
    pub fn push(&mut self, sample: PacketSample) -> bool {
        self.packets += 1;
        self.bytes += sample.size;
        if let Some(pts) = sample.pts_time {
            self.first_pts.get_or_insert(pts);
            self.last_pts = Some(pts);
        }
        !self.is_full()
    }

    pub fn is_full(&self) -> bool {
        self.packets >= self.max_packets || self.started.elapsed() >= self.max_duration
    }

    pub fn packets(&self) -> usize {
        self.packets
    }

    /// Observed kbps. The pts span covers `packets - 1` intervals, so it is
    /// stretched by one average interval; wall-clock time is used when the
    /// stream carries no usable timestamps.
    pub fn bitrate_kbps(&self) -> Option<u32> {
        if self.packets < 2 || self.bytes == 0 {
            return None;
        }
        let span = match (self.first_pts, self.last_pts) {
            (Some(first), Some(last)) if last > first => {
                (last - first) * self.packets as f64 / (self.packets - 1) as f64
            }
            _ => self.started.elapsed().as_secs_f64(),
        };
        if span <= 0.0 {
            return None;
        }
        Some((self.bytes as f64 * 8.0 / span / 1000.0).round() as u32)
    }

    /// Packets per second from the pts span
    pub fn packet_rate(&self) -> Option<f64> {
        match (self.first_pts, self.last_pts) {
            (Some(first), Some(last)) if last > first && self.packets >= 2 => {
                Some(((self.packets - 1) as f64 / (last - first) * 100.0).round() / 100.0)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_packet_line() {
        assert_eq!(
            parse_packet_line("pts_time=0.040000|size=1834"),
            Some(PacketSample { pts_time: Some(0.04), size: 1834 })
        );
        assert_eq!(
            parse_packet_line("size=99|pts_time=N/A"),
            Some(PacketSample { pts_time: None, size: 99 })
        );
        assert_eq!(parse_packet_line("pts_time=1.0"), None);
        assert_eq!(parse_packet_line(""), None);
    }

    #[test]
    fn test_bitrate_from_pts() {
        // 25 fps, 5000 bytes per packet -> 1000 kbps
        let mut sampler = BitrateSampler::new(30, Duration::from_secs(10));
        for i in 0..10 {
            sampler.push(PacketSample {
                pts_time: Some(i as f64 * 0.04),
                size: 5000,
            });
        }
        assert_eq!(sampler.bitrate_kbps(), Some(1000));
        assert_eq!(sampler.packet_rate(), Some(25.0));
    }

    #[test]
    fn test_packet_limit() {
        let mut sampler = BitrateSampler::new(3, Duration::from_secs(10));
        let p = PacketSample { pts_time: None, size: 1 };
        assert!(sampler.push(p));
        assert!(sampler.push(p));
        assert!(!sampler.push(p));
        assert_eq!(sampler.packets(), 3);
    }

    #[test]
    fn test_too_few_packets() {
        let mut sampler = BitrateSampler::new(30, Duration::from_secs(10));
        sampler.push(PacketSample { pts_time: Some(0.0), size: 100 });
        assert_eq!(sampler.bitrate_kbps(), None);
        assert_eq!(sampler.packet_rate(), None);
    }
}
