//! Result data structures for speed test output.
//!
//! [`SpeedTestResult`] is what a completed run hands to the presentation
//! layer. The four headline numbers sit at the top level; per-phase
//! detail is kept alongside for `--json` consumers.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::measurements::{aggregate_throughput, average_valid_speeds, SpeedSample};

/// Final aggregate of one completed run.
#[derive(Debug, Clone, Serialize)]
pub struct SpeedTestResult {
    /// When the run completed
    pub timestamp: DateTime<Utc>,
    /// Download speed in Mbps
    pub download: f64,
    /// Upload speed in Mbps
    pub upload: f64,
    /// Trimmed-mean round trip in milliseconds
    pub ping: f64,
    /// Client address reported by the server
    pub ip: String,
    pub details: RunDetails,
}

impl SpeedTestResult {
    pub fn new(
        ip: String,
        download: ThroughputReport,
        upload: ThroughputReport,
        latency: LatencyReport,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            download: download.speed_mbps,
            upload: upload.speed_mbps,
            ping: latency.ping_ms,
            ip,
            details: RunDetails { download, upload, latency },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunDetails {
    pub download: ThroughputReport,
    pub upload: ThroughputReport,
    pub latency: LatencyReport,
}

/// Summary of one throughput phase.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThroughputReport {
    /// Mean of the valid per-request speeds; the headline figure
    pub speed_mbps: f64,
    /// Total bytes over total time across timed requests
    pub aggregate_mbps: f64,
    pub requests: usize,
    pub failed: usize,
    pub bytes: u64,
}

impl ThroughputReport {
    pub fn from_samples(samples: &[SpeedSample]) -> Self {
        let failed = samples.iter().filter(|s| !s.is_valid()).count();

        Self {
            speed_mbps: average_valid_speeds(samples),
            aggregate_mbps: aggregate_throughput(samples),
            requests: samples.len(),
            failed,
            bytes: samples.iter().map(|s| s.bytes).sum(),
        }
    }
}

/// Summary of the ping phase.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatencyReport {
    pub ping_ms: f64,
    /// Raw round trips in the order they were taken
    pub samples_ms: Vec<f64>,
    /// How many samples are the failure penalty rather than a real timing
    pub penalties: usize,
}

/// `1234.5` → `1.23 Gbps`, `95.12` → `95.12 Mbps`, `0.5` → `500 Kbps`.
pub fn format_speed(mbps: f64) -> String {
    if mbps >= 1000.0 {
        format!("{:.2} Gbps", mbps / 1000.0)
    } else if mbps >= 1.0 {
        format!("{:.2} Mbps", mbps)
    } else {
        format!("{:.0} Kbps", mbps * 1000.0)
    }
}

pub fn format_ping(ms: f64) -> String {
    format!("{} ms", ms.round() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(bytes: u64, secs: f64, mbps: f64) -> SpeedSample {
        SpeedSample::reported(bytes, secs, mbps)
    }

    #[test]
    fn test_format_speed_units() {
        assert_eq!(format_speed(1234.5), "1.23 Gbps");
        assert_eq!(format_speed(1000.0), "1.00 Gbps");
        assert_eq!(format_speed(95.123), "95.12 Mbps");
        assert_eq!(format_speed(1.0), "1.00 Mbps");
        assert_eq!(format_speed(0.5), "500 Kbps");
        assert_eq!(format_speed(0.0), "0 Kbps");
    }

    #[test]
    fn test_format_ping_rounds() {
        assert_eq!(format_ping(49.6), "50 ms");
        assert_eq!(format_ping(12.2), "12 ms");
    }

    #[test]
    fn test_throughput_report_skips_failures() {
        let samples = vec![
            sample(1_048_576, 1.0, 8.0),
            SpeedSample::failed(),
            sample(2_097_152, 1.0, 16.0),
        ];

        let report = ThroughputReport::from_samples(&samples);
        assert_eq!(report.requests, 3);
        assert_eq!(report.failed, 1);
        assert_eq!(report.bytes, 3_145_728);
        assert!((report.speed_mbps - 12.0).abs() < 1e-9);
        assert!((report.aggregate_mbps - 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_throughput_report_all_failed_is_zero() {
        let report = ThroughputReport::from_samples(&[SpeedSample::failed(); 4]);
        assert_eq!(report.speed_mbps, 0.0);
        assert_eq!(report.aggregate_mbps, 0.0);
        assert_eq!(report.failed, 4);
    }

    #[test]
    fn test_result_serialization() {
        let result = SpeedTestResult::new(
            "203.0.113.5".to_string(),
            ThroughputReport::from_samples(&[sample(1_048_576, 0.5, 16.0)]),
            ThroughputReport::from_samples(&[sample(524_288, 0.5, 8.0)]),
            LatencyReport {
                ping_ms: 50.0,
                samples_ms: vec![50.0, 40.0, 200.0, 45.0, 55.0],
                penalties: 0,
            },
        );

        let json: serde_json::Value =
            serde_json::from_str(&serde_json::to_string(&result).unwrap())
                .unwrap();

        assert_eq!(json["download"], 16.0);
        assert_eq!(json["upload"], 8.0);
        assert_eq!(json["ping"], 50.0);
        assert_eq!(json["ip"], "203.0.113.5");
        assert!(json["timestamp"].is_string());
        assert_eq!(json["details"]["latency"]["samples_ms"][2], 200.0);
    }
}
