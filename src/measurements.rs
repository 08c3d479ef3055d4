//! Throughput arithmetic shared by the server sink and the client phases.
//!
//! All rates are megabits per second where a megabit is 2^20 bits, so a
//! payload of `n` MiB moved in one second reports `8n` Mbps.

use std::time::Duration;

/// Bytes in one mebibyte.
pub const MEBIBYTE: u64 = 1024 * 1024;

/// Convert a byte count and elapsed seconds into Mbps.
///
/// Returns `None` when `elapsed_secs` is not strictly positive, so a
/// zero-length timing can never poison an average.
pub fn throughput_mbps(bytes: u64, elapsed_secs: f64) -> Option<f64> {
    if elapsed_secs.is_nan() || elapsed_secs <= 0.0 {
        return None;
    }

    Some((bytes as f64 * 8.0) / MEBIBYTE as f64 / elapsed_secs)
}

/// One measured transfer: bytes moved over a wall-clock interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedSample {
    pub bytes: u64,
    pub elapsed_secs: f64,
    pub throughput_mbps: f64,
}

impl SpeedSample {
    /// Build a sample from a transfer, `None` for a non-positive interval.
    pub fn new(bytes: u64, elapsed: Duration) -> Option<Self> {
        let elapsed_secs = elapsed.as_secs_f64();
        throughput_mbps(bytes, elapsed_secs).map(|throughput_mbps| Self {
            bytes,
            elapsed_secs,
            throughput_mbps,
        })
    }

    /// A failed sub-request. Counted, but never averaged.
    pub fn failed() -> Self {
        Self { bytes: 0, elapsed_secs: 0.0, throughput_mbps: 0.0 }
    }

    /// Sample reported by a remote party that did its own timing.
    pub fn reported(bytes: u64, elapsed_secs: f64, throughput_mbps: f64) -> Self {
        Self { bytes, elapsed_secs, throughput_mbps }
    }

    pub fn is_valid(&self) -> bool {
        self.elapsed_secs > 0.0 && self.throughput_mbps > 0.0
    }
}

/// Mean of the per-transfer throughputs, skipping failed (zero) samples.
///
/// Yields 0.0 when no valid sample exists.
pub fn average_valid_speeds(samples: &[SpeedSample]) -> f64 {
    let speeds: Vec<f64> = samples
        .iter()
        .filter(|s| s.is_valid())
        .map(|s| s.throughput_mbps)
        .collect();

    crate::stats::mean(&speeds).unwrap_or(0.0)
}

/// Total bytes over total time across all samples with a positive interval.
///
/// Yields 0.0 when no sample has a positive interval.
pub fn aggregate_throughput(samples: &[SpeedSample]) -> f64 {
    let (bytes, secs) = samples
        .iter()
        .filter(|s| s.elapsed_secs > 0.0)
        .fold((0u64, 0.0f64), |(bytes, secs), s| {
            (bytes + s.bytes, secs + s.elapsed_secs)
        });

    throughput_mbps(bytes, secs).unwrap_or(0.0)
}
