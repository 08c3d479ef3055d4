//! Progress event types and callback interface.
//!
//! Defines the events emitted by the test engine to update the UI
//! and the callback trait for receiving these events.

use std::time::Duration;

use super::phase::Phase;
use crate::measurements::SpeedSample;
use crate::results::SpeedTestResult;

/// Direction of a throughput measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Download,
    Upload,
}

impl Direction {
    pub fn label(self) -> &'static str {
        match self {
            Direction::Download => "Download",
            Direction::Upload => "Upload",
        }
    }
}

/// Progress events emitted during a run.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// The run moved to a new phase.
    PhaseChange(Phase),
    /// Address reported by the identity endpoint.
    ClientIp(String),
    /// Unified progress, 0 to 100.
    Progress(f64),
    /// Live throughput while a transfer is in flight.
    CurrentSpeed {
        direction: Direction,
        speed_mbps: f64,
    },
    /// One sub-request finished (a failed one carries a zero sample).
    SampleComplete {
        direction: Direction,
        sample: SpeedSample,
        /// 1-indexed
        current: usize,
    },
    /// One ping round trip finished.
    LatencyMeasurement {
        /// Round trip in milliseconds, or the penalty value on failure
        value_ms: f64,
        /// 1-indexed
        current: usize,
        total: usize,
    },
    /// The run finished with a result.
    Completed(SpeedTestResult),
    /// The run failed and no result will follow.
    Error(String),
}

/// Callback interface for progress updates.
///
/// Implementations must be non-blocking to avoid affecting
/// measurement accuracy.
pub trait ProgressCallback: Send + Sync {
    fn on_progress(&self, event: ProgressEvent);
}

/// Discards every event.
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_progress(&self, _event: ProgressEvent) {}
}

/// Position on the unified bar for a phase paced by wall-clock time.
/// Capped at the end of the phase's span however long it overruns.
pub fn timed_progress(phase: Phase, elapsed: Duration, target: Duration) -> f64 {
    let (start, end) = phase.progress_span();
    if target.is_zero() {
        return end;
    }

    let fraction = elapsed.as_secs_f64() / target.as_secs_f64();
    (start + fraction * (end - start)).min(end)
}

/// Position on the unified bar for a phase paced by a fixed count.
pub fn counted_progress(phase: Phase, done: usize, total: usize) -> f64 {
    let (start, end) = phase.progress_span();
    if total == 0 {
        return end;
    }

    start + (done.min(total) as f64 / total as f64) * (end - start)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_progress_is_time_based() {
        let target = Duration::from_secs(10);
        assert_eq!(timed_progress(Phase::Download, Duration::ZERO, target), 0.0);
        assert_eq!(
            timed_progress(Phase::Download, Duration::from_secs(5), target),
            30.0
        );
        assert_eq!(
            timed_progress(Phase::Download, Duration::from_secs(25), target),
            60.0
        );
    }

    #[test]
    fn test_upload_progress_stays_in_its_span() {
        let target = Duration::from_secs(10);
        assert_eq!(
            timed_progress(Phase::Upload, Duration::from_secs(5), target),
            70.0
        );
        assert_eq!(
            timed_progress(Phase::Upload, Duration::from_secs(11), target),
            80.0
        );
        assert_eq!(timed_progress(Phase::Upload, Duration::ZERO, Duration::ZERO), 80.0);
    }

    #[test]
    fn test_ping_progress_counts_round_trips() {
        assert_eq!(counted_progress(Phase::Ping, 1, 5), 84.0);
        assert_eq!(counted_progress(Phase::Ping, 5, 5), 100.0);
        assert_eq!(counted_progress(Phase::Ping, 0, 0), 100.0);
    }
}

#[cfg(test)]
pub(crate) mod recording {
    use super::*;
    use std::sync::Mutex;

    /// Keeps every event for later assertions.
    #[derive(Default)]
    pub struct RecordingProgress {
        events: Mutex<Vec<ProgressEvent>>,
    }

    impl RecordingProgress {
        pub fn events(&self) -> Vec<ProgressEvent> {
            self.events.lock().unwrap().clone()
        }

        pub fn phases(&self) -> Vec<Phase> {
            self.events()
                .into_iter()
                .filter_map(|event| match event {
                    ProgressEvent::PhaseChange(phase) => Some(phase),
                    _ => None,
                })
                .collect()
        }

        pub fn progress_values(&self) -> Vec<f64> {
            self.events()
                .into_iter()
                .filter_map(|event| match event {
                    ProgressEvent::Progress(value) => Some(value),
                    _ => None,
                })
                .collect()
        }
    }

    impl ProgressCallback for RecordingProgress {
        fn on_progress(&self, event: ProgressEvent) {
            self.events.lock().unwrap().push(event);
        }
    }
}
