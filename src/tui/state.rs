//! TUI state management.
//!
//! Holds everything the renderer needs: the run phase, the unified
//! progress value, live speed, the client address and the last result.

use crate::measurements::SpeedSample;
use crate::results::SpeedTestResult;
use crate::speedtest::phase::Phase;
use crate::speedtest::progress::{Direction, ProgressEvent};

/// Error information for display.
#[derive(Debug, Clone)]
pub struct ErrorInfo {
    pub message: String,
    pub suggestion: Option<String>,
}

/// Round trips seen so far in the ping phase.
#[derive(Debug, Clone, Default)]
pub struct LatencyState {
    pub measurements: Vec<f64>,
    pub current: usize,
    pub total: usize,
}

/// Sub-requests seen so far in one throughput phase.
#[derive(Debug, Clone, Default)]
pub struct BandwidthState {
    pub requests: usize,
    pub failed: usize,
    /// Speed of the last sub-request that succeeded
    pub last_sample_mbps: Option<f64>,
}

impl BandwidthState {
    fn record(&mut self, sample: &SpeedSample, current: usize) {
        self.requests = current;
        if sample.is_valid() {
            self.last_sample_mbps = Some(sample.throughput_mbps);
        } else {
            self.failed += 1;
        }
    }
}

/// State for the TUI display.
#[derive(Debug, Clone)]
pub struct TuiState {
    pub phase: Phase,
    /// Unified progress, 0 to 100
    pub progress: f64,
    pub current_speed_mbps: Option<f64>,
    /// Which transfer `current_speed_mbps` belongs to
    pub current_direction: Option<Direction>,
    pub client_ip: Option<String>,
    pub server_url: String,
    pub latency: LatencyState,
    pub download: BandwidthState,
    pub upload: BandwidthState,
    pub result: Option<SpeedTestResult>,
    pub error: Option<ErrorInfo>,
    pub terminal_width: u16,
}

impl Default for TuiState {
    fn default() -> Self {
        Self {
            phase: Phase::Idle,
            progress: 0.0,
            current_speed_mbps: None,
            current_direction: None,
            client_ip: None,
            server_url: String::new(),
            latency: LatencyState::default(),
            download: BandwidthState::default(),
            upload: BandwidthState::default(),
            result: None,
            error: None,
            terminal_width: 80,
        }
    }
}

impl TuiState {
    pub fn new(server_url: impl Into<String>) -> Self {
        Self { server_url: server_url.into(), ..Self::default() }
    }

    pub fn is_testing(&self) -> bool {
        self.phase.is_testing()
    }

    /// Clear everything a previous run left behind. The client address
    /// stays until the next identity lookup replaces it.
    pub fn reset(&mut self) {
        self.phase = Phase::Idle;
        self.progress = 0.0;
        self.current_speed_mbps = None;
        self.current_direction = None;
        self.latency = LatencyState::default();
        self.download = BandwidthState::default();
        self.upload = BandwidthState::default();
        self.result = None;
        self.error = None;
    }

    /// The user stopped the run; show the idle screen immediately rather
    /// than waiting for the engine to unwind.
    pub fn stop(&mut self) {
        self.phase = Phase::Idle;
        self.progress = 0.0;
        self.current_speed_mbps = None;
        self.current_direction = None;
    }

    /// Set an error state with optional suggestion.
    pub fn set_error(&mut self, message: String, suggestion: Option<String>) {
        self.error = Some(ErrorInfo { message, suggestion });
    }

    /// Update state from a progress event emitted by the test engine.
    pub fn update_from_event(&mut self, event: &ProgressEvent) {
        match event {
            ProgressEvent::PhaseChange(phase) => {
                self.phase = *phase;
                self.current_speed_mbps = None;
                self.current_direction = None;
        self.current_direction = None;
                if *phase == Phase::Idle {
                    self.progress = 0.0;
                }
            }
            ProgressEvent::ClientIp(ip) => {
                self.client_ip = Some(ip.clone());
            }
            ProgressEvent::Progress(value) if !value.is_nan() => {
                self.progress = value.clamp(0.0, 100.0);
            }
            ProgressEvent::Progress(_) => {}
            ProgressEvent::CurrentSpeed { direction, speed_mbps } => {
                self.current_speed_mbps = Some(*speed_mbps);
                self.current_direction = Some(*direction);
            }
            ProgressEvent::SampleComplete { direction, sample, current } => {
                let state = match direction {
                    Direction::Download => &mut self.download,
                    Direction::Upload => &mut self.upload,
                };
                state.record(sample, *current);
            }
            ProgressEvent::LatencyMeasurement { value_ms, current, total } => {
                self.latency.measurements.push(*value_ms);
                self.latency.current = *current;
                self.latency.total = *total;
            }
            ProgressEvent::Completed(result) => {
                self.result = Some(result.clone());
                self.progress = 100.0;
            }
            ProgressEvent::Error(message) => {
                self.set_error(message.clone(), None);
            }
        }
    }
}
