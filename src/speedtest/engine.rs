use std::time::Duration;

use log::{debug, info, warn};

use super::cancel::CancelToken;
use super::client::Client;
use super::phase::{Phase, PhaseEvent};
use super::progress::{ProgressCallback, ProgressEvent};
use super::requests::identity::Identity;
use super::{download, latency, upload};
use crate::errors::{to_speed_test_error, ErrorKind, SpeedTestError};
use crate::measurements::MEBIBYTE;
use crate::results::{SpeedTestResult, ThroughputReport};

/// Configuration for the test engine.
#[derive(Debug, Clone)]
pub struct TestConfig {
    /// Download payload sizes in MiB, requested round-robin.
    /// Default: 1, 2, 4, 8
    pub download_sizes_mb: Vec<u64>,

    /// Upload payload sizes in bytes, posted round-robin.
    /// Default: 512 KiB, 1 MiB, 2 MiB
    pub upload_sizes: Vec<usize>,

    /// Minimum wall-clock time spent in each throughput phase.
    /// Default: 10s
    pub min_phase_duration: Duration,

    /// Number of sequential ping round trips.
    /// Default: 5
    pub ping_count: usize,

    /// Value recorded for a ping that failed.
    /// Default: 999ms
    pub ping_penalty_ms: f64,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            download_sizes_mb: vec![1, 2, 4, 8],
            upload_sizes: vec![
                (MEBIBYTE / 2) as usize,
                MEBIBYTE as usize,
                (2 * MEBIBYTE) as usize,
            ],
            min_phase_duration: Duration::from_secs(10),
            ping_count: 5,
            ping_penalty_ms: 999.0,
        }
    }
}

/// Owns the run's phase and reports every change.
struct PhaseTracker<'a> {
    phase: Phase,
    progress: &'a dyn ProgressCallback,
}

impl<'a> PhaseTracker<'a> {
    fn new(progress: &'a dyn ProgressCallback) -> Self {
        Self { phase: Phase::Idle, progress }
    }

    fn apply(&mut self, event: PhaseEvent) -> Result<Phase, SpeedTestError> {
        let next = self.phase.next(event).map_err(|e| {
            SpeedTestError::new(ErrorKind::Unknown, "phase sequencing failed")
                .with_source(e)
        })?;

        debug!("Phase {} -> {}", self.phase, next);
        self.phase = next;
        self.progress.on_progress(ProgressEvent::PhaseChange(next));

        Ok(next)
    }

    fn abort(&mut self) {
        self.phase = Phase::Idle;
        self.progress.on_progress(ProgressEvent::PhaseChange(Phase::Idle));
        self.progress.on_progress(ProgressEvent::Progress(0.0));
    }
}

/// Runs identity, download, upload and ping against one server.
pub struct TestEngine {
    client: Client,
    config: TestConfig,
}

impl TestEngine {
    pub fn new(client: Client, config: TestConfig) -> Self {
        Self { client, config }
    }

    /// Run one complete test.
    ///
    /// Returns `Ok(None)` when `cancel` fires before the run finishes; the
    /// in-flight request is dropped and no result is produced. Whatever
    /// the outcome, the last phase reported is `Complete` or `Idle`.
    pub async fn run(
        &self,
        cancel: &CancelToken,
        progress: &dyn ProgressCallback,
    ) -> Result<Option<SpeedTestResult>, SpeedTestError> {
        let mut tracker = PhaseTracker::new(progress);

        tracker.apply(PhaseEvent::Start)?;
        progress.on_progress(ProgressEvent::Progress(0.0));
        info!("Starting speed test against {}", self.client.base_url());

        let outcome = cancel
            .run_until_cancelled(self.sequence(&mut tracker, progress))
            .await;

        match outcome {
            Some(Ok(result)) => {
                info!(
                    "Speed test complete: download={:.2} Mbps, upload={:.2} Mbps, ping={:.1} ms",
                    result.download, result.upload, result.ping
                );
                progress.on_progress(ProgressEvent::Completed(result.clone()));
                Ok(Some(result))
            }
            Some(Err(e)) => {
                warn!("Speed test failed: {}", e.message);
                tracker.abort();
                progress.on_progress(ProgressEvent::Error(e.message.clone()));
                Err(e)
            }
            None => {
                info!("Speed test cancelled");
                tracker.abort();
                Ok(None)
            }
        }
    }

    async fn sequence(
        &self,
        tracker: &mut PhaseTracker<'_>,
        progress: &dyn ProgressCallback,
    ) -> Result<SpeedTestResult, SpeedTestError> {
        let identity = self
            .client
            .send(&Identity)
            .await
            .map_err(|e| to_speed_test_error(e, "identity lookup failed"))?;
        debug!("Client identity: {} ({})", identity.ip, identity.user_agent);
        progress.on_progress(ProgressEvent::ClientIp(identity.ip.clone()));

        let download = download::run(&self.client, &self.config, progress).await;
        tracker.apply(PhaseEvent::Finished)?;

        let upload = upload::run(&self.client, &self.config, progress).await;
        tracker.apply(PhaseEvent::Finished)?;

        let latency = latency::run(&self.client, &self.config, progress).await;
        tracker.apply(PhaseEvent::Finished)?;
        progress.on_progress(ProgressEvent::Progress(100.0));

        Ok(SpeedTestResult::new(
            identity.ip,
            ThroughputReport::from_samples(&download),
            ThroughputReport::from_samples(&upload),
            latency,
        ))
    }
}
