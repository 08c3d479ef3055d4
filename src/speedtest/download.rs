//! Download phase: pull payloads in a round-robin of sizes until the
//! minimum phase duration has passed.
//!
//! The duration is checked between payloads, never mid-transfer, so the
//! phase overruns its floor by at most one payload.

use futures::StreamExt;
use log::{debug, info, warn};
use tokio::time::Instant;

use super::client::{BoxError, Client};
use super::engine::TestConfig;
use super::phase::Phase;
use super::progress::{timed_progress, Direction, ProgressCallback, ProgressEvent};
use super::requests::download::Download;
use crate::measurements::{throughput_mbps, SpeedSample};

pub async fn run(
    client: &Client,
    config: &TestConfig,
    progress: &dyn ProgressCallback,
) -> Vec<SpeedSample> {
    let phase_start = Instant::now();
    let mut sizes = config.download_sizes_mb.iter().copied().cycle();
    let mut samples = Vec::new();

    while phase_start.elapsed() < config.min_phase_duration {
        let Some(size_mb) = sizes.next() else { break };

        let sample =
            match fetch(client, size_mb, phase_start, config, progress).await {
                Ok(sample) => {
                    debug!(
                        "Download {} MiB: {:.2} Mbps in {:.3}s",
                        size_mb, sample.throughput_mbps, sample.elapsed_secs
                    );
                    sample
                }
                Err(e) => {
                    warn!("Download {} MiB failed: {}", size_mb, e);
                    SpeedSample::failed()
                }
            };

        samples.push(sample);
        progress.on_progress(ProgressEvent::SampleComplete {
            direction: Direction::Download,
            sample,
            current: samples.len(),
        });
    }

    info!(
        "Download phase finished: {} requests in {:.1}s",
        samples.len(),
        phase_start.elapsed().as_secs_f64()
    );

    samples
}

/// One payload, read chunk by chunk so the live speed can be reported.
async fn fetch(
    client: &Client,
    size_mb: u64,
    phase_start: Instant,
    config: &TestConfig,
    progress: &dyn ProgressCallback,
) -> Result<SpeedSample, BoxError> {
    let request = Download::new(size_mb);
    let expected = request.expected_bytes();

    let started = Instant::now();
    let mut body = client.execute(&request).await?.bytes_stream();
    let mut received: u64 = 0;

    while let Some(chunk) = body.next().await {
        received += chunk?.len() as u64;

        if let Some(speed_mbps) =
            throughput_mbps(received, started.elapsed().as_secs_f64())
        {
            progress.on_progress(ProgressEvent::CurrentSpeed {
                direction: Direction::Download,
                speed_mbps,
            });
        }
        progress.on_progress(ProgressEvent::Progress(timed_progress(
            Phase::Download,
            phase_start.elapsed(),
            config.min_phase_duration,
        )));
    }

    if received != expected {
        return Err(format!(
            "body ended after {} of {} bytes",
            received, expected
        )
        .into());
    }

    SpeedSample::new(received, started.elapsed())
        .ok_or_else(|| "transfer finished in zero time".into())
}
