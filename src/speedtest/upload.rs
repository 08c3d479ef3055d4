//! Upload phase: post random payloads in a round-robin of sizes until the
//! minimum phase duration has passed. The server times each body, so its
//! `speedMbps` is the sample.

use log::{debug, info, warn};
use tokio::time::Instant;

use super::client::{BoxError, Client};
use super::engine::TestConfig;
use super::phase::Phase;
use super::progress::{timed_progress, Direction, ProgressCallback, ProgressEvent};
use super::requests::upload::Upload;
use crate::measurements::SpeedSample;

pub async fn run(
    client: &Client,
    config: &TestConfig,
    progress: &dyn ProgressCallback,
) -> Vec<SpeedSample> {
    let phase_start = Instant::now();
    let mut sizes = config.upload_sizes.iter().copied().cycle();
    let mut samples = Vec::new();

    while phase_start.elapsed() < config.min_phase_duration {
        let Some(size) = sizes.next() else { break };

        let sample = match post(client, size).await {
            Ok(sample) => {
                debug!(
                    "Upload {} bytes: {:.2} Mbps in {:.3}s",
                    size, sample.throughput_mbps, sample.elapsed_secs
                );
                progress.on_progress(ProgressEvent::CurrentSpeed {
                    direction: Direction::Upload,
                    speed_mbps: sample.throughput_mbps,
                });
                sample
            }
            Err(e) => {
                warn!("Upload {} bytes failed: {}", size, e);
                SpeedSample::failed()
            }
        };

        samples.push(sample);
        progress.on_progress(ProgressEvent::SampleComplete {
            direction: Direction::Upload,
            sample,
            current: samples.len(),
        });
        progress.on_progress(ProgressEvent::Progress(timed_progress(
            Phase::Upload,
            phase_start.elapsed(),
            config.min_phase_duration,
        )));
    }

    info!(
        "Upload phase finished: {} requests in {:.1}s",
        samples.len(),
        phase_start.elapsed().as_secs_f64()
    );

    samples
}

async fn post(client: &Client, size: usize) -> Result<SpeedSample, BoxError> {
    let request = Upload::random(size);
    let receipt = client.send(&request).await?;

    if !receipt.success {
        return Err("server rejected the upload".into());
    }

    Ok(SpeedSample::reported(
        receipt.received_bytes,
        receipt.duration,
        receipt.speed_mbps,
    ))
}
