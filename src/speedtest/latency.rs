//! Ping phase: a fixed number of sequential round trips, summarised by a
//! trimmed mean.

use log::{debug, info, warn};
use tokio::time::Instant;

use super::client::{BoxError, Client};
use super::engine::TestConfig;
use super::phase::Phase;
use super::progress::{counted_progress, ProgressCallback, ProgressEvent};
use super::requests::ping::Ping;
use crate::results::LatencyReport;
use crate::stats::{mean, trimmed_mean};

pub async fn run(
    client: &Client,
    config: &TestConfig,
    progress: &dyn ProgressCallback,
) -> LatencyReport {
    let total = config.ping_count;
    let mut samples_ms = Vec::with_capacity(total);
    let mut penalties = 0;

    for i in 0..total {
        let started = Instant::now();
        let value_ms = match round_trip(client).await {
            Ok(()) => started.elapsed().as_secs_f64() * 1000.0,
            Err(e) => {
                warn!("Ping {}/{} failed: {}", i + 1, total, e);
                penalties += 1;
                config.ping_penalty_ms
            }
        };
        debug!("Ping {}/{}: {:.2} ms", i + 1, total, value_ms);

        samples_ms.push(value_ms);
        progress.on_progress(ProgressEvent::LatencyMeasurement {
            value_ms,
            current: i + 1,
            total,
        });
        progress.on_progress(ProgressEvent::Progress(counted_progress(
            Phase::Ping,
            i + 1,
            total,
        )));
    }

    let ping_ms = summarize(&samples_ms);
    info!("Ping phase finished: {:.2} ms", ping_ms);

    LatencyReport { ping_ms, samples_ms, penalties }
}

/// Trimmed mean when there are enough samples to trim, plain mean
/// otherwise.
pub fn summarize(samples_ms: &[f64]) -> f64 {
    trimmed_mean(samples_ms)
        .or_else(|| mean(samples_ms))
        .unwrap_or(0.0)
}

async fn round_trip(client: &Client) -> Result<(), BoxError> {
    client.execute(&Ping).await?.bytes().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::test_support::TestServer;
    use crate::server::ServerConfig;
    use crate::speedtest::progress::recording::RecordingProgress;
    use std::time::Duration;

    #[test]
    fn test_summarize_drops_extremes() {
        assert_eq!(summarize(&[50.0, 40.0, 200.0, 45.0, 55.0]), 50.0);
    }

    #[test]
    fn test_summarize_small_sets() {
        assert_eq!(summarize(&[10.0, 20.0]), 15.0);
        assert_eq!(summarize(&[]), 0.0);
    }

    #[test]
    fn test_penalty_only_counts_once_after_trimming() {
        // One failed probe among five is exactly what trimming discards.
        assert_eq!(summarize(&[10.0, 12.0, 999.0, 11.0, 9.0]), 11.0);
    }

    #[tokio::test]
    async fn test_ping_phase_against_server() {
        let server = TestServer::start(ServerConfig::default()).await;
        let client = Client::new(&server.base_url(), Duration::from_secs(10)).unwrap();
        let progress = RecordingProgress::default();

        let report = run(&client, &TestConfig::default(), &progress).await;

        assert_eq!(report.samples_ms.len(), 5);
        assert_eq!(report.penalties, 0);
        assert!(report.ping_ms >= 0.0 && report.ping_ms < 999.0);
        assert_eq!(
            progress.progress_values(),
            vec![84.0, 88.0, 92.0, 96.0, 100.0]
        );
    }

    #[tokio::test]
    async fn test_failed_pings_record_penalty() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let client =
            Client::new(&format!("http://{}", addr), Duration::from_secs(2)).unwrap();

        let report = run(&client, &TestConfig::default(), &RecordingProgress::default())
            .await;

        assert_eq!(report.penalties, 5);
        assert_eq!(report.samples_ms, vec![999.0; 5]);
        assert_eq!(report.ping_ms, 999.0);
    }
}
