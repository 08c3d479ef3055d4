//! `POST /upload`: consume a request body and report how fast it arrived.

use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use futures::{Stream, StreamExt};
use http::header::CONNECTION;
use log::{debug, error, warn};
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::measurements::throughput_mbps;

/// Successful sink response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReceipt {
    pub success: bool,
    pub received_bytes: u64,
    /// Seconds from the first received byte to the last.
    pub duration: f64,
    pub speed_mbps: f64,
}

#[derive(Debug, Serialize)]
struct SinkFailure {
    success: bool,
    error: &'static str,
}

/// How a sink run ended.
#[derive(Debug)]
pub enum SinkOutcome {
    Complete(UploadReceipt),
    /// More than the ceiling arrived; reading stopped at `received` bytes.
    Exceeded { received: u64 },
    Failed(String),
}

/// Drain `body`, counting bytes, without buffering it.
///
/// Timing starts at the first chunk so connection setup and request
/// headers are not billed to the transfer.
pub async fn drain<S, E>(mut body: S, max_bytes: u64) -> SinkOutcome
where
    S: Stream<Item = Result<axum::body::Bytes, E>> + Unpin,
    E: std::fmt::Display,
{
    let mut received: u64 = 0;
    let mut first_byte: Option<Instant> = None;

    while let Some(chunk) = body.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => return SinkOutcome::Failed(e.to_string()),
        };

        if first_byte.is_none() && !chunk.is_empty() {
            first_byte = Some(Instant::now());
        }

        received += chunk.len() as u64;
        if received > max_bytes {
            return SinkOutcome::Exceeded { received };
        }
    }

    let duration =
        first_byte.map(|start| start.elapsed().as_secs_f64()).unwrap_or(0.0);

    SinkOutcome::Complete(UploadReceipt {
        success: true,
        received_bytes: received,
        duration,
        speed_mbps: throughput_mbps(received, duration).unwrap_or(0.0),
    })
}

pub async fn upload(State(state): State<Arc<AppState>>, body: Body) -> Response {
    let max_bytes = state.config.max_upload_bytes;

    match drain(body.into_data_stream(), max_bytes).await {
        SinkOutcome::Complete(receipt) => {
            debug!(
                "Upload received {} bytes in {:.3}s ({:.2} Mbps)",
                receipt.received_bytes, receipt.duration, receipt.speed_mbps
            );
            Json(receipt).into_response()
        }
        SinkOutcome::Exceeded { received } => {
            warn!(
                "Upload aborted after {} bytes, ceiling is {} bytes",
                received, max_bytes
            );
            // Dropping the unread body plus `Connection: close` makes
            // hyper tear the connection down instead of draining it.
            (
                StatusCode::PAYLOAD_TOO_LARGE,
                [(CONNECTION, "close")],
                Json(SinkFailure { success: false, error: "Upload size exceeded" }),
            )
                .into_response()
        }
        SinkOutcome::Failed(reason) => {
            error!("Upload error: {}", reason);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(SinkFailure { success: false, error: "Upload failed" }),
            )
                .into_response()
        }
    }
}
