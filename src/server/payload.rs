//! `GET /download?size=<MiB>`: stream synthetic, uncacheable bytes.
//!
//! The body is the shared random buffer written over and over until the
//! requested byte count is reached. When the client goes away hyper drops
//! the body stream, which ends generation; that path is logged at debug
//! level only because aborting mid-transfer is how clients finish early.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use axum::body::{Body, Bytes};
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use futures::Stream;
use http::header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE};
use log::debug;

use super::probe::NO_CACHE_HEADERS;
use super::{AppState, DownloadCounters};
use crate::measurements::MEBIBYTE;

pub const DOWNLOAD_FILENAME: &str = "attachment; filename=\"speed-test.dat\"";

/// Coerce the `size` query value the way a lenient integer parse would:
/// leading digits count, anything else falls back to `default_mb`. Zero
/// also falls back. The result never exceeds `max_mb`.
pub fn parse_size_mb(raw: Option<&str>, default_mb: u64, max_mb: u64) -> u64 {
    let Some(raw) = raw else { return default_mb.min(max_mb) };

    let trimmed = raw.trim_start();
    let unsigned = trimmed.strip_prefix('+').unwrap_or(trimmed);
    let digits: &str = unsigned
        .find(|c: char| !c.is_ascii_digit())
        .map_or(unsigned, |end| &unsigned[..end]);

    if digits.is_empty() {
        return default_mb.min(max_mb);
    }

    // Too many digits for u64 is still "a very large number".
    let size = digits.parse::<u64>().unwrap_or(u64::MAX);
    if size == 0 {
        return default_mb.min(max_mb);
    }

    size.min(max_mb)
}

/// Repeats one buffer until `total` bytes have been yielded.
///
/// Registers with `counters` while alive; dropping it before the last
/// byte counts as an aborted download.
pub struct PayloadStream {
    buffer: Bytes,
    total: u64,
    sent: u64,
    started: Instant,
    counters: Arc<DownloadCounters>,
}

impl PayloadStream {
    pub fn new(buffer: Bytes, total: u64, counters: Arc<DownloadCounters>) -> Self {
        counters.opened();
        Self { buffer, total, sent: 0, started: Instant::now(), counters }
    }

    pub fn sent(&self) -> u64 {
        self.sent
    }

    pub fn is_finished(&self) -> bool {
        self.sent >= self.total
    }
}

impl Stream for PayloadStream {
    type Item = Result<Bytes, std::io::Error>;

    fn poll_next(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Option<Self::Item>> {
        if self.is_finished() || self.buffer.is_empty() {
            return Poll::Ready(None);
        }

        let remaining = self.total - self.sent;
        let len = remaining.min(self.buffer.len() as u64) as usize;
        let chunk = self.buffer.slice(..len);
        self.sent += len as u64;

        Poll::Ready(Some(Ok(chunk)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.buffer.is_empty() {
            return (0, Some(0));
        }
        let chunk = self.buffer.len() as u64;
        let left = (self.total - self.sent).div_ceil(chunk) as usize;
        (left, Some(left))
    }
}

impl Drop for PayloadStream {
    fn drop(&mut self) {
        self.counters.closed(self.is_finished());
        if !self.is_finished() {
            debug!(
                "Download client went away after {} of {} bytes ({:?})",
                self.sent,
                self.total,
                self.started.elapsed()
            );
        }
    }
}

pub async fn download(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let size_mb = parse_size_mb(
        params.get("size").map(String::as_str),
        state.config.default_download_mb,
        state.config.max_download_mb,
    );
    let total = size_mb.saturating_mul(MEBIBYTE);

    debug!("Streaming {} MiB download", size_mb);

    let stream = PayloadStream::new(
        state.payload.clone(),
        total,
        Arc::clone(&state.downloads),
    );

    (
        NO_CACHE_HEADERS,
        [
            (CONTENT_TYPE, "application/octet-stream".to_string()),
            (CONTENT_LENGTH, total.to_string()),
            (CONTENT_DISPOSITION, DOWNLOAD_FILENAME.to_string()),
        ],
        Body::from_stream(stream),
    )
        .into_response()
}
