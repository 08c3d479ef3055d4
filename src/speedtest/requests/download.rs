use super::{Request, UA};
use reqwest::header::{HeaderMap, HeaderValue, CACHE_CONTROL, USER_AGENT};
use std::borrow::Cow;

/// `GET /download?size=<MiB>&t=<millis>`.
///
/// `t` changes on every request so no intermediary can answer from cache.
#[derive(Debug, Copy, Clone)]
pub struct Download {
    pub size_mb: u64,
    nonce: i64,
}

impl Download {
    pub fn new(size_mb: u64) -> Self {
        Self { size_mb, nonce: chrono::Utc::now().timestamp_millis() }
    }

    pub fn expected_bytes(&self) -> u64 {
        self.size_mb * crate::measurements::MEBIBYTE
    }
}

impl Request for Download {
    type Response = ();

    fn endpoint(&self) -> Cow<'_, str> {
        "download".into()
    }

    fn query(&self) -> Vec<(&'static str, String)> {
        vec![("size", self.size_mb.to_string()), ("t", self.nonce.to_string())]
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();

        headers.insert(USER_AGENT, HeaderValue::from_static(UA));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));

        headers
    }
}
