use super::{Request, RequestBody, UA};
use crate::server::sink::UploadReceipt;
use axum::body::Bytes;
use rand::RngCore;
use reqwest::header::{
    HeaderMap, HeaderValue, CONTENT_LENGTH, CONTENT_TYPE, USER_AGENT,
};
use reqwest::Method;
use std::borrow::Cow;

/// `POST /upload` with a freshly randomised body.
pub struct Upload {
    data: Bytes,
}

impl Upload {
    /// Fill `bytes` random bytes in one pass.
    pub fn random(bytes: usize) -> Self {
        let mut data = vec![0u8; bytes];
        rand::thread_rng().fill_bytes(&mut data);

        Self { data: Bytes::from(data) }
    }
}

impl Request for Upload {
    type Response = UploadReceipt;

    const METHOD: Method = Method::POST;

    fn endpoint(&self) -> Cow<'_, str> {
        "upload".into()
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();

        headers.insert(USER_AGENT, HeaderValue::from_static(UA));
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/octet-stream"),
        );
        headers.insert(CONTENT_LENGTH, self.data.len().into());

        headers
    }

    fn body(&self) -> RequestBody {
        RequestBody::Binary(self.data.clone())
    }
}
