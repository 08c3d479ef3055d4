pub mod download;
pub mod identity;
pub mod ping;
pub mod upload;

use axum::body::Bytes;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::Method;
use serde::de::DeserializeOwned;
use std::borrow::Cow;

pub(crate) const UA: &str = concat!(
    env!("CARGO_PKG_NAME"),
    "/",
    env!("CARGO_PKG_VERSION")
);

/// Body attached to an outgoing request.
pub enum RequestBody {
    None,
    Binary(Bytes),
}

/// One call against the measurement server.
pub trait Request {
    /// What `Client::send` decodes the JSON body into.
    type Response: DeserializeOwned;

    const METHOD: Method = Method::GET;

    /// Path relative to the server base URL.
    fn endpoint(&self) -> Cow<'_, str>;

    fn query(&self) -> Vec<(&'static str, String)> {
        Vec::new()
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();

        headers.insert(USER_AGENT, HeaderValue::from_static(UA));

        headers
    }

    fn body(&self) -> RequestBody {
        RequestBody::None
    }
}

impl<R: Request> Request for &R {
    type Response = R::Response;

    const METHOD: Method = R::METHOD;

    fn endpoint(&self) -> Cow<'_, str> {
        (**self).endpoint()
    }

    fn query(&self) -> Vec<(&'static str, String)> {
        (**self).query()
    }

    fn headers(&self) -> HeaderMap {
        (**self).headers()
    }

    fn body(&self) -> RequestBody {
        (**self).body()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_agent_names_the_crate() {
        assert_eq!(
            UA,
            format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
        );
        assert!(UA.starts_with("speed-probe/"));
    }
}
