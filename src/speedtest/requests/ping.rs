use super::{Request, UA};
use reqwest::header::{
    HeaderMap, HeaderValue, CACHE_CONTROL, PRAGMA, USER_AGENT,
};
use std::borrow::Cow;

/// `GET /ping`. The body is read and discarded; only the round trip matters.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ping;

impl Request for Ping {
    type Response = ();

    fn endpoint(&self) -> Cow<'_, str> {
        "ping".into()
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();

        headers.insert(USER_AGENT, HeaderValue::from_static(UA));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));

        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ping_disables_caching() {
        let headers = Ping.headers();
        assert_eq!(headers[CACHE_CONTROL], "no-cache");
        assert_eq!(headers[PRAGMA], "no-cache");
        assert_eq!(Ping.endpoint(), "ping");
    }
}
