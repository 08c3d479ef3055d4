//! `GET /ping`: the smallest uncacheable round trip we can serve.

use axum::response::IntoResponse;
use http::header::{HeaderName, CACHE_CONTROL, CONTENT_TYPE, EXPIRES, PRAGMA};

pub const PONG: &str = "pong";

/// Headers that defeat every cache between the client and us.
pub const NO_CACHE_HEADERS: [(HeaderName, &str); 3] = [
    (CACHE_CONTROL, "no-cache, no-store, must-revalidate"),
    (PRAGMA, "no-cache"),
    (EXPIRES, "0"),
];

pub async fn ping() -> impl IntoResponse {
    (NO_CACHE_HEADERS, [(CONTENT_TYPE, "text/plain")], PONG)
}

#[cfg(test)]
mod tests {
    use crate::server::test_support::TestServer;
    use crate::server::ServerConfig;

    #[tokio::test]
    async fn test_ping_returns_pong_without_caching() {
        let server = TestServer::start(ServerConfig::default()).await;

        let response = reqwest::get(server.url("/ping")).await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);

        let headers = response.headers().clone();
        assert_eq!(
            headers["cache-control"],
            "no-cache, no-store, must-revalidate"
        );
        assert_eq!(headers["pragma"], "no-cache");
        assert_eq!(headers["expires"], "0");
        assert!(headers["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/plain"));

        let body = response.bytes().await.unwrap();
        assert_eq!(&body[..], b"pong");
        assert_eq!(body.len(), 4);
    }
}
