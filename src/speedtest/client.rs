use crate::errors::SpeedTestError;
use crate::speedtest::requests::{Request, RequestBody};
use reqwest::{Client as ReqwestClient, RequestBuilder, Response};
use std::error::Error;
use std::time::Duration;
use url::Url;

pub type BoxError = Box<dyn Error + Send + Sync>;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client bound to one measurement server.
#[derive(Debug, Clone)]
pub struct Client {
    client: ReqwestClient,
    base: Url,
}

impl Client {
    /// `base_url` includes the route prefix, e.g.
    /// `http://host:3001/api/speed-test`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, SpeedTestError> {
        let mut base = Url::parse(base_url).map_err(|e| {
            SpeedTestError::config(format!("invalid server URL '{}'", base_url))
                .with_source(e)
                .with_suggestion("Use an absolute http(s) URL.")
        })?;

        if !matches!(base.scheme(), "http" | "https") {
            return Err(SpeedTestError::config(format!(
                "unsupported URL scheme '{}'",
                base.scheme()
            )));
        }

        // Without the trailing slash `join` would replace the last segment.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let client = ReqwestClient::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(timeout)
            .build()
            .map_err(|e| {
                SpeedTestError::config("failed to build HTTP client").with_source(e)
            })?;

        Ok(Client { client, base })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    pub fn url<R: Request>(&self, request: &R) -> Result<Url, BoxError> {
        let endpoint = request.endpoint();
        Ok(self.base.join(endpoint.trim_start_matches('/'))?)
    }

    /// Send `request` and hand back the response with its body unread.
    pub async fn execute<R: Request>(
        &self,
        request: &R,
    ) -> Result<Response, BoxError> {
        let url = self.url(request)?;

        let response = self
            .client
            .request(R::METHOD, url)
            .query(&request.query())
            .headers(request.headers())
            .probe_body(request.body())
            .send()
            .await?
            .error_for_status()?;

        Ok(response)
    }

    /// Send `request` and decode its JSON body.
    pub async fn send<R: Request>(
        &self,
        request: &R,
    ) -> Result<R::Response, BoxError> {
        let response = self.execute(request).await?;
        Ok(response.json::<R::Response>().await?)
    }
}

trait RequestBuilderExt: Sized {
    fn probe_body(self, body: RequestBody) -> Self;
}

impl RequestBuilderExt for RequestBuilder {
    fn probe_body(self, body: RequestBody) -> Self {
        match body {
            RequestBody::None => self,
            RequestBody::Binary(bytes) => self.body(bytes),
        }
    }
}
