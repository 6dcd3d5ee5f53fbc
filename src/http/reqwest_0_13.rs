use std::time::Duration;

use bon::Builder;
use bytes::Bytes;
use http::{HeaderMap, Request, StatusCode};

use super::{HttpClient, HttpResponse};

/// Default bound on a token request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Options for building a `reqwest` client for the token endpoint.
#[derive(Debug, Clone, Builder)]
pub struct ReqwestClientOptions {
    /// Proxy for `https` traffic, e.g. `http://proxy.internal:3128`.
    #[builder(into)]
    proxy_url: Option<String>,
    /// Total time allowed for a request, including reading the body.
    #[builder(default = DEFAULT_TIMEOUT)]
    timeout: Duration,
    /// Disables TLS certificate and hostname verification.
    ///
    /// Only for lab environments with self-signed certificates. With this
    /// set, anyone on the network path can capture the signed assertion and
    /// the issued access token.
    #[builder(default = false)]
    danger_accept_invalid_certs: bool,
}

impl Default for ReqwestClientOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl ReqwestClientOptions {
    /// Builds a `reqwest::Client` with these options.
    ///
    /// # Errors
    ///
    /// Returns an error if the proxy URL is invalid or the TLS backend
    /// cannot be initialized.
    pub fn build_client(&self) -> Result<reqwest::Client, reqwest::Error> {
        let mut builder = reqwest::Client::builder().timeout(self.timeout);

        if let Some(proxy_url) = &self.proxy_url {
            tracing::debug!(proxy = %proxy_url, "routing https traffic through proxy");
            builder = builder.proxy(reqwest::Proxy::https(proxy_url.as_str())?);
        }

        if self.danger_accept_invalid_certs {
            tracing::warn!("TLS certificate verification is disabled");
            builder = builder.danger_accept_invalid_certs(true);
        }

        builder.build()
    }
}

impl HttpClient for reqwest::Client {
    type Response = reqwest::Response;
    type Error = reqwest::Error;

    /// Converts the `http::Request` into a `reqwest::Request` and sends it.
    async fn execute(&self, request: Request<Bytes>) -> Result<Self::Response, Self::Error> {
        let (parts, body) = request.into_parts();
        let reqwest_request = self
            .request(parts.method, parts.uri.to_string())
            .headers(parts.headers)
            .body(body)
            .build()?;

        reqwest::Client::execute(self, reqwest_request).await
    }
}

impl HttpResponse for reqwest::Response {
    type Error = reqwest::Error;

    fn status(&self) -> StatusCode {
        self.status()
    }

    fn headers(&self) -> HeaderMap {
        self.headers().clone()
    }

    async fn body(self) -> Result<Bytes, Self::Error> {
        self.bytes().await
    }
}

impl crate::Error for reqwest::Error {
    fn is_retryable(&self) -> bool {
        self.is_connect() || self.is_timeout()
    }
}
