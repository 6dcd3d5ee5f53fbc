//! HTTP client and response abstractions.
//!
//! The token exchange is written against these traits rather than a
//! concrete client. A `reqwest` implementation is provided, along with
//! [`ReqwestClientOptions`] for building a client with the proxy, timeout
//! and TLS settings a service account configuration asks for.

mod reqwest_0_13;

use bytes::Bytes;
use http::{HeaderMap, Request, StatusCode};

pub use reqwest_0_13::{DEFAULT_TIMEOUT, ReqwestClientOptions};

/// Defines the common interface for HTTP requests.
pub trait HttpClient: Send + Sync {
    /// The error type returned by the client for a failed request.
    type Error: crate::Error;

    /// The associated response type returned by this HTTP client.
    type Response: HttpResponse;

    /// Executes an HTTP request and returns an owned response.
    ///
    /// Exactly one request is sent per call; implementations must not retry.
    fn execute(
        &self,
        request: Request<Bytes>,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send;
}

/// Defines the common interface for HTTP responses.
pub trait HttpResponse: Send + Sync {
    /// The error type when getting the response body.
    type Error: crate::Error;

    /// Returns the HTTP status code of the response.
    fn status(&self) -> StatusCode;

    /// Returns the response's HTTP headers.
    fn headers(&self) -> HeaderMap;

    /// Consumes the response and returns its body.
    fn body(self) -> impl Future<Output = Result<Bytes, Self::Error>> + Send;
}
