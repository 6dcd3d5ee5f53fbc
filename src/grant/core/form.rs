use std::time::Duration;

use bon::Builder;
use bytes::Bytes;
use http::{HeaderValue, Method, Request, StatusCode, Uri, header::ACCEPT, header::CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use snafu::prelude::*;

use crate::grant::core::token_response::TokenResponse;
use crate::http::{HttpClient, HttpResponse};

/// A single form-encoded POST to a token endpoint.
#[derive(Debug, Builder)]
pub(crate) struct TokenRequest<'a, F: Serialize> {
    uri: &'a Uri,
    form: &'a F,
    timeout: Duration,
}

impl<F: Serialize> TokenRequest<'_, F> {
    pub(crate) fn build_request(&self) -> Result<Request<Bytes>, serde_html_form::ser::Error> {
        let body = serde_html_form::to_string(self.form)?;

        let (mut parts, ()) = Request::new(()).into_parts();
        parts.method = Method::POST;
        parts.uri = self.uri.clone();
        parts.headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );
        parts
            .headers
            .insert(ACCEPT, HeaderValue::from_static("application/json"));

        Ok(Request::from_parts(parts, body.into()))
    }

    /// Sends the request once and interprets the response.
    ///
    /// The whole exchange, including reading the body, is bounded by the
    /// request timeout. Nothing is retried.
    pub(crate) async fn execute<C: HttpClient>(
        &self,
        http_client: &C,
    ) -> Result<TokenResponse, ExchangeError<C::Error, <C::Response as HttpResponse>::Error>> {
        let request = self.build_request().context(SerializeFormSnafu)?;

        let exchange = async {
            let response = http_client.execute(request).await.context(NetworkSnafu)?;
            let status = response.status();
            let body = response.body().await.context(ResponseBodyReadSnafu)?;
            Ok::<_, ExchangeError<C::Error, <C::Response as HttpResponse>::Error>>((status, body))
        };

        let (status, body) = tokio::time::timeout(self.timeout, exchange)
            .await
            .ok()
            .context(TimeoutSnafu {
                timeout: self.timeout,
            })??;

        parse_token_response(status, &body)
    }
}

fn parse_token_response<HttpReqErr: crate::Error, HttpRespErr: crate::Error>(
    status: StatusCode,
    body: &Bytes,
) -> Result<TokenResponse, ExchangeError<HttpReqErr, HttpRespErr>> {
    if status != StatusCode::OK {
        return TokenEndpointSnafu {
            status,
            body: String::from_utf8_lossy(body),
        }
        .fail();
    }

    TokenResponse::from_slice(body).context(ProtocolSnafu)
}

/// Errors that can occur when exchanging an assertion for an access token.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ExchangeError<HttpReqErr: crate::Error, HttpRespErr: crate::Error> {
    /// The request form could not be encoded.
    #[snafu(display("Failed to serialize token request form"))]
    SerializeForm {
        /// The underlying error.
        source: serde_html_form::ser::Error,
    },
    /// The request could not be sent or no response was received.
    #[snafu(display("Failed to make HTTP request"))]
    Network {
        /// The underlying transport error.
        source: HttpReqErr,
    },
    /// The response body could not be read.
    #[snafu(display("Failed to read response body"))]
    ResponseBodyRead {
        /// The underlying transport error.
        source: HttpRespErr,
    },
    /// No complete response arrived within the timeout.
    #[snafu(display("Token request timed out after {}s", timeout.as_secs_f64()))]
    Timeout {
        /// The timeout that elapsed.
        timeout: Duration,
    },
    /// The token endpoint answered with a status other than 200.
    #[snafu(display("Token endpoint returned HTTP {status}: {body}"))]
    TokenEndpoint {
        /// The HTTP status code.
        status: StatusCode,
        /// The response body, verbatim.
        body: String,
    },
    /// The token endpoint answered 200 without a usable token.
    #[snafu(display("Token endpoint response violates the OAuth2 protocol"))]
    Protocol {
        /// What was wrong with the response.
        source: ProtocolError,
    },
}

impl<HttpReqErr: crate::Error, HttpRespErr: crate::Error> ExchangeError<HttpReqErr, HttpRespErr> {
    /// Parses the body of a [`ExchangeError::TokenEndpoint`] error as an
    /// `OAuth2` error response (RFC 6749 §5.2), if it is one.
    #[must_use]
    pub fn oauth2_error(&self) -> Option<OAuth2ErrorBody> {
        match self {
            Self::TokenEndpoint { body, .. } => serde_json::from_str(body).ok(),
            _ => None,
        }
    }
}

impl<HttpReqErr: crate::Error, HttpRespErr: crate::Error> crate::Error
    for ExchangeError<HttpReqErr, HttpRespErr>
{
    fn is_retryable(&self) -> bool {
        match self {
            Self::SerializeForm { .. } | Self::Protocol { .. } => false,
            Self::Network { source } => source.is_retryable(),
            Self::ResponseBodyRead { source } => source.is_retryable(),
            Self::Timeout { .. } => true,
            Self::TokenEndpoint { status, .. } => status.is_server_error(),
        }
    }
}

/// A 200 response that does not carry an access token.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ProtocolError {
    /// The `access_token` member is absent, null or empty.
    #[snafu(display("Successful response has no access_token"))]
    MissingAccessToken,
    /// The body is not a JSON token response.
    ///
    /// The body itself is not kept, since it may contain a token.
    #[snafu(display("Failed to parse successful response as an OAuth2 token response"))]
    UnparseableSuccessResponse {
        /// The underlying error.
        source: serde_json::Error,
    },
}

impl crate::Error for ProtocolError {
    fn is_retryable(&self) -> bool {
        false
    }
}

/// The `OAuth2` error response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OAuth2ErrorBody {
    /// The error code, e.g. `invalid_grant`.
    pub error: String,
    /// The `error_description` field from the `OAuth2` error.
    pub error_description: Option<String>,
    /// The (optional) `error_uri` from the `OAuth2` error.
    pub error_uri: Option<String>,
}
