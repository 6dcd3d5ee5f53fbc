//! Error types and the [`Error`] trait.
//!
//! Every error returned by this crate implements the [`Error`] trait, which
//! extends [`std::error::Error`] with a retry classification. Nothing in the
//! crate retries on its own; the classification is for the host application.
//!
//! The building blocks return precise, generic errors ([`AssertionError`],
//! [`ExchangeError`]). [`TokenError`] flattens them into one non-generic
//! type for callers that only want to know which stage failed.

use std::convert::Infallible;
use std::time::Duration;

use http::StatusCode;
use snafu::{AsErrorSource, Snafu};

use crate::config::ConfigError;
use crate::crypto::signer::KeyError;
use crate::grant::core::{ExchangeError, OAuth2ErrorBody, ProtocolError};
use crate::jwt::{AssertionError, ClaimError};

/// Errors that may occur in the library.
pub trait Error: std::error::Error + AsErrorSource + Send + Sync + 'static {
    /// If true, this indicates that a failed request may succeed if retried.
    fn is_retryable(&self) -> bool;
}

impl Error for Infallible {
    fn is_retryable(&self) -> bool {
        false
    }
}

/// A boxed error that can be used without type parameters.
#[derive(Debug, Snafu)]
#[snafu(transparent)]
pub struct BoxedError {
    source: Box<dyn Error>,
}

impl BoxedError {
    /// Create a new boxed error from a generic `Error`.
    pub fn from_err<E: Error + 'static>(err: E) -> Self {
        Self {
            source: Box::new(err),
        }
    }
}

impl Error for BoxedError {
    fn is_retryable(&self) -> bool {
        self.source.is_retryable()
    }
}

/// The stage of token issuance an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The configuration was incomplete or invalid.
    Config,
    /// The assertion inputs were invalid.
    Claim,
    /// The signing key was malformed or unusable.
    Key,
    /// The token endpoint could not be reached in time.
    Network,
    /// The token endpoint answered with a non-200 status.
    TokenEndpoint,
    /// The token endpoint answered 200 without a usable token.
    Protocol,
}

/// Errors returned when issuing a service account access token.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum TokenError {
    /// The configuration was incomplete or invalid.
    #[snafu(display("Invalid configuration"))]
    Config {
        /// The underlying error.
        source: ConfigError,
    },
    /// The HTTP client could not be built, e.g. from a bad proxy URL.
    #[snafu(display("Failed to build HTTP client"))]
    HttpClientBuild {
        /// The underlying error from `reqwest`.
        source: reqwest::Error,
    },
    /// The signing key was malformed or unusable.
    #[snafu(context(false), display("Invalid signing key"))]
    Key {
        /// The underlying error.
        source: KeyError,
    },
    /// The assertion inputs were invalid. Raised before any network call.
    #[snafu(context(false), display("Invalid assertion claims"))]
    Claim {
        /// The underlying error.
        source: ClaimError,
    },
    /// The assertion could not be encoded or signed.
    #[snafu(display("Failed to produce signed assertion"))]
    Assertion {
        /// The underlying error.
        source: BoxedError,
    },
    /// The token request form could not be encoded.
    #[snafu(display("Failed to encode token request"))]
    EncodeRequest {
        /// The underlying error.
        source: serde_html_form::ser::Error,
    },
    /// The request could not be sent, or the response could not be read.
    #[snafu(display("Failed to reach the token endpoint"))]
    Network {
        /// The underlying transport error.
        source: BoxedError,
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
    #[snafu(context(false), display("Token endpoint response violates the OAuth2 protocol"))]
    Protocol {
        /// What was wrong with the response.
        source: ProtocolError,
    },
}

impl TokenError {
    /// Returns the stage of token issuance this error came from.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config { .. } | Self::HttpClientBuild { .. } => ErrorKind::Config,
            Self::Key { .. } | Self::Assertion { .. } => ErrorKind::Key,
            Self::Claim { .. } => ErrorKind::Claim,
            Self::EncodeRequest { .. } | Self::Protocol { .. } => ErrorKind::Protocol,
            Self::Network { .. } | Self::Timeout { .. } => ErrorKind::Network,
            Self::TokenEndpoint { .. } => ErrorKind::TokenEndpoint,
        }
    }

    /// Parses the body of a [`TokenError::TokenEndpoint`] error as an
    /// `OAuth2` error response, if it is one.
    #[must_use]
    pub fn oauth2_error(&self) -> Option<OAuth2ErrorBody> {
        match self {
            Self::TokenEndpoint { body, .. } => serde_json::from_str(body).ok(),
            _ => None,
        }
    }
}

impl Error for TokenError {
    fn is_retryable(&self) -> bool {
        match self {
            Self::Network { source } => source.is_retryable(),
            Self::Timeout { .. } => true,
            Self::TokenEndpoint { status, .. } => status.is_server_error(),
            Self::Config { .. }
            | Self::HttpClientBuild { .. }
            | Self::Key { .. }
            | Self::Claim { .. }
            | Self::Assertion { .. }
            | Self::EncodeRequest { .. }
            | Self::Protocol { .. } => false,
        }
    }
}

impl<SgnErr: Error> From<AssertionError<SgnErr>> for TokenError {
    fn from(error: AssertionError<SgnErr>) -> Self {
        match error {
            AssertionError::Claim { source } => Self::Claim { source },
            other => Self::Assertion {
                source: BoxedError::from_err(other),
            },
        }
    }
}

impl<HttpReqErr: Error, HttpRespErr: Error> From<ExchangeError<HttpReqErr, HttpRespErr>>
    for TokenError
{
    fn from(error: ExchangeError<HttpReqErr, HttpRespErr>) -> Self {
        match error {
            ExchangeError::SerializeForm { source } => Self::EncodeRequest { source },
            ExchangeError::Network { source } => Self::Network {
                source: BoxedError::from_err(source),
            },
            ExchangeError::ResponseBodyRead { source } => Self::Network {
                source: BoxedError::from_err(source),
            },
            ExchangeError::Timeout { timeout } => Self::Timeout { timeout },
            ExchangeError::TokenEndpoint { status, body } => Self::TokenEndpoint { status, body },
            ExchangeError::Protocol { source } => Self::Protocol { source },
        }
    }
}
