//! Validated endpoint URLs.
//!
//! [`EndpointUrl`] is a newtype over [`Uri`] that guarantees the URL has been
//! parsed. The token endpoint of an identity platform tenant is derived from
//! its base URL with [`EndpointUrl::token_endpoint`].

use std::convert::Infallible;
use std::fmt;

use http::{Uri, uri::InvalidUri};
use url::Url;

/// Path of the OAuth2 token endpoint, relative to the platform base URL.
pub const TOKEN_ENDPOINT_PATH: &str = "/am/oauth2/access_token";

/// A validated endpoint URL.
///
/// Once constructed it can be cloned and passed around without
/// re-validation. Its string form is used verbatim as the `aud` claim of
/// the assertion, so it is never normalized after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointUrl(Uri);

impl fmt::Display for EndpointUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl EndpointUrl {
    /// Derives the token endpoint from a platform base URL.
    ///
    /// Trailing slashes are stripped from `platform_url` before
    /// [`TOKEN_ENDPOINT_PATH`] is appended, so `https://tenant.example.com`
    /// and `https://tenant.example.com/` give the same endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the resulting string is not a valid URI.
    pub fn token_endpoint(platform_url: &str) -> Result<Self, InvalidUri> {
        let base = platform_url.trim().trim_end_matches('/');
        format!("{base}{TOKEN_ENDPOINT_PATH}").into_endpoint_url()
    }

    /// Returns the inner [`Uri`].
    #[must_use]
    pub fn as_uri(&self) -> &Uri {
        &self.0
    }
}

/// Conversion trait for types that can be turned into an [`EndpointUrl`].
pub trait IntoEndpointUrl {
    /// The error type returned if the conversion fails.
    type Error;

    /// Attempts to convert this value into an [`EndpointUrl`].
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not a valid URI.
    fn into_endpoint_url(self) -> Result<EndpointUrl, Self::Error>;
}

impl IntoEndpointUrl for EndpointUrl {
    type Error = Infallible;

    fn into_endpoint_url(self) -> Result<EndpointUrl, Self::Error> {
        Ok(self)
    }
}

impl IntoEndpointUrl for Uri {
    type Error = Infallible;

    fn into_endpoint_url(self) -> Result<EndpointUrl, Self::Error> {
        Ok(EndpointUrl(self))
    }
}

impl IntoEndpointUrl for Url {
    type Error = InvalidUri;

    fn into_endpoint_url(self) -> Result<EndpointUrl, Self::Error> {
        self.as_str().parse::<Uri>().map(EndpointUrl)
    }
}

impl IntoEndpointUrl for &str {
    type Error = InvalidUri;

    fn into_endpoint_url(self) -> Result<EndpointUrl, Self::Error> {
        self.parse::<Uri>().map(EndpointUrl)
    }
}

impl IntoEndpointUrl for String {
    type Error = InvalidUri;

    fn into_endpoint_url(self) -> Result<EndpointUrl, Self::Error> {
        self.parse::<Uri>().map(EndpointUrl)
    }
}
