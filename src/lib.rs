//! Issues `OAuth2` access tokens for identity platform service accounts.
//!
//! A service account holds an RSA private key as a JWK. To get a token, the
//! client signs a short-lived JWT assertion naming the account as issuer and
//! subject, and exchanges it at the platform's token endpoint using the JWT
//! bearer grant (RFC 7523).
//!
//! [`service_account::ServiceAccountClient`] does both steps. The steps are
//! also available separately: [`jwt`] builds and signs assertions and
//! [`grant::jwt_bearer`] performs the exchange over any [`http::HttpClient`].

#![forbid(unsafe_code)]
#![deny(clippy::panic)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod config;
pub mod credentials;
pub mod crypto;
mod endpoint_url;
mod error;
pub mod grant;
pub mod http;
pub mod jwk;
pub mod jwt;
pub mod output;
pub mod prelude;
pub mod service_account;
pub mod token;

pub use endpoint_url::{EndpointUrl, IntoEndpointUrl, TOKEN_ENDPOINT_PATH};
pub use error::{BoxedError, Error, ErrorKind, TokenError};

/// Documentation
pub mod _documentation {
    #[doc = include_str!("../README.md")]
    mod readme {}
    #[doc = include_str!("../CHANGELOG.md")]
    pub mod changelog {}
}

/// Re-export of parts of the `secrecy` crate.
pub mod secrecy {
    pub use ::secrecy::{ExposeSecret, SecretString};
}
