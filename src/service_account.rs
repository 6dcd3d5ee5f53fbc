//! Service account access tokens.
//!
//! [`ServiceAccountClient`] ties the pieces together: each call to
//! [`ServiceAccountClient::access_token`] signs a fresh assertion and
//! exchanges it at the platform's token endpoint. Nothing is cached.

use bon::Builder;
use snafu::prelude::*;

use crate::{
    EndpointUrl,
    config::ClientConfig,
    crypto::signer::RsaPrivateKey,
    error::{ConfigSnafu, HttpClientBuildSnafu, TokenError},
    grant::{
        core::{TokenResponse, mk_scopes},
        jwt_bearer::{JwtBearerGrant, JwtBearerGrantParameters},
    },
    http::{DEFAULT_TIMEOUT, HttpClient},
    jwt::{DEFAULT_EXP_SECONDS, ServiceAccountAssertion, SignedAssertion},
};

/// Issues access tokens for one service account.
///
/// The client holds no mutable state; it can be shared across tasks and
/// each call is independent.
#[derive(Debug, Builder)]
#[builder(state_mod(name = "builder"))]
pub struct ServiceAccountClient<C: HttpClient = reqwest::Client> {
    /// The HTTP client used for the token request.
    http_client: C,
    /// The service account identifier.
    #[builder(into)]
    service_account_id: String,
    /// The key assertions are signed with.
    signing_key: RsaPrivateKey,
    /// The token endpoint, which is also the assertion audience.
    #[builder(setters(name = "token_endpoint_url"))]
    token_endpoint: EndpointUrl,
    /// The scopes to request.
    #[builder(required, default, name = "scopes", with = |scopes: impl IntoIterator<Item = impl Into<String>>| mk_scopes(scopes))]
    scope: Option<String>,
    /// Assertion lifetime in seconds.
    #[builder(default = DEFAULT_EXP_SECONDS)]
    exp_seconds: i64,
    /// Bound on each token request.
    #[builder(default = DEFAULT_TIMEOUT)]
    timeout: std::time::Duration,
}

impl<C: HttpClient, S: builder::State> ServiceAccountClientBuilder<C, S> {
    /// Sets the token endpoint from the platform base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL does not yield a valid URI.
    pub fn platform_url(
        self,
        platform_url: &str,
    ) -> Result<ServiceAccountClientBuilder<C, builder::SetTokenEndpoint<S>>, http::uri::InvalidUri>
    where
        S::TokenEndpoint: builder::IsUnset,
    {
        Ok(self.token_endpoint_url(EndpointUrl::token_endpoint(platform_url)?))
    }
}

impl ServiceAccountClient {
    /// Builds a client from a configuration, with a `reqwest` client using
    /// the configured proxy, timeout and TLS settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration does not validate, the key
    /// cannot be loaded, or the HTTP client cannot be built.
    pub fn from_config(config: &ClientConfig) -> Result<Self, TokenError> {
        config.validate().context(ConfigSnafu)?;

        let signing_key = RsaPrivateKey::from_jwk_value(config.jwk.as_value())?;
        let http_client = config
            .http_client_options()
            .build_client()
            .context(HttpClientBuildSnafu)?;

        Ok(Self::builder()
            .http_client(http_client)
            .service_account_id(config.service_account_id.trim())
            .signing_key(signing_key)
            .token_endpoint_url(config.token_endpoint().context(ConfigSnafu)?)
            .scopes(config.scope.split_whitespace())
            .exp_seconds(config.exp_seconds)
            .timeout(config.timeout)
            .build())
    }
}

impl<C: HttpClient> ServiceAccountClient<C> {
    /// Returns the token endpoint, which is also the assertion audience.
    #[must_use]
    pub fn token_endpoint(&self) -> &EndpointUrl {
        &self.token_endpoint
    }

    /// Signs a new assertion for this account.
    ///
    /// # Errors
    ///
    /// Returns a claim error if the account id is empty or the lifetime is
    /// not positive.
    pub async fn assertion(&self) -> Result<SignedAssertion, TokenError> {
        let assertion = ServiceAccountAssertion::builder()
            .service_account_id(self.service_account_id.as_str())
            .audience(self.token_endpoint.to_string())
            .exp_seconds(self.exp_seconds)
            .build()
            .sign(&self.signing_key)
            .await?;
        Ok(assertion)
    }

    /// Requests a new access token.
    ///
    /// Signs a fresh assertion and makes exactly one token request. Invalid
    /// claims are reported before anything is sent.
    ///
    /// # Errors
    ///
    /// Returns a [`TokenError`] describing the stage that failed.
    pub async fn access_token(&self) -> Result<TokenResponse, TokenError> {
        tracing::debug!(
            service_account_id = %self.service_account_id,
            key_thumbprint = self.signing_key.thumbprint().unwrap_or_default(),
            exp_seconds = self.exp_seconds,
            "signing assertion"
        );
        let assertion = self.assertion().await?;

        let grant = JwtBearerGrant::builder()
            .token_endpoint_url(self.token_endpoint.clone())
            .timeout(self.timeout)
            .build();
        let params = JwtBearerGrantParameters::builder()
            .assertion(assertion)
            .scopes(self.scope.as_deref())
            .build();

        let response = grant.exchange(&self.http_client, params).await?;

        tracing::info!(
            service_account_id = %self.service_account_id,
            token_length = response.access_token.len(),
            scope = response.scope.as_deref().unwrap_or_default(),
            expires_in = ?response.expires_in,
            "access token issued"
        );
        Ok(response)
    }
}

/// Issues one access token for the account described by `config`.
///
/// # Errors
///
/// See [`ServiceAccountClient::from_config`] and
/// [`ServiceAccountClient::access_token`].
pub async fn get_access_token(config: &ClientConfig) -> Result<TokenResponse, TokenError> {
    ServiceAccountClient::from_config(config)?
        .access_token()
        .await
}
