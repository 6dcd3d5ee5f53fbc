//! JWT bearer authorization grant (RFC 7523 §2.1).
//!
//! The client presents a signed assertion as the authorization grant and
//! receives an access token for the account the assertion was issued by.

use std::borrow::Cow;
use std::time::Duration;

use bon::Builder;
use serde::Serialize;

use crate::{
    EndpointUrl, IntoEndpointUrl,
    grant::core::{ExchangeError, FormValue, TokenRequest, TokenResponse, mk_scopes},
    http::{DEFAULT_TIMEOUT, HttpClient, HttpResponse},
    jwt::SignedAssertion,
};

/// The `grant_type` value of the JWT bearer grant.
pub const JWT_BEARER_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// The `client_id` the identity platform expects for service accounts.
pub const SERVICE_ACCOUNT_CLIENT_ID: &str = "service-account";

/// An `OAuth2` JWT bearer grant against one token endpoint.
///
/// The grant holds no per-request state, so one value can serve any number
/// of concurrent exchanges.
#[derive(Debug, Clone, Builder)]
#[builder(state_mod(name = "builder"))]
pub struct JwtBearerGrant {
    /// The client ID sent with the request.
    #[builder(into, default = Cow::Borrowed(SERVICE_ACCOUNT_CLIENT_ID))]
    client_id: Cow<'static, str>,

    /// The URL of the token endpoint.
    #[builder(setters(name = "token_endpoint_url"))]
    token_endpoint: EndpointUrl,

    /// Upper bound on the whole exchange.
    #[builder(default = DEFAULT_TIMEOUT)]
    timeout: Duration,
}

impl<S: builder::State> JwtBearerGrantBuilder<S> {
    /// Sets the token endpoint URL.
    ///
    /// Accepts any type that implements [`IntoEndpointUrl`], including
    /// `&str`, [`String`], [`Url`](url::Url), [`Uri`](http::Uri), and
    /// [`EndpointUrl`].
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be parsed as a valid URI.
    pub fn token_endpoint<U: IntoEndpointUrl>(
        self,
        url: U,
    ) -> Result<JwtBearerGrantBuilder<builder::SetTokenEndpoint<S>>, U::Error>
    where
        S::TokenEndpoint: builder::IsUnset,
    {
        Ok(self.token_endpoint_url(url.into_endpoint_url()?))
    }
}

impl JwtBearerGrant {
    /// Returns the token endpoint URL.
    #[must_use]
    pub fn token_endpoint(&self) -> &EndpointUrl {
        &self.token_endpoint
    }

    fn build_form(&self, params: JwtBearerGrantParameters) -> JwtBearerGrantForm<'_> {
        JwtBearerGrantForm {
            client_id: FormValue::from(&*self.client_id),
            grant_type: JWT_BEARER_GRANT_TYPE.into(),
            assertion: params.assertion.into(),
            scope: params.scope.unwrap_or_default().into(),
        }
    }

    /// Exchanges the assertion for an access token.
    ///
    /// Sends exactly one POST to the token endpoint. Only HTTP 200 counts as
    /// success; any other status is returned as
    /// [`ExchangeError::TokenEndpoint`] with the body verbatim.
    ///
    /// `scope` is always part of the form, empty when no scopes were given.
    ///
    /// # Errors
    ///
    /// Returns an error if the request could not be sent or timed out, the
    /// endpoint rejected it, or the response carried no access token.
    pub async fn exchange<C: HttpClient>(
        &self,
        http_client: &C,
        params: JwtBearerGrantParameters,
    ) -> Result<TokenResponse, ExchangeError<C::Error, <C::Response as HttpResponse>::Error>> {
        tracing::debug!(
            endpoint = %self.token_endpoint,
            client_id = %self.client_id,
            scope = params.scope.as_deref().unwrap_or_default(),
            "requesting access token"
        );

        let form = self.build_form(params);

        let result = TokenRequest::builder()
            .uri(self.token_endpoint.as_uri())
            .form(&form)
            .timeout(self.timeout)
            .build()
            .execute(http_client)
            .await;

        match &result {
            Ok(response) => tracing::debug!(
                token_length = response.access_token.len(),
                scope = response.scope.as_deref().unwrap_or_default(),
                expires_in = ?response.expires_in,
                "access token retrieved"
            ),
            Err(ExchangeError::TokenEndpoint { status, body }) => tracing::warn!(
                status = status.as_u16(),
                body = %body,
                "token endpoint rejected the request"
            ),
            Err(error) => tracing::warn!(%error, "token request failed"),
        }

        result
    }
}

/// Parameters when requesting a token using the JWT bearer grant.
#[derive(Debug, Builder)]
pub struct JwtBearerGrantParameters {
    /// The signed assertion, consumed by the request.
    assertion: SignedAssertion,
    #[builder(required, default, name = "scopes", with = |scopes: impl IntoIterator<Item = impl Into<String>>| mk_scopes(scopes))]
    scope: Option<String>,
}

/// JWT bearer grant body.
#[derive(Debug, Serialize)]
pub struct JwtBearerGrantForm<'a> {
    client_id: FormValue<'a>,
    grant_type: FormValue<'static>,
    assertion: FormValue<'static>,
    scope: FormValue<'static>,
}
