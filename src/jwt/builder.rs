use std::borrow::Cow;
use std::convert::Infallible;
use std::time::SystemTime;

use base64::prelude::*;
use bon::Builder;
use secrecy::{ExposeSecret, SecretString};
use snafu::prelude::*;

use crate::{
    crypto::signer::{JwsSignerError, JwsSigningKey},
    jwt::claims::{AssertionClaims, ClaimError, JwtHeader},
};

/// Default assertion lifetime in seconds.
///
/// Stays under the 900 second ceiling the token endpoint places on
/// assertion lifetimes.
pub const DEFAULT_EXP_SECONDS: i64 = 899;

/// A service account assertion, ready to be signed.
///
/// Every call to [`ServiceAccountAssertion::sign`] produces a new token with
/// a fresh `jti` and an `exp` computed from the current time, so a value of
/// this type can be kept and signed repeatedly.
#[derive(Debug, Clone, Builder)]
pub struct ServiceAccountAssertion {
    /// The service account identifier, used as both `iss` and `sub`.
    #[builder(into)]
    service_account_id: String,
    /// The audience: the token endpoint URL.
    #[builder(into)]
    audience: String,
    /// Lifetime of the assertion in seconds.
    #[builder(default = DEFAULT_EXP_SECONDS)]
    exp_seconds: i64,
}

/// Errors that occur when building a signed assertion.
#[derive(Debug, Snafu)]
pub enum AssertionError<SgnErr: crate::Error + 'static = Infallible> {
    /// The claim inputs were invalid.
    #[snafu(display("Invalid assertion claims"))]
    Claim {
        /// The underlying claim error.
        source: ClaimError,
    },
    /// Failed to encode claims as they could not be converted to JSON.
    EncodeClaims {
        /// The underlying error from `serde_json`.
        source: serde_json::Error,
    },
    /// Failed to encode headers as they could not be converted to JSON.
    EncodeHeader {
        /// The underlying error from `serde_json`.
        source: serde_json::Error,
    },
    /// Failed to sign the assertion.
    Sign {
        /// The underlying signing error.
        source: JwsSignerError<SgnErr>,
    },
}

impl<SgnErr: crate::Error> crate::Error for AssertionError<SgnErr> {
    fn is_retryable(&self) -> bool {
        match self {
            AssertionError::Claim { .. }
            | AssertionError::EncodeClaims { .. }
            | AssertionError::EncodeHeader { .. } => false,
            AssertionError::Sign { source } => source.is_retryable(),
        }
    }
}

impl ServiceAccountAssertion {
    /// Returns the claim set for an assertion created at `now`.
    ///
    /// # Errors
    ///
    /// Returns a [`ClaimError`] if the inputs are invalid.
    pub fn claims_at(&self, now: SystemTime) -> Result<AssertionClaims, ClaimError> {
        AssertionClaims::new(
            &self.service_account_id,
            &self.audience,
            self.exp_seconds,
            now,
        )
    }

    /// Signs a new assertion and returns its compact serialization.
    ///
    /// Claims are validated before the signer is touched.
    ///
    /// # Errors
    ///
    /// Returns an error if the claims are invalid, could not be serialized
    /// to JSON, or signing failed.
    pub async fn sign<Sgn: JwsSigningKey>(
        &self,
        signer: &Sgn,
    ) -> Result<SignedAssertion, AssertionError<Sgn::Error>> {
        let claims = self.claims_at(SystemTime::now()).context(ClaimSnafu)?;

        match to_jws_compact(&claims, signer).await {
            Err(AssertionError::Sign {
                source: JwsSignerError::MismatchedKeyMetadata,
            }) => to_jws_compact(&claims, signer).await,
            other => other,
        }
    }
}

async fn to_jws_compact<Sgn: JwsSigningKey>(
    claims: &AssertionClaims,
    signer: &Sgn,
) -> Result<SignedAssertion, AssertionError<Sgn::Error>> {
    let key_metadata = signer.key_metadata();

    let header = JwtHeader {
        alg: Cow::Borrowed(&key_metadata.jws_algorithm),
    };
    let header_json = serde_json::to_vec(&header).context(EncodeHeaderSnafu)?;
    let header_b64 = BASE64_URL_SAFE_NO_PAD.encode(&header_json);
    let claims_json = serde_json::to_vec(claims).context(EncodeClaimsSnafu)?;
    let claims_b64 = BASE64_URL_SAFE_NO_PAD.encode(&claims_json);

    let signing_input = [header_b64, claims_b64].join(".");

    let signature = signer
        .sign(signing_input.as_bytes(), &key_metadata)
        .await
        .context(SignSnafu)?;

    let signature_b64 = BASE64_URL_SAFE_NO_PAD.encode(&signature);
    let compact = [signing_input, signature_b64].join(".");

    Ok(SignedAssertion(compact.into()))
}

/// Builds and signs a service account assertion in one call.
///
/// `audience` is the token endpoint URL, as produced by
/// [`EndpointUrl::token_endpoint`](crate::EndpointUrl::token_endpoint).
///
/// # Errors
///
/// See [`ServiceAccountAssertion::sign`].
pub async fn build<Sgn: JwsSigningKey>(
    service_account_id: &str,
    audience: &str,
    signer: &Sgn,
    exp_seconds: i64,
) -> Result<SignedAssertion, AssertionError<Sgn::Error>> {
    ServiceAccountAssertion::builder()
        .service_account_id(service_account_id)
        .audience(audience)
        .exp_seconds(exp_seconds)
        .build()
        .sign(signer)
        .await
}

/// A signed assertion in JWS compact serialization.
///
/// The value is a bearer credential for the lifetime of the assertion, so
/// it is held as a secret, cannot be cloned, and is consumed by the token
/// request that uses it.
#[derive(Debug)]
pub struct SignedAssertion(SecretString);

impl SignedAssertion {
    /// Consumes the assertion, returning the secret string.
    #[must_use]
    pub fn into_secret(self) -> SecretString {
        self.0
    }
}

impl ExposeSecret<str> for SignedAssertion {
    fn expose_secret(&self) -> &str {
        self.0.expose_secret()
    }
}
