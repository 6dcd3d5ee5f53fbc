use std::borrow::Cow;
use std::time::{SystemTime, SystemTimeError, UNIX_EPOCH};

use base64::prelude::*;
use rand::RngCore as _;
use serde::{Deserialize, Serialize};
use snafu::prelude::*;

/// Number of random bytes in a `jti` claim.
const JTI_BYTES: usize = 16;

/// Errors for inputs that cannot form a valid assertion claim set.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ClaimError {
    /// The service account identifier is empty.
    #[snafu(display("Service account ID must not be empty"))]
    EmptyServiceAccountId,
    /// The audience is empty.
    #[snafu(display("Audience must not be empty"))]
    EmptyAudience,
    /// The assertion lifetime is zero or negative.
    #[snafu(display("Assertion lifetime must be positive, got {exp_seconds} seconds"))]
    NonPositiveLifetime {
        /// The rejected lifetime.
        exp_seconds: i64,
    },
    /// The system clock reads earlier than the Unix epoch.
    #[snafu(display("System clock is before the Unix epoch"))]
    ClockBeforeEpoch {
        /// The underlying error.
        source: SystemTimeError,
    },
}

impl crate::Error for ClaimError {
    fn is_retryable(&self) -> bool {
        false
    }
}

/// The claim set of a service account assertion (RFC 7523 §3).
///
/// The assertion is self-issued, so `iss` and `sub` both carry the service
/// account identifier. `aud` is the token endpoint the assertion will be
/// presented to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionClaims {
    /// Issuer: the service account identifier.
    pub iss: String,
    /// Subject: the service account identifier.
    pub sub: String,
    /// Audience: the token endpoint URL.
    pub aud: String,
    /// Expiry, in seconds since the Unix epoch.
    pub exp: u64,
    /// Unique assertion identifier, for replay protection.
    pub jti: String,
}

impl AssertionClaims {
    /// Builds the claim set for an assertion created at `now`.
    ///
    /// A fresh `jti` is drawn for every call.
    ///
    /// # Errors
    ///
    /// Returns a [`ClaimError`] if the identifier or audience is blank,
    /// `exp_seconds` is not positive, or `now` precedes the Unix epoch.
    pub fn new(
        service_account_id: &str,
        audience: &str,
        exp_seconds: i64,
        now: SystemTime,
    ) -> Result<Self, ClaimError> {
        ensure!(
            !service_account_id.trim().is_empty(),
            EmptyServiceAccountIdSnafu
        );
        ensure!(!audience.trim().is_empty(), EmptyAudienceSnafu);
        let lifetime = u64::try_from(exp_seconds)
            .ok()
            .filter(|&secs| secs > 0)
            .context(NonPositiveLifetimeSnafu { exp_seconds })?;

        let issued_at = now
            .duration_since(UNIX_EPOCH)
            .context(ClockBeforeEpochSnafu)?
            .as_secs();

        Ok(Self {
            iss: service_account_id.to_owned(),
            sub: service_account_id.to_owned(),
            aud: audience.to_owned(),
            exp: issued_at.saturating_add(lifetime),
            jti: new_jti(),
        })
    }
}

/// Generates a `jti` value: 16 random bytes, base64url without padding.
pub(crate) fn new_jti() -> String {
    let mut bytes = [0u8; JTI_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    BASE64_URL_SAFE_NO_PAD.encode(bytes)
}

/// The protected header of the assertion. Only `alg` is sent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JwtHeader<'a> {
    /// The signing algorithm.
    pub alg: Cow<'a, str>,
}
