//! Signing key traits.

use std::borrow::Cow;

use bon::Builder;
use snafu::prelude::*;

use crate::Error;
use crate::crypto::signer::error::{MismatchedKeyMetadataSnafu, UnderlyingSnafu};
use crate::jwk::PublicJwk;

/// Key metadata.
#[derive(Debug, Clone, Builder, PartialEq)]
pub struct SigningKeyMetadata {
    /// The JWS algorithm identifier, as written to the JWT `alg` header.
    #[builder(into)]
    pub jws_algorithm: String,
    /// The key ID of the signer.
    ///
    /// This is informational. Service account assertions carry only the
    /// `alg` header, so it is not written to the JWT.
    #[builder(into)]
    pub key_id: Option<String>,
}

/// Trait for signers that produce RFC 7515 (JWS) / RFC 7518 (JWA) compatible signatures.
pub trait JwsSigningKey: Send + Sync {
    /// The error type returned by this signer's operations.
    type Error: Error + 'static;

    /// Returns the key metadata for this signer.
    fn key_metadata(&self) -> Cow<'_, SigningKeyMetadata>;

    /// Signs the given input data and returns the signature.
    ///
    /// Implementations provide this; callers use [`JwsSigningKey::sign`],
    /// which first checks the metadata the caller serialized into the header.
    ///
    /// # Errors
    ///
    /// Returns an error if the signing operation fails.
    fn sign_unchecked(
        &self,
        input: &[u8],
    ) -> impl Future<Output = Result<Vec<u8>, Self::Error>> + Send;

    /// Signs the given input data, after verifying the caller's expected key metadata.
    ///
    /// A signer backed by a rotating key store may change algorithm between
    /// the header being written and the signature being made; that case is
    /// reported rather than producing a token whose header lies.
    ///
    /// # Errors
    ///
    /// Returns [`super::JwsSignerError::MismatchedKeyMetadata`] if the key metadata is mismatched, or
    /// [`super::JwsSignerError::UnderlyingError`] if the signing operation fails.
    fn sign(
        &self,
        input: &[u8],
        key_metadata: &SigningKeyMetadata,
    ) -> impl Future<Output = Result<Vec<u8>, super::JwsSignerError<Self::Error>>> + Send {
        async move {
            if &*self.key_metadata() == key_metadata {
                self.sign_unchecked(input).await.context(UnderlyingSnafu)
            } else {
                MismatchedKeyMetadataSnafu.fail()
            }
        }
    }
}

/// Trait for asymmetric keys that provides its public key in JWK (RFC 7517) format.
pub trait HasPublicKey: Send + Sync {
    /// Returns the public key for this asymmetric key as a JSON Web Key.
    fn public_key_jwk(&self) -> &PublicJwk;
}
