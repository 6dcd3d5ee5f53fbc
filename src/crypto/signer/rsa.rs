use std::borrow::Cow;
use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rsa::BigUint;
use rsa::signature::SignatureEncoding as _;
use rsa::signature::Signer as _;
use rsa::traits::PublicKeyParts as _;
use secrecy::{ExposeSecret as _, SecretString};
use serde_json::Value;
use snafu::prelude::*;

use crate::crypto::signer::{HasPublicKey, JwsSigningKey, SigningKeyMetadata};
use crate::jwk::{self, KeyUse, PublicJwk, RsaPrivateJwk};

/// The only algorithm service account assertions are signed with.
const RS256: &str = "RS256";

/// Smallest modulus accepted for RS256 signing keys, in bits.
pub const MIN_KEY_BITS: usize = 1024;

/// Errors that may occur when loading an RSA private key from a JWK.
///
/// None of these are retryable: the key material itself is unusable.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum KeyError {
    /// The key was not a JSON object shaped like a JWK.
    #[snafu(display("Failed to parse JWK"))]
    Parse {
        /// The underlying error from `serde_json`.
        source: serde_json::Error,
    },
    /// The key type is not RSA.
    #[snafu(display("Unsupported key type '{kty}', expected 'RSA'"))]
    UnsupportedKeyType {
        /// The `kty` value of the key.
        kty: String,
    },
    /// The key declares an algorithm other than RS256.
    #[snafu(display("Key is restricted to algorithm '{alg}', expected 'RS256'"))]
    UnsupportedAlgorithm {
        /// The `alg` value of the key.
        alg: String,
    },
    /// The key declares that it is for encryption only.
    #[snafu(display("Key is not usable for signatures"))]
    WrongKeyUse,
    /// A required RSA component is absent.
    #[snafu(display("JWK is missing required RSA component '{component}'"))]
    MissingComponent {
        /// The JWK member name.
        component: &'static str,
    },
    /// A component was not valid base64url.
    #[snafu(display("JWK component '{component}' is not valid base64url"))]
    Decode {
        /// The JWK member name.
        component: &'static str,
        /// The underlying decoding error.
        source: base64::DecodeError,
    },
    /// The components do not form a valid RSA private key.
    #[snafu(display("JWK components do not form a valid RSA private key"))]
    InvalidKey {
        /// The underlying error from `rsa`.
        source: rsa::Error,
    },
    /// The modulus is too short to sign with.
    #[snafu(display("RSA key is {bits} bits, at least {MIN_KEY_BITS} required"))]
    KeyTooSmall {
        /// The size of the modulus.
        bits: usize,
    },
}

impl crate::Error for KeyError {
    fn is_retryable(&self) -> bool {
        false
    }
}

/// The RSA signature could not be produced.
#[derive(Debug, Snafu)]
#[snafu(display("RSA signing failed"))]
pub struct RsaSignError {
    source: rsa::signature::Error,
}

impl crate::Error for RsaSignError {
    fn is_retryable(&self) -> bool {
        false
    }
}

struct RsaPrivateKeyInner {
    signing_key: rsa::pkcs1v15::SigningKey<rsa::sha2::Sha256>,
    key_metadata: SigningKeyMetadata,
    jwk: PublicJwk,
}

impl std::fmt::Debug for RsaPrivateKeyInner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RsaPrivateKeyInner")
            .field("key_metadata", &self.key_metadata)
            .field("jwk", &self.jwk)
            .finish_non_exhaustive()
    }
}

/// An RSA private key which signs with RS256 (RSASSA-PKCS1-v1_5 with SHA-256).
#[derive(Debug, Clone)]
pub struct RsaPrivateKey {
    inner: Arc<RsaPrivateKeyInner>,
}

fn decode_component(component: &'static str, value: &str) -> Result<BigUint, KeyError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(value.trim_end_matches('='))
        .context(DecodeSnafu { component })?;
    Ok(BigUint::from_bytes_be(&bytes))
}

fn required_public(component: &'static str, value: Option<&String>) -> Result<BigUint, KeyError> {
    let value = value.context(MissingComponentSnafu { component })?;
    decode_component(component, value)
}

fn required_secret(
    component: &'static str,
    value: Option<&SecretString>,
) -> Result<BigUint, KeyError> {
    let value = value.context(MissingComponentSnafu { component })?;
    decode_component(component, value.expose_secret())
}

impl RsaPrivateKey {
    /// Loads the key from a parsed private JWK.
    ///
    /// `n`, `e`, `d`, `p` and `q` are required. The CRT parameters (`dp`,
    /// `dq`, `qi`) are recomputed from the primes, so they may be absent.
    ///
    /// # Errors
    ///
    /// Returns a [`KeyError`] if the key is not an RSA signing key, a
    /// required component is missing or undecodable, the components are
    /// mathematically inconsistent, or the modulus is shorter than
    /// [`MIN_KEY_BITS`].
    pub fn from_jwk(jwk: &RsaPrivateJwk) -> Result<Self, KeyError> {
        ensure!(
            jwk.kty == "RSA",
            UnsupportedKeyTypeSnafu {
                kty: jwk.kty.clone()
            }
        );
        if let Some(alg) = &jwk.algorithm {
            ensure!(alg == RS256, UnsupportedAlgorithmSnafu { alg: alg.clone() });
        }
        ensure!(jwk.key_use != Some(KeyUse::Encrypt), WrongKeyUseSnafu);

        let n = required_public("n", jwk.n.as_ref())?;
        let e = required_public("e", jwk.e.as_ref())?;
        let d = required_secret("d", jwk.d.as_ref())?;
        let p = required_secret("p", jwk.p.as_ref())?;
        let q = required_secret("q", jwk.q.as_ref())?;

        let private_key =
            rsa::RsaPrivateKey::from_components(n, e, d, vec![p, q]).context(InvalidKeySnafu)?;
        private_key.validate().context(InvalidKeySnafu)?;
        let bits = private_key.n().bits();
        ensure!(bits >= MIN_KEY_BITS, KeyTooSmallSnafu { bits });

        Ok(convert(private_key, jwk.kid.as_deref()))
    }

    /// Loads the key from a JSON value holding a private JWK.
    ///
    /// The value may be the JWK object, or a string containing the JWK JSON.
    ///
    /// # Errors
    ///
    /// Returns a [`KeyError`] if the value is not a JWK, or see [`RsaPrivateKey::from_jwk`].
    pub fn from_jwk_value(value: &Value) -> Result<Self, KeyError> {
        let jwk = RsaPrivateJwk::from_value(value).context(ParseSnafu)?;
        Self::from_jwk(&jwk)
    }

    /// Loads the key from a private JWK serialized as JSON.
    ///
    /// # Errors
    ///
    /// Returns a [`KeyError`] if the string is not a JWK, or see [`RsaPrivateKey::from_jwk`].
    pub fn from_jwk_json(json: &str) -> Result<Self, KeyError> {
        let jwk: RsaPrivateJwk = json.parse().context(ParseSnafu)?;
        Self::from_jwk(&jwk)
    }

    /// Returns the RFC 7638 thumbprint of the public key.
    #[must_use]
    pub fn thumbprint(&self) -> Option<String> {
        self.inner.jwk.thumbprint()
    }
}

fn convert(private_key: rsa::RsaPrivateKey, key_id: Option<&str>) -> RsaPrivateKey {
    let public_key = jwk::RsaPublicKey::builder()
        .n(private_key.n().to_bytes_be())
        .e(private_key.e().to_bytes_be())
        .build();

    RsaPrivateKey {
        inner: Arc::new(RsaPrivateKeyInner {
            signing_key: rsa::pkcs1v15::SigningKey::<rsa::sha2::Sha256>::new(private_key),
            key_metadata: SigningKeyMetadata::builder()
                .jws_algorithm(RS256)
                .maybe_key_id(key_id)
                .build(),
            jwk: PublicJwk::builder()
                .algorithm(RS256)
                .key_use(jwk::KeyUse::Sign)
                .key(public_key)
                .maybe_kid(key_id)
                .build(),
        }),
    }
}

impl JwsSigningKey for RsaPrivateKey {
    type Error = RsaSignError;

    fn key_metadata(&self) -> Cow<'_, SigningKeyMetadata> {
        Cow::Borrowed(&self.inner.key_metadata)
    }

    async fn sign_unchecked(&self, input: &[u8]) -> Result<Vec<u8>, Self::Error> {
        let signature = self
            .inner
            .signing_key
            .try_sign(input)
            .context(RsaSignSnafu)?;
        Ok(signature.to_vec())
    }
}

impl HasPublicKey for RsaPrivateKey {
    fn public_key_jwk(&self) -> &PublicJwk {
        &self.inner.jwk
    }
}


#[cfg(test)]
mod tests {
    use rsa::signature::Verifier as _;

    use super::*;

    fn jwk_without(member: &str) -> Value {
        let mut jwk = test_keys::private_jwk();
        jwk.as_object_mut().unwrap().remove(member);
        jwk
    }

    #[test]
    fn test_load_from_jwk_value() {
        let key = RsaPrivateKey::from_jwk_value(&test_keys::private_jwk()).unwrap();

        assert_eq!(key.key_metadata().jws_algorithm, "RS256");
        assert_eq!(key.key_metadata().key_id.as_deref(), Some("test-key"));
        assert!(key.thumbprint().is_some());
    }

    #[test]
    fn test_public_key_matches_private_key() {
        let key = RsaPrivateKey::from_jwk_value(&test_keys::private_jwk()).unwrap();
        let public = key.public_key_jwk();

        assert_eq!(public.kid.as_deref(), Some("test-key"));
        assert_eq!(public.key_use, Some(KeyUse::Sign));
        match &public.key {
            jwk::PublicKey::Rsa(rsa_key) => {
                assert_eq!(rsa_key.n, test_keys::private_key().n().to_bytes_be());
            }
            jwk::PublicKey::Unknown => panic!("expected an RSA public key"),
        }
    }

    #[test]
    fn test_load_from_jwk_json_string() {
        let json = test_keys::private_jwk().to_string();
        RsaPrivateKey::from_jwk_json(&json).unwrap();
        RsaPrivateKey::from_jwk_value(&Value::String(json)).unwrap();
    }

    #[tokio::test]
    async fn test_signature_verifies_with_public_key() {
        let key = RsaPrivateKey::from_jwk_value(&test_keys::private_jwk()).unwrap();
        let signature = key.sign_unchecked(b"header.payload").await.unwrap();

        let verifying_key = rsa::pkcs1v15::VerifyingKey::<rsa::sha2::Sha256>::new(
            test_keys::private_key().to_public_key(),
        );
        let signature = rsa::pkcs1v15::Signature::try_from(signature.as_slice()).unwrap();
        verifying_key
            .verify(b"header.payload", &signature)
            .expect("signature verifies");
    }

    #[test]
    fn test_missing_components_rejected() {
        for member in ["n", "e", "d", "p", "q"] {
            let result = RsaPrivateKey::from_jwk_value(&jwk_without(member));
            assert!(
                matches!(result, Err(KeyError::MissingComponent { component }) if component == member),
                "missing {member}: {result:?}"
            );
        }
    }

    #[test]
    fn test_public_jwk_rejected() {
        let mut jwk = test_keys::private_jwk();
        let object = jwk.as_object_mut().unwrap();
        for member in ["d", "p", "q"] {
            object.remove(member);
        }

        assert!(matches!(
            RsaPrivateKey::from_jwk_value(&jwk),
            Err(KeyError::MissingComponent { component: "d" })
        ));
    }

    #[test]
    fn test_non_rsa_key_rejected() {
        let jwk = serde_json::json!({"kty": "EC", "crv": "P-256", "x": "AA", "y": "AA", "d": "AA"});
        assert!(matches!(
            RsaPrivateKey::from_jwk_value(&jwk),
            Err(KeyError::UnsupportedKeyType { kty }) if kty == "EC"
        ));
    }

    #[test]
    fn test_other_algorithm_rejected() {
        let mut jwk = test_keys::private_jwk();
        jwk["alg"] = "PS256".into();
        assert!(matches!(
            RsaPrivateKey::from_jwk_value(&jwk),
            Err(KeyError::UnsupportedAlgorithm { alg }) if alg == "PS256"
        ));
    }

    #[test]
    fn test_encryption_key_rejected() {
        let mut jwk = test_keys::private_jwk();
        jwk["use"] = "enc".into();
        assert!(matches!(
            RsaPrivateKey::from_jwk_value(&jwk),
            Err(KeyError::WrongKeyUse)
        ));
    }

    #[test]
    fn test_bad_base64_rejected() {
        let mut jwk = test_keys::private_jwk();
        jwk["d"] = "not*base64".into();
        assert!(matches!(
            RsaPrivateKey::from_jwk_value(&jwk),
            Err(KeyError::Decode { component: "d", .. })
        ));
    }

    #[test]
    fn test_inconsistent_components_rejected() {
        let mut jwk = test_keys::private_jwk();
        jwk["d"] = "AQAB".into();
        assert!(matches!(
            RsaPrivateKey::from_jwk_value(&jwk),
            Err(KeyError::InvalidKey { .. })
        ));
    }

    #[test]
    fn test_small_key_rejected() {
        let small = rsa::RsaPrivateKey::new(&mut rand::thread_rng(), 512).unwrap();

        let result = RsaPrivateKey::from_jwk_value(&test_keys::jwk_for(&small));

        assert!(
            matches!(result, Err(KeyError::KeyTooSmall { bits: 512 })),
            "{result:?}"
        );
    }

    #[tokio::test]
    async fn test_signing_with_short_modulus_is_an_error() {
        // Below the RS256 encoding length, so only reachable by bypassing `from_jwk`.
        let tiny = rsa::RsaPrivateKey::new(&mut rand::thread_rng(), 256).unwrap();
        let key = convert(tiny, None);

        let result = key.sign_unchecked(b"header.payload").await;

        assert!(result.is_err());
    }

    #[test]
    fn test_not_json_rejected() {
        assert!(matches!(
            RsaPrivateKey::from_jwk_json("{not json"),
            Err(KeyError::Parse { .. })
        ));
    }
}
