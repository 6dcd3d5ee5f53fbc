//! JSON Web Key (JWK) types per RFC 7517/7518.
//!
//! Service account keys are issued as RSA private keys in JWK form. This
//! module holds the wire types for the private key as it arrives from the
//! platform, and for the public half that can be derived from it.

mod serde_utils;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use bon::Builder;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest as _, Sha256};

use crate::jwk::serde_utils::base64url_uint;

pub(crate) use serde_utils::base64url_uint::trim_leading_zeros;

/// A public JSON Web Key (RFC 7517 §4).
#[derive(Debug, Serialize, Deserialize, Builder, PartialEq, Clone)]
#[builder(derive(Into), builder_type(
    doc {
        /// Builder for creating a [`PublicJwk`] value (call `build()` or `into()` to finish).
    }
))]
pub struct PublicJwk {
    /// The key details.
    #[builder(into)]
    #[serde(flatten)]
    pub key: PublicKey,
    /// The key use for this key.
    #[serde(rename = "use", skip_serializing_if = "Option::is_none")]
    pub key_use: Option<KeyUse>,
    /// The algorithm of this key.
    #[builder(into)]
    #[serde(rename = "alg", skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<String>,
    /// The key ID of this key.
    #[builder(into)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
}

impl PublicJwk {
    /// Computes the RFC 7638 thumbprint of the key.
    ///
    /// The thumbprint identifies a key without revealing anything about its
    /// private half, which makes it suitable for logs.
    #[must_use]
    pub fn thumbprint(&self) -> Option<String> {
        let canonical_form = match &self.key {
            PublicKey::Rsa(rsa_public_key) => Some(rsa_public_key.canonical_form()),
            PublicKey::Unknown => None,
        };

        canonical_form.map(|canonical| {
            let mut hasher = Sha256::new();
            hasher.update(canonical.as_bytes());
            URL_SAFE_NO_PAD.encode(hasher.finalize())
        })
    }
}

/// Key use parameter (RFC 7517 §4.2).
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Copy)]
pub enum KeyUse {
    /// Digital signature or MAC.
    #[serde(rename = "sig")]
    Sign,
    /// Encryption.
    #[serde(rename = "enc")]
    Encrypt,
    /// Unknown key use value.
    #[serde(skip, other)]
    Unknown,
}

/// The structural part of a public key.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(tag = "kty")]
pub enum PublicKey {
    /// An RSA public key.
    #[serde(rename = "RSA")]
    Rsa(RsaPublicKey),
    /// Any key type other than RSA.
    #[serde(skip, other)]
    Unknown,
}

/// An RSA public key.
#[derive(Debug, Serialize, Deserialize, Builder, PartialEq, Clone)]
#[builder(derive(Into), builder_type(
    doc {
        /// Builder for creating an [`RsaPublicKey`] value (call `build()` or `into()` to finish).
    }
))]
pub struct RsaPublicKey {
    /// The modulus of the key.
    #[builder(with = <_>::from_iter)]
    #[serde(with = "base64url_uint")]
    pub n: Vec<u8>,
    /// The exponent of the key.
    #[builder(with = <_>::from_iter)]
    #[serde(with = "base64url_uint")]
    pub e: Vec<u8>,
}

impl RsaPublicKey {
    pub(super) fn canonical_form(&self) -> String {
        let e = URL_SAFE_NO_PAD.encode(trim_leading_zeros(&self.e));
        let n = URL_SAFE_NO_PAD.encode(trim_leading_zeros(&self.n));

        format!(r#"{{"e":"{e}","kty":"RSA","n":"{n}"}}"#)
    }
}

impl From<RsaPublicKey> for PublicKey {
    fn from(value: RsaPublicKey) -> Self {
        Self::Rsa(value)
    }
}

impl<S: rsa_public_key_builder::State> From<RsaPublicKeyBuilder<S>> for PublicKey
where
    S: rsa_public_key_builder::IsComplete,
{
    fn from(value: RsaPublicKeyBuilder<S>) -> Self {
        Self::Rsa(value.build())
    }
}

/// An RSA private key in JWK form (RFC 7518 §6.3).
///
/// Components are kept as their base64url text until the key is loaded by
/// [`RsaPrivateKey`](crate::crypto::signer::RsaPrivateKey); the private
/// components are held as secrets so `Debug` output never reveals them.
/// Every component is optional here so that loading can report exactly
/// which one is missing.
#[derive(Debug, Clone, Deserialize)]
pub struct RsaPrivateJwk {
    /// The key type. Must be `RSA` for the key to load.
    pub kty: String,
    /// The key ID.
    #[serde(default)]
    pub kid: Option<String>,
    /// The intended algorithm, if the key declares one.
    #[serde(rename = "alg", default)]
    pub algorithm: Option<String>,
    /// The intended key use, if the key declares one.
    #[serde(rename = "use", default)]
    pub key_use: Option<KeyUse>,
    /// Modulus.
    #[serde(default)]
    pub n: Option<String>,
    /// Public exponent.
    #[serde(default)]
    pub e: Option<String>,
    /// Private exponent.
    #[serde(default)]
    pub d: Option<SecretString>,
    /// First prime factor.
    #[serde(default)]
    pub p: Option<SecretString>,
    /// Second prime factor.
    #[serde(default)]
    pub q: Option<SecretString>,
    /// First factor CRT exponent.
    #[serde(default)]
    pub dp: Option<SecretString>,
    /// Second factor CRT exponent.
    #[serde(default)]
    pub dq: Option<SecretString>,
    /// First CRT coefficient.
    #[serde(default)]
    pub qi: Option<SecretString>,
}

impl RsaPrivateJwk {
    /// Parses a private JWK from a JSON value.
    ///
    /// The value may be the JWK object itself, or a string holding the JWK
    /// as serialized JSON (as some credential exports do).
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not a JSON object with a `kty` member.
    pub fn from_value(value: &Value) -> Result<Self, serde_json::Error> {
        match value {
            Value::String(json) => serde_json::from_str(json),
            other => Self::deserialize(other),
        }
    }
}

impl std::str::FromStr for RsaPrivateJwk {
    type Err = serde_json::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
mod tests {
    use base64::prelude::BASE64_URL_SAFE_NO_PAD;
    use secrecy::ExposeSecret as _;

    use super::*;

    const RFC7638_N: &str = "0vx7agoebGcQSuuPiLJXZptN9nndrQmbXEps2aiAFbWhM78LhWx4cbbfAAtVT86zwu1RK7aPFFxuhDR1L6tSoc_BJECPebWKRXjBZCiFV4n3oknjhMstn64tZ_2W-5JsGY4Hc5n9yBXArwl93lqt7_RN5w6Cf0h4QyQ5v-65YGjQR0_FDW2QvzqY368QQMicAtaSqzs8KJZgnYb9c7d0zgdAZHzu6qMQvRL5hajrn1n91CbOpbISD08qNLyrdkt-bFTWhAI4vMQFh6WeZu0fM4lFd2NcRwr3XPksINHaQ-G_xBniIqbw0Ls1jF44-csFCur-kEgU8awapJzKnqDKgw";

    // Example from https://www.rfc-editor.org/rfc/rfc7638.html#section-3.1
    #[test]
    fn test_thumbprint_rfc7638_example() {
        let jwk = PublicJwk::builder()
            .key(
                RsaPublicKey::builder()
                    .n(BASE64_URL_SAFE_NO_PAD.decode(RFC7638_N).unwrap())
                    .e(BASE64_URL_SAFE_NO_PAD.decode("AQAB").unwrap()),
            )
            .algorithm("RS256")
            .kid("2011-04-29")
            .build();

        assert_eq!(
            jwk.thumbprint().as_deref(),
            Some("NzbLsXh8uDCcd-6MNwXF4W_7noWXFZAfHkxZsRGC9Xs")
        );
    }

    #[test]
    fn test_public_jwk_serializes_with_kty() {
        let jwk = PublicJwk::builder()
            .key(RsaPublicKey::builder().n([0, 1, 2]).e([1, 0, 1]))
            .key_use(KeyUse::Sign)
            .build();

        let json = serde_json::to_value(&jwk).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"kty": "RSA", "n": "AQI", "e": "AQAB", "use": "sig"})
        );
    }

    #[test]
    fn test_private_jwk_from_object() {
        let value = serde_json::json!({
            "kty": "RSA",
            "kid": "sa-key",
            "alg": "RS256",
            "use": "sig",
            "n": RFC7638_N,
            "e": "AQAB",
            "d": "c2VjcmV0",
        });

        let jwk = RsaPrivateJwk::from_value(&value).unwrap();
        assert_eq!(jwk.kty, "RSA");
        assert_eq!(jwk.kid.as_deref(), Some("sa-key"));
        assert_eq!(jwk.algorithm.as_deref(), Some("RS256"));
        assert_eq!(jwk.key_use, Some(KeyUse::Sign));
        assert_eq!(jwk.d.as_ref().unwrap().expose_secret(), "c2VjcmV0");
        assert!(jwk.p.is_none());
    }

    #[test]
    fn test_private_jwk_from_embedded_json_string() {
        let value = Value::String(r#"{"kty":"RSA","n":"AQI","e":"AQAB"}"#.to_string());
        let jwk = RsaPrivateJwk::from_value(&value).unwrap();
        assert_eq!(jwk.n.as_deref(), Some("AQI"));
    }

    #[test]
    fn test_private_jwk_debug_redacts_secrets() {
        let jwk: RsaPrivateJwk = r#"{"kty":"RSA","d":"dG9wLXNlY3JldA"}"#.parse().unwrap();
        let debug = format!("{jwk:?}");
        assert!(!debug.contains("dG9wLXNlY3JldA"));
    }

    #[test]
    fn test_private_jwk_requires_kty() {
        assert!(RsaPrivateJwk::from_value(&serde_json::json!({"n": "AQI"})).is_err());
        assert!(RsaPrivateJwk::from_value(&serde_json::json!([1, 2, 3])).is_err());
    }
}
