//! Cryptographic signing keys.

mod error;
mod rsa;
mod r#trait;

pub use error::JwsSignerError;
pub use r#trait::{HasPublicKey, JwsSigningKey, SigningKeyMetadata};
pub use self::rsa::{KeyError, MIN_KEY_BITS, RsaPrivateKey, RsaSignError};

#[cfg(test)]
pub(crate) use self::rsa::test_keys;
