//! Imports for syntax extensions.

pub use crate::IntoEndpointUrl as _;
pub use crate::crypto::signer::JwsSigningKey as _;
pub use ::secrecy::ExposeSecret as _;
