//! Cryptographic interfaces.
//!
//! The JWT bearer grant needs exactly one cryptographic operation: an
//! asymmetric signature over the assertion. This module provides the
//! signing interface and an RS256 implementation backed by the `rsa` crate.
//! Other signers (for example a remote KMS) can implement the trait
//! externally.

pub mod signer;
