//! Service account assertions (RFC 7523 §2.1).
//!
//! Supports the following operations:
//!  - Typed assertion claim set with input validation
//!  - Signing and JWS compact serialization of the assertion

mod builder;
mod claims;

pub use builder::{
    AssertionError, DEFAULT_EXP_SECONDS, ServiceAccountAssertion, ServiceAccountAssertionBuilder,
    SignedAssertion, build,
};
pub use claims::{AssertionClaims, ClaimError, JwtHeader};
