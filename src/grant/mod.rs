//! `OAuth2` grant type implementations.
//!
//! The [`jwt_bearer`] grant is built on top of the [`core`] module, which
//! provides the form-encoded request, response parsing and error mapping
//! shared by token endpoint exchanges.

pub mod core;
pub mod jwt_bearer;
