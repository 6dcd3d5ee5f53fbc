//! Tokens issued by the token endpoint.

mod access_token;

pub use access_token::AccessToken;
