//! Token endpoint request infrastructure.
//!
//! Contains the form-encoded request, the interpretation of the token
//! endpoint's response, and the errors that come out of an exchange.

mod form;
mod form_value;
mod token_response;

pub use form::{ExchangeError, OAuth2ErrorBody, ProtocolError};
pub(crate) use form::TokenRequest;
pub use form_value::FormValue;
pub use token_response::TokenResponse;

/// Normalizes a sequence of scopes into a single space-separated scope string.
pub(crate) fn mk_scopes(scopes: impl IntoIterator<Item = impl Into<String>>) -> Option<String> {
    let maybe_scopes = scopes
        .into_iter()
        .flat_map(|s| {
            s.into()
                .split_whitespace()
                .map(str::to_owned)
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();

    (!maybe_scopes.is_empty()).then(|| maybe_scopes.join(" "))
}
