use std::collections::HashMap;

use serde::{Deserialize, Deserializer};
use serde_json::Value;
use snafu::prelude::*;

use crate::grant::core::form::{
    MissingAccessTokenSnafu, ProtocolError, UnparseableSuccessResponseSnafu,
};
use crate::token::AccessToken;

/// A successful response from the token endpoint.
#[derive(Debug, Clone)]
pub struct TokenResponse {
    /// The access token. Never empty.
    pub access_token: AccessToken,
    /// The token type, usually `Bearer`.
    pub token_type: Option<String>,
    /// Number of seconds until token expiry.
    pub expires_in: Option<u64>,
    /// The scopes granted, which may differ from those requested.
    pub scope: Option<String>,
    /// Other fields received from the token endpoint.
    extra: HashMap<String, Value>,
}

impl TokenResponse {
    /// Parses the body of an HTTP 200 token endpoint response.
    ///
    /// # Errors
    ///
    /// Returns a [`ProtocolError`] if the body is not a JSON object or has
    /// no non-empty `access_token`.
    pub fn from_slice(body: &[u8]) -> Result<Self, ProtocolError> {
        serde_json::from_slice::<RawTokenResponse>(body)
            .context(UnparseableSuccessResponseSnafu)?
            .into_token_response()
    }

    /// Gets a value from the "extra" token fields.
    #[must_use]
    pub fn get_extra(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }
}

/// The response body as received, before the access token is checked.
///
/// Only `access_token` decides whether the response is usable. The other
/// fields are informational, so a value of the wrong shape reads as absent.
#[derive(Deserialize)]
struct RawTokenResponse {
    #[serde(default, deserialize_with = "lenient_string")]
    access_token: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    token_type: Option<String>,
    #[serde(default, deserialize_with = "lenient_seconds")]
    expires_in: Option<u64>,
    #[serde(default, deserialize_with = "lenient_string")]
    scope: Option<String>,
    #[serde(flatten)]
    extra: HashMap<String, Value>,
}

impl RawTokenResponse {
    fn into_token_response(self) -> Result<TokenResponse, ProtocolError> {
        let access_token = self
            .access_token
            .filter(|token| !token.is_empty())
            .map(AccessToken::from)
            .context(MissingAccessTokenSnafu)?;

        Ok(TokenResponse {
            access_token,
            token_type: self.token_type,
            expires_in: self.expires_in,
            scope: self.scope,
            extra: self.extra,
        })
    }
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(value)) => Some(value),
        _ => None,
    })
}

/// Reads a lifetime given as an integer, a whole float such as `899.0`, or a
/// numeric string.
fn lenient_seconds<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u64>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(number)) => number
            .as_u64()
            .or_else(|| number.as_f64().and_then(whole_seconds)),
        Some(Value::String(value)) => value.trim().parse().ok(),
        _ => None,
    })
}

#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
fn whole_seconds(seconds: f64) -> Option<u64> {
    (seconds.fract() == 0.0 && (0.0..=u64::MAX as f64).contains(&seconds))
        .then_some(seconds as u64)
}

#[cfg(test)]
mod tests {
    use secrecy::ExposeSecret as _;

    use super::*;

    fn parse(json: &str) -> Result<TokenResponse, ProtocolError> {
        TokenResponse::from_slice(json.as_bytes())
    }

    #[test]
    fn test_full_response() {
        let response = parse(
            r#"{"access_token":"abc123","scope":"fr:am:*","token_type":"Bearer","expires_in":899,"id":"x"}"#,
        )
        .unwrap();

        assert_eq!(response.access_token.expose_secret(), "abc123");
        assert_eq!(response.scope.as_deref(), Some("fr:am:*"));
        assert_eq!(response.token_type.as_deref(), Some("Bearer"));
        assert_eq!(response.expires_in, Some(899));
        assert_eq!(response.get_extra("id"), Some(&Value::from("x")));
    }

    #[test]
    fn test_missing_access_token() {
        assert!(matches!(
            parse(r#"{"scope":"fr:am:*","expires_in":899}"#),
            Err(ProtocolError::MissingAccessToken)
        ));
    }

    #[test]
    fn test_null_or_empty_access_token() {
        assert!(matches!(
            parse(r#"{"access_token":null}"#),
            Err(ProtocolError::MissingAccessToken)
        ));
        assert!(matches!(
            parse(r#"{"access_token":""}"#),
            Err(ProtocolError::MissingAccessToken)
        ));
    }

    #[test]
    fn test_informational_fields_of_unexpected_shape_are_ignored() {
        for (expires_in, expected) in [
            ("899.0", Some(899)),
            (r#""899""#, Some(899)),
            ("-1", None),
            ("1.5", None),
            (r#""soon""#, None),
            ("null", None),
        ] {
            let response = parse(&format!(
                r#"{{"access_token":"abc123","expires_in":{expires_in},"scope":["fr:am:*"],"token_type":7}}"#
            ))
            .unwrap();

            assert_eq!(response.access_token.expose_secret(), "abc123");
            assert_eq!(response.expires_in, expected, "expires_in {expires_in}");
            assert_eq!(response.scope, None);
            assert_eq!(response.token_type, None);
        }
    }

    #[test]
    fn test_non_string_access_token() {
        assert!(matches!(
            parse(r#"{"access_token":12345}"#),
            Err(ProtocolError::MissingAccessToken)
        ));
    }

    #[test]
    fn test_non_json_body() {
        assert!(matches!(
            parse("<html>Sign in</html>"),
            Err(ProtocolError::UnparseableSuccessResponse { .. })
        ));
        assert!(matches!(
            parse(r#"["abc123"]"#),
            Err(ProtocolError::UnparseableSuccessResponse { .. })
        ));
    }
}
