//! Rendering an issued token for display.

use secrecy::ExposeSecret as _;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::grant::core::TokenResponse;

/// How an issued access token is printed.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// The raw token.
    #[default]
    Token,
    /// An `Authorization` header value: `Bearer <token>`.
    Bearer,
    /// A JSON object with the token and what the endpoint said about it.
    Json,
}

impl OutputFormat {
    /// Renders the token in this format.
    ///
    /// The JSON form always reports `token_type` as `Bearer`. `expires_in`
    /// and `scope` are only included when the endpoint returned them.
    #[must_use]
    pub fn render(self, response: &TokenResponse) -> String {
        let token = response.access_token.expose_secret();

        match self {
            Self::Token => token.to_owned(),
            Self::Bearer => format!("Bearer {token}"),
            Self::Json => {
                let mut envelope = Map::new();
                envelope.insert("access_token".to_owned(), token.into());
                envelope.insert("token_type".to_owned(), "Bearer".into());
                if let Some(expires_in) = response.expires_in {
                    envelope.insert("expires_in".to_owned(), expires_in.into());
                }
                if let Some(scope) = &response.scope {
                    envelope.insert("scope".to_owned(), scope.as_str().into());
                }
                Value::Object(envelope).to_string()
            }
        }
    }
}
