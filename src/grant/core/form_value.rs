use std::borrow::Cow;

use secrecy::{ExposeSecret as _, SecretString};
use serde::Serialize;

use crate::jwt::SignedAssertion;

/// A value in a form-encoded token request.
///
/// Sensitive values are only exposed when the form is serialized into the
/// request body; `Debug` output of a form never contains them.
#[derive(Debug, Clone)]
pub enum FormValue<'a> {
    /// A value that may be logged.
    NonSensitive(Cow<'a, str>),
    /// A credential that must not be logged.
    Sensitive(Cow<'a, SecretString>),
}

impl From<String> for FormValue<'_> {
    fn from(value: String) -> Self {
        Self::NonSensitive(Cow::Owned(value))
    }
}

impl<'a> From<&'a str> for FormValue<'a> {
    fn from(value: &'a str) -> Self {
        Self::NonSensitive(Cow::Borrowed(value))
    }
}

impl From<SecretString> for FormValue<'_> {
    fn from(value: SecretString) -> Self {
        Self::Sensitive(Cow::Owned(value))
    }
}

impl From<SignedAssertion> for FormValue<'_> {
    fn from(value: SignedAssertion) -> Self {
        value.into_secret().into()
    }
}

impl Serialize for FormValue<'_> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            FormValue::NonSensitive(cow) => cow.serialize(serializer),
            FormValue::Sensitive(secret) => secret.expose_secret().serialize(serializer),
        }
    }
}
