//! Client configuration files.
//!
//! A configuration file is JSON or YAML:
//!
//! ```yaml
//! service_account_id: 2f3a8c1e-5b7d-4e9f-a1c2-3d4e5f6a7b8c
//! platform_url: https://tenant.example.com
//! scope: fr:am:* fr:idm:*
//! jwk: { "kty": "RSA", "n": "...", "e": "AQAB", "d": "...", "p": "...", "q": "..." }
//! exp_seconds: 899
//! proxy_url: http://proxy.internal:3128
//! output_format: bearer
//! ```
//!
//! The account id and key may instead come from a credentials export named
//! by `credentials_file`; values in the configuration file take precedence.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bon::Builder;
use http::uri::InvalidUri;
use serde::Deserialize;
use serde_json::Value;
use snafu::prelude::*;

use crate::EndpointUrl;
use crate::credentials::{CredentialsError, ServiceAccountCredentials};
use crate::http::{DEFAULT_TIMEOUT, ReqwestClientOptions};
use crate::jwt::DEFAULT_EXP_SECONDS;
use crate::output::OutputFormat;

/// A private JWK as it appears in configuration: an object, or a string
/// holding the object's JSON.
///
/// `Debug` output is redacted.
#[derive(Clone, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct JwkDocument(Value);

impl JwkDocument {
    /// Returns the JSON value.
    #[must_use]
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    fn is_blank(&self) -> bool {
        match &self.0 {
            Value::Null => true,
            Value::String(s) => s.trim().is_empty(),
            Value::Object(map) => map.is_empty(),
            _ => false,
        }
    }
}

impl fmt::Debug for JwkDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("JwkDocument([REDACTED])")
    }
}

impl From<Value> for JwkDocument {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

impl From<&str> for JwkDocument {
    fn from(json: &str) -> Self {
        Self(Value::String(json.to_owned()))
    }
}

/// Errors from loading or validating a configuration.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ConfigError {
    /// A file could not be read.
    #[snafu(display("Failed to read {}", path.display()))]
    ReadFile {
        /// The file that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
    /// A `.json` file did not parse.
    #[snafu(display("Invalid JSON in {}", path.display()))]
    ParseJson {
        /// The configuration file.
        path: PathBuf,
        /// The underlying error from `serde_json`.
        source: serde_json::Error,
    },
    /// A YAML file, or a file of unknown type, did not parse.
    #[snafu(display("Invalid YAML in {}", path.display()))]
    ParseYaml {
        /// The configuration file.
        path: PathBuf,
        /// The underlying error from `serde_yaml`.
        source: serde_yaml::Error,
    },
    /// The credentials file did not parse.
    #[snafu(display("Invalid credentials file {}", path.display()))]
    Credentials {
        /// The credentials file.
        path: PathBuf,
        /// The underlying error.
        source: CredentialsError,
    },
    /// A required field is absent or blank.
    #[snafu(display("Missing required field '{field}'"))]
    MissingField {
        /// The field name.
        field: &'static str,
    },
    /// The JWK is neither an object nor a string.
    #[snafu(display("Field 'jwk' must be a JSON object or a JSON string"))]
    JwkNotAnObject,
    /// The platform URL did not parse.
    #[snafu(display("Invalid platform URL '{url}'"))]
    InvalidPlatformUrl {
        /// The configured value.
        url: String,
        /// The underlying error from `url`.
        source: url::ParseError,
    },
    /// The platform URL is not `http` or `https`.
    #[snafu(display("Platform URL scheme must be http or https, got '{scheme}'"))]
    UnsupportedScheme {
        /// The scheme of the configured URL.
        scheme: String,
    },
    /// The derived token endpoint is not a valid URI.
    #[snafu(display("Invalid token endpoint for platform URL '{url}'"))]
    InvalidTokenEndpoint {
        /// The configured platform URL.
        url: String,
        /// The underlying error from `http`.
        source: InvalidUri,
    },
    /// `exp_seconds` is zero or negative.
    #[snafu(display("exp_seconds must be positive, got {exp_seconds}"))]
    NonPositiveLifetime {
        /// The configured value.
        exp_seconds: i64,
    },
    /// `timeout_seconds` is zero.
    #[snafu(display("timeout_seconds must be positive"))]
    ZeroTimeout,
}

impl crate::Error for ConfigError {
    fn is_retryable(&self) -> bool {
        false
    }
}

/// A validated client configuration.
///
/// Construct with [`ClientConfig::load`] or [`ClientConfig::builder`]; the
/// builder does not validate, so call [`ClientConfig::validate`] on values
/// built by hand.
#[derive(Debug, Clone, Builder)]
pub struct ClientConfig {
    /// The service account identifier.
    #[builder(into)]
    pub service_account_id: String,
    /// The service account's private JWK.
    #[builder(into)]
    pub jwk: JwkDocument,
    /// Base URL of the identity platform tenant.
    #[builder(into)]
    pub platform_url: String,
    /// Space-separated scopes to request.
    #[builder(into)]
    pub scope: String,
    /// Assertion lifetime in seconds.
    #[builder(default = DEFAULT_EXP_SECONDS)]
    pub exp_seconds: i64,
    /// Proxy for `https` traffic.
    #[builder(into)]
    pub proxy_url: Option<String>,
    /// Whether to log request details.
    #[builder(default)]
    pub verbose: bool,
    /// How to print the issued token.
    #[builder(default)]
    pub output_format: OutputFormat,
    /// Bound on the token request.
    #[builder(default = DEFAULT_TIMEOUT)]
    pub timeout: Duration,
    /// Disables TLS certificate verification. Lab use only.
    #[builder(default)]
    pub danger_accept_invalid_certs: bool,
}

fn default_exp_seconds() -> i64 {
    DEFAULT_EXP_SECONDS
}

fn default_timeout_seconds() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}

/// The configuration file as written, before credentials are merged in.
#[derive(Debug, Deserialize)]
struct ConfigFile {
    #[serde(default, alias = "serviceAccountId")]
    service_account_id: Option<String>,
    #[serde(default, alias = "jwk_dict", alias = "jwk_json")]
    jwk: Option<JwkDocument>,
    #[serde(default, alias = "platform")]
    platform_url: Option<String>,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default = "default_exp_seconds")]
    exp_seconds: i64,
    #[serde(default, alias = "proxy")]
    proxy_url: Option<String>,
    #[serde(default)]
    verbose: bool,
    #[serde(default)]
    output_format: OutputFormat,
    #[serde(default = "default_timeout_seconds")]
    timeout_seconds: u64,
    #[serde(default)]
    danger_accept_invalid_certs: bool,
    /// Inverse of `danger_accept_invalid_certs`, as older files spell it.
    #[serde(default)]
    verify_ssl: Option<bool>,
    #[serde(default)]
    credentials_file: Option<PathBuf>,
    #[serde(flatten)]
    unknown: BTreeMap<String, Value>,
}

impl ConfigFile {
    fn parse(path: &Path, contents: &str) -> Result<Self, ConfigError> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        match extension.as_deref() {
            Some("json") => serde_json::from_str(contents).context(ParseJsonSnafu { path }),
            Some("yaml" | "yml") => serde_yaml::from_str(contents).context(ParseYamlSnafu { path }),
            _ => serde_json::from_str(contents)
                .or_else(|_| serde_yaml::from_str(contents))
                .context(ParseYamlSnafu { path }),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
}

impl ClientConfig {
    /// Loads and validates a configuration file.
    ///
    /// Files ending in `.json` are parsed as JSON, `.yaml`/`.yml` as YAML.
    /// Anything else is tried as JSON, then as YAML. A relative
    /// `credentials_file` is resolved against the configuration file's
    /// directory.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if a file cannot be read or parsed, or the
    /// result does not validate.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).context(ReadFileSnafu { path })?;
        let file = ConfigFile::parse(path, &contents)?;
        for key in file.unknown.keys() {
            tracing::warn!(
                path = %path.display(),
                key = key.as_str(),
                "ignoring unknown configuration key"
            );
        }

        let credentials = match &file.credentials_file {
            Some(credentials_file) => {
                let credentials_path = path
                    .parent()
                    .map_or_else(|| credentials_file.clone(), |dir| dir.join(credentials_file));
                tracing::debug!(path = %credentials_path.display(), "loading credentials file");
                let text = std::fs::read_to_string(&credentials_path).context(ReadFileSnafu {
                    path: &credentials_path,
                })?;
                let credentials = text
                    .parse::<ServiceAccountCredentials>()
                    .context(CredentialsSnafu {
                        path: &credentials_path,
                    })?;
                Some(credentials)
            }
            None => None,
        };

        let config = Self::from_file(file, credentials)?;
        config.validate()?;
        Ok(config)
    }

    fn from_file(
        file: ConfigFile,
        credentials: Option<ServiceAccountCredentials>,
    ) -> Result<Self, ConfigError> {
        let (credentials_id, credentials_jwk) = match credentials {
            Some(credentials) => (
                Some(credentials.service_account_id),
                Some(JwkDocument(credentials.jwk)),
            ),
            None => (None, None),
        };

        let service_account_id = non_blank(file.service_account_id)
            .or(credentials_id)
            .context(MissingFieldSnafu {
                field: "service_account_id",
            })?;
        let jwk = file
            .jwk
            .filter(|jwk| !jwk.is_blank())
            .or(credentials_jwk)
            .context(MissingFieldSnafu { field: "jwk" })?;
        let platform_url =
            non_blank(file.platform_url).context(MissingFieldSnafu { field: "platform_url" })?;
        let scope = non_blank(file.scope).context(MissingFieldSnafu { field: "scope" })?;

        Ok(Self {
            service_account_id,
            jwk,
            platform_url,
            scope,
            exp_seconds: file.exp_seconds,
            proxy_url: non_blank(file.proxy_url),
            verbose: file.verbose,
            output_format: file.output_format,
            timeout: Duration::from_secs(file.timeout_seconds),
            danger_accept_invalid_certs: file.danger_accept_invalid_certs
                || file.verify_ssl == Some(false),
        })
    }

    /// Checks that required fields are present and values are in range.
    ///
    /// The JWK is only checked for shape here; key material is validated
    /// when the signing key is loaded.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure!(
            !self.service_account_id.trim().is_empty(),
            MissingFieldSnafu {
                field: "service_account_id"
            }
        );
        ensure!(!self.jwk.is_blank(), MissingFieldSnafu { field: "jwk" });
        ensure!(
            matches!(self.jwk.0, Value::Object(_) | Value::String(_)),
            JwkNotAnObjectSnafu
        );
        ensure!(
            !self.platform_url.trim().is_empty(),
            MissingFieldSnafu {
                field: "platform_url"
            }
        );
        ensure!(
            !self.scope.trim().is_empty(),
            MissingFieldSnafu { field: "scope" }
        );

        let url = url::Url::parse(self.platform_url.trim()).context(InvalidPlatformUrlSnafu {
            url: &self.platform_url,
        })?;
        ensure!(
            matches!(url.scheme(), "http" | "https"),
            UnsupportedSchemeSnafu {
                scheme: url.scheme()
            }
        );

        ensure!(
            self.exp_seconds > 0,
            NonPositiveLifetimeSnafu {
                exp_seconds: self.exp_seconds
            }
        );
        ensure!(!self.timeout.is_zero(), ZeroTimeoutSnafu);
        Ok(())
    }

    /// Returns the token endpoint of the configured platform.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform URL does not yield a valid URI.
    pub fn token_endpoint(&self) -> Result<EndpointUrl, ConfigError> {
        EndpointUrl::token_endpoint(&self.platform_url).context(InvalidTokenEndpointSnafu {
            url: &self.platform_url,
        })
    }

    /// Returns the HTTP client options this configuration asks for.
    #[must_use]
    pub fn http_client_options(&self) -> ReqwestClientOptions {
        ReqwestClientOptions::builder()
            .maybe_proxy_url(self.proxy_url.clone())
            .timeout(self.timeout)
            .danger_accept_invalid_certs(self.danger_accept_invalid_certs)
            .build()
    }
}
