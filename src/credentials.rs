//! Service account credentials in the platform's text export format.
//!
//! ```text
//! ServiceAccountID: 2f3a8c1e-5b7d-4e9f-a1c2-3d4e5f6a7b8c
//! ServiceAccountJWK:
//! {
//!   "kty": "RSA",
//!   "n": "...",
//!   ...
//! }
//! ```
//!
//! The JWK may sit on the label line, on the following line, or span any
//! number of lines. Other lines are ignored. If a label appears more than
//! once, the last value wins.

use std::fmt;
use std::str::FromStr;

use serde_json::{Map, Value};
use snafu::prelude::*;

const ID_LABEL: &str = "ServiceAccountID:";
const JWK_LABEL: &str = "ServiceAccountJWK:";

/// A service account identifier and its private JWK.
#[derive(Clone)]
pub struct ServiceAccountCredentials {
    /// The service account identifier.
    pub service_account_id: String,
    /// The private JWK, always a JSON object.
    pub jwk: Value,
}

impl fmt::Debug for ServiceAccountCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountCredentials")
            .field("service_account_id", &self.service_account_id)
            .field("jwk", &"[REDACTED]")
            .finish()
    }
}

/// Errors from parsing a credentials file.
#[derive(Debug, Snafu)]
pub enum CredentialsError {
    /// No `ServiceAccountID:` value was found.
    #[snafu(display("No {ID_LABEL} entry found"))]
    MissingServiceAccountId,
    /// No `ServiceAccountJWK:` value was found.
    #[snafu(display("No {JWK_LABEL} entry found"))]
    MissingJwk,
    /// The JWK did not start with `{`.
    #[snafu(display("Expected a JSON object after {JWK_LABEL} on line {line}"))]
    ExpectedJwkObject {
        /// The line where the object was expected.
        line: usize,
    },
    /// The input ended before the JWK's closing brace.
    #[snafu(display("JWK starting on line {line} is never closed"))]
    UnterminatedJwk {
        /// The line where the JWK started.
        line: usize,
    },
    /// The braces balanced but the text was not valid JSON.
    #[snafu(display("JWK starting on line {line} is not valid JSON"))]
    InvalidJwk {
        /// The line where the JWK started.
        line: usize,
        /// The underlying error from `serde_json`.
        source: serde_json::Error,
    },
}

impl crate::Error for CredentialsError {
    fn is_retryable(&self) -> bool {
        false
    }
}

/// Tracks JSON object nesting across lines, ignoring braces inside strings.
#[derive(Debug, Default)]
struct ObjectScanner {
    depth: usize,
    in_string: bool,
    escaped: bool,
}

impl ObjectScanner {
    /// Feeds the next chunk of the object.
    ///
    /// Returns the length of the chunk up to and including the brace that
    /// closes the outermost object, if that brace is in this chunk.
    fn feed(&mut self, chunk: &str) -> Option<usize> {
        for (idx, ch) in chunk.char_indices() {
            if self.in_string {
                match ch {
                    _ if self.escaped => self.escaped = false,
                    '\\' => self.escaped = true,
                    '"' => self.in_string = false,
                    _ => {}
                }
                continue;
            }

            match ch {
                '"' => self.in_string = true,
                '{' => self.depth += 1,
                '}' => {
                    self.depth = self.depth.saturating_sub(1);
                    if self.depth == 0 {
                        return Some(idx + ch.len_utf8());
                    }
                }
                _ => {}
            }
        }
        None
    }
}

#[derive(Debug)]
struct JwkAccumulator {
    start_line: usize,
    buffer: String,
    scanner: ObjectScanner,
}

impl JwkAccumulator {
    fn new(start_line: usize) -> Self {
        Self {
            start_line,
            buffer: String::new(),
            scanner: ObjectScanner::default(),
        }
    }

    /// Adds one trimmed line, returning the JWK once its object is closed.
    fn push(&mut self, line_no: usize, line: &str) -> Result<Option<Value>, CredentialsError> {
        if self.buffer.is_empty() {
            if line.is_empty() {
                return Ok(None);
            }
            ensure!(
                line.starts_with('{'),
                ExpectedJwkObjectSnafu { line: line_no }
            );
        } else {
            self.buffer.push('\n');
        }

        match self.scanner.feed(line) {
            Some(end) => {
                self.buffer.push_str(&line[..end]);
                let object: Map<String, Value> = serde_json::from_str(&self.buffer)
                    .context(InvalidJwkSnafu {
                        line: self.start_line,
                    })?;
                Ok(Some(Value::Object(object)))
            }
            None => {
                self.buffer.push_str(line);
                Ok(None)
            }
        }
    }
}

#[derive(Debug)]
enum ParseState {
    SeekingKey,
    SeekingId,
    AccumulatingJwk(JwkAccumulator),
}

#[derive(Debug)]
struct Parser {
    state: ParseState,
    service_account_id: Option<String>,
    jwk: Option<Value>,
}

impl Parser {
    fn line(&mut self, line_no: usize, line: &str) -> Result<(), CredentialsError> {
        let state = std::mem::replace(&mut self.state, ParseState::SeekingKey);

        self.state = match state {
            ParseState::AccumulatingJwk(mut accumulator) => {
                match accumulator.push(line_no, line)? {
                    Some(jwk) => {
                        self.jwk = Some(jwk);
                        ParseState::SeekingKey
                    }
                    None => ParseState::AccumulatingJwk(accumulator),
                }
            }
            ParseState::SeekingId if line.is_empty() => ParseState::SeekingId,
            ParseState::SeekingId if !is_label(line) => {
                self.service_account_id = Some(line.to_owned());
                ParseState::SeekingKey
            }
            ParseState::SeekingKey | ParseState::SeekingId => self.label(line_no, line)?,
        };
        Ok(())
    }

    fn label(&mut self, line_no: usize, line: &str) -> Result<ParseState, CredentialsError> {
        if let Some(rest) = line.strip_prefix(ID_LABEL) {
            let id = rest.trim();
            if id.is_empty() {
                return Ok(ParseState::SeekingId);
            }
            self.service_account_id = Some(id.to_owned());
        } else if let Some(rest) = line.strip_prefix(JWK_LABEL) {
            let mut accumulator = JwkAccumulator::new(line_no);
            match accumulator.push(line_no, rest.trim())? {
                Some(jwk) => self.jwk = Some(jwk),
                None => return Ok(ParseState::AccumulatingJwk(accumulator)),
            }
        }
        Ok(ParseState::SeekingKey)
    }

    fn finish(self) -> Result<ServiceAccountCredentials, CredentialsError> {
        if let ParseState::AccumulatingJwk(accumulator) = self.state {
            return UnterminatedJwkSnafu {
                line: accumulator.start_line,
            }
            .fail();
        }

        Ok(ServiceAccountCredentials {
            service_account_id: self
                .service_account_id
                .context(MissingServiceAccountIdSnafu)?,
            jwk: self.jwk.context(MissingJwkSnafu)?,
        })
    }
}

fn is_label(line: &str) -> bool {
    line.starts_with(ID_LABEL) || line.starts_with(JWK_LABEL)
}

impl FromStr for ServiceAccountCredentials {
    type Err = CredentialsError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let mut parser = Parser {
            state: ParseState::SeekingKey,
            service_account_id: None,
            jwk: None,
        };

        for (idx, line) in text.lines().enumerate() {
            parser.line(idx + 1, line.trim())?;
        }

        parser.finish()
    }
}
