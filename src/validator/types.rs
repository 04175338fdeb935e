use std::fmt;

use thiserror::Error;

#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "with-serde", serde(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValidationMode {
    #[default]
    Strict,
    Relaxed,
}

/// A syntactically valid address. `domain` is always lower-cased, `username`
/// keeps the case it was given with.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EmailAddress {
    pub username: String,
    pub domain: String,
}

impl EmailAddress {
    pub fn new(username: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            domain: domain.into().to_lowercase(),
        }
    }
}

impl fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.username, self.domain)
    }
}

/// Output of the syntax gate.
///
/// When `valid` is false `username`, `domain` and `ascii_domain` are empty and
/// `reasons` lists every rule the input broke.
#[cfg_attr(feature = "with-serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SyntaxReport {
    pub username: String,
    pub domain: String,
    #[cfg_attr(feature = "with-serde", serde(skip_serializing_if = "String::is_empty", default))]
    pub ascii_domain: String,
    pub valid: bool,
    #[cfg_attr(feature = "with-serde", serde(skip_serializing_if = "Vec::is_empty", default))]
    pub reasons: Vec<String>,
}

impl SyntaxReport {
    pub(crate) fn invalid(reasons: Vec<String>) -> Self {
        Self {
            reasons,
            ..Self::default()
        }
    }

    /// The decomposed address, only for valid input.
    pub fn address(&self) -> Option<EmailAddress> {
        self.valid.then(|| EmailAddress {
            username: self.username.clone(),
            domain: self.domain.clone(),
        })
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EmailError {
    #[error("invalid email address: {}", reasons.join("; "))]
    InvalidFormat { reasons: Vec<String> },
}
