use thiserror::Error;

use super::types::VerificationResult;
use crate::gravatar::GravatarError;
use crate::mx::Error as MxError;
use crate::smtp::SmtpError;

/// Failure channel of a verification. Both variants still carry a complete
/// result so callers always have something well-typed to return.
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("invalid input: {reason}")]
    InvalidInput {
        reason: String,
        result: Box<VerificationResult>,
    },
    #[error("internal resolution error: {message}")]
    InternalResolution {
        message: String,
        result: Box<VerificationResult>,
    },
}

impl VerifyError {
    pub(crate) fn invalid_input(reason: impl Into<String>, result: VerificationResult) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
            result: Box::new(result),
        }
    }

    pub(crate) fn internal(message: impl Into<String>, result: VerificationResult) -> Self {
        Self::InternalResolution {
            message: message.into(),
            result: Box::new(result),
        }
    }

    /// Stable reason code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput { .. } => "invalid-input",
            Self::InternalResolution { .. } => "internal-resolution-error",
        }
    }

    pub fn result(&self) -> &VerificationResult {
        match self {
            Self::InvalidInput { result, .. } | Self::InternalResolution { result, .. } => result,
        }
    }

    pub fn into_result(self) -> VerificationResult {
        match self {
            Self::InvalidInput { result, .. } | Self::InternalResolution { result, .. } => *result,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },
    #[error("helo domain must not be empty")]
    EmptyHelo,
    #[error("invalid reply pattern: {source}")]
    Pattern {
        #[source]
        source: regex::Error,
    },
    #[cfg(feature = "with-serde")]
    #[error("cannot read {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[cfg(feature = "with-serde")]
    #[error("invalid configuration: {source}")]
    Toml {
        #[source]
        source: toml::de::Error,
    },
}

/// Why a [`Verifier`](super::Verifier) could not be assembled.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Resolver(#[from] MxError),
    #[error(transparent)]
    Smtp(#[from] SmtpError),
    #[error(transparent)]
    Gravatar(#[from] GravatarError),
}
