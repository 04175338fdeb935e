//! Gravatar presence lookup.
//!
//! The verifier only needs "does this address have an avatar"; the HTTP
//! implementation lives behind the `with-gravatar` feature.

use futures::future::BoxFuture;
use thiserror::Error;

#[cfg(feature = "with-gravatar")]
mod http;

#[cfg(feature = "with-gravatar")]
pub use http::{HttpGravatar, avatar_url, email_hash};

#[derive(Debug, Error)]
pub enum GravatarError {
    #[cfg(feature = "with-gravatar")]
    #[error("gravatar request failed: {source}")]
    Http {
        #[source]
        source: reqwest::Error,
    },
    #[error("unexpected gravatar status {0}")]
    UnexpectedStatus(u16),
}

/// Answers whether an address has a Gravatar. Implemented over HTTP and by
/// test doubles.
pub trait GravatarLookup: Send + Sync {
    fn has_avatar<'a>(&'a self, email: &'a str) -> BoxFuture<'a, Result<bool, GravatarError>>;
}
