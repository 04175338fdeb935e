//! MX resolution with implicit-MX fallback and a per-domain cache.
//!
//! The entry point is [`MxResolver::resolve`]. DNS access goes through the
//! [`DnsResolver`] trait, implemented for the tokio resolver returned by
//! [`system_resolver`].

mod error;
mod resolver;
mod types;

pub use error::MxError as Error;
pub use resolver::{DnsResolver, MxResolver, system_resolver};
pub use types::{MxRecord, MxResolution, MxStatus};

use std::time::Duration;

#[cfg(feature = "with-serde")]
use serde::{Deserialize, Serialize};

/// Timeouts and cache lifetimes for [`MxResolver`].
#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MxOptions {
    pub timeout: Duration,
    pub positive_ttl: Duration,
    pub negative_ttl: Duration,
    pub stale_window: Duration,
}

impl Default for MxOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(3),
            positive_ttl: Duration::from_secs(300),
            negative_ttl: Duration::from_secs(60),
            stale_window: Duration::from_secs(30),
        }
    }
}
