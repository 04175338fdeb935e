use thiserror::Error;

#[derive(Debug, Error)]
pub enum MxError {
    #[error("domain is empty")]
    EmptyDomain,
    #[error("domain IDNA conversion failed")]
    IdnaConversion {
        #[source]
        source: idna::Errors,
    },
    #[error("resolver initialization failed: {message}")]
    ResolverInit { message: String },
    #[error("DNS lookup timed out for {domain}")]
    Timeout { domain: String },
    #[error("DNS lookup failed for {domain}: {source}")]
    Lookup {
        domain: String,
        #[source]
        source: trust_dns_resolver::error::ResolveError,
    },
}

impl MxError {
    pub(crate) fn idna(source: idna::Errors) -> Self {
        Self::IdnaConversion { source }
    }

    pub(crate) fn resolver_init(message: impl Into<String>) -> Self {
        Self::ResolverInit {
            message: message.into(),
        }
    }

    pub(crate) fn lookup(
        domain: impl Into<String>,
        source: trust_dns_resolver::error::ResolveError,
    ) -> Self {
        Self::Lookup {
            domain: domain.into(),
            source,
        }
    }

    pub(crate) fn timeout(domain: impl Into<String>) -> Self {
        Self::Timeout {
            domain: domain.into(),
        }
    }

    /// True for failures of the resolver itself rather than of the queried
    /// domain (bad system configuration, I/O or protocol errors).
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::ResolverInit { .. } | Self::Lookup { .. })
    }
}
