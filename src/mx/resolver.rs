use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use trust_dns_resolver::TokioAsyncResolver;
use trust_dns_resolver::error::{ResolveError, ResolveErrorKind};
use trust_dns_resolver::proto::op::ResponseCode;

use super::{Error, MxOptions, MxRecord, MxResolution, MxStatus};
use crate::cache::TtlCache;

/// DNS primitives the resolver needs. Implemented for the tokio resolver and
/// by test stubs.
pub trait DnsResolver: Send + Sync {
    fn lookup_mx<'a>(&'a self, domain: &'a str) -> BoxFuture<'a, Result<MxStatus, Error>>;

    /// A/AAAA addresses of `domain`; an empty answer is `Ok(vec![])`.
    fn lookup_ip<'a>(&'a self, domain: &'a str) -> BoxFuture<'a, Result<Vec<IpAddr>, Error>>;
}

/// Builds a resolver from the system configuration (`/etc/resolv.conf`).
pub fn system_resolver() -> Result<TokioAsyncResolver, Error> {
    TokioAsyncResolver::tokio_from_system_conf().map_err(|err| Error::resolver_init(err.to_string()))
}

impl DnsResolver for TokioAsyncResolver {
    fn lookup_mx<'a>(&'a self, domain: &'a str) -> BoxFuture<'a, Result<MxStatus, Error>> {
        async move {
            match self.mx_lookup(domain).await {
                Ok(lookup) => Ok(MxStatus::Records(
                    lookup
                        .iter()
                        .map(|mx| {
                            MxRecord::new(mx.preference(), normalize_exchange(mx.exchange().to_utf8()))
                        })
                        .collect(),
                )),
                Err(err) => classify_error(domain, err),
            }
        }
        .boxed()
    }

    fn lookup_ip<'a>(&'a self, domain: &'a str) -> BoxFuture<'a, Result<Vec<IpAddr>, Error>> {
        async move {
            match TokioAsyncResolver::lookup_ip(self, domain).await {
                Ok(lookup) => Ok(lookup.iter().collect()),
                Err(err) => classify_error(domain, err).map(|_| Vec::new()),
            }
        }
        .boxed()
    }
}

fn classify_error(domain: &str, err: ResolveError) -> Result<MxStatus, Error> {
    match err.kind() {
        ResolveErrorKind::NoRecordsFound { response_code, .. }
            if *response_code == ResponseCode::NXDomain =>
        {
            Ok(MxStatus::NxDomain)
        }
        ResolveErrorKind::NoRecordsFound { .. } => Ok(MxStatus::NoRecords),
        ResolveErrorKind::Timeout => Err(Error::timeout(domain)),
        _ => Err(Error::lookup(domain, err)),
    }
}

/// Resolves domains to ordered mail-exchanger lists, caching per domain.
#[derive(Clone)]
pub struct MxResolver {
    dns: Arc<dyn DnsResolver>,
    cache: TtlCache<MxResolution, Error>,
    options: MxOptions,
}

impl MxResolver {
    pub fn new(dns: Arc<dyn DnsResolver>, options: MxOptions) -> Self {
        Self {
            dns,
            cache: TtlCache::new(options.stale_window),
            options,
        }
    }

    /// Cached resolution of `domain`. NXDOMAIN and empty answers come back as
    /// an empty [`MxResolution`]; only timeouts and resolver failures are
    /// errors, and those are not cached.
    pub async fn resolve(&self, domain: &str) -> Result<MxResolution, Arc<Error>> {
        let ascii = normalize_domain(domain).map_err(Arc::new)?;
        let dns = Arc::clone(&self.dns);
        let options = self.options.clone();
        let key = ascii.clone();
        self.cache
            .get_or_load(&key, move || resolve_uncached(dns, ascii, options))
            .await
    }

    pub fn cached(&self, domain: &str) -> Option<MxResolution> {
        let ascii = normalize_domain(domain).ok()?;
        self.cache.get(&ascii)
    }
}

async fn resolve_uncached(
    dns: Arc<dyn DnsResolver>,
    domain: String,
    options: MxOptions,
) -> Result<(MxResolution, Duration), Error> {
    tracing::debug!(domain = %domain, "resolving MX");
    let status = with_timeout(options.timeout, &domain, dns.lookup_mx(&domain)).await?;

    let records = match status {
        MxStatus::NxDomain => {
            tracing::debug!(domain = %domain, "NXDOMAIN");
            return Ok((MxResolution::empty(), options.negative_ttl));
        }
        MxStatus::Records(records) if !records.is_empty() => records,
        MxStatus::Records(_) | MxStatus::NoRecords => {
            return implicit_mx(dns.as_ref(), &domain, &options).await;
        }
    };

    if is_null_mx(&records) {
        return Ok((
            MxResolution {
                hosts: Vec::new(),
                has_mx_records: true,
                null_mx: true,
            },
            options.positive_ttl,
        ));
    }

    let hosts = order_records(records);
    tracing::debug!(domain = %domain, hosts = hosts.len(), "MX resolved");
    Ok((
        MxResolution {
            hosts,
            has_mx_records: true,
            null_mx: false,
        },
        options.positive_ttl,
    ))
}

/// RFC 5321 §5.1: without MX, the domain's own address is the single host.
async fn implicit_mx(
    dns: &dyn DnsResolver,
    domain: &str,
    options: &MxOptions,
) -> Result<(MxResolution, Duration), Error> {
    let addrs = with_timeout(options.timeout, domain, dns.lookup_ip(domain)).await?;
    if addrs.is_empty() {
        return Ok((MxResolution::empty(), options.negative_ttl));
    }
    tracing::debug!(domain = %domain, "no MX, using A/AAAA fallback");
    Ok((
        MxResolution {
            hosts: vec![MxRecord::new(0, domain)],
            has_mx_records: false,
            null_mx: false,
        },
        options.positive_ttl,
    ))
}

async fn with_timeout<T>(
    timeout: Duration,
    domain: &str,
    lookup: BoxFuture<'_, Result<T, Error>>,
) -> Result<T, Error> {
    tokio::time::timeout(timeout, lookup)
        .await
        .map_err(|_| Error::timeout(domain))?
}

fn is_null_mx(records: &[MxRecord]) -> bool {
    records.len() == 1 && records[0].host.is_empty()
}

/// Ascending priority; equal priorities keep resolver order. Empty and
/// repeated exchanges are dropped.
pub(crate) fn order_records(records: Vec<MxRecord>) -> Vec<MxRecord> {
    let mut ordered: Vec<MxRecord> = Vec::with_capacity(records.len());
    for record in records {
        if record.host.is_empty() || ordered.iter().any(|r| r.host == record.host) {
            continue;
        }
        ordered.push(record);
    }
    ordered.sort_by_key(|r| r.priority);
    ordered
}

pub(crate) fn normalize_domain(domain: &str) -> Result<String, Error> {
    let trimmed = domain.trim().trim_end_matches('.');
    if trimmed.is_empty() {
        return Err(Error::EmptyDomain);
    }
    idna::domain_to_ascii(trimmed).map_err(Error::idna)
}

pub(crate) fn normalize_exchange(exchange: String) -> String {
    let trimmed = exchange.trim_end_matches('.');
    trimmed.to_ascii_lowercase()
}
