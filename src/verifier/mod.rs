//! The verification pipeline.
//!
//! [`Verifier::verify`] gates on syntax, then runs MX resolution followed by
//! the SMTP probe alongside the Gravatar lookup, while the classifiers and
//! the suggester run inline. Everything is bounded by one deadline; a branch
//! that has not finished by then contributes its default. [`assemble`] is
//! the only place the branch outputs meet.

mod config;
mod error;
mod types;

pub use config::VerifierConfig;
pub use error::{BuildError, ConfigError, VerifyError};
pub use types::{Reachability, VerificationResult};

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, timeout, timeout_at};

use crate::classify::{Classifiers, DomainFlags};
use crate::gravatar::GravatarLookup;
use crate::mx::{DnsResolver, MxResolver, system_resolver};
use crate::smtp::{Connector, ProbeConclusion, ProbeTarget, SmtpProbeReport, SmtpProber, TcpConnector};
use crate::suggest::DomainSuggester;
use crate::validator::{EmailAddress, SyntaxReport, parse_email};

/// Longest budget a single request is given, whatever the caller asks for.
pub const MAX_REQUEST_BUDGET: Duration = Duration::from_secs(24 * 60 * 60);

/// Cheap to clone; clones share caches and classifier tables.
#[derive(Clone)]
pub struct Verifier {
    config: Arc<VerifierConfig>,
    mx: MxResolver,
    prober: SmtpProber,
    classifiers: Arc<Classifiers>,
    suggester: Arc<DomainSuggester>,
    gravatar: Option<Arc<dyn GravatarLookup>>,
}

/// Swaps in collaborators before building a [`Verifier`]. Anything left
/// unset uses the system resolver, plain TCP, the built-in tables and the
/// built-in domain list.
pub struct VerifierBuilder {
    config: VerifierConfig,
    dns: Option<Arc<dyn DnsResolver>>,
    connector: Option<Arc<dyn Connector>>,
    classifiers: Option<Arc<Classifiers>>,
    suggester: Option<DomainSuggester>,
    gravatar: Option<Arc<dyn GravatarLookup>>,
}

impl VerifierBuilder {
    pub fn dns(mut self, dns: Arc<dyn DnsResolver>) -> Self {
        self.dns = Some(dns);
        self
    }

    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    pub fn classifiers(mut self, classifiers: Arc<Classifiers>) -> Self {
        self.classifiers = Some(classifiers);
        self
    }

    pub fn suggester(mut self, suggester: DomainSuggester) -> Self {
        self.suggester = Some(suggester);
        self
    }

    /// Only consulted when `gravatar_enabled` is set.
    pub fn gravatar(mut self, gravatar: Arc<dyn GravatarLookup>) -> Self {
        self.gravatar = Some(gravatar);
        self
    }

    pub fn build(self) -> Result<Verifier, BuildError> {
        let config = self.config;
        config.validate()?;

        let dns: Arc<dyn DnsResolver> = match self.dns {
            Some(dns) => dns,
            None => Arc::new(system_resolver()?),
        };
        let connector: Arc<dyn Connector> = match self.connector {
            Some(connector) => connector,
            None => Arc::new(TcpConnector::new()?),
        };
        let prober = SmtpProber::new(connector, config.smtp.clone())
            .map_err(|source| ConfigError::Pattern { source })?;
        let gravatar = if config.gravatar_enabled {
            match self.gravatar {
                Some(lookup) => Some(lookup),
                None => default_gravatar(&config)?,
            }
        } else {
            None
        };

        Ok(Verifier {
            mx: MxResolver::new(dns, config.mx_options()),
            prober,
            classifiers: self.classifiers.unwrap_or_default(),
            suggester: Arc::new(
                self.suggester
                    .unwrap_or_else(|| DomainSuggester::default().with_threshold(config.suggestion_threshold)),
            ),
            gravatar,
            config: Arc::new(config),
        })
    }
}

#[cfg(feature = "with-gravatar")]
fn default_gravatar(config: &VerifierConfig) -> Result<Option<Arc<dyn GravatarLookup>>, BuildError> {
    let lookup = crate::gravatar::HttpGravatar::new(config.gravatar_timeout())?;
    Ok(Some(Arc::new(lookup)))
}

#[cfg(not(feature = "with-gravatar"))]
fn default_gravatar(_config: &VerifierConfig) -> Result<Option<Arc<dyn GravatarLookup>>, BuildError> {
    tracing::warn!("gravatar lookups enabled but built without the with-gravatar feature");
    Ok(None)
}

impl Verifier {
    pub fn builder(config: VerifierConfig) -> VerifierBuilder {
        VerifierBuilder {
            config,
            dns: None,
            connector: None,
            classifiers: None,
            suggester: None,
            gravatar: None,
        }
    }

    /// System DNS configuration and real sockets.
    pub fn from_system_conf(config: VerifierConfig) -> Result<Self, BuildError> {
        Self::builder(config).build()
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    pub fn classifiers(&self) -> &Arc<Classifiers> {
        &self.classifiers
    }

    pub async fn verify(&self, email: &str) -> Result<VerificationResult, VerifyError> {
        self.verify_with_timeout(email, None).await
    }

    /// Like [`verify`](Self::verify) for raw bytes off the wire. Input that
    /// is not UTF-8 is reported as invalid input.
    pub async fn verify_bytes(&self, input: &[u8]) -> Result<VerificationResult, VerifyError> {
        match std::str::from_utf8(input) {
            Ok(email) => self.verify(email).await,
            Err(err) => {
                let email = String::from_utf8_lossy(input);
                let reason = format!("input is not valid UTF-8: {err}");
                let syntax = SyntaxReport::invalid(vec![reason.clone()]);
                Err(VerifyError::invalid_input(
                    reason,
                    VerificationResult::rejected(&email, syntax),
                ))
            }
        }
    }

    /// Verifies `email` within `deadline`, or the configured deadline when
    /// `None`. Either is capped at [`MAX_REQUEST_BUDGET`].
    ///
    /// Malformed addresses are a normal `Ok` result with reachability `no`;
    /// only empty input and resolver malfunctions take the error channel,
    /// and both still carry a full result.
    pub async fn verify_with_timeout(
        &self,
        email: &str,
        deadline: Option<Duration>,
    ) -> Result<VerificationResult, VerifyError> {
        if email.trim().is_empty() {
            let syntax = SyntaxReport::invalid(vec!["empty input".to_string()]);
            return Err(VerifyError::invalid_input(
                "empty input",
                VerificationResult::rejected(email, syntax),
            ));
        }

        let syntax = parse_email(email, self.config.validation_mode);
        let Some(address) = syntax.address() else {
            tracing::debug!(reasons = ?syntax.reasons, "syntax rejected");
            return Ok(VerificationResult::rejected(email, syntax));
        };

        let budget = deadline
            .unwrap_or_else(|| self.config.deadline())
            .min(MAX_REQUEST_BUDGET);
        let deadline = Instant::now() + budget;

        let flags = self.classifiers.classify(&address);
        let suggestion = self.suggester.suggest(&address.domain);

        let network = async {
            tokio::join!(
                self.reach(&syntax, deadline),
                self.gravatar_presence(&address, deadline),
            )
        };
        // The branches watch the deadline themselves; this only guards
        // against one of them overrunning its session teardown.
        let hard_cap = budget.saturating_add(self.config.smtp.quit_timeout());
        let (reach, gravatar) = match timeout(hard_cap, network).await {
            Ok(branches) => branches,
            Err(_) => {
                tracing::warn!(domain = %address.domain, "verification overran its deadline");
                (Reach::default(), None)
            }
        };

        let internal = reach.internal.clone();
        let result = assemble(email, syntax, flags, suggestion, reach, gravatar);
        tracing::debug!(
            domain = %address.domain,
            reachable = %result.reachable,
            "verification finished"
        );
        match internal {
            Some(message) => Err(VerifyError::internal(message, result)),
            None => Ok(result),
        }
    }

    async fn reach(&self, syntax: &SyntaxReport, deadline: Instant) -> Reach {
        let domain = syntax.ascii_domain.as_str();
        let resolution = match timeout_at(deadline, self.mx.resolve(domain)).await {
            Ok(Ok(resolution)) => resolution,
            Ok(Err(err)) if err.is_internal() => {
                tracing::warn!(domain, error = %err, "resolver failure");
                return Reach {
                    internal: Some(err.to_string()),
                    ..Reach::default()
                };
            }
            Ok(Err(err)) => {
                tracing::debug!(domain, error = %err, "MX resolution failed");
                return Reach::default();
            }
            Err(_) => {
                tracing::debug!(domain, "deadline reached during MX resolution");
                return Reach::default();
            }
        };

        let mut reach = Reach {
            has_mx_records: resolution.has_mx_records,
            null_mx: resolution.null_mx,
            ..Reach::default()
        };
        if !self.config.smtp_enabled || resolution.is_empty() {
            return reach;
        }

        let target = ProbeTarget {
            local: &syntax.username,
            domain,
        };
        reach.probe = Some(self.prober.probe(target, &resolution.hosts, deadline).await);
        reach
    }

    async fn gravatar_presence(&self, address: &EmailAddress, deadline: Instant) -> Option<bool> {
        let lookup = self.gravatar.as_ref()?;
        let email = address.to_string();
        match timeout_at(deadline, lookup.has_avatar(&email)).await {
            Ok(Ok(found)) => Some(found),
            Ok(Err(err)) => {
                tracing::debug!(error = %err, "gravatar lookup failed");
                None
            }
            Err(_) => None,
        }
    }
}

/// Output of the MX + SMTP branch.
#[derive(Debug, Clone, Default)]
pub(crate) struct Reach {
    pub has_mx_records: bool,
    pub null_mx: bool,
    pub probe: Option<SmtpProbeReport>,
    pub internal: Option<String>,
}

/// Merges the branch outputs and enforces the cross-field rules: a
/// catch-all domain is never `yes`, `deliverable` needs `host_exists` and
/// excludes `disabled`.
pub(crate) fn assemble(
    email: &str,
    syntax: SyntaxReport,
    flags: DomainFlags,
    suggestion: Option<String>,
    reach: Reach,
    gravatar: Option<bool>,
) -> VerificationResult {
    let mut smtp = reach
        .probe
        .as_ref()
        .map(|report| report.outcome)
        .unwrap_or_default();
    if smtp.deliverable && (!smtp.host_exists || smtp.disabled) {
        smtp.deliverable = false;
    }

    let mut reachable = match reach.probe.as_ref().map(|report| &report.conclusion) {
        Some(ProbeConclusion::Deliverable) => Reachability::Yes,
        Some(ProbeConclusion::Undeliverable) => Reachability::No,
        Some(ProbeConclusion::Inconclusive(_)) => Reachability::Unknown,
        None if reach.null_mx => Reachability::No,
        None => Reachability::Unknown,
    };
    if reachable == Reachability::Yes && (smtp.catch_all || !smtp.deliverable) {
        reachable = Reachability::Unknown;
    }

    VerificationResult {
        email: email.to_string(),
        reachable,
        syntax,
        smtp,
        gravatar,
        suggestion,
        disposable: flags.disposable,
        role_account: flags.role_account,
        free: flags.free,
        has_mx_records: reach.has_mx_records,
        probe: reach.probe,
    }
}

#[cfg(test)]
mod tests;
