use std::sync::Arc;
use std::time::Duration;

use futures::future::{self, Either};
use tokio::time::Instant;

use super::error::SmtpError;
use super::options::{CompiledPatterns, SmtpProbeOptions};
use super::session::SmtpSession;
use super::transport::Connector;
use super::types::{
    AttemptStage, HostAttempt, HostOutcome, ProbeConclusion, SessionState, SmtpProbeOutcome,
    SmtpProbeReport, SmtpReply,
};
use super::util::{confidence_for, random_local_part};
use crate::cache::TtlCache;
use crate::mx::MxRecord;

const CATCH_ALL_LOCAL_LEN: usize = 16;

/// Address being probed. `domain` must already be in ASCII form.
#[derive(Debug, Clone, Copy)]
pub struct ProbeTarget<'a> {
    pub local: &'a str,
    pub domain: &'a str,
}

/// Runs RCPT-level probes against a domain's mail exchangers.
///
/// Cloning is cheap; clones share the connector and the catch-all verdict
/// cache.
#[derive(Clone)]
pub struct SmtpProber {
    connector: Arc<dyn Connector>,
    options: Arc<SmtpProbeOptions>,
    patterns: Arc<CompiledPatterns>,
    catch_all: TtlCache<bool, SmtpError>,
}

impl SmtpProber {
    pub fn new(
        connector: Arc<dyn Connector>,
        options: SmtpProbeOptions,
    ) -> Result<Self, regex::Error> {
        let patterns = options.patterns.compile()?;
        Ok(Self {
            connector,
            options: Arc::new(options),
            patterns: Arc::new(patterns),
            catch_all: TtlCache::new(Duration::ZERO),
        })
    }

    pub fn options(&self) -> &SmtpProbeOptions {
        &self.options
    }

    pub fn cached_catch_all(&self, domain: &str) -> Option<bool> {
        self.catch_all.get(domain)
    }

    /// Walks `hosts` in order until one gives a mailbox-level answer, the
    /// host cap is reached, or `deadline` passes. Never fails; anything that
    /// goes wrong ends up in the report as an inconclusive conclusion.
    pub async fn probe(
        &self,
        target: ProbeTarget<'_>,
        hosts: &[MxRecord],
        deadline: Instant,
    ) -> SmtpProbeReport {
        if hosts.is_empty() {
            return SmtpProbeReport::inconclusive("no mail exchanger");
        }

        let mut attempts = Vec::new();
        'hosts: for record in hosts.iter().take(self.options.max_hosts.max(1)) {
            for retry in 0..2 {
                if Instant::now() >= deadline {
                    break 'hosts;
                }
                let attempt = self.attempt_host(&record.host, target, deadline).await;
                let conclusive = attempt.outcome.is_conclusive();
                let temporary = attempt.outcome.is_temporary();
                let expired = matches!(attempt.outcome, HostOutcome::DeadlineExceeded);
                attempts.push(attempt);

                if conclusive || expired {
                    break 'hosts;
                }
                if !(temporary && retry == 0) {
                    break;
                }
                tracing::debug!(host = %record.host, "temporary failure, retrying once");
            }
        }

        let expired = Instant::now() >= deadline;
        summarize(attempts, expired, self.options.catch_all_probe, &self.patterns)
    }

    async fn attempt_host(
        &self,
        host: &str,
        target: ProbeTarget<'_>,
        deadline: Instant,
    ) -> HostAttempt {
        if !self.options.catch_all_probe {
            return self.run_session(host, target, None, deadline).await;
        }

        if !self.options.parallel_catch_all {
            let known = self.catch_all.get(target.domain);
            let probe_local = known.is_none().then(|| random_local_part(CATCH_ALL_LOCAL_LEN));
            let mut attempt = self
                .run_session(host, target, probe_local.as_deref(), deadline)
                .await;
            match (known, attempt.catch_all) {
                (Some(verdict), _) if matches!(attempt.outcome, HostOutcome::Accepted { .. }) => {
                    attempt.catch_all = Some(verdict);
                }
                (None, Some(verdict)) => {
                    self.catch_all
                        .insert(target.domain, verdict, self.options.catch_all_ttl());
                }
                _ => {}
            }
            return attempt;
        }

        let session = self.run_session(host, target, None, deadline);
        let verdict = self.catch_all_verdict(host, target.domain, deadline);
        tokio::pin!(session, verdict);
        match future::select(session, verdict).await {
            // The random-recipient session is dropped unless the real one was accepted.
            Either::Left((mut attempt, verdict)) => {
                if matches!(attempt.outcome, HostOutcome::Accepted { .. }) {
                    attempt.catch_all = verdict.await;
                }
                attempt
            }
            Either::Right((verdict, session)) => {
                let mut attempt = session.await;
                if matches!(attempt.outcome, HostOutcome::Accepted { .. }) {
                    attempt.catch_all = verdict;
                }
                attempt
            }
        }
    }

    /// Cached per domain; only conclusive verdicts are stored.
    async fn catch_all_verdict(&self, host: &str, domain: &str, deadline: Instant) -> Option<bool> {
        let prober = self.clone();
        let host = host.to_string();
        let owned_domain = domain.to_string();
        let ttl = self.options.catch_all_ttl();
        let verdict = self
            .catch_all
            .get_or_load(domain, move || async move {
                let local = random_local_part(CATCH_ALL_LOCAL_LEN);
                let target = ProbeTarget {
                    local: &local,
                    domain: &owned_domain,
                };
                let attempt = prober.run_session(&host, target, None, deadline).await;
                match attempt.outcome {
                    HostOutcome::Accepted { .. } => Ok((true, ttl)),
                    HostOutcome::Rejected { .. } => Ok((false, ttl)),
                    other => Err(SmtpError::protocol(format!(
                        "catch-all check inconclusive: {other}"
                    ))),
                }
            })
            .await;
        match verdict {
            Ok(verdict) => Some(verdict),
            Err(err) => {
                tracing::debug!(domain, error = %err, "no catch-all verdict");
                None
            }
        }
    }

    async fn run_session(
        &self,
        host: &str,
        target: ProbeTarget<'_>,
        catch_all_local: Option<&str>,
        deadline: Instant,
    ) -> HostAttempt {
        let mut attempt = HostAttempt::new(host);
        let mut session = SmtpSession::new(host, self.options.command_timeout(), deadline);
        let result = self.drive(&mut session, target, catch_all_local).await;
        attempt.reached = session.state();
        session.finish(self.options.quit_timeout()).await;
        attempt.events = session.take_events();

        match result {
            Ok((outcome, catch_all)) => {
                attempt.outcome = outcome;
                attempt.catch_all = catch_all;
            }
            Err(err) => attempt.outcome = outcome_for_error(err),
        }
        tracing::debug!(host, outcome = %attempt.outcome, "host attempt finished");
        attempt
    }

    async fn drive(
        &self,
        session: &mut SmtpSession,
        target: ProbeTarget<'_>,
        catch_all_local: Option<&str>,
    ) -> Result<(HostOutcome, Option<bool>), SmtpError> {
        session
            .open(
                self.connector.as_ref(),
                self.options.port,
                self.options.connect_timeout(),
            )
            .await?;

        let greeting = session.read_greeting().await?;
        if !greeting.is_positive_completion() {
            return Ok((classify_greeting(greeting), None));
        }
        session.advance(SessionState::Greeted);

        if let Some(outcome) = self.hello(session).await? {
            return Ok((outcome, None));
        }

        let sender = format!("MAIL FROM:<{}>", self.options.sender());
        let mail = session.command(AttemptStage::MailFrom, &sender).await?;
        if !mail.is_positive_completion() {
            return Ok((classify_sender(mail), None));
        }
        session.advance(SessionState::SenderAccepted);

        let rcpt = format!("RCPT TO:<{}@{}>", target.local, target.domain);
        let reply = session.command(AttemptStage::RcptTo, &rcpt).await?;
        session.advance(SessionState::RecipientChecked);
        let outcome = classify_recipient(reply, &self.patterns);

        let mut catch_all = None;
        if let (HostOutcome::Accepted { .. }, Some(local)) = (&outcome, catch_all_local) {
            let probe = format!("RCPT TO:<{local}@{}>", target.domain);
            // A failure here leaves the real verdict standing.
            if let Ok(reply) = session.command(AttemptStage::CatchAll, &probe).await {
                catch_all = match classify_recipient(reply, &self.patterns) {
                    HostOutcome::Accepted { .. } => Some(true),
                    HostOutcome::Rejected { .. } => Some(false),
                    _ => None,
                };
            }
        }
        Ok((outcome, catch_all))
    }

    /// EHLO with HELO fallback, then opportunistic STARTTLS. `Some` ends the
    /// session early with that outcome.
    async fn hello(&self, session: &mut SmtpSession) -> Result<Option<HostOutcome>, SmtpError> {
        let helo = self.options.helo_name();
        let ehlo = session
            .command(AttemptStage::Ehlo, &format!("EHLO {helo}"))
            .await?;
        if ehlo.code == 421 {
            return Ok(Some(HostOutcome::Unavailable { reply: ehlo }));
        }
        if !ehlo.is_positive_completion() {
            let reply = session
                .command(AttemptStage::Helo, &format!("HELO {helo}"))
                .await?;
            return Ok(match reply.code {
                200..=299 => None,
                421 => Some(HostOutcome::Unavailable { reply }),
                _ => Some(HostOutcome::ProtocolError {
                    message: format!("HELO refused: {reply}"),
                }),
            });
        }

        if self.options.opportunistic_tls && ehlo.has_capability("STARTTLS") {
            let reply = session.command(AttemptStage::StartTls, "STARTTLS").await?;
            if reply.code == 220 {
                session.upgrade_tls(self.connector.as_ref()).await?;
                let again = session
                    .command(AttemptStage::Ehlo, &format!("EHLO {helo}"))
                    .await?;
                if !again.is_positive_completion() {
                    return Ok(Some(HostOutcome::ProtocolError {
                        message: format!("EHLO after STARTTLS refused: {again}"),
                    }));
                }
            }
        }
        Ok(None)
    }
}

fn classify_greeting(reply: SmtpReply) -> HostOutcome {
    match reply.code {
        421 => HostOutcome::Unavailable { reply },
        521 | 554 | 556 => HostOutcome::NoMail { reply },
        _ => HostOutcome::ProtocolError {
            message: format!("unexpected greeting: {reply}"),
        },
    }
}

fn classify_sender(reply: SmtpReply) -> HostOutcome {
    if reply.code == 421 {
        HostOutcome::Unavailable { reply }
    } else if reply.is_transient_failure() {
        HostOutcome::TemporaryFailure { reply }
    } else {
        // The probe sender itself was refused.
        HostOutcome::Blocked { reply }
    }
}

pub(crate) fn classify_recipient(reply: SmtpReply, patterns: &CompiledPatterns) -> HostOutcome {
    if reply.is_positive_completion() {
        return HostOutcome::Accepted { reply };
    }
    if reply.code == 421 {
        return HostOutcome::Unavailable { reply };
    }
    if reply.is_transient_failure() {
        return HostOutcome::TemporaryFailure { reply };
    }
    if reply.is_permanent_failure() {
        let text = reply.message();
        if reply.code == 552 || patterns.is_full_inbox(&text) {
            return HostOutcome::FullInbox { reply };
        }
        if patterns.is_disabled(&text) {
            return HostOutcome::Disabled { reply };
        }
        if patterns.is_blocked(&text) {
            return HostOutcome::Blocked { reply };
        }
        return HostOutcome::Rejected { reply };
    }
    HostOutcome::ProtocolError {
        message: format!("unexpected RCPT reply: {reply}"),
    }
}

fn outcome_for_error(err: SmtpError) -> HostOutcome {
    match err {
        SmtpError::DeadlineExceeded => HostOutcome::DeadlineExceeded,
        SmtpError::Protocol(message) => HostOutcome::ProtocolError { message },
        other => HostOutcome::Unreachable {
            message: other.to_string(),
        },
    }
}

/// `catch_all_checked` says whether a catch-all verdict was sought; an
/// accepted recipient without one is then left inconclusive.
fn summarize(
    attempts: Vec<HostAttempt>,
    expired: bool,
    catch_all_checked: bool,
    patterns: &CompiledPatterns,
) -> SmtpProbeReport {
    let mut outcome = SmtpProbeOutcome {
        host_exists: attempts.iter().any(|a| a.reached >= SessionState::Greeted),
        ..SmtpProbeOutcome::default()
    };

    let decisive = attempts.iter().find(|a| a.outcome.is_conclusive());
    let conclusion = match decisive {
        Some(attempt) => match &attempt.outcome {
            HostOutcome::Accepted { .. } => {
                outcome.deliverable = true;
                match attempt.catch_all {
                    Some(true) => {
                        outcome.catch_all = true;
                        ProbeConclusion::Inconclusive("domain accepts any recipient".to_string())
                    }
                    None if catch_all_checked => {
                        ProbeConclusion::Inconclusive("catch-all check inconclusive".to_string())
                    }
                    _ => ProbeConclusion::Deliverable,
                }
            }
            HostOutcome::FullInbox { .. } => {
                outcome.full_inbox = true;
                ProbeConclusion::Undeliverable
            }
            HostOutcome::Disabled { .. } => {
                outcome.disabled = true;
                ProbeConclusion::Undeliverable
            }
            _ => ProbeConclusion::Undeliverable,
        },
        None if expired => ProbeConclusion::Inconclusive("deadline exceeded".to_string()),
        None => {
            // 4xx text only hints at the mailbox state; the verdict stays open.
            for attempt in &attempts {
                if let HostOutcome::TemporaryFailure { reply } = &attempt.outcome {
                    let text = reply.message();
                    outcome.full_inbox |= patterns.is_full_inbox(&text);
                    outcome.disabled |= patterns.is_disabled(&text);
                }
            }
            ProbeConclusion::Inconclusive(
                attempts
                    .last()
                    .map(|a| a.outcome.to_string())
                    .unwrap_or_else(|| "no host attempted".to_string()),
            )
        }
    };

    SmtpProbeReport {
        confidence: confidence_for(&conclusion, outcome.catch_all),
        outcome,
        conclusion,
        attempts,
    }
}
