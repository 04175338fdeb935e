use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use proptest::prelude::*;
use tokio::time::Instant;

use super::*;
use crate::gravatar::GravatarError;
use crate::mx::tests::StubResolver;
use crate::mx::{Error as MxError, MxRecord, MxStatus};
use crate::smtp::tests::{Dialogue, HostScript, ScriptedConnector, options as smtp_options};
use crate::smtp::{SmtpProbeOptions, SmtpProbeOutcome, SmtpProbeReport};

struct StubGravatar {
    answer: Result<bool, u16>,
    calls: AtomicUsize,
}

impl StubGravatar {
    fn new(answer: Result<bool, u16>) -> Self {
        Self {
            answer,
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl GravatarLookup for StubGravatar {
    fn has_avatar<'a>(&'a self, _email: &'a str) -> BoxFuture<'a, Result<bool, GravatarError>> {
        async move {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.answer.map_err(GravatarError::UnexpectedStatus)
        }
        .boxed()
    }
}

struct Harness {
    verifier: Verifier,
    dns: Arc<StubResolver>,
    smtp: Arc<ScriptedConnector>,
    gravatar: Arc<StubGravatar>,
}

impl Harness {
    fn new(dns: StubResolver, smtp: ScriptedConnector) -> Self {
        Self::with(dns, smtp, config(), StubGravatar::new(Ok(true)))
    }

    fn with(
        dns: StubResolver,
        smtp: ScriptedConnector,
        config: VerifierConfig,
        gravatar: StubGravatar,
    ) -> Self {
        let dns = Arc::new(dns);
        let smtp = Arc::new(smtp);
        let gravatar = Arc::new(gravatar);
        let verifier = Verifier::builder(config)
            .dns(dns.clone())
            .connector(smtp.clone())
            .gravatar(gravatar.clone())
            .suggester(DomainSuggester::new(["gmail.com", "example.com"], 2))
            .build()
            .expect("verifier builds");
        Self {
            verifier,
            dns,
            smtp,
            gravatar,
        }
    }

    fn network_calls(&self) -> usize {
        self.dns.calls() + self.smtp.connects.load(Ordering::SeqCst) + self.gravatar.calls()
    }
}

fn config() -> VerifierConfig {
    VerifierConfig {
        gravatar_enabled: true,
        smtp: smtp_options(),
        ..VerifierConfig::default()
    }
}

fn single_mx(host: &'static str) -> StubResolver {
    StubResolver::new(move |_| Ok(MxStatus::Records(vec![MxRecord::new(10, host)])))
}

fn no_records() -> StubResolver {
    StubResolver::new(|_| Ok(MxStatus::NoRecords))
}

#[tokio::test]
async fn invalid_syntax_short_circuits() {
    let h = Harness::new(single_mx("mx.test"), ScriptedConnector::new());
    let result = h.verifier.verify("not-an-email").await.expect("ok result");

    assert_eq!(result.email, "not-an-email");
    assert!(!result.syntax.valid);
    assert_eq!(result.reachable, Reachability::No);
    assert_eq!(result.smtp, SmtpProbeOutcome::default());
    assert_eq!(result.suggestion, None);
    assert_eq!(result.gravatar, None);
    assert!(!result.has_mx_records);
    assert_eq!(h.network_calls(), 0);
}

#[tokio::test]
async fn disposable_domain_is_still_probed() {
    let h = Harness::new(
        single_mx("mx.mailinator.test"),
        ScriptedConnector::new().host("mx.mailinator.test", Dialogue::answering("250 OK").script()),
    );
    let result = h.verifier.verify("user@mailinator.com").await.expect("ok");

    assert!(result.syntax.valid);
    assert!(result.disposable);
    assert!(result.smtp.host_exists);
    assert!(h.smtp.connects.load(Ordering::SeqCst) > 0);
}

#[tokio::test]
async fn role_account_is_flagged() {
    let h = Harness::new(no_records(), ScriptedConnector::new());
    let result = h.verifier.verify("sales@knowncorp.co").await.expect("ok");

    assert!(result.role_account);
    assert!(!result.free);
    assert!(!result.has_mx_records);
    assert_eq!(result.reachable, Reachability::Unknown);
    assert_eq!(h.smtp.connects.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn misspelt_domain_gets_a_suggestion() {
    let h = Harness::new(
        StubResolver::new(|_| Ok(MxStatus::NxDomain)),
        ScriptedConnector::new(),
    );
    let result = h.verifier.verify("x@exmaple.com").await.expect("ok");

    assert_eq!(result.suggestion.as_deref(), Some("example.com"));
    assert_eq!(result.reachable, Reachability::Unknown);
    assert!(!result.smtp.host_exists);
}

#[tokio::test]
async fn catch_all_domain_is_never_yes() {
    let h = Harness::new(
        single_mx("mx.test"),
        ScriptedConnector::new().host("mx.test", Dialogue::answering("250 2.1.5 OK").script()),
    );
    let result = h.verifier.verify("alice@example.com").await.expect("ok");

    assert!(result.smtp.host_exists);
    assert!(result.smtp.catch_all);
    assert!(result.smtp.deliverable);
    assert_eq!(result.reachable, Reachability::Unknown);
    h.smtp.assert_no_message_data();
}

#[tokio::test]
async fn refused_everywhere_is_unknown() {
    let h = Harness::new(
        StubResolver::new(|_| {
            Ok(MxStatus::Records(vec![
                MxRecord::new(10, "mx1.test"),
                MxRecord::new(20, "mx2.test"),
            ]))
        }),
        ScriptedConnector::new()
            .host("mx1.test", HostScript::Refuse)
            .host("mx2.test", HostScript::Refuse),
    );
    let result = h.verifier.verify("alice@example.com").await.expect("ok");

    assert!(result.has_mx_records);
    assert!(!result.smtp.host_exists);
    assert!(!result.smtp.deliverable);
    assert_eq!(result.reachable, Reachability::Unknown);
}

#[tokio::test]
async fn confirmed_mailbox_is_yes() {
    let h = Harness::new(
        single_mx("mx.test"),
        ScriptedConnector::new().host("mx.test", Dialogue::with_mailbox("alice@example.com").script()),
    );
    let result = h.verifier.verify("alice@example.com").await.expect("ok");

    assert_eq!(result.reachable, Reachability::Yes);
    assert!(result.smtp.deliverable);
    assert!(!result.smtp.catch_all);
    assert_eq!(result.gravatar, Some(true));
    assert!(result.probe.is_some());
    h.smtp.assert_no_message_data();
}

#[tokio::test]
async fn greylisted_catch_all_check_is_unknown() {
    let h = Harness::new(
        single_mx("mx.test"),
        ScriptedConnector::new().host(
            "mx.test",
            Dialogue::new(|rcpt| {
                if rcpt == "alice@example.com" {
                    "250 2.1.5 OK".to_string()
                } else {
                    "451 4.7.1 greylisted".to_string()
                }
            })
            .script(),
        ),
    );
    let result = h.verifier.verify("alice@example.com").await.expect("ok");

    assert_eq!(result.reachable, Reachability::Unknown);
    assert!(result.smtp.deliverable);
    assert!(!result.smtp.catch_all);
}

#[tokio::test]
async fn storage_shortage_is_unknown_not_no() {
    let h = Harness::new(
        single_mx("mx.test"),
        ScriptedConnector::new().host(
            "mx.test",
            Dialogue::answering("452 4.3.1 Insufficient system storage").script(),
        ),
    );
    let result = h.verifier.verify("alice@example.com").await.expect("ok");

    assert_eq!(result.reachable, Reachability::Unknown);
    assert!(!result.smtp.full_inbox);
    assert!(result.smtp.host_exists);
}

#[tokio::test]
async fn unbounded_timeouts_and_ttls_are_capped() {
    let h = Harness::with(
        single_mx("mx.test"),
        ScriptedConnector::new().host("mx.test", Dialogue::with_mailbox("alice@example.com").script()),
        VerifierConfig {
            deadline_ms: u64::MAX,
            mx_cache_ttl_secs: u64::MAX,
            mx_negative_ttl_secs: u64::MAX,
            cache_stale_window_secs: u64::MAX,
            smtp: SmtpProbeOptions {
                catch_all_ttl_secs: u64::MAX,
                ..smtp_options()
            },
            ..config()
        },
        StubGravatar::new(Ok(true)),
    );

    let result = h.verifier.verify("alice@example.com").await.expect("ok");
    assert_eq!(result.reachable, Reachability::Yes);

    let result = h
        .verifier
        .verify_with_timeout("alice@example.com", Some(Duration::MAX))
        .await
        .expect("ok");
    assert_eq!(result.reachable, Reachability::Yes);
    assert_eq!(h.dns.mx_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn rejected_mailbox_is_no() {
    let h = Harness::new(
        single_mx("mx.test"),
        ScriptedConnector::new().host("mx.test", Dialogue::with_mailbox("bob@example.com").script()),
    );
    let result = h.verifier.verify("alice@example.com").await.expect("ok");

    assert_eq!(result.reachable, Reachability::No);
    assert!(result.smtp.host_exists);
    assert!(!result.smtp.deliverable);
}

#[tokio::test]
async fn email_field_keeps_the_original_input() {
    let h = Harness::new(
        single_mx("mx.test"),
        ScriptedConnector::new().host("mx.test", Dialogue::with_mailbox("alice@example.com").script()),
    );
    let input = "Alice@Example.COM";
    let result = h.verifier.verify(input).await.expect("ok");

    assert_eq!(result.email, input);
    assert_eq!(result.syntax.username, "Alice");
    assert_eq!(result.syntax.domain, "example.com");
    assert_eq!(result.reachable, Reachability::Yes);
}

#[tokio::test]
async fn null_mx_domain_is_no_without_probing() {
    let h = Harness::new(
        StubResolver::new(|_| Ok(MxStatus::Records(vec![MxRecord::new(0, "")]))),
        ScriptedConnector::new(),
    );
    let result = h.verifier.verify("alice@example.com").await.expect("ok");

    assert!(result.has_mx_records);
    assert_eq!(result.reachable, Reachability::No);
    assert_eq!(h.smtp.connects.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn smtp_can_be_switched_off() {
    let h = Harness::with(
        single_mx("mx.test"),
        ScriptedConnector::new().host("mx.test", Dialogue::answering("250 OK").script()),
        VerifierConfig {
            smtp_enabled: false,
            ..config()
        },
        StubGravatar::new(Ok(false)),
    );
    let result = h.verifier.verify("alice@example.com").await.expect("ok");

    assert!(result.has_mx_records);
    assert_eq!(result.reachable, Reachability::Unknown);
    assert_eq!(result.gravatar, Some(false));
    assert!(result.probe.is_none());
    assert_eq!(h.smtp.connects.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn empty_input_takes_the_error_channel() {
    let h = Harness::new(single_mx("mx.test"), ScriptedConnector::new());
    let err = h.verifier.verify("   ").await.expect_err("empty");

    assert_eq!(err.code(), "invalid-input");
    assert!(matches!(err, VerifyError::InvalidInput { .. }));
    assert_eq!(err.result().reachable, Reachability::No);
    assert_eq!(err.result().suggestion, None);
    assert_eq!(h.network_calls(), 0);
}

#[tokio::test]
async fn non_utf8_bytes_are_invalid_input() {
    let h = Harness::new(single_mx("mx.test"), ScriptedConnector::new());
    let err = h
        .verifier
        .verify_bytes(b"al\xffce@example.com")
        .await
        .expect_err("not utf-8");

    assert_eq!(err.code(), "invalid-input");
    let result = err.into_result();
    assert_eq!(result.reachable, Reachability::No);
    assert!(!result.syntax.valid);
    assert_eq!(h.network_calls(), 0);
}

#[tokio::test]
async fn resolver_malfunction_is_reported_with_a_result() {
    let h = Harness::new(
        StubResolver::new(|_| Err(MxError::resolver_init("no nameservers configured"))),
        ScriptedConnector::new(),
    );
    let err = h
        .verifier
        .verify("sales@mailinator.com")
        .await
        .expect_err("internal error");

    assert_eq!(err.code(), "internal-resolution-error");
    let result = err.result();
    assert!(result.syntax.valid);
    assert!(result.disposable);
    assert!(result.role_account);
    assert_eq!(result.reachable, Reachability::Unknown);
    assert_eq!(result.suggestion, None);
}

#[tokio::test]
async fn dns_timeout_degrades_to_unknown() {
    let h = Harness::new(
        StubResolver::new(|domain| Err(MxError::timeout(domain))),
        ScriptedConnector::new(),
    );
    let result = h.verifier.verify("alice@example.com").await.expect("ok");
    assert_eq!(result.reachable, Reachability::Unknown);
    assert!(!result.has_mx_records);
}

#[tokio::test]
async fn gravatar_failure_and_disabled_lookup_are_unknown() {
    let failing = Harness::with(
        no_records(),
        ScriptedConnector::new(),
        config(),
        StubGravatar::new(Err(503)),
    );
    let result = failing.verifier.verify("alice@example.com").await.expect("ok");
    assert_eq!(result.gravatar, None);
    assert_eq!(failing.gravatar.calls(), 1);

    let disabled = Harness::with(
        no_records(),
        ScriptedConnector::new(),
        VerifierConfig {
            gravatar_enabled: false,
            ..config()
        },
        StubGravatar::new(Ok(true)),
    );
    let result = disabled.verifier.verify("alice@example.com").await.expect("ok");
    assert_eq!(result.gravatar, None);
    assert_eq!(disabled.gravatar.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn hanging_smtp_is_bounded_by_the_deadline() {
    let h = Harness::with(
        single_mx("mx.test"),
        ScriptedConnector::new().host("mx.test", HostScript::Hang),
        VerifierConfig {
            deadline_ms: 1_000,
            ..config()
        },
        StubGravatar::new(Ok(true)),
    );
    let quit_cap = h.verifier.config().smtp.quit_timeout();

    let started = Instant::now();
    let result = h.verifier.verify("alice@example.com").await.expect("ok");

    assert!(started.elapsed() <= Duration::from_millis(1_000) + quit_cap);
    assert_eq!(result.reachable, Reachability::Unknown);
    assert!(!result.smtp.deliverable);
    assert!(result.has_mx_records);
    assert_eq!(result.gravatar, Some(true));
}

#[tokio::test(start_paused = true)]
async fn slow_dns_is_cut_off_by_a_request_timeout() {
    let h = Harness::new(
        single_mx("mx.test").with_delay(Duration::from_secs(10)),
        ScriptedConnector::new(),
    );

    let started = Instant::now();
    let result = h
        .verifier
        .verify_with_timeout("alice@example.com", Some(Duration::from_millis(200)))
        .await
        .expect("ok");

    assert!(started.elapsed() <= Duration::from_millis(200) + h.verifier.config().smtp.quit_timeout());
    assert_eq!(result.reachable, Reachability::Unknown);
    assert!(!result.has_mx_records);
    assert_eq!(h.smtp.connects.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn concurrent_requests_share_one_mx_lookup() {
    let h = Harness::with(
        single_mx("mx.test").with_delay(Duration::from_millis(100)),
        ScriptedConnector::new(),
        VerifierConfig {
            smtp_enabled: false,
            ..config()
        },
        StubGravatar::new(Ok(false)),
    );

    let (a, b) = tokio::join!(
        h.verifier.verify("alice@example.com"),
        h.verifier.verify("bob@example.com"),
    );
    assert!(a.expect("a").has_mx_records);
    assert!(b.expect("b").has_mx_records);
    assert_eq!(h.dns.mx_calls.load(Ordering::SeqCst), 1);
}

fn report(outcome: SmtpProbeOutcome, conclusion: ProbeConclusion) -> SmtpProbeReport {
    SmtpProbeReport {
        outcome,
        conclusion,
        attempts: Vec::new(),
        confidence: 0.0,
    }
}

fn valid_syntax() -> SyntaxReport {
    crate::validator::parse_email("alice@example.com", crate::validator::ValidationMode::Strict)
}

proptest! {
    #[test]
    fn inputs_without_at_never_touch_the_network(input in "[^@]{0,60}") {
        let h = Harness::new(single_mx("mx.test"), ScriptedConnector::new());
        let result = match futures::executor::block_on(h.verifier.verify(&input)) {
            Ok(result) => result,
            Err(err) => err.into_result(),
        };
        prop_assert_eq!(result.reachable, Reachability::No);
        prop_assert_eq!(&result.email, &input);
        prop_assert_eq!(h.network_calls(), 0);
    }

    #[test]
    fn assembly_enforces_cross_field_rules(
        flags in proptest::array::uniform5(any::<bool>()),
        conclusion in 0u8..3,
        probed in any::<bool>(),
        null_mx in any::<bool>(),
    ) {
        let [host_exists, full_inbox, catch_all, deliverable, disabled] = flags;
        let outcome = SmtpProbeOutcome { host_exists, full_inbox, catch_all, deliverable, disabled };
        let conclusion = match conclusion {
            0 => ProbeConclusion::Deliverable,
            1 => ProbeConclusion::Undeliverable,
            _ => ProbeConclusion::Inconclusive("test".into()),
        };
        let reach = Reach {
            has_mx_records: true,
            null_mx,
            probe: probed.then(|| report(outcome, conclusion)),
            internal: None,
        };
        let result = assemble(
            "alice@example.com",
            valid_syntax(),
            DomainFlags::default(),
            None,
            reach,
            None,
        );

        if result.smtp.catch_all {
            prop_assert_ne!(result.reachable, Reachability::Yes);
        }
        if result.smtp.deliverable {
            prop_assert!(result.smtp.host_exists);
            prop_assert!(!result.smtp.disabled);
        }
        if result.reachable == Reachability::Yes {
            prop_assert!(result.smtp.deliverable);
        }
    }
}
