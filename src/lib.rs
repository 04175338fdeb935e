#![forbid(unsafe_code)]
//! mailverify_lib : vérification de délivrabilité e-mail sans envoi.
//!
//! [`Verifier::verify`] runs the syntax gate, the static classifiers, the
//! typo suggester, MX resolution and an SMTP probe that stops at `RCPT TO`,
//! and folds everything into one [`VerificationResult`].

pub mod cache;
pub mod classify;
pub mod gravatar;
pub mod mx;
pub mod smtp;
pub mod suggest;
pub mod validator;
pub mod verifier;

pub use cache::TtlCache;
pub use classify::{ClassifierTables, Classifiers, DirectorySource, DomainFlags, TableError, TableSource};
pub use gravatar::{GravatarError, GravatarLookup};
#[cfg(feature = "with-gravatar")]
pub use gravatar::HttpGravatar;
pub use mx::{DnsResolver, Error as MxError, MxOptions, MxRecord, MxResolution, MxResolver, MxStatus};
pub use smtp::{
    Connector, HostAttempt, HostOutcome, ProbeConclusion, SmtpError, SmtpEvent, SmtpProbeOptions,
    SmtpProbeOutcome, SmtpProbeReport, SmtpProber, TcpConnector,
};
pub use suggest::DomainSuggester;
pub use validator::{
    EmailAddress, EmailError, SyntaxReport, ValidationMode, parse_email, validate_email,
};
pub use verifier::{
    BuildError, ConfigError, Reachability, VerificationResult, Verifier, VerifierBuilder,
    VerifierConfig, VerifyError,
};
