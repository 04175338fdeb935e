use std::fmt;

#[cfg(feature = "with-serde")]
use serde::{Deserialize, Serialize};

use crate::smtp::{SmtpProbeOutcome, SmtpProbeReport};
use crate::validator::SyntaxReport;

#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "with-serde", serde(rename_all = "lowercase"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Reachability {
    /// SMTP confirmed a mailbox on a domain that does not accept everything.
    Yes,
    /// Invalid syntax, or the domain explicitly refused the mailbox.
    No,
    #[default]
    Unknown,
}

impl Reachability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Yes => "yes",
            Self::No => "no",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Reachability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything known about one address after a verification run.
#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VerificationResult {
    /// The input exactly as given.
    pub email: String,
    pub reachable: Reachability,
    pub syntax: SyntaxReport,
    pub smtp: SmtpProbeOutcome,
    /// `None` when the lookup is disabled, failed or ran out of time.
    pub gravatar: Option<bool>,
    pub suggestion: Option<String>,
    pub disposable: bool,
    pub role_account: bool,
    pub free: bool,
    pub has_mx_records: bool,
    /// Per-host attempts and transcripts of the SMTP probe, when one ran.
    #[cfg_attr(
        feature = "with-serde",
        serde(skip_serializing_if = "Option::is_none", default)
    )]
    pub probe: Option<SmtpProbeReport>,
}

impl VerificationResult {
    /// Result for input that failed the syntax gate.
    pub fn rejected(email: &str, syntax: SyntaxReport) -> Self {
        Self {
            email: email.to_string(),
            reachable: Reachability::No,
            syntax,
            ..Self::default()
        }
    }
}
