use std::fmt;

#[cfg(feature = "with-serde")]
use serde::{Deserialize, Serialize};

/// A raw SMTP reply, preserving the numeric status code and message text.
#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpReply {
    pub code: u16,
    pub lines: Vec<String>,
}

impl SmtpReply {
    pub fn new(code: u16, text: &str) -> Self {
        Self {
            code,
            lines: text.lines().map(str::to_string).collect(),
        }
    }

    pub fn message(&self) -> String {
        self.lines.join("\n")
    }

    pub fn is_positive_completion(&self) -> bool {
        (200..300).contains(&self.code)
    }

    pub fn is_transient_failure(&self) -> bool {
        (400..500).contains(&self.code)
    }

    pub fn is_permanent_failure(&self) -> bool {
        (500..600).contains(&self.code)
    }

    pub fn has_capability(&self, cap: &str) -> bool {
        self.lines.iter().any(|line| {
            line.split_whitespace()
                .next()
                .map(|token| token.eq_ignore_ascii_case(cap))
                .unwrap_or(false)
        })
    }
}

impl fmt::Display for SmtpReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.lines.join(" "))
    }
}

/// Per-host session state. Every failure jumps straight to `Closed`; the
/// furthest state reached before closing is kept in [`HostAttempt::reached`].
#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Connected,
    Greeted,
    SenderAccepted,
    RecipientChecked,
    Closed,
}

#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptStage {
    Connect,
    Greeting,
    Ehlo,
    Helo,
    StartTls,
    MailFrom,
    RcptTo,
    CatchAll,
    Rset,
    Quit,
}

/// A recorded SMTP transcript event used for diagnostics.
#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmtpEvent {
    Sent {
        stage: AttemptStage,
        command: String,
    },
    Received {
        stage: AttemptStage,
        reply: SmtpReply,
    },
    Error {
        stage: AttemptStage,
        message: String,
    },
}

/// Outcome of a session against a single host.
#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostOutcome {
    /// RCPT accepted (2xx).
    Accepted { reply: SmtpReply },
    /// RCPT refused with a permanent no-such-user style code.
    Rejected { reply: SmtpReply },
    FullInbox { reply: SmtpReply },
    Disabled { reply: SmtpReply },
    /// 4xx on MAIL FROM or RCPT.
    TemporaryFailure { reply: SmtpReply },
    /// The provider refused the probe itself (policy, reputation, sender).
    Blocked { reply: SmtpReply },
    /// 421 at any step.
    Unavailable { reply: SmtpReply },
    /// Greeting says the host takes no mail (521/554/556).
    NoMail { reply: SmtpReply },
    Unreachable { message: String },
    ProtocolError { message: String },
    DeadlineExceeded,
    NotAttempted,
}

impl HostOutcome {
    /// Accepted or refused for a reason tied to the mailbox itself.
    pub fn is_conclusive(&self) -> bool {
        matches!(
            self,
            Self::Accepted { .. } | Self::Rejected { .. } | Self::FullInbox { .. } | Self::Disabled { .. }
        )
    }

    pub fn is_temporary(&self) -> bool {
        matches!(self, Self::TemporaryFailure { .. })
    }

    pub fn as_reply(&self) -> Option<&SmtpReply> {
        match self {
            Self::Accepted { reply }
            | Self::Rejected { reply }
            | Self::FullInbox { reply }
            | Self::Disabled { reply }
            | Self::TemporaryFailure { reply }
            | Self::Blocked { reply }
            | Self::Unavailable { reply }
            | Self::NoMail { reply } => Some(reply),
            _ => None,
        }
    }
}

impl fmt::Display for HostOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Accepted { reply } => write!(f, "accepted ({reply})"),
            Self::Rejected { reply } => write!(f, "rejected ({reply})"),
            Self::FullInbox { reply } => write!(f, "inbox full ({reply})"),
            Self::Disabled { reply } => write!(f, "mailbox disabled ({reply})"),
            Self::TemporaryFailure { reply } => write!(f, "temporary failure ({reply})"),
            Self::Blocked { reply } => write!(f, "probe blocked ({reply})"),
            Self::Unavailable { reply } => write!(f, "service unavailable ({reply})"),
            Self::NoMail { reply } => write!(f, "host accepts no mail ({reply})"),
            Self::Unreachable { message } => write!(f, "unreachable: {message}"),
            Self::ProtocolError { message } => write!(f, "protocol error: {message}"),
            Self::DeadlineExceeded => f.write_str("deadline exceeded"),
            Self::NotAttempted => f.write_str("not attempted"),
        }
    }
}

/// Detailed report for a single host interrogation.
#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostAttempt {
    pub host: String,
    pub reached: SessionState,
    pub events: Vec<SmtpEvent>,
    pub outcome: HostOutcome,
    /// Whether a random recipient at the same domain was accepted too.
    pub catch_all: Option<bool>,
}

impl HostAttempt {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            reached: SessionState::Idle,
            events: Vec::new(),
            outcome: HostOutcome::NotAttempted,
            catch_all: None,
        }
    }
}

/// Deliverability signals inferred from the SMTP dialogue.
///
/// `deliverable` implies `host_exists`; `disabled` and `deliverable` are
/// never both set.
#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SmtpProbeOutcome {
    pub host_exists: bool,
    pub full_inbox: bool,
    pub catch_all: bool,
    pub deliverable: bool,
    pub disabled: bool,
}

#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeConclusion {
    /// Accepted by a host that does not accept everything.
    Deliverable,
    /// Refused for a mailbox-level reason.
    Undeliverable,
    /// Nothing conclusive; the string says why.
    Inconclusive(String),
}

impl fmt::Display for ProbeConclusion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deliverable => f.write_str("deliverable"),
            Self::Undeliverable => f.write_str("undeliverable"),
            Self::Inconclusive(reason) => write!(f, "inconclusive ({reason})"),
        }
    }
}

/// Final report produced by [`SmtpProber::probe`](super::SmtpProber::probe).
#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct SmtpProbeReport {
    pub outcome: SmtpProbeOutcome,
    pub conclusion: ProbeConclusion,
    pub attempts: Vec<HostAttempt>,
    pub confidence: f32,
}

impl SmtpProbeReport {
    pub fn inconclusive(reason: impl Into<String>) -> Self {
        let conclusion = ProbeConclusion::Inconclusive(reason.into());
        Self {
            outcome: SmtpProbeOutcome::default(),
            confidence: super::util::confidence_for(&conclusion, false),
            conclusion,
            attempts: Vec::new(),
        }
    }
}
