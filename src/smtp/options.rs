use std::borrow::Cow;
use std::time::Duration;

use regex::{RegexSet, RegexSetBuilder};
#[cfg(feature = "with-serde")]
use serde::{Deserialize, Serialize};

/// Configuration knobs for [`SmtpProber`](super::SmtpProber).
#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "with-serde", serde(default))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmtpProbeOptions {
    pub port: u16,
    pub helo_domain: String,
    /// Envelope sender. Empty means `postmaster@<helo_domain>`.
    pub mail_from: String,
    pub connect_timeout_ms: u64,
    pub command_timeout_ms: u64,
    /// Cap on the RSET/QUIT exchange once a session is being torn down.
    pub quit_timeout_ms: u64,
    pub max_hosts: usize,
    pub opportunistic_tls: bool,
    /// Run the catch-all check on its own connection, concurrently with the
    /// real recipient check. Otherwise it follows the real RCPT in-session.
    pub parallel_catch_all: bool,
    pub catch_all_probe: bool,
    pub catch_all_ttl_secs: u64,
    pub patterns: ReplyPatterns,
}

impl Default for SmtpProbeOptions {
    fn default() -> Self {
        Self {
            port: 25,
            helo_domain: "localhost".to_string(),
            mail_from: String::new(),
            connect_timeout_ms: 5_000,
            command_timeout_ms: 5_000,
            quit_timeout_ms: 500,
            max_hosts: 3,
            opportunistic_tls: true,
            parallel_catch_all: true,
            catch_all_probe: true,
            catch_all_ttl_secs: 3_600,
            patterns: ReplyPatterns::default(),
        }
    }
}

impl SmtpProbeOptions {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    pub fn quit_timeout(&self) -> Duration {
        Duration::from_millis(self.quit_timeout_ms)
    }

    pub fn catch_all_ttl(&self) -> Duration {
        Duration::from_secs(self.catch_all_ttl_secs)
    }

    pub fn helo_name(&self) -> &str {
        let trimmed = self.helo_domain.trim();
        if trimmed.is_empty() { "localhost" } else { trimmed }
    }

    pub fn sender(&self) -> Cow<'_, str> {
        if self.mail_from.trim().is_empty() {
            Cow::Owned(format!("postmaster@{}", self.helo_name()))
        } else {
            Cow::Borrowed(self.mail_from.trim())
        }
    }
}

/// Case-insensitive regular expressions matched against the text of
/// non-2xx RCPT replies.
#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "with-serde", serde(default))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyPatterns {
    pub full_inbox: Vec<String>,
    pub disabled: Vec<String>,
    pub blocked: Vec<String>,
}

impl Default for ReplyPatterns {
    fn default() -> Self {
        fn owned(items: &[&str]) -> Vec<String> {
            items.iter().map(|s| s.to_string()).collect()
        }
        Self {
            full_inbox: owned(&[
                r"mailbox (is )?full",
                r"over ?quota",
                r"quota exceeded",
                r"exceeded (its |the )?storage",
                r"mailbox size limit",
            ]),
            disabled: owned(&[
                r"(account|mailbox|user)\b.{0,60}\b(is|has been) (disabled|deactivated|suspended|inactive)",
                r"disabled (account|mailbox|user)",
                r"no longer (active|in use)",
            ]),
            blocked: owned(&[
                r"block ?list",
                r"black ?list",
                r"\bblocked\b",
                r"spamhaus",
                r"(denied|rejected) (by|due to) policy",
                r"poor reputation",
            ]),
        }
    }
}

impl ReplyPatterns {
    pub fn compile(&self) -> Result<CompiledPatterns, regex::Error> {
        Ok(CompiledPatterns {
            full_inbox: build_set(&self.full_inbox)?,
            disabled: build_set(&self.disabled)?,
            blocked: build_set(&self.blocked)?,
        })
    }
}

fn build_set(patterns: &[String]) -> Result<RegexSet, regex::Error> {
    RegexSetBuilder::new(patterns).case_insensitive(true).build()
}

#[derive(Debug, Clone)]
pub struct CompiledPatterns {
    full_inbox: RegexSet,
    disabled: RegexSet,
    blocked: RegexSet,
}

impl CompiledPatterns {
    pub fn is_full_inbox(&self, text: &str) -> bool {
        self.full_inbox.is_match(text)
    }

    pub fn is_disabled(&self, text: &str) -> bool {
        self.disabled.is_match(text)
    }

    pub fn is_blocked(&self, text: &str) -> bool {
        self.blocked.is_match(text)
    }
}
