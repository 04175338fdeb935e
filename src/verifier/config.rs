use std::time::Duration;

#[cfg(feature = "with-serde")]
use serde::{Deserialize, Serialize};

use super::error::ConfigError;
use crate::mx::MxOptions;
use crate::smtp::SmtpProbeOptions;
use crate::suggest::DEFAULT_THRESHOLD;
use crate::validator::ValidationMode;

/// Everything a [`Verifier`](super::Verifier) needs to know, passed at
/// construction. Missing TOML keys fall back to [`Default`].
#[cfg_attr(feature = "with-serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "with-serde", serde(default))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifierConfig {
    pub smtp_enabled: bool,
    pub gravatar_enabled: bool,
    /// Wall-clock budget for one verification.
    pub deadline_ms: u64,
    pub dns_timeout_ms: u64,
    pub gravatar_timeout_ms: u64,
    pub mx_cache_ttl_secs: u64,
    pub mx_negative_ttl_secs: u64,
    pub cache_stale_window_secs: u64,
    pub suggestion_threshold: usize,
    pub validation_mode: ValidationMode,
    pub smtp: SmtpProbeOptions,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            smtp_enabled: true,
            gravatar_enabled: false,
            deadline_ms: 15_000,
            dns_timeout_ms: 3_000,
            gravatar_timeout_ms: 3_000,
            mx_cache_ttl_secs: 300,
            mx_negative_ttl_secs: 60,
            cache_stale_window_secs: 30,
            suggestion_threshold: DEFAULT_THRESHOLD,
            validation_mode: ValidationMode::Strict,
            smtp: SmtpProbeOptions::default(),
        }
    }
}

impl VerifierConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }

    pub fn gravatar_timeout(&self) -> Duration {
        Duration::from_millis(self.gravatar_timeout_ms)
    }

    pub fn mx_options(&self) -> MxOptions {
        MxOptions {
            timeout: Duration::from_millis(self.dns_timeout_ms),
            positive_ttl: Duration::from_secs(self.mx_cache_ttl_secs),
            negative_ttl: Duration::from_secs(self.mx_negative_ttl_secs),
            stale_window: Duration::from_secs(self.cache_stale_window_secs),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let non_zero = [
            ("deadline_ms", self.deadline_ms),
            ("dns_timeout_ms", self.dns_timeout_ms),
            ("smtp.connect_timeout_ms", self.smtp.connect_timeout_ms),
            ("smtp.command_timeout_ms", self.smtp.command_timeout_ms),
            ("smtp.max_hosts", self.smtp.max_hosts as u64),
            ("smtp.port", u64::from(self.smtp.port)),
        ];
        if let Some(&(field, _)) = non_zero.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::Zero { field });
        }
        if self.gravatar_enabled && self.gravatar_timeout_ms == 0 {
            return Err(ConfigError::Zero {
                field: "gravatar_timeout_ms",
            });
        }
        if self.smtp.helo_domain.trim().is_empty() {
            return Err(ConfigError::EmptyHelo);
        }
        self.smtp
            .patterns
            .compile()
            .map_err(|source| ConfigError::Pattern { source })?;
        Ok(())
    }

    #[cfg(feature = "with-serde")]
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|source| ConfigError::Toml { source })?;
        config.validate()?;
        Ok(config)
    }

    #[cfg(feature = "with-serde")]
    pub fn from_toml_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smtp::ReplyPatterns;

    #[test]
    fn defaults_are_valid() {
        VerifierConfig::default().validate().expect("defaults validate");
    }

    #[test]
    fn zero_values_are_rejected() {
        let config = VerifierConfig {
            deadline_ms: 0,
            ..VerifierConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Zero { field: "deadline_ms" })
        ));

        let mut config = VerifierConfig::default();
        config.smtp.max_hosts = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Zero {
                field: "smtp.max_hosts"
            })
        ));
    }

    #[test]
    fn empty_helo_and_bad_patterns_are_rejected() {
        let mut config = VerifierConfig::default();
        config.smtp.helo_domain = "  ".into();
        assert!(matches!(config.validate(), Err(ConfigError::EmptyHelo)));

        let mut config = VerifierConfig::default();
        config.smtp.patterns = ReplyPatterns {
            disabled: vec!["[".into()],
            ..ReplyPatterns::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Pattern { .. })));
    }

    #[test]
    fn mx_options_follow_config() {
        let config = VerifierConfig {
            dns_timeout_ms: 1_500,
            mx_cache_ttl_secs: 600,
            ..VerifierConfig::default()
        };
        let mx = config.mx_options();
        assert_eq!(mx.timeout, Duration::from_millis(1_500));
        assert_eq!(mx.positive_ttl, Duration::from_secs(600));
        assert_eq!(mx.negative_ttl, Duration::from_secs(60));
    }

    #[cfg(feature = "with-serde")]
    #[test]
    fn partial_toml_overrides_defaults() {
        let config = VerifierConfig::from_toml_str(
            r#"
            deadline_ms = 5000
            validation_mode = "relaxed"

            [smtp]
            helo_domain = "verify.example.net"
            parallel_catch_all = false

            [smtp.patterns]
            full_inbox = ["casella piena"]
            "#,
        )
        .expect("parses");

        assert_eq!(config.deadline_ms, 5_000);
        assert_eq!(config.validation_mode, ValidationMode::Relaxed);
        assert_eq!(config.smtp.helo_domain, "verify.example.net");
        assert!(!config.smtp.parallel_catch_all);
        assert_eq!(config.smtp.port, 25);
        assert_eq!(config.smtp.patterns.full_inbox, vec!["casella piena".to_string()]);
        assert!(!config.smtp.patterns.disabled.is_empty());
        assert!(config.smtp_enabled);
    }

    #[cfg(feature = "with-serde")]
    #[test]
    fn invalid_toml_is_reported() {
        assert!(matches!(
            VerifierConfig::from_toml_str("deadline_ms = \"soon\""),
            Err(ConfigError::Toml { .. })
        ));
        assert!(matches!(
            VerifierConfig::from_toml_str("deadline_ms = 0"),
            Err(ConfigError::Zero { .. })
        ));
    }
}
