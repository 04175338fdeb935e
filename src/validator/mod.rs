//! Syntax gate: decides whether an input string is a well-formed address and
//! splits it into username and domain. Nothing downstream runs on input this
//! module rejects.

mod domain;
mod local;
mod types;

pub use types::{EmailAddress, EmailError, SyntaxReport, ValidationMode};

use std::str::FromStr;

use domain::check_domain;
use local::{is_local_relaxed, is_local_strict, is_quoted};

/// RFC 5321: 254 octets max for a forward-path address.
const MAX_ADDRESS_LEN: usize = 254;
const MAX_LOCAL_LEN: usize = 64;

/// Runs every syntax rule against `email` and reports the decomposition.
///
/// Surrounding whitespace is ignored. The domain is lower-cased, the username
/// keeps its case.
pub fn parse_email(email: &str, mode: ValidationMode) -> SyntaxReport {
    let input = email.trim();

    let mut reasons = Vec::new();

    if input.len() > MAX_ADDRESS_LEN {
        reasons.push(format!("total length {} > {MAX_ADDRESS_LEN}", input.len()));
    }
    if input.chars().any(char::is_control) {
        reasons.push("contains control characters".to_string());
    }

    let Some((local, domain)) = split_address(input, mode) else {
        reasons.push("must contain exactly one '@'".to_string());
        return SyntaxReport::invalid(reasons);
    };

    if local.is_empty() || local.len() > MAX_LOCAL_LEN {
        reasons.push(format!(
            "local part length {} invalid (1..={MAX_LOCAL_LEN})",
            local.len()
        ));
    }

    let ascii_domain = check_domain(domain, &mut reasons);

    let local_ok = match mode {
        ValidationMode::Strict => is_local_strict(local),
        ValidationMode::Relaxed => is_local_relaxed(local),
    };
    if !local.is_empty() && !local_ok {
        reasons.push(match mode {
            ValidationMode::Strict => "invalid local part (strict rules)".into(),
            ValidationMode::Relaxed => "invalid local part (relaxed rules)".into(),
        });
    }

    if !reasons.is_empty() {
        return SyntaxReport::invalid(reasons);
    }

    SyntaxReport {
        username: local.to_string(),
        domain: domain.to_lowercase(),
        ascii_domain,
        valid: true,
        reasons,
    }
}

/// Like [`parse_email`] but turns rejection into an error.
pub fn validate_email(email: &str, mode: ValidationMode) -> Result<EmailAddress, EmailError> {
    let report = parse_email(email, mode);
    report.address().ok_or(EmailError::InvalidFormat {
        reasons: report.reasons,
    })
}

impl FromStr for EmailAddress {
    type Err = EmailError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        validate_email(s, ValidationMode::Strict)
    }
}

fn split_address(input: &str, mode: ValidationMode) -> Option<(&str, &str)> {
    match mode {
        ValidationMode::Strict => {
            if input.matches('@').count() != 1 {
                return None;
            }
            input.split_once('@')
        }
        // a quoted local part may carry its own '@'
        ValidationMode::Relaxed => {
            let (local, domain) = input.rsplit_once('@')?;
            if local.contains('@') && !is_quoted(local) {
                return None;
            }
            Some((local, domain))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn accepts_basic() {
        let r = parse_email("alice@example.com", ValidationMode::Strict);
        assert!(r.valid, "{:?}", r.reasons);
        assert_eq!(r.username, "alice");
        assert_eq!(r.domain, "example.com");
    }

    #[test]
    fn rejects_missing_at() {
        let r = parse_email("not-an-email", ValidationMode::Strict);
        assert!(!r.valid);
        assert!(r.username.is_empty());
        assert!(r.domain.is_empty());
        assert!(r.reasons.iter().any(|r| r.contains("'@'")));
    }

    #[test]
    fn rejects_double_at() {
        let r = parse_email("a@@b.com", ValidationMode::Strict);
        assert!(!r.valid);
    }

    #[test]
    fn lowercases_domain_keeps_username_case() {
        let r = parse_email("John.Doe@Example.COM", ValidationMode::Strict);
        assert!(r.valid, "{:?}", r.reasons);
        assert_eq!(r.username, "John.Doe");
        assert_eq!(r.domain, "example.com");
        assert_eq!(format!("{}@{}", r.username, r.domain), "John.Doe@example.com");
    }

    #[test]
    fn rejects_control_bytes() {
        let r = parse_email("ali\u{7}ce@example.com", ValidationMode::Strict);
        assert!(!r.valid);
        assert!(r.reasons.iter().any(|r| r.contains("control")));
    }

    #[test]
    fn enforces_local_length() {
        let local = "a".repeat(65);
        let r = parse_email(&format!("{local}@example.com"), ValidationMode::Strict);
        assert!(!r.valid);
        let local = "a".repeat(64);
        let r = parse_email(&format!("{local}@example.com"), ValidationMode::Strict);
        assert!(r.valid, "{:?}", r.reasons);
    }

    #[test]
    fn enforces_domain_length() {
        let label = "a".repeat(60);
        let domain = vec![label.as_str(); 5].join(".");
        assert!(domain.len() > 255);
        let r = parse_email(&format!("x@{domain}"), ValidationMode::Relaxed);
        assert!(!r.valid);
        assert!(r.reasons.iter().any(|r| r.contains("domain length")));
    }

    #[test]
    fn relaxed_accepts_quoted_local_with_at() {
        let r = parse_email("\"john@home\"@example.com", ValidationMode::Relaxed);
        assert!(r.valid, "{:?}", r.reasons);
        assert_eq!(r.username, "\"john@home\"");
        let strict = parse_email("\"john@home\"@example.com", ValidationMode::Strict);
        assert!(!strict.valid);
    }

    #[test]
    fn from_str_round_trips_display() {
        let addr: EmailAddress = "Bob@EXAMPLE.org".parse().expect("valid");
        assert_eq!(addr.to_string(), "Bob@example.org");
        assert!("bob".parse::<EmailAddress>().is_err());
    }

    proptest! {
        #[test]
        fn inputs_without_at_are_always_invalid(s in "[^@]{0,80}") {
            let r = parse_email(&s, ValidationMode::Relaxed);
            prop_assert!(!r.valid);
            prop_assert!(r.address().is_none());
        }

        #[test]
        fn valid_reports_reconstruct_input(
            user in "[A-Za-z0-9]{1,20}",
            host in "[A-Za-z]{1,20}",
            tld in "[a-z]{2,6}",
        ) {
            let input = format!("{user}@{host}.{tld}");
            let r = parse_email(&input, ValidationMode::Strict);
            prop_assert!(r.valid);
            let expected = format!("{user}@{}.{tld}", host.to_lowercase());
            prop_assert_eq!(format!("{}@{}", r.username, r.domain), expected);
        }
    }
}
