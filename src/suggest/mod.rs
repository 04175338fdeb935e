//! Typo correction for the domain part, by edit distance against a curated
//! list of common mail domains.

/// Distance at or below which a curated domain is offered as a correction.
pub const DEFAULT_THRESHOLD: usize = 2;

/// Canonical order matters: on equal distance the earlier entry wins.
const POPULAR_DOMAINS: &[&str] = &[
    "gmail.com",
    "yahoo.com",
    "hotmail.com",
    "outlook.com",
    "aol.com",
    "icloud.com",
    "live.com",
    "msn.com",
    "me.com",
    "mac.com",
    "googlemail.com",
    "protonmail.com",
    "proton.me",
    "gmx.com",
    "gmx.de",
    "gmx.net",
    "mail.com",
    "zoho.com",
    "yandex.com",
    "yandex.ru",
    "mail.ru",
    "qq.com",
    "163.com",
    "comcast.net",
    "verizon.net",
    "att.net",
    "sbcglobal.net",
    "bellsouth.net",
    "cox.net",
    "earthlink.net",
    "hotmail.co.uk",
    "yahoo.co.uk",
    "btinternet.com",
    "hotmail.fr",
    "orange.fr",
    "wanadoo.fr",
    "laposte.net",
    "free.fr",
    "sfr.fr",
    "web.de",
    "t-online.de",
    "libero.it",
    "ymail.com",
    "rocketmail.com",
    "fastmail.com",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainSuggester {
    domains: Vec<String>,
    threshold: usize,
}

impl Default for DomainSuggester {
    fn default() -> Self {
        Self::new(POPULAR_DOMAINS.iter().copied(), DEFAULT_THRESHOLD)
    }
}

impl DomainSuggester {
    pub fn new<I>(domains: I, threshold: usize) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        Self {
            domains: domains
                .into_iter()
                .map(|d| d.into().to_ascii_lowercase())
                .collect(),
            threshold,
        }
    }

    pub fn with_threshold(mut self, threshold: usize) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn domains(&self) -> &[String] {
        &self.domains
    }

    /// Closest curated domain within the threshold, or `None` when the input
    /// already is a curated domain or nothing is close enough.
    pub fn suggest(&self, domain: &str) -> Option<String> {
        let domain = domain.trim_end_matches('.').to_lowercase();
        if domain.is_empty() || self.domains.iter().any(|d| *d == domain) {
            return None;
        }

        let mut best: Option<(usize, &str)> = None;
        for candidate in &self.domains {
            let distance = edit_distance(&domain, candidate);
            if distance > self.threshold {
                continue;
            }
            // strict `<` keeps the earliest entry on ties
            if best.is_none_or(|(d, _)| distance < d) {
                best = Some((distance, candidate.as_str()));
            }
        }
        best.map(|(_, candidate)| candidate.to_string())
    }
}

/// Levenshtein distance over chars: insertion, deletion and substitution all
/// cost one.
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != cb);
            curr[j + 1] = substitution.min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}
