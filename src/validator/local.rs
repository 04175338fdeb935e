/// Règles strictes: atext ASCII + '.' non initial/terminal, pas de ".."
pub(crate) fn is_local_strict(s: &str) -> bool {
    if s.starts_with('.') || s.ends_with('.') || s.contains("..") {
        return false;
    }
    s.chars().all(|c| {
        c.is_ascii_alphanumeric()
            || matches!(
                c,
                '!' | '#'
                    | '$'
                    | '%'
                    | '&'
                    | '\''
                    | '*'
                    | '+'
                    | '-'
                    | '/'
                    | '='
                    | '?'
                    | '^'
                    | '_'
                    | '`'
                    | '{'
                    | '|'
                    | '}'
                    | '~'
                    | '.'
            )
    })
}

/// Règles relaxed: autorise une quoted-string (avec échappements `\x`),
/// sinon retombe sur `is_local_strict`.
pub(crate) fn is_local_relaxed(s: &str) -> bool {
    if is_quoted(s) {
        quoted_body_ok(&s[1..s.len() - 1])
    } else {
        is_local_strict(s)
    }
}

pub(crate) fn is_quoted(s: &str) -> bool {
    s.len() >= 2 && s.starts_with('"') && s.ends_with('"')
}

/// A bare `"` or `\` must be escaped; escapes only cover printable ASCII.
fn quoted_body_ok(body: &str) -> bool {
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(escaped) if escaped.is_ascii() && !escaped.is_ascii_control() => {}
                _ => return false,
            },
            '"' => return false,
            c if !c.is_ascii() || c.is_ascii_control() => return false,
            _ => {}
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn strict_dots() {
        assert!(!is_local_strict(".abc"));
        assert!(!is_local_strict("abc."));
        assert!(!is_local_strict("a..b"));
        assert!(is_local_strict("a.b"));
    }
    #[test]
    fn strict_rejects_at_and_space() {
        assert!(!is_local_strict("a@b"));
        assert!(!is_local_strict("a b"));
    }
    #[test]
    fn relaxed_quoted() {
        assert!(is_local_relaxed("\"a b\""));
        assert!(is_local_relaxed("\"john@home\""));
        assert!(is_local_relaxed("\"say \\\"hi\\\"\""));
        assert!(!is_local_relaxed("\"unbalanced\"quote\""));
        assert!(!is_local_relaxed("\"trailing\\\""));
    }
}
