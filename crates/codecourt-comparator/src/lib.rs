//! Verdict comparator — decides pass/fail from actual vs expected output.
//!
//! The whole contract is one pure function. No I/O, no config lookup: the
//! caller reads `strict_whitespace_diffing` from configuration and passes
//! the resulting [`Policy`] in.

/// Whitespace policy controlling [`compare`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    /// Replace CRLF with LF and trim leading/trailing whitespace from the
    /// whole string before comparing. The default.
    Normalise,
    /// Byte-for-byte equality, no normalisation.
    Strict,
}

impl Policy {
    pub fn from_strict_flag(strict_whitespace_diffing: bool) -> Self {
        if strict_whitespace_diffing {
            Policy::Strict
        } else {
            Policy::Normalise
        }
    }
}

/// Normalise CRLF to LF and trim leading/trailing whitespace from the
/// whole string. No per-line trimming, no numeric tolerance.
pub fn normalise(s: &str) -> String {
    s.replace("\r\n", "\n").trim().to_string()
}

/// Decide pass/fail for `actual` against `expected` under `policy`.
pub fn compare(actual: &str, expected: &str, policy: Policy) -> bool {
    match policy {
        Policy::Strict => actual == expected,
        Policy::Normalise => normalise(actual) == normalise(expected),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_match_passes() {
        assert!(compare("1\n2\nFizz", "1\n2\nFizz", Policy::Normalise));
    }

    #[test]
    fn trailing_newline_and_crlf_are_ignored_under_normalise() {
        assert!(compare(
            "1\r\n2\r\nFizz\r\n",
            "1\n2\nFizz",
            Policy::Normalise
        ));
    }

    #[test]
    fn leading_and_trailing_whitespace_ignored_under_normalise() {
        assert!(compare("  1\n2\nFizz  \n\n", "1\n2\nFizz", Policy::Normalise));
    }

    #[test]
    fn mismatch_fails() {
        assert!(!compare("1\n2\nFizz", "1\n2\nBuzz", Policy::Normalise));
    }

    #[test]
    fn strict_policy_rejects_trailing_whitespace() {
        assert!(!compare("1\n2\nFizz\n", "1\n2\nFizz", Policy::Strict));
    }

    #[test]
    fn strict_policy_accepts_exact_bytes() {
        assert!(compare("1\n2\nFizz", "1\n2\nFizz", Policy::Strict));
    }

    #[test]
    fn comparator_is_idempotent_under_normalisation() {
        // compare(x, y) = compare(normalise(x), normalise(y)) under default policy.
        let x = "1\r\n2\r\nFizz\r\n  ";
        let y = "1\n2\nFizz";
        assert_eq!(
            compare(x, y, Policy::Normalise),
            compare(&normalise(x), &normalise(y), Policy::Normalise)
        );
    }

    #[test]
    fn no_per_line_trimming() {
        // Interior whitespace differences still fail — only the whole string is trimmed.
        assert!(!compare("1\n 2\nFizz", "1\n2\nFizz", Policy::Normalise));
    }
}
