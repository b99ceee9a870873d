//! Character-safe string helpers.

/// Return at most the first `max_chars` characters of `s`.
///
/// Cuts on a character boundary, never inside a multi-byte sequence.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_shorter_is_unchanged() {
        assert_eq!(truncate_chars("Hoi An", 100), "Hoi An");
        assert_eq!(truncate_chars("", 3), "");
    }

    #[test]
    fn test_truncate_counts_characters_not_bytes() {
        let s = "Bà Nà Hills";
        assert_eq!(truncate_chars(s, 4), "Bà N");
        assert_eq!(truncate_chars("Đà Nẵng", 2), "Đà");
    }

    #[test]
    fn test_truncate_zero() {
        assert_eq!(truncate_chars("abc", 0), "");
    }
}
