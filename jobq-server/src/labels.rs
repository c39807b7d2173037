//! Validation of `JobSpec` label keys, mirroring the grammar the image-reference parser applies
//! to image components: a compiled pattern checked once per call, no allocation beyond the match.

use std::sync::LazyLock;

use regex::Regex;

const MAX_LABEL_VALUE_LEN: usize = 127;

static LABEL_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z]+(?:[/._-][a-z0-9]+)*[a-z]?$").unwrap());

pub fn is_valid_label_key(key: &str) -> bool {
    LABEL_KEY.is_match(key)
}

pub fn is_valid_label_value(value: &str) -> bool {
    value.len() <= MAX_LABEL_VALUE_LEN
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_simple_lowercase_key() {
        assert!(is_valid_label_key("team"));
    }

    #[test]
    fn accepts_key_with_separators() {
        assert!(is_valid_label_key("x-jobq.io/owner_team"));
    }

    #[test]
    fn rejects_uppercase() {
        assert!(!is_valid_label_key("Team"));
    }

    #[test]
    fn rejects_leading_digit() {
        assert!(!is_valid_label_key("1team"));
    }

    #[test]
    fn rejects_value_over_127_chars() {
        assert!(!is_valid_label_value(&"a".repeat(128)));
    }

    #[test]
    fn accepts_value_at_the_limit() {
        assert!(is_valid_label_value(&"a".repeat(127)));
    }
}
