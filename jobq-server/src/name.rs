//! RFC-1123/1035 label sanitisation for names handed to `metadata.generateName`.

use std::borrow::Cow;

fn is_ascii_lowercase_numeric(byte: u8) -> bool {
    matches!(byte, b'a'..=b'z' | b'0'..=b'9')
}

fn is_ascii_lowercase_numeric_or_dash(byte: u8) -> bool {
    matches!(byte, b'a'..=b'z' | b'0'..=b'9' | b'-')
}

/// Returns true if the input matches `^[a-z]([-a-z0-9]*[a-z0-9])?$`, see
/// https://kubernetes.io/docs/concepts/overview/working-with-objects/names/#rfc-1035-label-names.
pub fn is_rfc_1035_label(value: &(impl AsRef<[u8]> + ?Sized)) -> bool {
    fn inner(value: &[u8]) -> bool {
        match value.len() {
            0 => false,
            1 => value[0].is_ascii_lowercase(),
            _ => {
                value[0].is_ascii_lowercase()
                    && value[1..value.len() - 1]
                        .iter()
                        .copied()
                        .all(is_ascii_lowercase_numeric_or_dash)
                    && is_ascii_lowercase_numeric(value[value.len() - 1])
            }
        }
    }
    inner(value.as_ref())
}

/// Attempts to lossily convert an already-lowercased input into a string that adheres to
/// `^[a-z]([-a-z0-9]*[a-z0-9])?$`. Returns `None` if there are not enough alphanumeric characters
/// to construct a non-empty string.
fn to_rfc_1035_label_lossy(input: &[u8]) -> Option<Cow<str>> {
    let start = input.iter().enumerate().find_map(|(index, &byte)| {
        if byte.is_ascii_lowercase() {
            Some(index)
        } else {
            None
        }
    })?;

    let end = input
        .iter()
        .enumerate()
        .skip(start.wrapping_add(1))
        .rev()
        .find_map(|(index, &byte)| {
            if is_ascii_lowercase_numeric(byte) {
                Some(index)
            } else {
                None
            }
        })
        .unwrap_or(start)
        .wrapping_add(1);

    if is_rfc_1035_label(&input[start..end]) {
        // SAFETY: is_rfc_1035_label guarantees that all bytes are ASCII.
        return Some(Cow::Borrowed(unsafe {
            std::str::from_utf8_unchecked(&input[start..end])
        }));
    }

    let mut output = Vec::with_capacity(end.wrapping_sub(start));

    output.push(input[start]);

    let mut can_append_dash = true;
    for &byte in &input[start.wrapping_add(1)..end.wrapping_sub(1)] {
        let to_push = if is_ascii_lowercase_numeric_or_dash(byte) {
            Some(byte)
        } else if can_append_dash {
            Some(b'-')
        } else {
            None
        };

        if let Some(c) = to_push {
            can_append_dash = c != b'-';
            output.push(c);
        }
    }

    output.push(input[end.wrapping_sub(1)]);

    debug_assert!(is_rfc_1035_label(&output));

    // SAFETY: All bytes are valid ASCII.
    Some(Cow::Owned(unsafe { String::from_utf8_unchecked(output) }))
}

/// Lowercases the input, replaces underscores with hyphens, and lossily reduces the result to an
/// RFC-1123 label suitable for `metadata.generateName`. Returns `None` if no non-empty label can
/// be constructed.
pub fn sanitize_rfc_1123(input: &str) -> Option<String> {
    let normalized: Vec<u8> = input
        .bytes()
        .map(|b| match b {
            b'_' => b'-',
            b'A'..=b'Z' => b + (b'a' - b'A'),
            other => other,
        })
        .collect();

    to_rfc_1035_label_lossy(&normalized).map(Cow::into_owned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_and_replaces_underscores() {
        assert_eq!(sanitize_rfc_1123("My_Job_Name"), Some("my-job-name".to_string()));
    }

    #[test]
    fn strips_invalid_leading_and_trailing_characters() {
        assert_eq!(sanitize_rfc_1123("-test-job-"), Some("test-job".to_string()));
    }

    #[test]
    fn returns_none_for_no_alphanumeric_content() {
        assert_eq!(sanitize_rfc_1123("___"), None);
        assert_eq!(sanitize_rfc_1123(""), None);
    }

    #[test]
    fn collapses_runs_of_invalid_characters_to_a_single_dash() {
        assert_eq!(sanitize_rfc_1123("a..b"), Some("a-b".to_string()));
    }
}
