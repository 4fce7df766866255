//! Commit-message trailers and branch-name slugs.
//!
//! The durable diff id lives in a `DiffID: <id>` trailer line at the end of
//! the commit message. The commit-msg hook (see `init`) inserts one when
//! missing, so for any diff-scoped operation its absence is a usage error.

use rand::Rng;

use crate::types::DiffId;

/// The recognized trailer key.
pub const TRAILER_KEY: &str = "DiffID";

/// Extracts the diff id from a full commit message.
///
/// Scans for `DiffID: <value>` lines and returns the first match. Multiple
/// trailers are a tolerated ambiguity: the first one wins, the rest are
/// ignored.
pub fn diff_id_from_message(message: &str) -> Option<DiffId> {
    for line in message.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        if key.trim() == TRAILER_KEY {
            let value = value.trim();
            if !value.is_empty() {
                return Some(DiffId::new(value));
            }
        }
    }
    None
}

/// Renders a trailer line for the given id.
pub fn trailer_line(id: &DiffId) -> String {
    format!("{}: {}", TRAILER_KEY, id)
}

/// Derives a deterministic branch name from a commit subject.
///
/// Lowercases, maps every non-alphanumeric run to a single `-`, and trims
/// leading/trailing dashes (the same shape git's `%f` sanitized subject has).
pub fn slug(subject: &str) -> String {
    let mut out = String::with_capacity(subject.len());
    let mut pending_dash = false;
    for c in subject.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    out
}

const ID_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const ID_SUFFIX_LEN: usize = 5;

/// Generates a fresh diff id: `d` followed by five random `[a-z0-9]` chars.
pub fn generate_diff_id() -> DiffId {
    let mut rng = rand::thread_rng();
    let mut id = String::with_capacity(ID_SUFFIX_LEN + 1);
    id.push('d');
    for _ in 0..ID_SUFFIX_LEN {
        let idx = rng.gen_range(0..ID_ALPHABET.len());
        id.push(ID_ALPHABET[idx] as char);
    }
    DiffId::new(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn finds_trailer_in_footer() {
        let message = "Fix typo\n\nLonger explanation.\n\nDiffID: dabc12\n";
        assert_eq!(diff_id_from_message(message), Some(DiffId::new("dabc12")));
    }

    #[test]
    fn first_of_multiple_trailers_wins() {
        let message = "Subject\n\nDiffID: first1\nDiffID: second\n";
        assert_eq!(diff_id_from_message(message), Some(DiffId::new("first1")));
    }

    #[test]
    fn missing_trailer_is_none() {
        assert_eq!(diff_id_from_message("Subject\n\nBody only.\n"), None);
        assert_eq!(diff_id_from_message(""), None);
    }

    #[test]
    fn empty_value_is_none() {
        assert_eq!(diff_id_from_message("Subject\n\nDiffID:\n"), None);
        assert_eq!(diff_id_from_message("Subject\n\nDiffID:   \n"), None);
    }

    #[test]
    fn other_keys_are_ignored() {
        let message = "Subject\n\nSigned-off-by: someone\nDiffID: dzz999\n";
        assert_eq!(diff_id_from_message(message), Some(DiffId::new("dzz999")));
    }

    #[test]
    fn trailer_line_roundtrips() {
        let id = DiffId::new("dabc12");
        assert_eq!(
            diff_id_from_message(&trailer_line(&id)),
            Some(DiffId::new("dabc12"))
        );
    }

    #[test]
    fn slug_examples() {
        assert_eq!(slug("Fix typo"), "fix-typo");
        assert_eq!(slug("Add   spaces!!"), "add-spaces");
        assert_eq!(slug("[WIP] Try v2"), "wip-try-v2");
        assert_eq!(slug("---"), "");
    }

    #[test]
    fn generated_ids_have_expected_shape() {
        for _ in 0..32 {
            let id = generate_diff_id();
            let s = id.as_str();
            assert_eq!(s.len(), 6);
            assert!(s.starts_with('d'));
            assert!(s[1..].bytes().all(|b| ID_ALPHABET.contains(&b)));
        }
    }

    proptest! {
        #[test]
        fn slug_is_lowercase_alnum_dash(subject in ".{0,80}") {
            let s = slug(&subject);
            prop_assert!(s.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'));
            prop_assert!(!s.starts_with('-'));
            prop_assert!(!s.ends_with('-'));
            prop_assert!(!s.contains("--"));
        }

        #[test]
        fn slug_is_idempotent(subject in ".{0,80}") {
            let once = slug(&subject);
            prop_assert_eq!(slug(&once), once);
        }
    }
}
