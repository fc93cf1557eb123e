//! Tag validation.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, Result};

static TAG_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[-a-zA-Z0-9_.]+$").expect("valid regex"));

/// Tag sent for untagged uploads. The server compiles the circuit but does not keep it under
/// any tag.
pub const UNTAGGED: &str = "";

/// Whether `tag` only uses characters from `[-a-zA-Z0-9_.]`.
pub fn is_valid_tag(tag: &str) -> bool {
    TAG_REGEX.is_match(tag)
}

/// Validates `tags` and returns the list to send upstream. An empty list becomes the single
/// [`UNTAGGED`] sentinel.
pub fn validate_tags<S: AsRef<str>>(tags: &[S]) -> Result<Vec<String>> {
    if tags.is_empty() {
        return Ok(vec![UNTAGGED.to_string()]);
    }

    tags.iter()
        .map(|tag| {
            let tag = tag.as_ref();
            if is_valid_tag(tag) {
                Ok(tag.to_string())
            } else {
                Err(Error::InvalidTag {
                    tag: tag.to_string(),
                })
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_tags() {
        for tag in ["latest", "v1.2.3", "release_candidate-2", "A", "..."] {
            assert!(is_valid_tag(tag), "{tag}");
        }
        assert_eq!(validate_tags(&["v1", "latest"]).unwrap(), ["v1", "latest"]);
    }

    #[test]
    fn test_invalid_tags() {
        for tag in ["", "with space", "slash/tag", "colon:tag", "ümlaut", "tab\t"] {
            assert!(!is_valid_tag(tag), "{tag:?}");
        }

        let err = validate_tags(&["ok", "not ok"]).unwrap_err();
        assert!(matches!(&err, Error::InvalidTag { tag } if tag == "not ok"));
        assert!(err.to_string().contains("\"not ok\""));
    }

    #[test]
    fn test_empty_tags_become_sentinel() {
        let tags: [&str; 0] = [];
        assert_eq!(validate_tags(&tags).unwrap(), [UNTAGGED]);
    }
}
