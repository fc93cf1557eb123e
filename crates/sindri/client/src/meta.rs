//! Metadata validation and default metadata.
//!
//! Every circuit and proof can carry string metadata. Default entries come from the
//! `SINDRI_META` environment variable, given either as a JSON object
//! (`{"key": "value"}`) or as `key1=value1:key2=value2`, where a literal `:` inside a segment is
//! written as `::`. Explicit metadata always wins over the defaults.

use once_cell::sync::{Lazy, OnceCell};
use regex::Regex;
use serde_json::Value;
use sindri_types::Meta;
use tracing::warn;

use crate::error::{Error, Result};

/// Environment variable holding the default metadata.
pub const SINDRI_META_ENV: &str = "SINDRI_META";

const KEY_LENGTH_MAX: usize = 64;
const VALUE_LENGTH_MAX: usize = 4096;

// Must stay in sync with the server side validation.
static KEY_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9_-]*$").expect("valid regex"));

/// Validates a single metadata entry, returning a human readable reason when it is invalid.
pub fn validate_meta_entry(key: &str, value: &str) -> std::result::Result<(), String> {
    let key_length = key.chars().count();
    if !(1..=KEY_LENGTH_MAX).contains(&key_length) {
        return Err(format!(
            "Invalid metadata key length for '{key}' (must be 1-{KEY_LENGTH_MAX} characters)."
        ));
    }
    if !KEY_REGEX.is_match(key) {
        return Err(format!(
            "Invalid metadata key for '{key}' (must start with an alphabet character and only \
             include alphanumeric characters, underscores, and hyphens)."
        ));
    }
    if value.chars().count() > VALUE_LENGTH_MAX {
        return Err(format!(
            "Invalid metadata value length for '{key}' (must be 0-{VALUE_LENGTH_MAX} characters)."
        ));
    }
    Ok(())
}

/// How [`MetadataValidator::default_meta`] treats the cache and invalid entries.
#[derive(Debug, Clone, Copy)]
pub struct DefaultMetaOptions {
    /// Reuse (and populate) the cached defaults. A cached value is returned as is, without
    /// re-running validation.
    pub cache: bool,
    /// Fail on the first invalid entry instead of dropping it with a warning.
    pub raise: bool,
}

impl Default for DefaultMetaOptions {
    fn default() -> Self {
        Self {
            cache: true,
            raise: false,
        }
    }
}

/// Owns the raw default metadata and its parsed, lazily initialized form.
#[derive(Debug, Default)]
pub struct MetadataValidator {
    raw: Option<String>,
    cached: OnceCell<Meta>,
}

impl MetadataValidator {
    /// Validator whose defaults come from `SINDRI_META`.
    pub fn from_env() -> Self {
        Self::new(std::env::var(SINDRI_META_ENV).ok())
    }

    /// Validator with the given raw defaults (`None` means no defaults).
    pub fn new(raw: Option<String>) -> Self {
        Self {
            raw,
            cached: OnceCell::new(),
        }
    }

    /// Drops the cached defaults so the next call parses the raw source again.
    pub fn reset(&mut self) {
        self.cached.take();
    }

    /// Parsed default metadata.
    pub fn default_meta(&self, options: DefaultMetaOptions) -> Result<Meta> {
        if !options.cache {
            return self.parse(options.raise);
        }
        self.cached
            .get_or_try_init(|| self.parse(options.raise))
            .cloned()
    }

    /// Validates `meta` and merges it over the defaults. Any invalid entry, explicit or default,
    /// aborts the whole operation.
    pub fn validate_and_merge(&self, meta: &Meta) -> Result<Meta> {
        let mut merged = self.default_meta(DefaultMetaOptions {
            cache: true,
            raise: true,
        })?;
        for (key, value) in meta {
            validate_meta_entry(key, value).map_err(Error::InvalidMeta)?;
        }
        merged.extend(meta.iter().map(|(k, v)| (k.clone(), v.clone())));
        Ok(merged)
    }

    fn parse(&self, raise: bool) -> Result<Meta> {
        let Some(raw) = self.raw.as_deref().filter(|raw| !raw.is_empty()) else {
            return Ok(Meta::new());
        };

        if raw.starts_with('{') {
            return parse_json(raw, raise);
        }

        let mut meta = Meta::new();
        for segment in split_segments(raw) {
            let Some((key, value)) = segment.split_once('=') else {
                let message = format!(
                    "Invalid '{SINDRI_META_ENV}' metadata segment '{segment}' \
                     (missing '=', try 'key=value')."
                );
                reject(raise, message, &segment)?;
                continue;
            };
            if let Err(message) = validate_meta_entry(key, value) {
                reject(raise, message, &segment)?;
                continue;
            }
            meta.insert(key.to_string(), value.to_string());
        }
        Ok(meta)
    }
}

fn parse_json(raw: &str, raise: bool) -> Result<Meta> {
    let object = match serde_json::from_str::<serde_json::Map<String, Value>>(raw) {
        Ok(object) => object,
        Err(error) => {
            let message = format!("Failed to parse '{SINDRI_META_ENV}' as JSON.");
            if raise {
                return Err(Error::InvalidMeta(message));
            }
            warn!(error = %error, "{message} Using '{{}}' as the default.");
            return Ok(Meta::new());
        }
    };

    let mut meta = Meta::new();
    for (key, value) in object {
        let Value::String(value) = value else {
            let message = format!("Invalid metadata entry for '{key}' (value must be a string).");
            reject(raise, message, &key)?;
            continue;
        };
        if let Err(message) = validate_meta_entry(&key, &value) {
            reject(raise, message, &key)?;
            continue;
        }
        meta.insert(key, value);
    }
    Ok(meta)
}

/// Splits `key=value:key=value` on single colons, turning `::` into a literal `:`.
fn split_segments(raw: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if c != ':' {
            current.push(c);
        } else if chars.peek() == Some(&':') {
            chars.next();
            current.push(':');
        } else {
            segments.push(std::mem::take(&mut current));
        }
    }
    segments.push(current);
    segments
}

fn reject(raise: bool, message: String, entry: &str) -> Result<()> {
    if raise {
        return Err(Error::InvalidMeta(message));
    }
    warn!(entry, "{message} Ignoring.");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(entries: &[(&str, &str)]) -> Meta {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_key_and_value_boundaries() {
        assert!(validate_meta_entry(&"k".repeat(64), "").is_ok());
        assert!(validate_meta_entry(&"k".repeat(65), "").is_err());
        assert!(validate_meta_entry("", "value").is_err());
        assert!(validate_meta_entry("1key", "value").is_err());
        assert!(validate_meta_entry("key with space", "value").is_err());
        assert!(validate_meta_entry("a_b-C9", "value").is_ok());
        assert!(validate_meta_entry("key", &"v".repeat(4096)).is_ok());
        assert!(validate_meta_entry("key", &"v".repeat(4097)).is_err());
    }

    #[test]
    fn test_colon_delimited_defaults() {
        let validator = MetadataValidator::new(Some("a=1:url=http:://host:b=x=y".to_string()));
        assert_eq!(
            validator.default_meta(DefaultMetaOptions::default()).unwrap(),
            meta(&[("a", "1"), ("url", "http://host"), ("b", "x=y")])
        );
    }

    #[test]
    fn test_json_defaults() {
        let validator = MetadataValidator::new(Some(r#"{"a": "1", "b": "2"}"#.to_string()));
        assert_eq!(
            validator.default_meta(DefaultMetaOptions::default()).unwrap(),
            meta(&[("a", "1"), ("b", "2")])
        );
    }

    #[test]
    fn test_soft_mode_drops_invalid_entries() {
        let validator = MetadataValidator::new(Some("a=1:broken:9x=2:b=3".to_string()));
        assert_eq!(
            validator.default_meta(DefaultMetaOptions::default()).unwrap(),
            meta(&[("a", "1"), ("b", "3")])
        );

        let validator = MetadataValidator::new(Some(r#"{"a": 1, "b": "2"}"#.to_string()));
        assert_eq!(
            validator.default_meta(DefaultMetaOptions::default()).unwrap(),
            meta(&[("b", "2")])
        );

        let validator = MetadataValidator::new(Some("{not json".to_string()));
        assert!(
            validator
                .default_meta(DefaultMetaOptions::default())
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn test_hard_mode_raises_first_invalid_entry() {
        let validator = MetadataValidator::new(Some("a=1:broken:9x=2".to_string()));
        let err = validator
            .default_meta(DefaultMetaOptions {
                cache: false,
                raise: true,
            })
            .unwrap_err();
        assert!(err.to_string().contains("'broken'"), "{err}");
    }

    #[test]
    fn test_cache_and_reset() {
        let mut validator = MetadataValidator::new(Some("a=1:broken".to_string()));

        // A soft read populates the cache, later hard reads reuse it without raising.
        let soft = validator.default_meta(DefaultMetaOptions::default()).unwrap();
        assert_eq!(soft, meta(&[("a", "1")]));
        assert_eq!(validator.validate_and_merge(&Meta::new()).unwrap(), soft);

        // Bypassing or resetting the cache parses the raw source again.
        let bypass = DefaultMetaOptions {
            cache: false,
            raise: true,
        };
        assert!(validator.default_meta(bypass).is_err());
        validator.reset();
        assert!(validator.validate_and_merge(&Meta::new()).is_err());
    }

    #[test]
    fn test_failed_hard_read_is_not_cached() {
        let validator = MetadataValidator::new(Some("broken".to_string()));
        assert!(validator.validate_and_merge(&Meta::new()).is_err());
        assert!(
            validator
                .default_meta(DefaultMetaOptions::default())
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn test_explicit_meta_wins() {
        let validator = MetadataValidator::new(Some("a=1:b=2".to_string()));
        let merged = validator
            .validate_and_merge(&meta(&[("b", "3"), ("c", "4")]))
            .unwrap();
        assert_eq!(merged, meta(&[("a", "1"), ("b", "3"), ("c", "4")]));
    }

    #[test]
    fn test_invalid_explicit_meta() {
        let validator = MetadataValidator::new(None);
        let err = validator
            .validate_and_merge(&meta(&[("0day", "x")]))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidMeta(_)));
        assert!(err.to_string().contains("'0day'"));
    }
}
